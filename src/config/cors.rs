/// Frontend origin the service accepts cross-origin calls from by default
pub const PRODUCTION_ORIGIN: &str = "https://lost-found-web-application-production.up.railway.app";

/// Methods a browser may use cross-origin when nothing else is configured
pub const DEFAULT_ALLOWED_METHODS: [&str; 5] = ["GET", "POST", "PUT", "DELETE", "OPTIONS"];

/// CORS configuration, as read from the environment.
///
/// Values are kept as raw strings here; `CorsPolicy::from_config` parses them.
#[derive(Debug, Clone)]
pub struct CorsConfig {
    /// Path pattern the policy applies to (e.g., "/**")
    pub path_pattern: String,

    /// Allowed origins (use ["*"] for all origins)
    pub allowed_origins: Vec<String>,

    /// Allowed HTTP methods
    pub allowed_methods: Vec<String>,

    /// Allowed request headers (use ["*"] for all headers)
    pub allowed_headers: Vec<String>,

    /// Whether browsers may send credentials with cross-origin requests
    pub allow_credentials: bool,

    /// How long browsers may cache a preflight answer, in seconds
    pub max_age_seconds: u64,
}

impl CorsConfig {
    /// Validate CORS configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.path_pattern.trim().is_empty() {
            return Err("CORS_PATH_PATTERN cannot be empty".to_string());
        }

        if self.allowed_origins.is_empty() {
            return Err("CORS_ALLOWED_ORIGINS must list at least one origin".to_string());
        }

        if self.allowed_methods.is_empty() {
            return Err("CORS_ALLOWED_METHODS must list at least one method".to_string());
        }

        if self.allow_credentials && self.allowed_origins.iter().any(|o| o.trim() == "*") {
            return Err(
                "CORS_ALLOW_CREDENTIALS cannot be combined with a wildcard origin".to_string(),
            );
        }

        Ok(())
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            path_pattern: "/**".to_string(),
            allowed_origins: vec![PRODUCTION_ORIGIN.to_string()],
            allowed_methods: DEFAULT_ALLOWED_METHODS.iter().map(|m| m.to_string()).collect(),
            allowed_headers: vec!["*".to_string()],
            allow_credentials: false,
            max_age_seconds: 1800,
        }
    }
}
