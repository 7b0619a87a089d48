use crate::error::{AppError, AppResult};
use std::env;
use std::str::FromStr;

mod cors;
mod logging;
mod server;

pub use cors::{CorsConfig, DEFAULT_ALLOWED_METHODS, PRODUCTION_ORIGIN};
pub use logging::{LogFormat, LoggingConfig};
pub use server::ServerConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from environment variables (and `.env`, if present)
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// Every key has a default, so an empty lookup yields the production
    /// configuration.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let server_host = lookup("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let server_port = parse_or(&lookup, "SERVER_PORT", 8080u16)?;

        let path_pattern = lookup("CORS_PATH_PATTERN").unwrap_or_else(|| "/**".to_string());
        let allowed_origins = lookup("CORS_ALLOWED_ORIGINS")
            .map(|s| split_list(&s))
            .unwrap_or_else(|| vec![PRODUCTION_ORIGIN.to_string()]);
        let allowed_methods = lookup("CORS_ALLOWED_METHODS")
            .map(|s| split_list(&s))
            .unwrap_or_else(|| DEFAULT_ALLOWED_METHODS.iter().map(|m| m.to_string()).collect());
        let allowed_headers = lookup("CORS_ALLOWED_HEADERS")
            .map(|s| split_list(&s))
            .unwrap_or_else(|| vec!["*".to_string()]);
        let allow_credentials = parse_or(&lookup, "CORS_ALLOW_CREDENTIALS", false)?;
        let max_age_seconds = parse_or(&lookup, "CORS_MAX_AGE_SECONDS", 1800u64)?;

        let log_format = match lookup("LOG_FORMAT") {
            Some(raw) => raw.parse().map_err(AppError::Configuration)?,
            None => LogFormat::Text,
        };

        let config = Config {
            server: ServerConfig {
                host: server_host,
                port: server_port,
            },
            cors: CorsConfig {
                path_pattern,
                allowed_origins,
                allowed_methods,
                allowed_headers,
                allow_credentials,
                max_age_seconds,
            },
            logging: LoggingConfig { format: log_format },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> AppResult<()> {
        self.server.validate().map_err(AppError::Configuration)?;
        self.cors.validate().map_err(AppError::Configuration)?;
        Ok(())
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> AppResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Configuration(format!("Invalid {}", key))),
        None => Ok(default),
    }
}

/// Split a comma separated list, dropping empty entries
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_production_policy() {
        let config = Config::from_lookup(|_| None).unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.cors.path_pattern, "/**");
        assert_eq!(config.cors.allowed_origins, vec![PRODUCTION_ORIGIN.to_string()]);
        assert_eq!(
            config.cors.allowed_methods,
            vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"]
        );
        assert_eq!(config.cors.allowed_headers, vec!["*"]);
        assert!(!config.cors.allow_credentials);
        assert_eq!(config.cors.max_age_seconds, 1800);
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn test_origin_list_is_trimmed() {
        let config = Config::from_lookup(lookup_from(&[(
            "CORS_ALLOWED_ORIGINS",
            " https://a.example.com , http://localhost:5173,, ",
        )]))
        .unwrap();

        assert_eq!(
            config.cors.allowed_origins,
            vec!["https://a.example.com", "http://localhost:5173"]
        );
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let err = Config::from_lookup(lookup_from(&[("SERVER_PORT", "not_a_port")])).unwrap_err();
        assert!(matches!(err, AppError::Configuration(msg) if msg == "Invalid SERVER_PORT"));
    }

    #[test]
    fn test_invalid_credentials_flag_is_rejected() {
        let err =
            Config::from_lookup(lookup_from(&[("CORS_ALLOW_CREDENTIALS", "yes")])).unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
    }

    #[test]
    fn test_wildcard_origin_with_credentials_is_rejected() {
        let err = Config::from_lookup(lookup_from(&[
            ("CORS_ALLOWED_ORIGINS", "*"),
            ("CORS_ALLOW_CREDENTIALS", "true"),
        ]))
        .unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
    }

    #[test]
    fn test_json_log_format() {
        let config = Config::from_lookup(lookup_from(&[("LOG_FORMAT", "JSON")])).unwrap();
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_unknown_log_format_is_rejected() {
        assert!(Config::from_lookup(lookup_from(&[("LOG_FORMAT", "xml")])).is_err());
    }
}
