//! Cross-origin policy for the HTTP layer.
//!
//! A single [`CorsPolicy`] is built from configuration at start-up and turned
//! into a `tower-http` [`CorsLayer`], fronted by [`CorsGuardLayer`] on every
//! route. The policy itself never changes afterwards; the layers only
//! consult it.
//!
//! Matching rules:
//! - The request path must match the policy's [`PathPattern`].
//! - The `Origin` header must equal one of the allowed origins, compared as
//!   `scheme://host[:port]` with the host lowercased and default port elided.
//! - Preflights that fail any of the above, or ask for an unlisted method or
//!   header, are refused with 403 and no `Access-Control-Allow-*` headers.
//! - Accepted preflights list the configured methods. With wildcard headers
//!   the requested headers are mirrored back.

mod guard;
mod path_pattern;

pub use guard::{dispatch, CorsGuard, CorsGuardLayer, Dispatch};
pub use path_pattern::PathPattern;

use crate::config::{CorsConfig, PRODUCTION_ORIGIN};
use crate::error::{AppError, AppResult};
use http::request::Parts;
use http::{HeaderName, HeaderValue, Method};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use url::Url;

/// Origins a policy accepts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigins {
    Any,
    /// Normalized `scheme://host[:port]` strings
    List(Vec<String>),
}

/// Request headers a policy accepts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedHeaders {
    Any,
    List(Vec<HeaderName>),
}

/// The cross-origin policy registered for the whole service.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    path_pattern: PathPattern,
    allowed_origins: AllowedOrigins,
    allowed_methods: Vec<Method>,
    allowed_headers: AllowedHeaders,
    allow_credentials: bool,
    max_age: Duration,
}

/// A cross-origin request, as a browser would present it
#[derive(Debug, Clone)]
pub struct CorsRequest<'a> {
    pub origin: &'a str,
    pub method: &'a Method,
    pub path: &'a str,
    pub request_headers: &'a [HeaderName],
}

/// Why a request falls outside the policy
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CorsRejection {
    #[error("path {0} is not covered by the policy")]
    PathNotCovered(String),

    #[error("origin {0} is not allowed")]
    OriginNotAllowed(String),

    #[error("method {0} is not allowed")]
    MethodNotAllowed(Method),

    #[error("header {0} is not allowed")]
    HeaderNotAllowed(HeaderName),

    #[error("malformed {0} header")]
    MalformedPreflight(String),
}

/// Serializable view of the effective policy
#[derive(Debug, Clone, Serialize)]
pub struct PolicySummary {
    pub path_pattern: String,
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub allow_credentials: bool,
    pub max_age_seconds: u64,
}

impl CorsPolicy {
    /// The policy the service ships with: the production frontend only.
    pub fn production() -> Self {
        Self {
            path_pattern: PathPattern::any(),
            allowed_origins: AllowedOrigins::List(vec![PRODUCTION_ORIGIN.to_string()]),
            allowed_methods: vec![
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ],
            allowed_headers: AllowedHeaders::Any,
            allow_credentials: false,
            max_age: Duration::from_secs(1800),
        }
    }

    /// Parse and validate a policy from raw configuration values.
    pub fn from_config(config: &CorsConfig) -> AppResult<Self> {
        config.validate().map_err(AppError::Configuration)?;

        let path_pattern = PathPattern::parse(&config.path_pattern)?;

        let allowed_origins = if config.allowed_origins.iter().any(|o| o.trim() == "*") {
            AllowedOrigins::Any
        } else {
            let mut origins = Vec::with_capacity(config.allowed_origins.len());
            for raw in &config.allowed_origins {
                let origin = parse_configured_origin(raw)?;
                if !origins.contains(&origin) {
                    origins.push(origin);
                }
            }
            AllowedOrigins::List(origins)
        };

        let mut allowed_methods = Vec::with_capacity(config.allowed_methods.len());
        for raw in &config.allowed_methods {
            let method = parse_method(raw)?;
            if !allowed_methods.contains(&method) {
                allowed_methods.push(method);
            }
        }

        let allowed_headers = if config.allowed_headers.iter().any(|h| h.trim() == "*") {
            AllowedHeaders::Any
        } else {
            let mut headers = Vec::with_capacity(config.allowed_headers.len());
            for raw in &config.allowed_headers {
                let name = HeaderName::from_bytes(raw.trim().as_bytes())
                    .map_err(|_| AppError::InvalidHeader(raw.clone()))?;
                if !headers.contains(&name) {
                    headers.push(name);
                }
            }
            AllowedHeaders::List(headers)
        };

        Ok(Self {
            path_pattern,
            allowed_origins,
            allowed_methods,
            allowed_headers,
            allow_credentials: config.allow_credentials,
            max_age: Duration::from_secs(config.max_age_seconds),
        })
    }

    pub fn path_pattern(&self) -> &PathPattern {
        &self.path_pattern
    }

    pub fn allowed_origins(&self) -> &AllowedOrigins {
        &self.allowed_origins
    }

    pub fn allowed_methods(&self) -> &[Method] {
        &self.allowed_methods
    }

    pub fn allowed_headers(&self) -> &AllowedHeaders {
        &self.allowed_headers
    }

    pub fn allow_credentials(&self) -> bool {
        self.allow_credentials
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    pub fn applies_to(&self, path: &str) -> bool {
        self.path_pattern.matches(path)
    }

    pub fn allows_origin(&self, origin: &str) -> bool {
        match &self.allowed_origins {
            AllowedOrigins::Any => true,
            AllowedOrigins::List(origins) => normalize_origin(origin)
                .map(|origin| origins.contains(&origin))
                .unwrap_or(false),
        }
    }

    pub fn allows_method(&self, method: &Method) -> bool {
        self.allowed_methods.contains(method)
    }

    pub fn allows_header(&self, name: &HeaderName) -> bool {
        match &self.allowed_headers {
            AllowedHeaders::Any => true,
            AllowedHeaders::List(names) => names.contains(name),
        }
    }

    /// Evaluate a request against the policy without going through the layer.
    pub fn check(&self, request: &CorsRequest<'_>) -> Result<(), CorsRejection> {
        if !self.applies_to(request.path) {
            return Err(CorsRejection::PathNotCovered(request.path.to_string()));
        }

        if !self.allows_origin(request.origin) {
            return Err(CorsRejection::OriginNotAllowed(request.origin.to_string()));
        }

        if !self.allows_method(request.method) {
            return Err(CorsRejection::MethodNotAllowed(request.method.clone()));
        }

        if let Some(name) = request
            .request_headers
            .iter()
            .find(|name| !self.allows_header(name))
        {
            return Err(CorsRejection::HeaderNotAllowed(name.clone()));
        }

        Ok(())
    }

    /// Build the middleware layer that enforces this policy.
    pub fn layer(&self) -> CorsLayer {
        let policy = self.clone();
        let allow_origin = AllowOrigin::predicate(move |origin: &HeaderValue, parts: &Parts| {
            policy.applies_to(parts.uri.path())
                && origin
                    .to_str()
                    .map(|origin| policy.allows_origin(origin))
                    .unwrap_or(false)
        });

        let allow_headers = match &self.allowed_headers {
            AllowedHeaders::Any => AllowHeaders::mirror_request(),
            AllowedHeaders::List(names) => AllowHeaders::list(names.iter().cloned()),
        };

        tracing::debug!(
            path_pattern = %self.path_pattern,
            credentials = self.allow_credentials,
            "Building CORS layer"
        );

        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods(AllowMethods::list(self.allowed_methods.iter().cloned()))
            .allow_headers(allow_headers)
            .allow_credentials(self.allow_credentials)
            .max_age(self.max_age)
    }

    pub fn summary(&self) -> PolicySummary {
        PolicySummary {
            path_pattern: self.path_pattern.to_string(),
            allowed_origins: match &self.allowed_origins {
                AllowedOrigins::Any => vec!["*".to_string()],
                AllowedOrigins::List(origins) => origins.clone(),
            },
            allowed_methods: self.allowed_methods.iter().map(|m| m.to_string()).collect(),
            allowed_headers: match &self.allowed_headers {
                AllowedHeaders::Any => vec!["*".to_string()],
                AllowedHeaders::List(names) => names.iter().map(|n| n.to_string()).collect(),
            },
            allow_credentials: self.allow_credentials,
            max_age_seconds: self.max_age.as_secs(),
        }
    }
}

impl Default for CorsPolicy {
    fn default() -> Self {
        Self::production()
    }
}

/// Reduce an origin to `scheme://host[:port]`; `None` for anything that is
/// not an http(s) origin (including the opaque `null` origin).
pub fn normalize_origin(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.host_str()?;
    Some(url.origin().ascii_serialization())
}

fn parse_configured_origin(raw: &str) -> AppResult<String> {
    let invalid = || AppError::InvalidOrigin(raw.to_string());
    let url = Url::parse(raw.trim()).map_err(|_| invalid())?;

    if url.path() != "/"
        || url.query().is_some()
        || url.fragment().is_some()
        || !url.username().is_empty()
        || url.password().is_some()
    {
        return Err(invalid());
    }

    normalize_origin(raw).ok_or_else(invalid)
}

fn parse_method(raw: &str) -> AppResult<Method> {
    let upper = raw.trim().to_ascii_uppercase();
    if upper.is_empty() || upper == "*" {
        return Err(AppError::InvalidMethod(raw.to_string()));
    }
    Method::from_bytes(upper.as_bytes()).map_err(|_| AppError::InvalidMethod(raw.to_string()))
}
