//! Per-request dispatch in front of the `tower-http` CORS layer.
//!
//! `CorsLayer` treats every `OPTIONS` request as a preflight and advertises
//! the allowed methods and headers whatever the origin. The guard decides
//! first whether the policy applies at all:
//! - paths outside the pattern go straight to the inner service;
//! - requests without an allowed `Origin` get no `Access-Control-Allow-*`
//!   headers;
//! - preflights that fail [`CorsPolicy::check`] are answered with 403.

use super::{CorsPolicy, CorsRejection, CorsRequest};
use crate::error::AppError;
use crate::middleware::RequestId;
use axum::body::Body;
use axum::response::{IntoResponse, Response};
use http::{header, HeaderMap, HeaderName, HeaderValue, Method, Request};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service, ServiceExt};
use tower_http::cors::{preflight_request_headers, Cors};

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// How a single request is handled with respect to the policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Path not covered: no cross-origin processing at all
    OutOfScope,
    /// Covered path, but no allowed origin: served without CORS headers
    NotCrossOrigin,
    /// Served through the CORS layer
    CrossOrigin,
    /// Preflight refused
    Reject(CorsRejection),
}

/// Classify a request against the policy.
pub fn dispatch(policy: &CorsPolicy, method: &Method, path: &str, headers: &HeaderMap) -> Dispatch {
    if !policy.applies_to(path) {
        return Dispatch::OutOfScope;
    }

    let Some(origin) = headers.get(header::ORIGIN) else {
        return Dispatch::NotCrossOrigin;
    };
    let origin = origin.to_str().unwrap_or_default();

    let requested_method = headers.get(header::ACCESS_CONTROL_REQUEST_METHOD);
    if *method != Method::OPTIONS || requested_method.is_none() {
        return if policy.allows_origin(origin) {
            Dispatch::CrossOrigin
        } else {
            Dispatch::NotCrossOrigin
        };
    }

    let requested_method = match requested_method
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Method::from_bytes(v.trim().as_bytes()).ok())
    {
        Some(method) => method,
        None => {
            return Dispatch::Reject(CorsRejection::MalformedPreflight(
                "Access-Control-Request-Method".to_string(),
            ))
        }
    };

    let request_headers = match requested_headers(headers) {
        Ok(names) => names,
        Err(rejection) => return Dispatch::Reject(rejection),
    };

    let request = CorsRequest {
        origin,
        method: &requested_method,
        path,
        request_headers: &request_headers,
    };

    match policy.check(&request) {
        Ok(()) => Dispatch::CrossOrigin,
        Err(rejection) => Dispatch::Reject(rejection),
    }
}

fn requested_headers(headers: &HeaderMap) -> Result<Vec<HeaderName>, CorsRejection> {
    let malformed = || CorsRejection::MalformedPreflight("Access-Control-Request-Headers".to_string());
    let mut names = Vec::new();
    for value in headers.get_all(header::ACCESS_CONTROL_REQUEST_HEADERS) {
        let value = value.to_str().map_err(|_| malformed())?;
        for raw in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            names.push(HeaderName::from_bytes(raw.as_bytes()).map_err(|_| malformed())?);
        }
    }
    Ok(names)
}

/// `Vary` for responses on covered paths that skip the CORS layer
fn append_vary(response: &mut Response) {
    let names: Vec<String> = preflight_request_headers().map(|n| n.to_string()).collect();
    if let Ok(value) = HeaderValue::from_str(&names.join(", ")) {
        response.headers_mut().append(header::VARY, value);
    }
}

/// Layer wrapping a service with the policy-aware guard and the CORS layer
#[derive(Debug, Clone)]
pub struct CorsGuardLayer {
    policy: Arc<CorsPolicy>,
}

impl CorsGuardLayer {
    pub fn new(policy: CorsPolicy) -> Self {
        Self {
            policy: Arc::new(policy),
        }
    }
}

impl<S: Clone> Layer<S> for CorsGuardLayer {
    type Service = CorsGuard<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CorsGuard {
            policy: self.policy.clone(),
            cors: self.policy.layer().layer(inner.clone()),
            plain: inner,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CorsGuard<S> {
    policy: Arc<CorsPolicy>,
    cors: Cors<S>,
    plain: S,
}

impl<S> Service<Request<Body>> for CorsGuard<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<Result<Response, S::Error>>;

    // Readiness is driven per call through `oneshot` on a clone.
    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        match dispatch(&self.policy, req.method(), req.uri().path(), req.headers()) {
            Dispatch::CrossOrigin => Box::pin(self.cors.clone().oneshot(req)),
            Dispatch::OutOfScope => Box::pin(self.plain.clone().oneshot(req)),
            Dispatch::NotCrossOrigin => {
                let plain = self.plain.clone();
                Box::pin(async move {
                    let mut response = plain.oneshot(req).await?;
                    append_vary(&mut response);
                    Ok(response)
                })
            }
            Dispatch::Reject(rejection) => {
                let request_id = req
                    .extensions()
                    .get::<RequestId>()
                    .map(|id| id.as_str().to_string())
                    .unwrap_or_default();
                tracing::info!(
                    request_id = %request_id,
                    path = %req.uri().path(),
                    %rejection,
                    "Rejected CORS preflight"
                );

                let mut response = AppError::from(rejection).into_response();
                append_vary(&mut response);
                Box::pin(async move { Ok(response) })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CorsConfig, PRODUCTION_ORIGIN};

    fn headers(pairs: &[(HeaderName, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(name.clone(), value.parse().unwrap());
        }
        map
    }

    #[test]
    fn test_allowed_preflight_goes_through_cors_layer() {
        let map = headers(&[
            (header::ORIGIN, PRODUCTION_ORIGIN),
            (header::ACCESS_CONTROL_REQUEST_METHOD, "DELETE"),
            (header::ACCESS_CONTROL_REQUEST_HEADERS, "X-Custom-Header"),
        ]);
        assert_eq!(
            dispatch(&CorsPolicy::production(), &Method::OPTIONS, "/api/items", &map),
            Dispatch::CrossOrigin
        );
    }

    #[test]
    fn test_foreign_preflight_is_rejected() {
        let map = headers(&[
            (header::ORIGIN, "https://evil.example.com"),
            (header::ACCESS_CONTROL_REQUEST_METHOD, "DELETE"),
        ]);
        assert_eq!(
            dispatch(&CorsPolicy::production(), &Method::OPTIONS, "/api/items", &map),
            Dispatch::Reject(CorsRejection::OriginNotAllowed(
                "https://evil.example.com".to_string()
            ))
        );
    }

    #[test]
    fn test_preflight_for_unlisted_method_is_rejected() {
        let map = headers(&[
            (header::ORIGIN, PRODUCTION_ORIGIN),
            (header::ACCESS_CONTROL_REQUEST_METHOD, "PATCH"),
        ]);
        assert_eq!(
            dispatch(&CorsPolicy::production(), &Method::OPTIONS, "/api/items", &map),
            Dispatch::Reject(CorsRejection::MethodNotAllowed(Method::PATCH))
        );
    }

    #[test]
    fn test_malformed_request_headers_are_rejected() {
        let map = headers(&[
            (header::ORIGIN, PRODUCTION_ORIGIN),
            (header::ACCESS_CONTROL_REQUEST_METHOD, "GET"),
            (header::ACCESS_CONTROL_REQUEST_HEADERS, "bad header"),
        ]);
        assert!(matches!(
            dispatch(&CorsPolicy::production(), &Method::OPTIONS, "/", &map),
            Dispatch::Reject(CorsRejection::MalformedPreflight(_))
        ));
    }

    #[test]
    fn test_requests_without_origin_skip_cors() {
        assert_eq!(
            dispatch(&CorsPolicy::production(), &Method::OPTIONS, "/api/items", &HeaderMap::new()),
            Dispatch::NotCrossOrigin
        );
    }

    #[test]
    fn test_foreign_simple_request_skips_cors() {
        let map = headers(&[(header::ORIGIN, "https://evil.example.com")]);
        assert_eq!(
            dispatch(&CorsPolicy::production(), &Method::GET, "/api/items", &map),
            Dispatch::NotCrossOrigin
        );
    }

    #[test]
    fn test_uncovered_path_is_out_of_scope() {
        let config = CorsConfig {
            path_pattern: "/api/**".to_string(),
            ..CorsConfig::default()
        };
        let policy = CorsPolicy::from_config(&config).unwrap();
        let map = headers(&[
            (header::ORIGIN, PRODUCTION_ORIGIN),
            (header::ACCESS_CONTROL_REQUEST_METHOD, "GET"),
        ]);
        assert_eq!(
            dispatch(&policy, &Method::OPTIONS, "/static/x", &map),
            Dispatch::OutOfScope
        );
    }
}
