use crate::cors::CorsPolicy;
use std::time::Instant;

/// Application state shared across all HTTP handlers.
///
/// This struct is wrapped in `Arc` and shared across all request handlers
/// via Axum's State extraction. Nothing in it is mutated after start-up.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Cross-origin policy registered for every route
    pub cors_policy: CorsPolicy,

    /// When the process finished bootstrapping
    pub started_at: Instant,
}

impl AppState {
    pub fn new(cors_policy: CorsPolicy) -> Self {
        Self {
            cors_policy,
            started_at: Instant::now(),
        }
    }
}
