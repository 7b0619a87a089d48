use axum::middleware;
use axum::routing::get;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::cors::CorsGuardLayer;

use super::fallback;
use super::health;
use super::AppState;

/// Create application router.
///
/// The CORS guard is applied after the fallback is registered so that
/// unrouted paths get the same cross-origin treatment as real ones. It sits
/// inside the request-id middleware so rejections carry the request ID.
pub fn create_router(state: Arc<AppState>) -> axum::Router {
    use crate::middleware::request_id_middleware;

    let cors = CorsGuardLayer::new(state.cors_policy.clone());

    axum::Router::new()
        .route("/api/health", get(health::health_check))
        .fallback(fallback::not_found)
        .layer(cors)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
