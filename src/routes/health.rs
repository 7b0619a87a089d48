use crate::routes::types::HealthCheckResponse;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use std::sync::Arc;

use super::AppState;

/// Health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let response = HealthCheckResponse {
        status: "healthy".to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        cors_path_pattern: state.cors_policy.path_pattern().to_string(),
        timestamp: chrono::Utc::now(),
    };

    Json(response)
}
