use serde::Serialize;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    pub status: String,
    pub uptime_seconds: u64,
    pub cors_path_pattern: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}
