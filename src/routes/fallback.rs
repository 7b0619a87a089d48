use crate::error::AppError;
use axum::http::Uri;

/// Fallback for any path without a route; still passes through the CORS layer
pub async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(uri.path().to_string())
}
