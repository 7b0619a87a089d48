//! Server startup and shutdown logic.
//!
//! `run_server` builds the cross-origin policy from configuration, registers
//! it on the router, binds the listener and serves until a shutdown signal.

use crate::config::Config;
use crate::cors::CorsPolicy;
use crate::error::{AppError, AppResult};
use crate::routes;
use crate::state::AppState;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Run the web server with the given configuration.
///
/// # Errors
///
/// This function will return an error if:
/// - The CORS configuration cannot be turned into a policy
/// - Server binding fails
/// - Server runtime error occurs
pub async fn run_server(config: Config, addr: String) -> AppResult<()> {
    info!("Starting lostfound-cors server...");

    let policy = CorsPolicy::from_config(&config.cors)?;
    let summary = policy.summary();
    info!(
        path_pattern = %summary.path_pattern,
        origins = ?summary.allowed_origins,
        methods = ?summary.allowed_methods,
        headers = ?summary.allowed_headers,
        credentials = summary.allow_credentials,
        max_age_seconds = summary.max_age_seconds,
        "Registered CORS policy"
    );

    let state = Arc::new(AppState::new(policy));
    let app = routes::create_router(state);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to bind to address {}: {}", addr, e)))?;

    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(create_shutdown_signal())
        .await
        .map_err(|e| AppError::Internal(format!("Server error: {}", e)))?;

    info!("Server shutdown complete");
    Ok(())
}

/// Create a future that resolves when a shutdown signal is received.
///
/// On Unix-like systems, this listens for both Ctrl+C (SIGINT) and SIGTERM.
/// On other platforms, it only listens for Ctrl+C.
///
/// # Panics
///
/// Panics if signal handler installation fails; without it the process
/// could never shut down gracefully.
async fn create_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    #[cfg(not(unix))]
    ctrl_c.await;

    info!("Shutdown signal received");
}
