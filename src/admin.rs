//! Administrative command handlers.
//!
//! These commands inspect the cross-origin policy the server would register
//! without starting it.

use crate::config::Config;
use crate::cors::{CorsPolicy, CorsRequest};
use crate::error::{AppError, AppResult};
use clap::Subcommand;
use http::{HeaderName, Method};
use tracing::info;

/// Administrative commands available via CLI.
#[derive(Subcommand, Debug)]
pub enum AdminCommands {
    /// Print the effective CORS policy as JSON
    ShowPolicy,

    /// Check whether a cross-origin request would be allowed
    Check {
        /// Value of the request's Origin header
        #[arg(long)]
        origin: String,

        /// Request method
        #[arg(long, default_value = "GET")]
        method: String,

        /// Request path
        #[arg(long, default_value = "/")]
        path: String,

        /// Request header the browser would ask to send (repeatable)
        #[arg(long = "header")]
        headers: Vec<String>,
    },
}

/// Run an administrative command with the given configuration.
pub fn run(config: Config, admin_command: AdminCommands) -> AppResult<()> {
    let policy = CorsPolicy::from_config(&config.cors)?;

    match admin_command {
        AdminCommands::ShowPolicy => show_policy(&policy),
        AdminCommands::Check {
            origin,
            method,
            path,
            headers,
        } => check(&policy, &origin, &method, &path, &headers),
    }
}

fn show_policy(policy: &CorsPolicy) -> AppResult<()> {
    let json = serde_json::to_string_pretty(&policy.summary())?;
    println!("{}", json);
    Ok(())
}

fn check(
    policy: &CorsPolicy,
    origin: &str,
    method: &str,
    path: &str,
    headers: &[String],
) -> AppResult<()> {
    let method = Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| AppError::InvalidMethod(method.to_string()))?;
    let request_headers = headers
        .iter()
        .map(|h| {
            HeaderName::from_bytes(h.trim().as_bytes())
                .map_err(|_| AppError::InvalidHeader(h.clone()))
        })
        .collect::<AppResult<Vec<_>>>()?;

    let request = CorsRequest {
        origin,
        method: &method,
        path,
        request_headers: &request_headers,
    };

    info!(origin, method = %method, path, "Checking cross-origin request");

    match policy.check(&request) {
        Ok(()) => println!("allowed: {} {} from {}", method, path, origin),
        Err(rejection) => println!("rejected: {}", rejection),
    }

    Ok(())
}
