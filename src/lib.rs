//! Cross-origin policy service for the Lost & Found web backend.
//!
//! The crate builds a single immutable [`cors::CorsPolicy`] from the
//! environment and registers it on an axum router.

pub mod admin;
pub mod config;
pub mod cors;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;
