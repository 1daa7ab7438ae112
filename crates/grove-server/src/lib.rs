//! # grove-server
//!
//! Server assembly for the GroveAuth identity provider: configuration
//! loading, router construction, middleware (security headers, dynamic
//! CORS, request ids), startup bootstrap, and the binary entry point.

pub mod bootstrap;
pub mod config;
pub mod health;
pub mod middleware;
pub mod server;

pub use config::{SeedClient, ServerConfig};
pub use server::{ServerBuilder, build_router, build_state};

use tracing_subscriber::EnvFilter;

/// Initializes the tracing subscriber from `RUST_LOG` (default `info`).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
