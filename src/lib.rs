//! dashgate - authenticating reverse proxy for static dashboards
//!
//! Sits in front of a set of per-tenant object-store buckets and serves
//! each one at `<base-domain>/<slug>/` or `<slug>.<base-domain>`.
//!
//! # Architecture
//!
//! - **router**: maps host and path to a dashboard, an auth endpoint or a redirect
//! - **auth**: OAuth 2.0 Authorization Code + PKCE login, encrypted cookie
//!   sessions and the access gate
//! - **proxy**: fetches objects from the bucket with single-page-app fallback
//! - **http**: axum server wiring everything together
//!
//! # Example
//!
//! ```rust,no_run
//! use dashgate::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     dashgate::telemetry::init_logging(&config.log_level, config.log_json);
//!     dashgate::http::start_server(config).await?;
//!     Ok(())
//! }
//! ```

// Core modules
pub mod constants;
pub mod error;
pub mod model;

// Infrastructure
pub mod config;
pub mod telemetry;

// Request handling
pub mod auth;
pub mod proxy;
pub mod router;

// Interface layers
pub mod cli;
pub mod http;

// Re-exports for convenience
pub use error::{GatewayError, Result};
pub use model::TenantDashboard;
