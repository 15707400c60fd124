//! SECA gateway daemon
//!
//! Configuration loading, problem+json rendering and the axum router in
//! front of [`secagw_core::GatewayService`].

pub mod config;
pub mod problem;
pub mod routes;

pub use config::{ConfigError, DaemonConfig};
pub use problem::ApiError;
pub use routes::{AppState, build_router};
