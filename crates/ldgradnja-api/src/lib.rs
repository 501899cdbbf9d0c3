//! # ldgradnja-api
//!
//! HTTP layer for LDGradnja built on Axum: drawing conversion endpoints,
//! the AI API reverse proxy, health checks and the bundled frontend.

pub mod app;
pub mod error;
pub mod extractors;
pub mod frontend;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use app::{build_app, run_server};
pub use error::ApiError;
pub use state::AppState;
