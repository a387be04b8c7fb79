//! Middleware for the deck service.
//!
//! # Components
//!
//! - `auth` - Bearer token authentication (required and optional)
//! - `http_metrics` - HTTP request metrics for every response

pub mod auth;
pub mod http_metrics;

pub use auth::{optional_auth, require_auth, AuthState};
pub use http_metrics::http_metrics_middleware;
