//! Deck Service Library
//!
//! Backend of a collaborative choose-your-adventure card game:
//!
//! - Admins schedule time-boxed decks and move them through their statuses
//! - Creators submit binary-choice cards into decks
//! - Each creator gets one persistent random card per deck
//! - Email/password login issues short-lived HS256 bearer tokens
//!
//! # Architecture
//!
//! The service follows the Handler -> Service -> Repository pattern:
//!
//! ```text
//! routes/mod.rs -> handlers/*.rs -> services/*.rs -> repositories/*.rs
//! ```
//!
//! # Modules
//!
//! - `auth` - Token issuing, validation and caller roles
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Authentication and HTTP metrics layers
//! - `models` - Rows, domain types, requests and responses
//! - `observability` - Prometheus metrics
//! - `repositories` - Database access
//! - `routes` - Axum router setup
//! - `services` - Business rules

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
pub mod services;

/// Migrations embedded at compile time, applied at startup.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");
