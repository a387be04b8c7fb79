//! Observability module for the deck service.
//!
//! Provides metrics definitions and recording helpers.

pub mod metrics;
