//! Prometheus metrics endpoint handler.
//!
//! # Security
//!
//! This endpoint is unauthenticated so Prometheus can scrape it. Labels are
//! bounded (normalized endpoints, status classes, outcomes) and carry no
//! account data.

use axum::{extract::State, response::IntoResponse};
use metrics_exporter_prometheus::PrometheusHandle;

/// Handler for GET /api/v1/metrics
///
/// Returns the Prometheus text format:
/// ```text
/// # TYPE deck_random_assignments_total counter
/// deck_random_assignments_total{outcome="assigned",attempts="1"} 12
/// ```
#[tracing::instrument(skip_all, name = "deck.metrics.scrape")]
pub async fn metrics_handler(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    handle.render()
}
