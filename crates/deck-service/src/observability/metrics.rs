//! Metrics definitions for the deck service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `deck_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `method`: 7 values max (GET, POST, PATCH, DELETE, PUT, HEAD, OPTIONS)
//! - `endpoint`: parameterized paths, unknown paths collapse to `/other`
//! - `status`: 3 values (success, error, timeout)
//! - `operation`: bounded by code (`select_deck`, `insert_assignment`, ...)
//! - `outcome`, `error_type`: bounded by enum variants

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize the Prometheus metrics recorder and return the handle used by
/// the `/metrics` endpoint.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("deck_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("deck_db_query".to_string()),
            &[
                0.001, 0.002, 0.005, 0.010, 0.020, 0.050, 0.100, 0.250, 0.500, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set DB query buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("deck_random_assignment".to_string()),
            &[0.002, 0.005, 0.010, 0.020, 0.050, 0.100, 0.250, 0.500],
        )
        .map_err(|e| format!("Failed to set random assignment buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `deck_http_requests_total`, `deck_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
///
/// Captures framework-level rejections (415, 422, 404, 405) as well as
/// handler responses.
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("deck_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint.clone(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("deck_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Categorize HTTP status code into success/error/timeout
fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Normalize endpoint path to bound label cardinality.
fn normalize_endpoint(path: &str) -> String {
    match path {
        "/api/v1/health"
        | "/api/v1/metrics"
        | "/api/v1/auth/login"
        | "/api/v1/creators"
        | "/api/v1/admins"
        | "/api/v1/decks"
        | "/api/v1/cards/admin"
        | "/api/v1/cards/creator" => path.to_string(),
        _ => normalize_dynamic_endpoint(path),
    }
}

/// Replace numeric id segments with `{id}` for the known route shapes.
fn normalize_dynamic_endpoint(path: &str) -> String {
    let templated: Vec<&str> = path
        .split('/')
        .map(|segment| {
            if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
                "{id}"
            } else {
                segment
            }
        })
        .collect();
    let templated = templated.join("/");

    match templated.as_str() {
        "/api/v1/decks/{id}"
        | "/api/v1/decks/{id}/status"
        | "/api/v1/decks/{id}/cards"
        | "/api/v1/decks/like/{id}"
        | "/api/v1/cards/{id}"
        | "/api/v1/carte/aleatoire/deck/{id}" => templated,
        // Unknown paths normalized to "/other" to bound cardinality
        _ => "/other".to_string(),
    }
}

// ============================================================================
// Database Metrics
// ============================================================================

/// Record database query execution
///
/// Metric: `deck_db_query_duration_seconds`, `deck_db_queries_total`
/// Labels: `operation`, `status`
pub fn record_db_query(operation: &str, status: &str, duration: Duration) {
    histogram!("deck_db_query_duration_seconds",
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("deck_db_queries_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

// ============================================================================
// Domain Metrics
// ============================================================================

/// Record a random card request.
///
/// Metric: `deck_random_assignments_total`, `deck_random_assignment_duration_seconds`
/// Labels: `outcome` (existing, assigned, not_found, error), `attempts`
pub fn record_random_assignment(outcome: &str, attempts: u32, duration: Duration) {
    histogram!("deck_random_assignment_duration_seconds",
        "outcome" => outcome.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("deck_random_assignments_total",
        "outcome" => outcome.to_string(),
        "attempts" => attempts.to_string()
    )
    .increment(1);
}

/// Record a deck status change request.
///
/// Metric: `deck_status_transitions_total`
/// Labels: `to`, `result` (updated, noop)
pub fn record_status_transition(to: &str, result: &str) {
    counter!("deck_status_transitions_total",
        "to" => to.to_string(),
        "result" => result.to_string()
    )
    .increment(1);
}

/// Record an error by operation and category.
///
/// Metric: `deck_errors_total`
/// Labels: `operation`, `error_type`, `status_code`
pub fn record_error(operation: &str, error_type: &str, status_code: u16) {
    counter!("deck_errors_total",
        "operation" => operation.to_string(),
        "error_type" => error_type.to_string(),
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

// ============================================================================
// Tests
// ============================================================================
