//! HTTP request metrics.
//!
//! Applied as the outermost layer so every response is counted, including
//! rejections produced before a handler runs (unknown route, wrong method,
//! timeout, auth failure). The raw path is passed to `record_http_request`,
//! which folds ids into route templates.

use crate::observability::metrics::record_http_request;
use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

/// Record method, normalized endpoint, status and latency of each request.
pub async fn http_metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    record_http_request(&method, &path, response.status().as_u16(), start.elapsed());
    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        middleware,
        routing::{get, patch},
        Router,
    };
    use tower::ServiceExt;

    async fn ok() -> &'static str {
        "OK"
    }

    async fn conflict() -> (StatusCode, &'static str) {
        (StatusCode::CONFLICT, "taken")
    }

    fn app() -> Router {
        Router::new()
            .route("/api/v1/decks", get(ok))
            .route("/api/v1/decks/:id/cards", axum::routing::post(conflict))
            .route("/api/v1/decks/like/:id", patch(ok))
            .layer(middleware::from_fn(http_metrics_middleware))
    }

    async fn status_of(method: &str, uri: &str) -> StatusCode {
        let request = HttpRequest::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .expect("request builder should succeed");
        app()
            .oneshot(request)
            .await
            .expect("request should succeed")
            .status()
    }

    #[tokio::test]
    async fn test_records_success() {
        assert_eq!(status_of("GET", "/api/v1/decks").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_records_handler_error_on_dynamic_path() {
        assert_eq!(
            status_of("POST", "/api/v1/decks/17/cards").await,
            StatusCode::CONFLICT
        );
    }

    #[tokio::test]
    async fn test_records_framework_rejections() {
        assert_eq!(status_of("GET", "/api/v1/nowhere").await, StatusCode::NOT_FOUND);
        assert_eq!(
            status_of("DELETE", "/api/v1/decks/like/3").await,
            StatusCode::METHOD_NOT_ALLOWED
        );
    }
}
