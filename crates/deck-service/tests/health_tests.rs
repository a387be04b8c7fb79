//! Health and metrics endpoint integration tests.
//!
//! Tests `/api/v1/health` and `/api/v1/metrics` using the `TestDeckServer`
//! harness.

use deck_test_utils::TestDeckServer;
use sqlx::PgPool;

/// Test that health endpoint returns 200 and healthy status.
#[sqlx::test(migrations = "../../migrations")]
async fn test_health_endpoint_returns_200(pool: PgPool) -> Result<(), anyhow::Error> {
    let server = TestDeckServer::spawn(pool).await?;

    let response = reqwest::get(server.api("/health")).await?;
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "healthy");

    Ok(())
}

/// Test that health endpoint returns JSON content type.
#[sqlx::test(migrations = "../../migrations")]
async fn test_health_endpoint_returns_json(pool: PgPool) -> Result<(), anyhow::Error> {
    let server = TestDeckServer::spawn(pool).await?;

    let response = reqwest::get(server.api("/health")).await?;

    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok());

    assert!(
        content_type.is_some_and(|ct| ct.contains("application/json")),
        "Expected application/json content type, got {:?}",
        content_type
    );

    Ok(())
}

/// Test that non-existent routes return 404.
#[sqlx::test(migrations = "../../migrations")]
async fn test_unknown_route_returns_404(pool: PgPool) -> Result<(), anyhow::Error> {
    let server = TestDeckServer::spawn(pool).await?;

    let response = reqwest::get(server.api("/nonexistent")).await?;
    assert_eq!(response.status(), 404);

    Ok(())
}

/// Test that the Prometheus endpoint is public and serves text.
#[sqlx::test(migrations = "../../migrations")]
async fn test_metrics_endpoint_is_public(pool: PgPool) -> Result<(), anyhow::Error> {
    let server = TestDeckServer::spawn(pool).await?;

    // Generate at least one request metric first
    reqwest::get(server.api("/health")).await?;

    let response = reqwest::get(server.api("/metrics")).await?;
    assert_eq!(response.status(), 200);

    Ok(())
}
