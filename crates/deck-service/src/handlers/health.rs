//! Health check handler.

use crate::errors::DeckError;
use crate::models::HealthResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::Json;
use std::sync::Arc;
use tracing::instrument;

/// Handler for GET /api/v1/health
///
/// Pings the database. An unreachable database is reported in the body
/// with a 200 so probes can still read it.
///
/// ```json
/// { "status": "healthy", "database": "healthy" }
/// ```
#[instrument(skip_all, name = "deck.health.check")]
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> Result<Json<HealthResponse>, DeckError> {
    let db_healthy = sqlx::query("SELECT 1").fetch_one(&state.pool).await.is_ok();

    let label = if db_healthy { "healthy" } else { "unhealthy" };
    if !db_healthy {
        tracing::warn!(target: "deck.handlers.health", "Database ping failed");
    }

    Ok(Json(HealthResponse {
        status: label.to_string(),
        database: Some(label.to_string()),
    }))
}
