//! Deck service error types.
//!
//! All errors map to HTTP status codes via the `IntoResponse` impl.
//! Messages for server-side failures are replaced by generic text before they
//! reach the client; the underlying detail is logged.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Deck service error type.
///
/// Maps to HTTP status codes:
/// - BadRequest: 400 Bad Request
/// - InvalidToken: 401 Unauthorized
/// - Forbidden: 403 Forbidden
/// - NotFound: 404 Not Found
/// - Conflict: 409 Conflict
/// - DataIntegrity, Database, Internal: 500 Internal Server Error
/// - ServiceUnavailable: 503 Service Unavailable
#[derive(Debug, Error)]
pub enum DeckError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A stored row references something that no longer exists, or holds a
    /// payload that cannot be decoded.
    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl DeckError {
    /// Returns the HTTP status code for this error (for metrics recording).
    pub fn status_code(&self) -> u16 {
        match self {
            DeckError::Database(_) | DeckError::DataIntegrity(_) | DeckError::Internal(_) => 500,
            DeckError::InvalidToken(_) => 401,
            DeckError::NotFound(_) => 404,
            DeckError::Conflict(_) => 409,
            DeckError::Forbidden(_) => 403,
            DeckError::BadRequest(_) => 400,
            DeckError::ServiceUnavailable(_) => 503,
        }
    }

    /// Short label used as the `error_type` metric dimension.
    pub fn kind(&self) -> &'static str {
        match self {
            DeckError::Database(_) => "database",
            DeckError::InvalidToken(_) => "invalid_token",
            DeckError::NotFound(_) => "not_found",
            DeckError::Conflict(_) => "conflict",
            DeckError::Forbidden(_) => "forbidden",
            DeckError::BadRequest(_) => "bad_request",
            DeckError::DataIntegrity(_) => "data_integrity",
            DeckError::ServiceUnavailable(_) => "service_unavailable",
            DeckError::Internal(_) => "internal",
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for DeckError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            DeckError::Database(err) => {
                // Log actual error server-side, return generic message to client
                tracing::error!(target: "deck.database", error = %err, "Database operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "An internal database error occurred".to_string(),
                )
            }
            DeckError::InvalidToken(reason) => {
                (StatusCode::UNAUTHORIZED, "INVALID_TOKEN", reason.clone())
            }
            DeckError::NotFound(resource) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", resource.clone())
            }
            DeckError::Conflict(reason) => (StatusCode::CONFLICT, "CONFLICT", reason.clone()),
            DeckError::Forbidden(reason) => (StatusCode::FORBIDDEN, "FORBIDDEN", reason.clone()),
            DeckError::BadRequest(reason) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", reason.clone())
            }
            DeckError::DataIntegrity(detail) => {
                tracing::error!(target: "deck.integrity", detail = %detail, "Stored data is inconsistent");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATA_INTEGRITY",
                    "Stored data is inconsistent".to_string(),
                )
            }
            DeckError::ServiceUnavailable(reason) => {
                tracing::warn!(target: "deck.availability", reason = %reason, "Service unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Service temporarily unavailable".to_string(),
                )
            }
            DeckError::Internal(detail) => {
                tracing::error!(target: "deck.internal", detail = %detail, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        // Add WWW-Authenticate header for 401 responses
        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) = "Bearer realm=\"deck-api\", error=\"invalid_token\"".parse() {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}

/// Unique index allowing one card per creator and deck.
const CARD_PER_CREATOR_INDEX: &str = "idx_cards_deck_creator";

/// Convert sqlx errors to DeckError
impl From<sqlx::Error> for DeckError {
    fn from(err: sqlx::Error) -> Self {
        // A unique violation means a concurrent writer got there first
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                let message = match db_err.constraint() {
                    Some(CARD_PER_CREATOR_INDEX) => "You already submitted a card to this deck",
                    _ => "Resource already exists",
                };
                return DeckError::Conflict(message.to_string());
            }
        }
        DeckError::Database(err.to_string())
    }
}
