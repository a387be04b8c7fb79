//! HTTP request handlers for the deck service.
//!
//! Handlers parse and authorize; business rules live in `services`.

pub mod assignments;
pub mod auth;
pub mod cards;
pub mod decks;
pub mod health;
pub mod metrics;

pub use assignments::get_random_card;
pub use auth::{create_admin, login, register_creator};
pub use cards::{delete_card, list_cards_for_admin, list_cards_for_creator, submit_card};
pub use decks::{create_deck, delete_deck, like_deck, list_decks, transition_status, update_deck};
pub use health::health_check;
pub use metrics::metrics_handler;

use crate::errors::DeckError;
use crate::observability::metrics::record_error;
use axum::body::Bytes;
use serde::de::DeserializeOwned;

/// Deserialize a JSON body manually so malformed input is a 400 rather than
/// axum's default 422.
pub(crate) fn parse_json_body<T: DeserializeOwned>(
    body: &Bytes,
    operation: &str,
) -> Result<T, DeckError> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!(target: "deck.handlers", operation = operation, error = %e, "Invalid request body");
        let err = DeckError::BadRequest("Invalid request body".to_string());
        record_error(operation, err.kind(), err.status_code());
        err
    })
}

/// Count a failed operation before handing the error to axum.
pub(crate) fn observe<T>(operation: &str, result: Result<T, DeckError>) -> Result<T, DeckError> {
    if let Err(e) = &result {
        record_error(operation, e.kind(), e.status_code());
    }
    result
}
