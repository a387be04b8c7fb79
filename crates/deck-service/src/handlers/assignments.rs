//! Random card handler.

use crate::auth::Caller;
use crate::errors::DeckError;
use crate::handlers::observe;
use crate::models::CardResponse;
use crate::routes::AppState;
use crate::services::RandomAssignmentService;
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use std::sync::Arc;
use tracing::instrument;

/// Handler for POST /api/v1/carte/aleatoire/deck/{deck_id}
///
/// Returns the caller's card for the deck, assigning one at random on the
/// first request. Later requests return the same card.
///
/// # Response
///
/// - 200 OK: The assigned card
/// - 403 Forbidden: Caller is not a creator
/// - 404 Not Found: Unknown deck, or the deck has no cards yet
/// - 503 Service Unavailable: Assignment kept losing races; retry
#[instrument(skip_all, name = "deck.assignments.random_card", fields(deck_id = deck_id))]
pub async fn get_random_card(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(deck_id): Path<i64>,
) -> Result<Json<CardResponse>, DeckError> {
    let creator_id = observe("random_card", caller.require_creator())?;
    let card = observe(
        "random_card",
        RandomAssignmentService::get_or_assign_card(&state.pool, deck_id, creator_id).await,
    )?;
    Ok(Json(CardResponse::from(card)))
}
