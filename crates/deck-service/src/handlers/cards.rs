//! Card handlers.
//!
//! - `POST /api/v1/decks/{id}/cards` - Submit a card (creator or admin)
//! - `GET /api/v1/cards/admin` - Every deck with its cards (admin)
//! - `GET /api/v1/cards/creator` - The caller's own cards (creator)
//! - `DELETE /api/v1/cards/{id}` - Delete a card (admin)

use crate::auth::Caller;
use crate::errors::DeckError;
use crate::handlers::{observe, parse_json_body};
use crate::models::{CardAuthor, CardResponse, DeckCardsResponse, SubmitCardRequest};
use crate::routes::AppState;
use crate::services::CardSubmissionService;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use common::types::Role;
use std::sync::Arc;
use tracing::instrument;

/// Handler for POST /api/v1/decks/{id}/cards
///
/// # Response
///
/// - 201 Created: Card stored with the next submission order
/// - 400 Bad Request: Text or choices fail validation
/// - 404 Not Found: Unknown deck
/// - 409 Conflict: Creator already has a card here, or the deck is full
#[instrument(skip_all, name = "deck.cards.submit", fields(deck_id = deck_id))]
pub async fn submit_card(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(deck_id): Path<i64>,
    body: Bytes,
) -> Result<(StatusCode, Json<CardResponse>), DeckError> {
    let request: SubmitCardRequest = parse_json_body(&body, "submit_card")?;

    let author = match caller.role {
        Role::Creator => CardAuthor::Creator(caller.id),
        Role::Admin => CardAuthor::Admin(caller.id),
    };

    let card = observe(
        "submit_card",
        CardSubmissionService::submit_card(&state.pool, deck_id, author, &request).await,
    )?;
    Ok((StatusCode::CREATED, Json(CardResponse::from(card))))
}

/// Handler for GET /api/v1/cards/admin
#[instrument(skip_all, name = "deck.cards.list_admin")]
pub async fn list_cards_for_admin(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<Vec<DeckCardsResponse>>, DeckError> {
    observe("list_cards_admin", caller.require_admin())?;
    let decks = observe(
        "list_cards_admin",
        CardSubmissionService::list_cards_for_admin(&state.pool, Utc::now()).await,
    )?;
    Ok(Json(decks))
}

/// Handler for GET /api/v1/cards/creator
#[instrument(skip_all, name = "deck.cards.list_creator")]
pub async fn list_cards_for_creator(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<Vec<DeckCardsResponse>>, DeckError> {
    let creator_id = observe("list_cards_creator", caller.require_creator())?;
    let decks = observe(
        "list_cards_creator",
        CardSubmissionService::list_cards_for_creator(&state.pool, creator_id, Utc::now()).await,
    )?;
    Ok(Json(decks))
}

/// Handler for DELETE /api/v1/cards/{id}
///
/// Creators holding this card as their random assignment get a new one on
/// their next request.
#[instrument(skip_all, name = "deck.cards.delete", fields(card_id = card_id))]
pub async fn delete_card(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(card_id): Path<i64>,
) -> Result<StatusCode, DeckError> {
    observe("delete_card", caller.require_admin())?;
    observe(
        "delete_card",
        CardSubmissionService::delete_card(&state.pool, card_id).await,
    )?;
    Ok(StatusCode::NO_CONTENT)
}
