//! Deck handlers.
//!
//! - `GET /api/v1/decks` - Role-filtered grouped listing (optional auth)
//! - `POST /api/v1/decks` - Create a deck (admin)
//! - `PATCH /api/v1/decks/{id}` - Reschedule a deck (admin)
//! - `PATCH /api/v1/decks/{id}/status` - Set a deck's status (admin)
//! - `DELETE /api/v1/decks/{id}` - Delete an empty deck (admin)
//! - `PATCH /api/v1/decks/like/{id}` - Like a deck (public)

use crate::auth::Caller;
use crate::errors::DeckError;
use crate::handlers::{observe, parse_json_body};
use crate::models::{
    CreateDeckRequest, DeckListResponse, DeckResponse, LikeResponse, StatusTransitionResponse,
    TransitionStatusRequest, UpdateDeckRequest,
};
use crate::repositories::TransitionOutcome;
use crate::routes::AppState;
use crate::services::deck_lifecycle::is_playable;
use crate::services::DeckLifecycleService;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::instrument;

/// Handler for GET /api/v1/decks
///
/// Admins see every group, creators every group but `planned`, anonymous
/// callers only the decks that are playable right now.
#[instrument(skip_all, name = "deck.decks.list")]
pub async fn list_decks(
    State(state): State<Arc<AppState>>,
    caller: Option<Extension<Caller>>,
) -> Result<Json<DeckListResponse>, DeckError> {
    let viewer = caller.map(|Extension(c)| c.role);
    let decks = observe(
        "list_decks",
        DeckLifecycleService::list_decks(&state.pool, viewer, Utc::now()).await,
    )?;
    Ok(Json(decks))
}

/// Handler for POST /api/v1/decks
///
/// # Response
///
/// - 201 Created: Deck created in status `planned`
/// - 400 Bad Request: Invalid fields or start date in the past
/// - 403 Forbidden: Caller is not an admin
/// - 409 Conflict: Dates overlap a deck still accepting cards
#[instrument(skip_all, name = "deck.decks.create")]
pub async fn create_deck(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    body: Bytes,
) -> Result<(StatusCode, Json<DeckResponse>), DeckError> {
    let admin_id = observe("create_deck", caller.require_admin())?;
    let request: CreateDeckRequest = parse_json_body(&body, "create_deck")?;

    let now = Utc::now();
    let summary = observe(
        "create_deck",
        DeckLifecycleService::create_deck(&state.pool, &request, admin_id, now.date_naive())
            .await,
    )?;

    let response = DeckResponse::new(&summary, is_playable(&summary, now));
    Ok((StatusCode::CREATED, Json(response)))
}

/// Handler for PATCH /api/v1/decks/{id}
#[instrument(skip_all, name = "deck.decks.update", fields(deck_id = deck_id))]
pub async fn update_deck(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(deck_id): Path<i64>,
    body: Bytes,
) -> Result<Json<DeckResponse>, DeckError> {
    observe("update_deck", caller.require_admin())?;
    let request: UpdateDeckRequest = parse_json_body(&body, "update_deck")?;

    let summary = observe(
        "update_deck",
        DeckLifecycleService::update_deck_schedule(&state.pool, deck_id, &request).await,
    )?;

    let response = DeckResponse::new(&summary, is_playable(&summary, Utc::now()));
    Ok(Json(response))
}

/// Handler for PATCH /api/v1/decks/{id}/status
///
/// Setting the status a deck already has succeeds with `changed: false`.
#[instrument(skip_all, name = "deck.decks.transition", fields(deck_id = deck_id))]
pub async fn transition_status(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(deck_id): Path<i64>,
    body: Bytes,
) -> Result<Json<StatusTransitionResponse>, DeckError> {
    observe("transition_status", caller.require_admin())?;
    let request: TransitionStatusRequest = parse_json_body(&body, "transition_status")?;

    let outcome = observe(
        "transition_status",
        DeckLifecycleService::transition_status(&state.pool, deck_id, request.status).await,
    )?;

    let changed = match outcome {
        TransitionOutcome::Updated => true,
        TransitionOutcome::NoOp => false,
        TransitionOutcome::NotFound => {
            return observe(
                "transition_status",
                Err(DeckError::NotFound("Deck not found".to_string())),
            )
        }
    };

    Ok(Json(StatusTransitionResponse {
        id: deck_id,
        status: request.status,
        changed,
    }))
}

/// Handler for DELETE /api/v1/decks/{id}
///
/// # Response
///
/// - 204 No Content: Deck deleted
/// - 404 Not Found: Unknown deck
/// - 409 Conflict: The deck still has cards
#[instrument(skip_all, name = "deck.decks.delete", fields(deck_id = deck_id))]
pub async fn delete_deck(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(deck_id): Path<i64>,
) -> Result<StatusCode, DeckError> {
    observe("delete_deck", caller.require_admin())?;
    observe(
        "delete_deck",
        DeckLifecycleService::delete_deck(&state.pool, deck_id).await,
    )?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for PATCH /api/v1/decks/like/{id}
///
/// Unauthenticated; every call adds one like.
#[instrument(skip_all, name = "deck.decks.like", fields(deck_id = deck_id))]
pub async fn like_deck(
    State(state): State<Arc<AppState>>,
    Path(deck_id): Path<i64>,
) -> Result<Json<LikeResponse>, DeckError> {
    let like_count = observe(
        "like_deck",
        DeckLifecycleService::like(&state.pool, deck_id).await,
    )?;
    Ok(Json(LikeResponse {
        id: deck_id,
        like_count,
    }))
}
