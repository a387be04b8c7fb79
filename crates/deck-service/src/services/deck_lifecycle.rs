//! Deck lifecycle.
//!
//! Scheduling (create and update), explicit status transitions, read-time
//! playability, likes and the delete policy.
//!
//! # Scheduling invariant
//!
//! No two decks that still accept cards may have intersecting
//! `[start_date, end_date]` ranges, bounds inclusive. A full deck no longer
//! blocks its dates. Writers hold a transaction-scoped advisory lock while
//! they check and write, so two concurrent writers cannot both pass.
//!
//! # Status vs playability
//!
//! `status` is only changed by an admin. Whether a deck is playable is
//! computed on every read from its card count and end date and never
//! written back.

use crate::errors::DeckError;
use crate::models::{
    CreateDeckRequest, DeckListResponse, DeckResponse, DeckStatus, DeckSummary, UpdateDeckRequest,
    MAX_DECK_TITLE_CHARS, MIN_DECK_TITLE_CHARS,
};
use crate::observability::metrics;
use crate::repositories::{CardsRepository, DecksRepository, NewDeck, TransitionOutcome};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use common::types::Role;
use sqlx::PgPool;
use tracing::instrument;

/// Check title, dates and capacity. Returns the trimmed title.
pub fn validate_deck_fields(
    title: &str,
    start_date: NaiveDate,
    end_date: NaiveDate,
    card_capacity: i32,
) -> Result<String, DeckError> {
    let title = title.trim();
    let title_len = title.chars().count();
    if !(MIN_DECK_TITLE_CHARS..=MAX_DECK_TITLE_CHARS).contains(&title_len) {
        return Err(DeckError::BadRequest(format!(
            "Title must be between {} and {} characters",
            MIN_DECK_TITLE_CHARS, MAX_DECK_TITLE_CHARS
        )));
    }

    if start_date >= end_date {
        return Err(DeckError::BadRequest(
            "Start date must be before end date".to_string(),
        ));
    }

    if card_capacity <= 0 {
        return Err(DeckError::BadRequest(
            "Card capacity must be positive".to_string(),
        ));
    }

    Ok(title.to_string())
}

/// Inclusive interval intersection: `[a_start, a_end]` meets `[b_start, b_end]`.
pub fn intervals_overlap(
    a_start: NaiveDate,
    a_end: NaiveDate,
    b_start: NaiveDate,
    b_end: NaiveDate,
) -> bool {
    a_start <= b_end && b_start <= a_end
}

/// A deck is playable once it is full or its end date (00:00 UTC) has passed.
pub fn is_playable(summary: &DeckSummary, now: DateTime<Utc>) -> bool {
    let ends_at = summary.deck.end_date.and_time(NaiveTime::MIN).and_utc();
    summary.is_full() || now > ends_at
}

/// Project each deck to its response with the computed `playable` flag.
pub fn classify_playability(decks: &[DeckSummary], now: DateTime<Utc>) -> Vec<DeckResponse> {
    decks
        .iter()
        .map(|summary| DeckResponse::new(summary, is_playable(summary, now)))
        .collect()
}

/// Group deck responses by persisted status.
fn group_by_status(decks: Vec<DeckResponse>, include_planned: bool) -> DeckListResponse {
    let mut grouped = DeckListResponse {
        planned: include_planned.then(Vec::new),
        wip: Some(Vec::new()),
        pending: Some(Vec::new()),
        playable: Some(Vec::new()),
    };

    for deck in decks {
        let bucket = match deck.status {
            DeckStatus::Planned => grouped.planned.as_mut(),
            DeckStatus::Wip => grouped.wip.as_mut(),
            DeckStatus::Pending => grouped.pending.as_mut(),
            DeckStatus::Playable => grouped.playable.as_mut(),
        };
        if let Some(bucket) = bucket {
            bucket.push(deck);
        }
    }

    grouped
}

/// Service for deck lifecycle operations.
pub struct DeckLifecycleService;

impl DeckLifecycleService {
    /// Create a deck in status `planned`.
    ///
    /// # Errors
    ///
    /// - `DeckError::BadRequest` - Invalid title, dates or capacity, or a
    ///   start date before `today`
    /// - `DeckError::Conflict` - Dates overlap a deck still accepting cards
    #[instrument(skip_all, fields(admin_id = admin_id))]
    pub async fn create_deck(
        pool: &PgPool,
        request: &CreateDeckRequest,
        admin_id: i64,
        today: NaiveDate,
    ) -> Result<DeckSummary, DeckError> {
        let title = validate_deck_fields(
            &request.title,
            request.start_date,
            request.end_date,
            request.card_capacity,
        )?;

        if request.start_date < today {
            return Err(DeckError::BadRequest(
                "Start date cannot be in the past".to_string(),
            ));
        }

        let mut tx = pool.begin().await?;
        DecksRepository::lock_schedule(&mut tx).await?;

        Self::ensure_no_overlap(&mut tx, request.start_date, request.end_date, None).await?;

        let new_deck = NewDeck {
            title,
            start_date: request.start_date,
            end_date: request.end_date,
            card_capacity: request.card_capacity,
            owner_admin_id: admin_id,
        };
        let deck = DecksRepository::create(&mut *tx, &new_deck).await?;
        tx.commit().await?;

        tracing::info!(
            target: "deck.service.lifecycle",
            deck_id = deck.id,
            start = %deck.start_date,
            end = %deck.end_date,
            "Deck created"
        );

        Ok(DeckSummary {
            deck,
            card_count: 0,
        })
    }

    /// Change title, end date and capacity of an existing deck.
    ///
    /// Validation runs against the deck's stored start date. An already
    /// started deck can be rescheduled, and lowering the capacity below the
    /// current card count is accepted (the deck simply becomes full). A deck
    /// that is full after the update skips the overlap check.
    #[instrument(skip_all, fields(deck_id = deck_id))]
    pub async fn update_deck_schedule(
        pool: &PgPool,
        deck_id: i64,
        request: &UpdateDeckRequest,
    ) -> Result<DeckSummary, DeckError> {
        let mut tx = pool.begin().await?;
        DecksRepository::lock_schedule(&mut tx).await?;

        let existing = DecksRepository::find_by_id(&mut *tx, deck_id)
            .await?
            .ok_or_else(|| DeckError::NotFound("Deck not found".to_string()))?;

        let title = validate_deck_fields(
            &request.title,
            existing.start_date,
            request.end_date,
            request.card_capacity,
        )?;

        // A deck that stays full does not block its dates
        let card_count = CardsRepository::count_in_deck(&mut *tx, deck_id).await?;
        if card_count < i64::from(request.card_capacity) {
            Self::ensure_no_overlap(&mut tx, existing.start_date, request.end_date, Some(deck_id))
                .await?;
        }

        let deck = DecksRepository::update_schedule(
            &mut *tx,
            deck_id,
            &title,
            request.end_date,
            request.card_capacity,
        )
        .await?
        .ok_or_else(|| DeckError::NotFound("Deck not found".to_string()))?;
        tx.commit().await?;

        tracing::info!(
            target: "deck.service.lifecycle",
            deck_id = deck_id,
            end = %deck.end_date,
            capacity = deck.card_capacity,
            "Deck schedule updated"
        );

        Ok(DeckSummary { deck, card_count })
    }

    async fn ensure_no_overlap(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        start_date: NaiveDate,
        end_date: NaiveDate,
        exclude_id: Option<i64>,
    ) -> Result<(), DeckError> {
        let overlapping = DecksRepository::find_overlapping_under_capacity(
            &mut **tx,
            start_date,
            end_date,
            exclude_id,
        )
        .await?;

        if let Some(other) = overlapping.first() {
            tracing::debug!(
                target: "deck.service.lifecycle",
                conflicting_deck_id = other.deck.id,
                "Deck dates overlap an open deck"
            );
            return Err(DeckError::Conflict(format!(
                "Dates overlap deck '{}' ({} to {}) which still accepts cards",
                other.deck.title, other.deck.start_date, other.deck.end_date
            )));
        }

        Ok(())
    }

    /// Set a deck's status. Any status can move to any other.
    #[instrument(skip_all, fields(deck_id = deck_id, status = status.as_str()))]
    pub async fn transition_status(
        pool: &PgPool,
        deck_id: i64,
        status: DeckStatus,
    ) -> Result<TransitionOutcome, DeckError> {
        let outcome = DecksRepository::transition_status(pool, deck_id, status).await?;

        match outcome {
            TransitionOutcome::Updated => {
                metrics::record_status_transition(status.as_str(), "updated");
                tracing::info!(
                    target: "deck.service.lifecycle",
                    deck_id = deck_id,
                    status = status.as_str(),
                    "Deck status changed"
                );
            }
            TransitionOutcome::NoOp => {
                metrics::record_status_transition(status.as_str(), "noop");
            }
            TransitionOutcome::NotFound => {}
        }

        Ok(outcome)
    }

    /// Add one like. Returns the new count.
    #[instrument(skip_all, fields(deck_id = deck_id))]
    pub async fn like(pool: &PgPool, deck_id: i64) -> Result<i64, DeckError> {
        DecksRepository::increment_like(pool, deck_id)
            .await?
            .ok_or_else(|| DeckError::NotFound("Deck not found".to_string()))
    }

    /// Delete an empty deck.
    ///
    /// # Errors
    ///
    /// - `DeckError::NotFound` - Unknown deck
    /// - `DeckError::Conflict` - The deck still has cards
    #[instrument(skip_all, fields(deck_id = deck_id))]
    pub async fn delete_deck(pool: &PgPool, deck_id: i64) -> Result<(), DeckError> {
        let mut tx = pool.begin().await?;

        if DecksRepository::lock_for_update(&mut tx, deck_id)
            .await?
            .is_none()
        {
            return Err(DeckError::NotFound("Deck not found".to_string()));
        }

        let card_count = CardsRepository::count_in_deck(&mut *tx, deck_id).await?;
        if card_count > 0 {
            return Err(DeckError::Conflict(format!(
                "Deck still has {} card(s); delete them first",
                card_count
            )));
        }

        DecksRepository::delete(&mut *tx, deck_id).await?;
        tx.commit().await?;

        tracing::info!(
            target: "deck.service.lifecycle",
            deck_id = deck_id,
            "Deck deleted"
        );
        Ok(())
    }

    /// Role-filtered deck listing.
    ///
    /// - Admin: every deck, grouped by status
    /// - Creator: every deck except `planned`, grouped by status
    /// - Anonymous: only the decks computed as playable right now
    #[instrument(skip_all, fields(viewer = ?viewer))]
    pub async fn list_decks(
        pool: &PgPool,
        viewer: Option<Role>,
        now: DateTime<Utc>,
    ) -> Result<DeckListResponse, DeckError> {
        let summaries = DecksRepository::list_summaries(pool).await?;
        let decks = classify_playability(&summaries, now);

        Ok(match viewer {
            Some(Role::Admin) => group_by_status(decks, true),
            Some(Role::Creator) => group_by_status(decks, false),
            None => DeckListResponse {
                playable: Some(decks.into_iter().filter(|d| d.playable).collect()),
                ..Default::default()
            },
        })
    }
}
