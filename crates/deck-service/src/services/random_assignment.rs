//! Random card assignment.
//!
//! Each creator gets one card per deck, picked uniformly at random among all
//! cards of the deck the first time it is requested and returned unchanged
//! on every later request.
//!
//! # Flow
//!
//! 1. Read the stored assignment for `(deck_id, creator_id)`; return its card
//! 2. Otherwise load the deck's card ids and pick one with the CSPRNG
//! 3. Insert-if-absent; a lost race or a card deleted in between restarts
//!    the flow at step 1, at most `MAX_ASSIGNMENT_ATTEMPTS` times
//!
//! The primary key on `random_assignments(deck_id, creator_id)` is what
//! makes concurrent first requests converge on a single card.

use crate::errors::DeckError;
use crate::models::Card;
use crate::observability::metrics;
use crate::repositories::{CardsRepository, DecksRepository, InsertOutcome, RandomAssignmentsRepository};
use ring::rand::{SecureRandom, SystemRandom};
use sqlx::PgPool;
use std::future::Future;
use std::time::Instant;
use tracing::instrument;

/// Rounds of read/pick/insert before giving up with `ServiceUnavailable`.
pub const MAX_ASSIGNMENT_ATTEMPTS: u32 = 3;

/// Draws of the CSPRNG before falling back to the first item.
const MAX_SAMPLING_DRAWS: usize = 8;

/// Pick one item uniformly at random.
///
/// Uses rejection sampling over 64-bit CSPRNG output so every index is
/// equally likely. Returns `None` only for an empty slice.
pub fn uniform_random_select<T>(items: &[T]) -> Option<&T> {
    if items.len() <= 1 {
        return items.first();
    }

    let rng = SystemRandom::new();
    let n = items.len() as u64;
    // Largest multiple of n representable; draws at or above it are biased.
    let zone = u64::MAX - (u64::MAX % n);

    for _ in 0..MAX_SAMPLING_DRAWS {
        let mut random_bytes = [0u8; 8];
        if rng.fill(&mut random_bytes).is_err() {
            tracing::warn!(
                target: "deck.service.assignment",
                "CSPRNG failed, falling back to first card"
            );
            return items.first();
        }

        let value = u64::from_le_bytes(random_bytes);
        if value < zone {
            return items.get((value % n) as usize);
        }
    }

    items.first()
}

/// Run `attempt` until it yields a value, an error, or
/// `MAX_ASSIGNMENT_ATTEMPTS` rounds have returned `Ok(None)`.
///
/// Returns the result together with the number of rounds run.
async fn retry_lost_races<T, F, Fut>(deck_id: i64, mut attempt: F) -> (Result<T, DeckError>, u32)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, DeckError>>,
{
    let mut attempts = 0;

    let result = loop {
        if attempts >= MAX_ASSIGNMENT_ATTEMPTS {
            tracing::warn!(
                target: "deck.service.assignment",
                deck_id = deck_id,
                attempts = attempts,
                "Random assignment exhausted retries"
            );
            break Err(DeckError::ServiceUnavailable(
                "Card assignment is busy, please retry".to_string(),
            ));
        }
        attempts += 1;

        match attempt().await {
            Ok(Some(found)) => break Ok(found),
            Ok(None) => {
                tracing::debug!(
                    target: "deck.service.assignment",
                    deck_id = deck_id,
                    attempt = attempts,
                    "Assignment attempt lost a race, retrying"
                );
            }
            Err(e) => break Err(e),
        }
    };

    (result, attempts)
}

/// Service for random card assignment.
pub struct RandomAssignmentService;

/// How a successful call was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    Existing,
    Assigned,
}

impl Resolution {
    fn as_str(&self) -> &'static str {
        match self {
            Resolution::Existing => "existing",
            Resolution::Assigned => "assigned",
        }
    }
}

impl RandomAssignmentService {
    /// Return the creator's card for a deck, assigning one on first call.
    ///
    /// # Errors
    ///
    /// - `DeckError::NotFound` - Unknown deck, or the deck has no cards
    /// - `DeckError::DataIntegrity` - The assignment points at a card that no
    ///   longer exists, or the card's stored choices cannot be decoded
    /// - `DeckError::ServiceUnavailable` - Every attempt lost a race
    /// - `DeckError::Database` - Database operation failed
    #[instrument(skip_all, fields(deck_id = deck_id, creator_id = creator_id))]
    pub async fn get_or_assign_card(
        pool: &PgPool,
        deck_id: i64,
        creator_id: i64,
    ) -> Result<Card, DeckError> {
        let start = Instant::now();
        let (result, attempts) =
            retry_lost_races(deck_id, || Self::attempt(pool, deck_id, creator_id)).await;

        let outcome = match &result {
            Ok((_, resolution)) => resolution.as_str(),
            Err(DeckError::NotFound(_)) => "not_found",
            Err(_) => "error",
        };
        metrics::record_random_assignment(outcome, attempts, start.elapsed());

        let (card, resolution) = result?;
        if resolution == Resolution::Assigned {
            tracing::info!(
                target: "deck.service.assignment",
                deck_id = deck_id,
                card_id = card.id,
                "Card assigned to creator"
            );
        }
        Ok(card)
    }

    /// One read/pick/insert round. `Ok(None)` means the round must be retried.
    async fn attempt(
        pool: &PgPool,
        deck_id: i64,
        creator_id: i64,
    ) -> Result<Option<(Card, Resolution)>, DeckError> {
        if let Some(existing) = RandomAssignmentsRepository::find(pool, deck_id, creator_id).await? {
            let card = CardsRepository::find_by_id(pool, existing.card_id)
                .await?
                .ok_or_else(|| {
                    tracing::error!(
                        target: "deck.service.assignment",
                        deck_id = deck_id,
                        card_id = existing.card_id,
                        "Assignment references a missing card"
                    );
                    DeckError::DataIntegrity(format!(
                        "assignment for deck {} references missing card {}",
                        deck_id, existing.card_id
                    ))
                })?;
            return Ok(Some((card, Resolution::Existing)));
        }

        if DecksRepository::find_by_id(pool, deck_id).await?.is_none() {
            return Err(DeckError::NotFound("Deck not found".to_string()));
        }

        let card_ids = CardsRepository::ids_in_deck(pool, deck_id).await?;
        let Some(&card_id) = uniform_random_select(&card_ids) else {
            return Err(DeckError::NotFound("Deck has no cards".to_string()));
        };

        match RandomAssignmentsRepository::insert_if_absent(pool, deck_id, creator_id, card_id)
            .await?
        {
            InsertOutcome::Inserted(row) => {
                // The card can still be deleted after our insert; its
                // assignment cascades with it, so start over.
                Ok(CardsRepository::find_by_id(pool, row.card_id)
                    .await?
                    .map(|card| (card, Resolution::Assigned)))
            }
            InsertOutcome::AlreadyAssigned | InsertOutcome::CardMissing => Ok(None),
        }
    }
}
