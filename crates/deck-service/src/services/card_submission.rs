//! Card submission and card listings.
//!
//! Submission runs in one transaction holding the deck row lock, so the
//! capacity check and `submission_order = max + 1` are evaluated serially
//! per deck. The partial unique index on `cards(deck_id, creator_id)` backs
//! up the one-card-per-creator rule.

use crate::errors::DeckError;
use crate::models::{
    Card, CardAuthor, CardResponse, DeckCardsResponse, DeckResponse, DeckSummary,
    SubmitCardRequest,
};
use crate::repositories::{CardsRepository, DecksRepository, NewCard};
use crate::services::deck_lifecycle::is_playable;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::BTreeMap;
use tracing::instrument;

/// Pair each deck with its cards, keeping deck order and dropping decks
/// for which `keep_empty` is false and no card matched.
fn group_cards_by_deck(
    decks: &[DeckSummary],
    cards: Vec<Card>,
    keep_empty: bool,
    now: DateTime<Utc>,
) -> Vec<DeckCardsResponse> {
    let mut by_deck: BTreeMap<i64, Vec<CardResponse>> = BTreeMap::new();
    for card in cards {
        by_deck
            .entry(card.deck_id)
            .or_default()
            .push(CardResponse::from(card));
    }

    decks
        .iter()
        .filter_map(|summary| {
            let cards = by_deck.remove(&summary.deck.id).unwrap_or_default();
            if cards.is_empty() && !keep_empty {
                return None;
            }
            Some(DeckCardsResponse {
                deck: DeckResponse::new(summary, is_playable(summary, now)),
                cards,
            })
        })
        .collect()
}

/// Service for card operations.
pub struct CardSubmissionService;

impl CardSubmissionService {
    /// Submit a card to a deck.
    ///
    /// # Errors
    ///
    /// - `DeckError::BadRequest` - Text or choices fail validation
    /// - `DeckError::NotFound` - Unknown deck
    /// - `DeckError::Conflict` - The creator already has a card in this deck,
    ///   or the deck is full
    #[instrument(skip_all, fields(deck_id = deck_id, author = ?author))]
    pub async fn submit_card(
        pool: &PgPool,
        deck_id: i64,
        author: CardAuthor,
        request: &SubmitCardRequest,
    ) -> Result<Card, DeckError> {
        request
            .validate()
            .map_err(|msg| DeckError::BadRequest(msg.to_string()))?;

        let mut tx = pool.begin().await?;

        let deck = DecksRepository::lock_for_update(&mut tx, deck_id)
            .await?
            .ok_or_else(|| DeckError::NotFound("Deck not found".to_string()))?;

        if let Some(creator_id) = author.creator_id() {
            if CardsRepository::creator_has_card(&mut *tx, deck_id, creator_id).await? {
                return Err(DeckError::Conflict(
                    "You already submitted a card to this deck".to_string(),
                ));
            }
        }

        let card_count = CardsRepository::count_in_deck(&mut *tx, deck_id).await?;
        if card_count >= i64::from(deck.card_capacity) {
            return Err(DeckError::Conflict("Deck is full".to_string()));
        }

        let submission_order = CardsRepository::next_submission_order(&mut *tx, deck_id).await?;

        let new_card = NewCard {
            deck_id,
            author,
            text: request.text.trim().to_string(),
            choice1: request.choice1.trimmed(),
            choice2: request.choice2.trimmed(),
            submission_order,
        };
        let card = CardsRepository::insert(&mut *tx, &new_card).await?;
        tx.commit().await?;

        tracing::info!(
            target: "deck.service.cards",
            deck_id = deck_id,
            card_id = card.id,
            submission_order = submission_order,
            "Card submitted"
        );

        Ok(card)
    }

    /// Every deck with its card count and all of its cards.
    #[instrument(skip_all)]
    pub async fn list_cards_for_admin(
        pool: &PgPool,
        now: DateTime<Utc>,
    ) -> Result<Vec<DeckCardsResponse>, DeckError> {
        let decks = DecksRepository::list_summaries(pool).await?;
        let cards = CardsRepository::list_all(pool).await?;
        Ok(group_cards_by_deck(&decks, cards, true, now))
    }

    /// The creator's own cards, grouped by deck.
    #[instrument(skip_all, fields(creator_id = creator_id))]
    pub async fn list_cards_for_creator(
        pool: &PgPool,
        creator_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<DeckCardsResponse>, DeckError> {
        let decks = DecksRepository::list_summaries(pool).await?;
        let cards = CardsRepository::list_by_creator(pool, creator_id).await?;
        Ok(group_cards_by_deck(&decks, cards, false, now))
    }

    /// Delete a card. Assignments pointing at it are removed with it, so
    /// affected creators get a fresh card on their next request.
    ///
    /// Runs under the schedule lock and the deck row lock: a full deck that
    /// shares dates with an open deck cannot be reopened by a delete.
    ///
    /// # Errors
    ///
    /// - `DeckError::NotFound` - Unknown card
    /// - `DeckError::Conflict` - The deck would accept cards again while its
    ///   dates overlap another deck that still accepts cards
    #[instrument(skip_all, fields(card_id = card_id))]
    pub async fn delete_card(pool: &PgPool, card_id: i64) -> Result<(), DeckError> {
        let mut tx = pool.begin().await?;
        DecksRepository::lock_schedule(&mut tx).await?;

        let card = CardsRepository::find_by_id(&mut *tx, card_id)
            .await?
            .ok_or_else(|| DeckError::NotFound("Card not found".to_string()))?;

        let deck = DecksRepository::lock_for_update(&mut tx, card.deck_id)
            .await?
            .ok_or_else(|| DeckError::NotFound("Deck not found".to_string()))?;

        let remaining = CardsRepository::count_in_deck(&mut *tx, deck.id).await? - 1;
        if remaining < i64::from(deck.card_capacity) {
            let overlapping = DecksRepository::find_overlapping_under_capacity(
                &mut *tx,
                deck.start_date,
                deck.end_date,
                Some(deck.id),
            )
            .await?;

            if let Some(other) = overlapping.first() {
                tracing::debug!(
                    target: "deck.service.cards",
                    deck_id = deck.id,
                    conflicting_deck_id = other.deck.id,
                    "Card delete would reopen an overlapping deck"
                );
                return Err(DeckError::Conflict(format!(
                    "Deleting this card would reopen deck '{}' while deck '{}' ({} to {}) \
                     still accepts cards",
                    deck.title, other.deck.title, other.deck.start_date, other.deck.end_date
                )));
            }
        }

        if !CardsRepository::delete(&mut *tx, card_id).await? {
            return Err(DeckError::NotFound("Card not found".to_string()));
        }
        tx.commit().await?;

        tracing::info!(
            target: "deck.service.cards",
            card_id = card_id,
            deck_id = deck.id,
            "Card deleted"
        );
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::{Choice, Deck, DeckStatus};
    use chrono::{NaiveDate, TimeZone};

    fn deck(id: i64, cards: i64) -> DeckSummary {
        DeckSummary {
            deck: Deck {
                id,
                title: format!("Deck {}", id),
                start_date: NaiveDate::from_ymd_opt(2026, 11, 1).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2026, 11, 30).unwrap(),
                card_capacity: 3,
                like_count: 0,
                status: DeckStatus::Wip,
                owner_admin_id: 1,
                created_at: Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap(),
            },
            card_count: cards,
        }
    }

    fn card(id: i64, deck_id: i64, order: i32) -> Card {
        let choice = Choice {
            label: "Go".to_string(),
            population: 1,
            finance: -1,
        };
        Card {
            id,
            deck_id,
            author: CardAuthor::Creator(7),
            text: "t".repeat(60),
            choice1: choice.clone(),
            choice2: choice,
            submission_order: order,
            created_at: Utc.with_ymd_and_hms(2026, 10, 2, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_group_cards_by_deck_keeps_deck_order() {
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 0, 0, 0).unwrap();
        let decks = vec![deck(1, 2), deck(2, 0), deck(3, 1)];
        let cards = vec![card(10, 1, 1), card(11, 1, 2), card(12, 3, 1)];

        let grouped = group_cards_by_deck(&decks, cards, true, now);
        assert_eq!(grouped.len(), 3);
        assert_eq!(grouped[0].deck.id, 1);
        assert_eq!(grouped[0].cards.len(), 2);
        assert_eq!(grouped[1].deck.id, 2);
        assert!(grouped[1].cards.is_empty());
        assert_eq!(grouped[2].cards[0].id, 12);
    }

    #[test]
    fn test_group_cards_by_deck_drops_empty_when_asked() {
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 0, 0, 0).unwrap();
        let decks = vec![deck(1, 1), deck(2, 0)];
        let cards = vec![card(10, 1, 1)];

        let grouped = group_cards_by_deck(&decks, cards, false, now);
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0].deck.id, 1);
    }
}
