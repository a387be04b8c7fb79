//! Cards repository.

use crate::errors::DeckError;
use crate::models::{Card, CardAuthor, CardRow, Choice};
use crate::observability::metrics;
use crate::repositories::decks::status_label;
use crate::repositories::store::{Criteria, KeyedTable, OrderDirection, Store, Table, Values};
use sqlx::{Executor, Postgres};
use std::time::Instant;
use tracing::instrument;

pub struct Cards;

impl Table for Cards {
    type Row = CardRow;
    const TABLE_NAME: &'static str = "cards";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "deck_id",
        "creator_id",
        "admin_id",
        "text",
        "choice1",
        "choice2",
        "submission_order",
        "created_at",
    ];
}

impl KeyedTable for Cards {
    const ID_COLUMN: &'static str = "id";
}

/// Fields of a card about to be inserted.
#[derive(Debug, Clone)]
pub struct NewCard {
    pub deck_id: i64,
    pub author: CardAuthor,
    pub text: String,
    pub choice1: Choice,
    pub choice2: Choice,
    pub submission_order: i32,
}

fn to_cards(rows: Vec<CardRow>) -> Result<Vec<Card>, DeckError> {
    rows.into_iter().map(Card::try_from).collect()
}

fn encode_choice(choice: &Choice) -> Result<serde_json::Value, DeckError> {
    serde_json::to_value(choice)
        .map_err(|e| DeckError::Internal(format!("failed to encode choice: {}", e)))
}

/// Repository for card operations.
pub struct CardsRepository;

impl CardsRepository {
    /// Fetch a card with decoded choices.
    ///
    /// An undecodable stored payload surfaces as `DataIntegrity`.
    #[instrument(skip_all, fields(card_id = id))]
    pub async fn find_by_id<'e, E>(executor: E, id: i64) -> Result<Option<Card>, DeckError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        Store::<Cards>::find(executor, id)
            .await?
            .map(Card::try_from)
            .transpose()
    }

    /// Cards written by a creator, grouped by deck then submission order.
    #[instrument(skip_all, fields(creator_id = creator_id))]
    pub async fn list_by_creator<'e, E>(
        executor: E,
        creator_id: i64,
    ) -> Result<Vec<Card>, DeckError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let criteria = Criteria::new()
            .eq("creator_id", creator_id)
            .order_by("deck_id", OrderDirection::Asc)
            .order_by("submission_order", OrderDirection::Asc);
        to_cards(Store::<Cards>::find_all_by(executor, criteria).await?)
    }

    /// Every card, grouped by deck then submission order.
    #[instrument(skip_all)]
    pub async fn list_all<'e, E>(executor: E) -> Result<Vec<Card>, DeckError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let criteria = Criteria::new()
            .order_by("deck_id", OrderDirection::Asc)
            .order_by("submission_order", OrderDirection::Asc);
        to_cards(Store::<Cards>::find_all_by(executor, criteria).await?)
    }

    /// Ids of the cards in a deck, for uniform random selection.
    #[instrument(skip_all, fields(deck_id = deck_id))]
    pub async fn ids_in_deck<'e, E>(executor: E, deck_id: i64) -> Result<Vec<i64>, DeckError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let start = Instant::now();
        let result: Result<Vec<i64>, sqlx::Error> = sqlx::query_scalar(
            r#"
            SELECT id FROM cards
            WHERE deck_id = $1
            ORDER BY id
            "#,
        )
        .bind(deck_id) // $1
        .fetch_all(executor)
        .await;
        metrics::record_db_query("select_deck_card_ids", status_label(&result), start.elapsed());

        Ok(result?)
    }

    #[instrument(skip_all, fields(deck_id = deck_id))]
    pub async fn count_in_deck<'e, E>(executor: E, deck_id: i64) -> Result<i64, DeckError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let start = Instant::now();
        let result: Result<i64, sqlx::Error> =
            sqlx::query_scalar("SELECT COUNT(*) FROM cards WHERE deck_id = $1")
                .bind(deck_id) // $1
                .fetch_one(executor)
                .await;
        metrics::record_db_query("count_deck_cards", status_label(&result), start.elapsed());

        Ok(result?)
    }

    #[instrument(skip_all, fields(deck_id = deck_id))]
    pub async fn creator_has_card<'e, E>(
        executor: E,
        deck_id: i64,
        creator_id: i64,
    ) -> Result<bool, DeckError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let criteria = Criteria::new()
            .eq("deck_id", deck_id)
            .eq("creator_id", creator_id);
        Store::<Cards>::exists(executor, criteria).await
    }

    /// `max(submission_order) + 1` within the deck, or 1 for an empty deck.
    ///
    /// Only meaningful while the deck row is locked by the caller.
    #[instrument(skip_all, fields(deck_id = deck_id))]
    pub async fn next_submission_order<'e, E>(executor: E, deck_id: i64) -> Result<i32, DeckError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let start = Instant::now();
        let result: Result<i32, sqlx::Error> = sqlx::query_scalar(
            r#"
            SELECT COALESCE(MAX(submission_order), 0) + 1
            FROM cards
            WHERE deck_id = $1
            "#,
        )
        .bind(deck_id) // $1
        .fetch_one(executor)
        .await;
        metrics::record_db_query("next_submission_order", status_label(&result), start.elapsed());

        Ok(result?)
    }

    #[instrument(skip_all, fields(deck_id = new_card.deck_id))]
    pub async fn insert<'e, E>(executor: E, new_card: &NewCard) -> Result<Card, DeckError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let values = Values::new()
            .set("deck_id", new_card.deck_id)
            .set("creator_id", new_card.author.creator_id())
            .set("admin_id", new_card.author.admin_id())
            .set("text", new_card.text.clone())
            .set("choice1", encode_choice(&new_card.choice1)?)
            .set("choice2", encode_choice(&new_card.choice2)?)
            .set("submission_order", new_card.submission_order);

        let row = Store::<Cards>::create(executor, values).await?;
        Card::try_from(row)
    }

    #[instrument(skip_all, fields(card_id = id))]
    pub async fn delete<'e, E>(executor: E, id: i64) -> Result<bool, DeckError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        Store::<Cards>::delete(executor, id).await
    }
}
