//! Decks repository.
//!
//! Plain CRUD goes through [`Store`]; the grouped card counts, overlap
//! search, conditional status update and like increment are hand-written
//! statements because each must be a single atomic query.

use crate::errors::DeckError;
use crate::models::{Deck, DeckRow, DeckStatus, DeckSummary, DeckSummaryRow};
use crate::observability::metrics;
use crate::repositories::store::{KeyedTable, Store, Table, Values};
use chrono::NaiveDate;
use sqlx::{Executor, PgConnection, PgPool, Postgres};
use std::time::Instant;
use tracing::instrument;

/// Advisory lock key serializing deck schedule writes (create/update).
///
/// Held for the duration of the writing transaction so two concurrent
/// writers cannot both pass the overlap check.
const DECK_SCHEDULE_LOCK_KEY: i64 = 0x6465_636b_7363_6864; // "deckschd"

pub struct Decks;

impl Table for Decks {
    type Row = DeckRow;
    const TABLE_NAME: &'static str = "decks";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "title",
        "start_date",
        "end_date",
        "card_capacity",
        "like_count",
        "status",
        "owner_admin_id",
        "created_at",
    ];
}

impl KeyedTable for Decks {
    const ID_COLUMN: &'static str = "id";
}

/// Fields of a deck about to be inserted.
#[derive(Debug, Clone)]
pub struct NewDeck {
    pub title: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub card_capacity: i32,
    pub owner_admin_id: i64,
}

/// Result of a conditional status update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    Updated,
    /// The deck already had the requested status; the row was not touched.
    NoOp,
    NotFound,
}

/// Columns of a deck summary, with the card count aggregated per deck.
const SUMMARY_SELECT: &str = r#"
    SELECT
        d.id, d.title, d.start_date, d.end_date, d.card_capacity,
        d.like_count, d.status, d.owner_admin_id, d.created_at,
        COUNT(c.id) AS card_count
    FROM decks d
    LEFT JOIN cards c ON c.deck_id = d.id
"#;

/// Repository for deck operations.
pub struct DecksRepository;

impl DecksRepository {
    #[instrument(skip_all, fields(deck_id = id))]
    pub async fn find_by_id<'e, E>(executor: E, id: i64) -> Result<Option<Deck>, DeckError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        Store::<Decks>::find(executor, id)
            .await?
            .map(Deck::try_from)
            .transpose()
    }

    #[instrument(skip_all, fields(admin_id = new_deck.owner_admin_id))]
    pub async fn create<'e, E>(executor: E, new_deck: &NewDeck) -> Result<Deck, DeckError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let values = Values::new()
            .set("title", new_deck.title.clone())
            .set("start_date", new_deck.start_date)
            .set("end_date", new_deck.end_date)
            .set("card_capacity", new_deck.card_capacity)
            .set("status", DeckStatus::Planned.as_str().to_string())
            .set("like_count", 0_i64)
            .set("owner_admin_id", new_deck.owner_admin_id);

        let row = Store::<Decks>::create(executor, values).await?;
        Deck::try_from(row)
    }

    /// Rewrite title, end date and capacity. Returns `None` for an unknown id.
    #[instrument(skip_all, fields(deck_id = id))]
    pub async fn update_schedule<'e, E>(
        executor: E,
        id: i64,
        title: &str,
        end_date: NaiveDate,
        card_capacity: i32,
    ) -> Result<Option<Deck>, DeckError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let values = Values::new()
            .set("title", title.to_string())
            .set("end_date", end_date)
            .set("card_capacity", card_capacity);

        Store::<Decks>::update(executor, id, values)
            .await?
            .map(Deck::try_from)
            .transpose()
    }

    #[instrument(skip_all, fields(deck_id = id))]
    pub async fn delete<'e, E>(executor: E, id: i64) -> Result<bool, DeckError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        Store::<Decks>::delete(executor, id).await
    }

    /// Every deck with its card count, ordered by start date.
    #[instrument(skip_all)]
    pub async fn list_summaries<'e, E>(executor: E) -> Result<Vec<DeckSummary>, DeckError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("{SUMMARY_SELECT} GROUP BY d.id ORDER BY d.start_date, d.id");

        let start = Instant::now();
        let result: Result<Vec<DeckSummaryRow>, sqlx::Error> =
            sqlx::query_as(&sql).fetch_all(executor).await;
        metrics::record_db_query("list_deck_summaries", status_label(&result), start.elapsed());

        result?.into_iter().map(DeckSummary::try_from).collect()
    }

    /// Under-capacity decks whose `[start_date, end_date]` intersects the given
    /// range (bounds inclusive), optionally ignoring one deck.
    #[instrument(skip_all, fields(start = %start_date, end = %end_date))]
    pub async fn find_overlapping_under_capacity<'e, E>(
        executor: E,
        start_date: NaiveDate,
        end_date: NaiveDate,
        exclude_id: Option<i64>,
    ) -> Result<Vec<DeckSummary>, DeckError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "{SUMMARY_SELECT}
            WHERE d.start_date <= $2
              AND $1 <= d.end_date
              AND ($3::BIGINT IS NULL OR d.id <> $3)
            GROUP BY d.id
            HAVING COUNT(c.id) < d.card_capacity
            ORDER BY d.start_date, d.id"
        );

        let start = Instant::now();
        let result: Result<Vec<DeckSummaryRow>, sqlx::Error> = sqlx::query_as(&sql)
            .bind(start_date) // $1
            .bind(end_date) // $2
            .bind(exclude_id) // $3
            .fetch_all(executor)
            .await;
        metrics::record_db_query("find_overlapping_decks", status_label(&result), start.elapsed());

        result?.into_iter().map(DeckSummary::try_from).collect()
    }

    /// Take the transaction-scoped lock that serializes schedule writers.
    #[instrument(skip_all)]
    pub async fn lock_schedule(conn: &mut PgConnection) -> Result<(), DeckError> {
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(DECK_SCHEDULE_LOCK_KEY) // $1
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Lock a deck row for the rest of the transaction.
    ///
    /// Card submission and deck deletion take this lock so that capacity,
    /// submission order and emptiness are evaluated serially per deck.
    #[instrument(skip_all, fields(deck_id = id))]
    pub async fn lock_for_update(conn: &mut PgConnection, id: i64) -> Result<Option<Deck>, DeckError> {
        let start = Instant::now();
        let result: Result<Option<DeckRow>, sqlx::Error> = sqlx::query_as(
            r#"
            SELECT id, title, start_date, end_date, card_capacity,
                   like_count, status, owner_admin_id, created_at
            FROM decks
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id) // $1
        .fetch_optional(conn)
        .await;
        metrics::record_db_query("lock_deck", status_label(&result), start.elapsed());

        result?.map(Deck::try_from).transpose()
    }

    /// Set the status unless it already has that value.
    ///
    /// One conditional `UPDATE`; a follow-up existence check tells a no-op
    /// apart from an unknown deck.
    #[instrument(skip_all, fields(deck_id = id, status = status.as_str()))]
    pub async fn transition_status(
        pool: &PgPool,
        id: i64,
        status: DeckStatus,
    ) -> Result<TransitionOutcome, DeckError> {
        let start = Instant::now();
        let result: Result<Option<i64>, sqlx::Error> = sqlx::query_scalar(
            r#"
            UPDATE decks
            SET status = $2
            WHERE id = $1 AND status <> $2
            RETURNING id
            "#,
        )
        .bind(id) // $1
        .bind(status.as_str()) // $2
        .fetch_optional(pool)
        .await;
        metrics::record_db_query("update_deck_status", status_label(&result), start.elapsed());

        if result?.is_some() {
            return Ok(TransitionOutcome::Updated);
        }

        let exists = Store::<Decks>::find(pool, id).await?.is_some();
        Ok(if exists {
            TransitionOutcome::NoOp
        } else {
            TransitionOutcome::NotFound
        })
    }

    /// Atomically add one like. Returns the new count, or `None` for an
    /// unknown deck.
    #[instrument(skip_all, fields(deck_id = id))]
    pub async fn increment_like<'e, E>(executor: E, id: i64) -> Result<Option<i64>, DeckError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let start = Instant::now();
        let result: Result<Option<i64>, sqlx::Error> = sqlx::query_scalar(
            r#"
            UPDATE decks
            SET like_count = like_count + 1
            WHERE id = $1
            RETURNING like_count
            "#,
        )
        .bind(id) // $1
        .fetch_optional(executor)
        .await;
        metrics::record_db_query("increment_deck_like", status_label(&result), start.elapsed());

        Ok(result?)
    }
}

pub(crate) fn status_label<T>(result: &Result<T, sqlx::Error>) -> &'static str {
    if result.is_ok() {
        "success"
    } else {
        "error"
    }
}
