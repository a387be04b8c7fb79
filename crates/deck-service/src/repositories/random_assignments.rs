//! Random assignments repository.
//!
//! A row binds a creator to one card of a deck. Rows are created lazily by
//! the assignment engine and never updated; the primary key on
//! `(deck_id, creator_id)` guarantees at most one row per pair.
//!
//! # Security
//!
//! - All queries use parameterized statements
//! - Uses `INSERT ... ON CONFLICT DO NOTHING` so concurrent first requests
//!   cannot create two assignments

use crate::errors::DeckError;
use crate::models::RandomAssignmentRow;
use crate::observability::metrics;
use crate::repositories::decks::status_label;
use crate::repositories::store::{Criteria, Store, Table};
use sqlx::{Executor, PgPool, Postgres};
use std::time::Instant;
use tracing::instrument;

/// Foreign key from `random_assignments.card_id` to `cards.id`.
const CARD_FOREIGN_KEY: &str = "random_assignments_card_id_fkey";

pub struct RandomAssignments;

impl Table for RandomAssignments {
    type Row = RandomAssignmentRow;
    const TABLE_NAME: &'static str = "random_assignments";
    const COLUMNS: &'static [&'static str] = &["deck_id", "creator_id", "card_id", "assigned_at"];
}

/// Result of an insert-if-absent attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Our row was written.
    Inserted(RandomAssignmentRow),
    /// A row for the pair already exists (another request won the race).
    AlreadyAssigned,
    /// The chosen card was deleted between selection and insert.
    CardMissing,
}

/// Repository for random card assignments.
pub struct RandomAssignmentsRepository;

impl RandomAssignmentsRepository {
    /// Current assignment for `(deck_id, creator_id)`, if any.
    #[instrument(skip_all, fields(deck_id = deck_id, creator_id = creator_id))]
    pub async fn find<'e, E>(
        executor: E,
        deck_id: i64,
        creator_id: i64,
    ) -> Result<Option<RandomAssignmentRow>, DeckError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let criteria = Criteria::new()
            .eq("deck_id", deck_id)
            .eq("creator_id", creator_id);
        Store::<RandomAssignments>::find_one_by(executor, criteria).await
    }

    /// Insert the assignment unless one already exists for the pair.
    #[instrument(skip_all, fields(deck_id = deck_id, creator_id = creator_id, card_id = card_id))]
    pub async fn insert_if_absent(
        pool: &PgPool,
        deck_id: i64,
        creator_id: i64,
        card_id: i64,
    ) -> Result<InsertOutcome, DeckError> {
        let start = Instant::now();
        let result: Result<Option<RandomAssignmentRow>, sqlx::Error> = sqlx::query_as(
            r#"
            INSERT INTO random_assignments (deck_id, creator_id, card_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (deck_id, creator_id) DO NOTHING
            RETURNING deck_id, creator_id, card_id, assigned_at
            "#,
        )
        .bind(deck_id) // $1
        .bind(creator_id) // $2
        .bind(card_id) // $3
        .fetch_optional(pool)
        .await;
        metrics::record_db_query("insert_assignment", status_label(&result), start.elapsed());

        match result {
            Ok(Some(row)) => Ok(InsertOutcome::Inserted(row)),
            Ok(None) => {
                tracing::debug!(
                    target: "deck.repository.assignments",
                    deck_id = deck_id,
                    "Insert returned no row, assignment already exists"
                );
                Ok(InsertOutcome::AlreadyAssigned)
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_foreign_key_violation() => {
                if db_err.constraint() == Some(CARD_FOREIGN_KEY) {
                    tracing::debug!(
                        target: "deck.repository.assignments",
                        deck_id = deck_id,
                        card_id = card_id,
                        "Selected card vanished before insert"
                    );
                    Ok(InsertOutcome::CardMissing)
                } else {
                    // Deck or creator row is gone
                    Err(DeckError::NotFound(
                        "Deck or creator no longer exists".to_string(),
                    ))
                }
            }
            Err(e) => Err(e.into()),
        }
    }
}
