//! Admins repository.
//!
//! Emails are stored lowercased; callers normalize before lookup.

use crate::errors::DeckError;
use crate::models::AdminRow;
use crate::repositories::store::{Criteria, Store, Table, Values};
use sqlx::{Executor, Postgres};
use tracing::instrument;

pub struct Admins;

impl Table for Admins {
    type Row = AdminRow;
    const TABLE_NAME: &'static str = "admins";
    const COLUMNS: &'static [&'static str] =
        &["id", "email", "password_hash", "display_name", "created_at"];
}

/// Repository for admin accounts.
pub struct AdminsRepository;

impl AdminsRepository {
    #[instrument(skip_all)]
    pub async fn find_by_email<'e, E>(
        executor: E,
        email: &str,
    ) -> Result<Option<AdminRow>, DeckError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        Store::<Admins>::find_one_by(executor, Criteria::new().eq("email", email.to_string()))
            .await
    }

    #[instrument(skip_all)]
    pub async fn email_exists<'e, E>(executor: E, email: &str) -> Result<bool, DeckError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        Store::<Admins>::exists(executor, Criteria::new().eq("email", email.to_string())).await
    }

    #[instrument(skip_all)]
    pub async fn create<'e, E>(
        executor: E,
        email: &str,
        password_hash: &str,
        display_name: &str,
    ) -> Result<AdminRow, DeckError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let values = Values::new()
            .set("email", email.to_string())
            .set("password_hash", password_hash.to_string())
            .set("display_name", display_name.to_string());

        Store::<Admins>::create(executor, values)
            .await
            .map_err(|e| match e {
                // Unique constraint violation on email
                DeckError::Database(ref msg) if msg.contains("admins_email_key") => {
                    DeckError::Conflict("An account with this email already exists".to_string())
                }
                other => other,
            })
    }
}
