//! Creators repository.
//!
//! Emails are stored lowercased; callers normalize before lookup.

use crate::errors::DeckError;
use crate::models::{CreatorRow, Gender};
use crate::repositories::store::{Criteria, Store, Table, Values};
use chrono::NaiveDate;
use sqlx::{Executor, Postgres};
use tracing::instrument;

pub struct Creators;

impl Table for Creators {
    type Row = CreatorRow;
    const TABLE_NAME: &'static str = "creators";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "name",
        "email",
        "password_hash",
        "gender",
        "birth_date",
        "warn_count",
        "created_at",
    ];
}

/// Fields of a creator account about to be inserted.
#[derive(Clone)]
pub struct NewCreator {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub gender: Gender,
    pub birth_date: NaiveDate,
}

/// Repository for creator accounts.
pub struct CreatorsRepository;

impl CreatorsRepository {
    #[instrument(skip_all)]
    pub async fn find_by_email<'e, E>(
        executor: E,
        email: &str,
    ) -> Result<Option<CreatorRow>, DeckError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        Store::<Creators>::find_one_by(executor, Criteria::new().eq("email", email.to_string()))
            .await
    }

    #[instrument(skip_all)]
    pub async fn email_exists<'e, E>(executor: E, email: &str) -> Result<bool, DeckError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        Store::<Creators>::exists(executor, Criteria::new().eq("email", email.to_string())).await
    }

    #[instrument(skip_all)]
    pub async fn create<'e, E>(executor: E, new_creator: &NewCreator) -> Result<CreatorRow, DeckError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let values = Values::new()
            .set("name", new_creator.name.clone())
            .set("email", new_creator.email.clone())
            .set("password_hash", new_creator.password_hash.clone())
            .set("gender", new_creator.gender.as_str().to_string())
            .set("birth_date", new_creator.birth_date);

        Store::<Creators>::create(executor, values)
            .await
            .map_err(|e| match e {
                // Unique constraint violation on email
                DeckError::Database(ref msg) if msg.contains("creators_email_key") => {
                    DeckError::Conflict("An account with this email already exists".to_string())
                }
                other => other,
            })
    }
}
