//! Generic table access shared by the entity repositories.
//!
//! A table is described by its name, an allow-list of columns, and the
//! `FromRow` type its rows decode into. `Store<T>` builds parameterized
//! statements from that description. Column names are only ever taken from
//! the allow-list, never from caller input, and every value is bound as a
//! placeholder.
//!
//! All operations accept any `Executor`, so they run equally against the
//! pool or inside a transaction (`&mut *tx`).

use crate::errors::DeckError;
use crate::observability::metrics;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::{Arguments, Executor, FromRow, Postgres};
use std::marker::PhantomData;
use std::time::Instant;
use tracing::instrument;

/// Static description of a table.
pub trait Table {
    /// Decoded row type. Must read every column in `COLUMNS`.
    type Row: for<'r> FromRow<'r, PgRow> + Send + Unpin;

    const TABLE_NAME: &'static str;

    /// Columns that may be selected, filtered on, or written.
    const COLUMNS: &'static [&'static str];
}

/// A table with a single `BIGINT` primary key.
pub trait KeyedTable: Table {
    const ID_COLUMN: &'static str;
}

/// A value that can be appended to a Postgres argument list.
pub trait SqlArg: Send + Sync {
    fn add_to(&self, args: &mut PgArguments) -> Result<(), sqlx::Error>;
}

impl<T> SqlArg for T
where
    T: for<'a> sqlx::Encode<'a, Postgres> + sqlx::Type<Postgres> + Send + Sync + Clone + 'static,
{
    fn add_to(&self, args: &mut PgArguments) -> Result<(), sqlx::Error> {
        args.add(self.clone()).map_err(sqlx::Error::Encode)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl OrderDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        }
    }
}

/// Equality filters and ordering for `find_all_by`, `find_one_by`, `exists`.
#[derive(Default)]
pub struct Criteria {
    conditions: Vec<(&'static str, Box<dyn SqlArg>)>,
    order_by: Vec<(&'static str, OrderDirection)>,
    limit: Option<i64>,
}

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `column = value`.
    pub fn eq<V>(mut self, column: &'static str, value: V) -> Self
    where
        V: for<'a> sqlx::Encode<'a, Postgres> + sqlx::Type<Postgres> + Send + Sync + Clone + 'static,
    {
        self.conditions.push((column, Box::new(value)));
        self
    }

    pub fn order_by(mut self, column: &'static str, direction: OrderDirection) -> Self {
        self.order_by.push((column, direction));
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Column assignments for `create` and `update`.
#[derive(Default)]
pub struct Values {
    entries: Vec<(&'static str, Box<dyn SqlArg>)>,
}

impl Values {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<V>(mut self, column: &'static str, value: V) -> Self
    where
        V: for<'a> sqlx::Encode<'a, Postgres> + sqlx::Type<Postgres> + Send + Sync + Clone + 'static,
    {
        self.entries.push((column, Box::new(value)));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// CRUD operations over a [`Table`].
pub struct Store<T>(PhantomData<T>);

impl<T: Table> Store<T> {
    fn check_column(column: &str) -> Result<(), DeckError> {
        if T::COLUMNS.contains(&column) {
            Ok(())
        } else {
            Err(DeckError::Internal(format!(
                "column '{}' is not allowed on {}",
                column,
                T::TABLE_NAME
            )))
        }
    }

    fn select_list() -> String {
        T::COLUMNS.join(", ")
    }

    /// Append `WHERE`, `ORDER BY` and `LIMIT` clauses, binding filter values.
    fn push_criteria(
        sql: &mut String,
        args: &mut PgArguments,
        criteria: &Criteria,
    ) -> Result<(), DeckError> {
        for (index, (column, value)) in criteria.conditions.iter().enumerate() {
            Self::check_column(column)?;
            value.add_to(args)?;
            sql.push_str(if index == 0 { " WHERE " } else { " AND " });
            sql.push_str(&format!("{} = ${}", column, index + 1));
        }

        for (index, (column, direction)) in criteria.order_by.iter().enumerate() {
            Self::check_column(column)?;
            sql.push_str(if index == 0 { " ORDER BY " } else { ", " });
            sql.push_str(&format!("{} {}", column, direction.as_sql()));
        }

        if let Some(limit) = criteria.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        Ok(())
    }

    fn build_select(criteria: &Criteria) -> Result<(String, PgArguments), DeckError> {
        let mut sql = format!("SELECT {} FROM {}", Self::select_list(), T::TABLE_NAME);
        let mut args = PgArguments::default();
        Self::push_criteria(&mut sql, &mut args, criteria)?;
        Ok((sql, args))
    }

    fn build_exists(criteria: &Criteria) -> Result<(String, PgArguments), DeckError> {
        let mut sql = format!("SELECT EXISTS (SELECT 1 FROM {}", T::TABLE_NAME);
        let mut args = PgArguments::default();
        Self::push_criteria(&mut sql, &mut args, criteria)?;
        sql.push(')');
        Ok((sql, args))
    }

    fn build_insert(values: &Values) -> Result<(String, PgArguments), DeckError> {
        if values.is_empty() {
            return Err(DeckError::Internal(format!(
                "insert into {} without values",
                T::TABLE_NAME
            )));
        }

        let mut args = PgArguments::default();
        let mut columns = Vec::with_capacity(values.entries.len());
        let mut placeholders = Vec::with_capacity(values.entries.len());
        for (index, (column, value)) in values.entries.iter().enumerate() {
            Self::check_column(column)?;
            value.add_to(&mut args)?;
            columns.push(*column);
            placeholders.push(format!("${}", index + 1));
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            T::TABLE_NAME,
            columns.join(", "),
            placeholders.join(", "),
            Self::select_list()
        );
        Ok((sql, args))
    }

    /// Fetch every row of the table.
    #[instrument(skip_all, fields(table = T::TABLE_NAME))]
    pub async fn find_all<'e, E>(executor: E) -> Result<Vec<T::Row>, DeckError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        Self::find_all_by(executor, Criteria::new()).await
    }

    /// Fetch rows matching every condition in `criteria`.
    #[instrument(skip_all, fields(table = T::TABLE_NAME))]
    pub async fn find_all_by<'e, E>(
        executor: E,
        criteria: Criteria,
    ) -> Result<Vec<T::Row>, DeckError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let (sql, args) = Self::build_select(&criteria)?;
        let start = Instant::now();
        let result = sqlx::query_as_with::<_, T::Row, _>(&sql, args)
            .fetch_all(executor)
            .await;
        record("find_all_by", T::TABLE_NAME, result.is_ok(), start);
        Ok(result?)
    }

    /// Fetch the first row matching `criteria`, if any.
    #[instrument(skip_all, fields(table = T::TABLE_NAME))]
    pub async fn find_one_by<'e, E>(
        executor: E,
        criteria: Criteria,
    ) -> Result<Option<T::Row>, DeckError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let criteria = if criteria.limit.is_none() {
            criteria.limit(1)
        } else {
            criteria
        };
        let (sql, args) = Self::build_select(&criteria)?;
        let start = Instant::now();
        let result = sqlx::query_as_with::<_, T::Row, _>(&sql, args)
            .fetch_optional(executor)
            .await;
        record("find_one_by", T::TABLE_NAME, result.is_ok(), start);
        Ok(result?)
    }

    /// Whether any row matches `criteria`.
    #[instrument(skip_all, fields(table = T::TABLE_NAME))]
    pub async fn exists<'e, E>(executor: E, criteria: Criteria) -> Result<bool, DeckError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let (sql, args) = Self::build_exists(&criteria)?;
        let start = Instant::now();
        let result = sqlx::query_scalar_with::<_, bool, _>(&sql, args)
            .fetch_one(executor)
            .await;
        record("exists", T::TABLE_NAME, result.is_ok(), start);
        Ok(result?)
    }

    /// Insert a row and return it as stored.
    #[instrument(skip_all, fields(table = T::TABLE_NAME))]
    pub async fn create<'e, E>(executor: E, values: Values) -> Result<T::Row, DeckError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let (sql, args) = Self::build_insert(&values)?;
        let start = Instant::now();
        let result = sqlx::query_as_with::<_, T::Row, _>(&sql, args)
            .fetch_one(executor)
            .await;
        record("create", T::TABLE_NAME, result.is_ok(), start);
        Ok(result?)
    }
}

impl<T: KeyedTable> Store<T> {
    fn build_update(id: i64, values: &Values) -> Result<(String, PgArguments), DeckError> {
        if values.is_empty() {
            return Err(DeckError::Internal(format!(
                "update of {} without values",
                T::TABLE_NAME
            )));
        }

        let mut args = PgArguments::default();
        let mut assignments = Vec::with_capacity(values.entries.len());
        for (index, (column, value)) in values.entries.iter().enumerate() {
            Self::check_column(column)?;
            if *column == T::ID_COLUMN {
                return Err(DeckError::Internal(format!(
                    "primary key of {} cannot be updated",
                    T::TABLE_NAME
                )));
            }
            value.add_to(&mut args)?;
            assignments.push(format!("{} = ${}", column, index + 1));
        }
        args.add(id).map_err(sqlx::Error::Encode)?;

        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ${} RETURNING {}",
            T::TABLE_NAME,
            assignments.join(", "),
            T::ID_COLUMN,
            values.entries.len() + 1,
            Self::select_list()
        );
        Ok((sql, args))
    }

    /// Fetch a row by primary key.
    #[instrument(skip_all, fields(table = T::TABLE_NAME, id = id))]
    pub async fn find<'e, E>(executor: E, id: i64) -> Result<Option<T::Row>, DeckError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        Self::find_one_by(executor, Criteria::new().eq(T::ID_COLUMN, id)).await
    }

    /// Update the given columns of a row. Returns `None` when the id is unknown.
    #[instrument(skip_all, fields(table = T::TABLE_NAME, id = id))]
    pub async fn update<'e, E>(
        executor: E,
        id: i64,
        values: Values,
    ) -> Result<Option<T::Row>, DeckError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let (sql, args) = Self::build_update(id, &values)?;
        let start = Instant::now();
        let result = sqlx::query_as_with::<_, T::Row, _>(&sql, args)
            .fetch_optional(executor)
            .await;
        record("update", T::TABLE_NAME, result.is_ok(), start);
        Ok(result?)
    }

    /// Delete a row by primary key. Returns whether a row was removed.
    #[instrument(skip_all, fields(table = T::TABLE_NAME, id = id))]
    pub async fn delete<'e, E>(executor: E, id: i64) -> Result<bool, DeckError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("DELETE FROM {} WHERE {} = $1", T::TABLE_NAME, T::ID_COLUMN);
        let start = Instant::now();
        let result = sqlx::query(&sql).bind(id).execute(executor).await;
        record("delete", T::TABLE_NAME, result.is_ok(), start);
        Ok(result?.rows_affected() > 0)
    }
}

fn record(operation: &str, table: &str, ok: bool, start: Instant) {
    let status = if ok { "success" } else { "error" };
    metrics::record_db_query(&format!("{}_{}", operation, table), status, start.elapsed());
}
