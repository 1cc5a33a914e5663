//! The user-facing collection handle.
//!
//! A [`Collection`] binds a model type to a table over one connection.
//! Query-shaping methods are immutable and chainable; data operations
//! render and execute fresh on every call, and the first operation per
//! logical database triggers schema synchronization.

use std::fmt;
use std::marker::PhantomData;

use sqlx::Sqlite;
use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;
use tracing::debug;
use velvet_sql_core::{CompiledQuery, Expr, QueryState, SqlValue, TableSchema, compile, quote_ident};

use crate::connection::Connection;
use crate::error::{OrmError, Result};
use crate::model::Model;
use crate::sync;

/// A queryable, mutable view of the `M` models stored in one table.
///
/// Cheap to clone. Query-shaping methods return a new handle and leave
/// the receiver untouched, so chains can fork:
///
/// ```ignore
/// let high = tracks.filter(col("score").gt(9.0))?;
/// let top_ten = high.order_by_desc("score")?.take(10);
/// let rest = high.order_by_desc("score")?.skip(10);
/// ```
pub struct Collection<M: Model> {
    connection: Connection,
    table: String,
    query: QueryState,
    _marker: PhantomData<M>,
}

impl<M: Model> Clone for Collection<M> {
    fn clone(&self) -> Self {
        Self {
            connection: self.connection.clone(),
            table: self.table.clone(),
            query: self.query.clone(),
            _marker: PhantomData,
        }
    }
}

impl<M: Model> fmt::Debug for Collection<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("connection", &self.connection)
            .field("table", &self.table)
            .field("query", &self.query)
            .finish()
    }
}

impl<M: Model> Collection<M> {
    pub(crate) fn new(connection: Connection, table: &str) -> Self {
        Self {
            connection,
            table: String::from(table),
            query: QueryState::new(),
            _marker: PhantomData,
        }
    }

    fn with_query(&self, query: QueryState) -> Self {
        Self {
            connection: self.connection.clone(),
            table: self.table.clone(),
            query,
            _marker: PhantomData,
        }
    }

    /// The table this collection reads and writes.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// The desired schema of the backing table.
    #[must_use]
    pub fn schema(&self) -> TableSchema {
        TableSchema::new(self.table.clone(), M::columns())
    }

    /// Sets the WHERE predicate.
    ///
    /// Fails with [`OrmError::Compilation`] when the expression uses an
    /// unsupported shape and with [`OrmError::DuplicateClause`] when a
    /// predicate is already set in this chain; express conjunctions
    /// inside a single expression with [`Expr::and`].
    pub fn filter(&self, predicate: Expr) -> Result<Self> {
        let compiled = compile(&predicate)?;
        Ok(self.with_query(self.query.filter(compiled)?))
    }

    /// Adds an ascending ordering key. Repeating a column in one chain
    /// fails with [`OrmError::DuplicateClause`].
    pub fn order_by(&self, column: &str) -> Result<Self> {
        Ok(self.with_query(self.query.order_by(column, true)?))
    }

    /// Adds a descending ordering key.
    pub fn order_by_desc(&self, column: &str) -> Result<Self> {
        Ok(self.with_query(self.query.order_by(column, false)?))
    }

    /// Returns a handle selecting distinct rows.
    #[must_use]
    pub fn distinct(&self) -> Self {
        self.with_query(self.query.distinct())
    }

    /// Returns a handle skipping the first `count` rows.
    #[must_use]
    pub fn skip(&self, count: i64) -> Self {
        self.with_query(self.query.skip(count))
    }

    /// Returns a handle keeping at most `count` rows.
    #[must_use]
    pub fn take(&self, count: i64) -> Self {
        self.with_query(self.query.take(count))
    }

    /// Renders the SELECT this handle would execute.
    #[must_use]
    pub fn to_sql(&self) -> CompiledQuery {
        self.query.select(&self.table)
    }

    /// Reconciles the backing table with the model's schema, returning
    /// the number of DDL statements executed. Pass `force` to bypass
    /// the once-per-database cache.
    pub async fn synchronize(&self, force: bool) -> Result<u32> {
        sync::synchronize(&self.connection, &self.schema(), force).await
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.synchronize(false).await.map(|_| ())
    }

    /// Executes the current query and materializes all matching rows.
    ///
    /// The query re-renders and re-executes on every call; two calls on
    /// one handle observe writes made in between.
    pub async fn fetch(&self) -> Result<Vec<M>> {
        self.ensure_schema().await?;
        let compiled = self.to_sql();
        debug!(sql = %compiled.sql, "executing select");

        let mut raw = self.connection.lock().await;
        let mut query = sqlx::query(&compiled.sql);
        for parameter in &compiled.params {
            query = bind_value(query, parameter.value.clone());
        }
        let rows = query.fetch_all(&mut *raw).await?;
        drop(raw);

        rows.iter().map(M::from_row).collect()
    }

    /// Executes the current query and returns the first matching row.
    pub async fn first(&self) -> Result<Option<M>> {
        Ok(self.take(1).fetch().await?.into_iter().next())
    }

    /// Inserts `model` and returns it.
    ///
    /// When the model declares an identity column, the insert and the
    /// read of the generated value run as one critical section on the
    /// connection, and the value is written back into the model.
    pub async fn add(&self, mut model: M) -> Result<M> {
        self.ensure_schema().await?;
        let (sql, values) = insert_statement::<M>(&self.table, &model)?;
        debug!(sql = %sql, "executing insert");

        let mut raw = self.connection.lock().await;
        let mut query = sqlx::query(&sql);
        for value in values {
            query = bind_value(query, value);
        }
        query.execute(&mut *raw).await?;

        if M::identity_column().is_some() {
            let id: i64 = sqlx::query_scalar("SELECT last_insert_rowid()")
                .fetch_one(&mut *raw)
                .await?;
            drop(raw);
            model.set_identity(id);
        }

        Ok(model)
    }

    /// Updates the row keyed by `model`'s identity with its current
    /// column values, returning the number of rows affected.
    pub async fn update(&self, model: &M) -> Result<u64> {
        let identity = M::identity_column().ok_or(OrmError::IdentityMissing(M::NAME))?;
        self.ensure_schema().await?;

        let mut assignments = Vec::new();
        let mut params = Vec::new();
        for (column, value) in M::columns().iter().zip(model.values()?) {
            if column.identity {
                continue;
            }
            assignments.push(format!("{} = @{}", quote_ident(column.name), column.name));
            params.push(value);
        }
        if assignments.is_empty() {
            return Ok(0);
        }

        let sql = format!(
            "UPDATE {} SET {} WHERE {} = @{}",
            quote_ident(&self.table),
            assignments.join(", "),
            quote_ident(identity.name),
            identity.name
        );
        params.push(identity_value(model));
        debug!(sql = %sql, "executing update");

        let mut raw = self.connection.lock().await;
        let mut query = sqlx::query(&sql);
        for value in params {
            query = bind_value(query, value);
        }
        let result = query.execute(&mut *raw).await?;
        Ok(result.rows_affected())
    }

    /// Deletes the row keyed by `model`'s identity, returning the
    /// number of rows affected.
    pub async fn delete(&self, model: &M) -> Result<u64> {
        let identity = M::identity_column().ok_or(OrmError::IdentityMissing(M::NAME))?;
        self.ensure_schema().await?;

        let sql = format!(
            "DELETE FROM {} WHERE {} = @{}",
            quote_ident(&self.table),
            quote_ident(identity.name),
            identity.name
        );
        debug!(sql = %sql, "executing delete");

        let mut raw = self.connection.lock().await;
        let result = bind_value(sqlx::query(&sql), identity_value(model))
            .execute(&mut *raw)
            .await?;
        Ok(result.rows_affected())
    }
}

fn identity_value<M: Model>(model: &M) -> SqlValue {
    match model.identity() {
        Some(id) => SqlValue::Int(id),
        None => SqlValue::Null,
    }
}

fn insert_statement<M: Model>(table: &str, model: &M) -> Result<(String, Vec<SqlValue>)> {
    let mut names = Vec::new();
    let mut placeholders = Vec::new();
    let mut params = Vec::new();
    for (column, value) in M::columns().iter().zip(model.values()?) {
        if column.identity {
            continue;
        }
        names.push(quote_ident(column.name));
        placeholders.push(format!("@{}", column.name));
        params.push(value);
    }

    let sql = if names.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES", quote_ident(table))
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(table),
            names.join(", "),
            placeholders.join(", ")
        )
    };
    Ok((sql, params))
}

/// Binds a [`SqlValue`] to the next statement parameter.
fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: SqlValue,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        SqlValue::Null => query.bind(Option::<i64>::None),
        SqlValue::Bool(value) => query.bind(value),
        SqlValue::Int(value) => query.bind(value),
        SqlValue::Float(value) => query.bind(value),
        SqlValue::Text(value) => query.bind(value),
        SqlValue::Blob(value) => query.bind(value),
    }
}
