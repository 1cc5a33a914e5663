//! Schema synchronization.
//!
//! Brings a live database in line with a desired [`TableSchema`]:
//! missing tables are created, missing columns are added one ALTER at a
//! time (the engine forbids adding several columns in one statement).
//! Work per database is serialized through the registry's per-database
//! mutex, and a reconciled (database, schema) pair is remembered so the
//! check runs at most once unless forced.

use sqlx::{Column as _, Executor, Statement};
use tracing::{debug, info};
use velvet_sql_core::{TableSchema, quote_ident};

use crate::connection::Connection;
use crate::error::{OrmError, Result};
use crate::registry::{LiveSchema, LiveTable, registry};

/// Ensures the live schema can hold `schema`, returning the number of
/// DDL statements executed (zero on the cached fast path).
///
/// A rejected statement surfaces as [`OrmError::Schema`] and leaves the
/// pair unmarked, so the next call re-attempts the reconciliation.
pub async fn synchronize(connection: &Connection, schema: &TableSchema, force: bool) -> Result<u32> {
    let database = connection.database().clone();
    let signature = schema.signature();

    if !force && registry().is_synchronized(&database, &signature) {
        return Ok(0);
    }

    let lock = registry().database_lock(&database);
    let _guard = lock.lock().await;

    // The live schema is always re-read under the lock; the cached copy
    // may predate another task's DDL.
    let live = scan_database(connection).await?;

    let mut statements = Vec::new();
    match live.table(schema.name()) {
        None => statements.push(create_table_sql(schema)),
        Some(existing) => {
            for column in schema.columns() {
                if !existing.has_column(column.name) {
                    statements.push(add_column_sql(schema.name(), column.name));
                }
            }
        }
    }

    let executed = statements.len() as u32;
    if executed > 0 {
        {
            let mut raw = connection.lock().await;
            for sql in &statements {
                debug!(sql = %sql, "applying schema statement");
                sqlx::query(sql)
                    .execute(&mut *raw)
                    .await
                    .map_err(|source| OrmError::Schema {
                        statement: sql.clone(),
                        source,
                    })?;
            }
        }
        scan_database(connection).await?;
        info!(
            table = schema.name(),
            statements = executed,
            "schema synchronized"
        );
    }

    registry().mark_synchronized(&database, &signature);
    Ok(executed)
}

/// Scans the live schema of `connection`'s database and refreshes the
/// registry's cached copy.
pub async fn scan_database(connection: &Connection) -> Result<LiveSchema> {
    let mut raw = connection.lock().await;

    let names = sqlx::query_scalar::<_, String>(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
    )
    .fetch_all(&mut *raw)
    .await?;

    let mut tables = Vec::with_capacity(names.len());
    for name in names {
        let probe = format!("SELECT * FROM {} LIMIT 0", quote_ident(&name));
        let statement = (&mut *raw).prepare(probe.as_str()).await?;
        let columns = statement
            .columns()
            .iter()
            .map(|column| String::from(column.name()))
            .collect();
        tables.push(LiveTable { name, columns });
    }
    drop(raw);

    let schema = LiveSchema::new(tables);
    registry().store_live_schema(connection.database(), schema.clone());
    Ok(schema)
}

fn create_table_sql(schema: &TableSchema) -> String {
    let mut definitions = Vec::new();
    if let Some(identity) = schema.identity() {
        definitions.push(format!(
            "{} INTEGER PRIMARY KEY AUTOINCREMENT",
            quote_ident(identity.name)
        ));
    }
    for column in schema.data_columns() {
        definitions.push(quote_ident(column.name));
    }
    format!(
        "CREATE TABLE {} ({})",
        quote_ident(schema.name()),
        definitions.join(", ")
    )
}

fn add_column_sql(table: &str, column: &str) -> String {
    format!(
        "ALTER TABLE {} ADD COLUMN {}",
        quote_ident(table),
        quote_ident(column)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use velvet_sql_core::{ColumnDescriptor, ColumnKind};

    const COLUMNS: &[ColumnDescriptor] = &[
        ColumnDescriptor {
            name: "id",
            kind: ColumnKind::Integer,
            identity: true,
        },
        ColumnDescriptor {
            name: "name",
            kind: ColumnKind::Text,
            identity: false,
        },
        ColumnDescriptor {
            name: "score",
            kind: ColumnKind::Real,
            identity: false,
        },
    ];

    const PLAIN_COLUMNS: &[ColumnDescriptor] = &[ColumnDescriptor {
        name: "label",
        kind: ColumnKind::Text,
        identity: false,
    }];

    #[test]
    fn create_table_declares_identity_first() {
        let schema = TableSchema::new("tracks", COLUMNS);
        assert_eq!(
            create_table_sql(&schema),
            "CREATE TABLE \"tracks\" (\"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \"name\", \"score\")"
        );
    }

    #[test]
    fn create_table_without_identity_has_no_primary_key() {
        let schema = TableSchema::new("labels", PLAIN_COLUMNS);
        assert_eq!(create_table_sql(&schema), "CREATE TABLE \"labels\" (\"label\")");
    }

    #[test]
    fn one_alter_per_column() {
        assert_eq!(
            add_column_sql("tracks", "tag"),
            "ALTER TABLE \"tracks\" ADD COLUMN \"tag\""
        );
    }
}
