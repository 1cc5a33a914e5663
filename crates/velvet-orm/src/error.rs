//! Error types for the ORM.

use thiserror::Error;
use velvet_sql_core::{CompileError, QueryError};

/// ORM-specific errors.
///
/// Every failure surfaces synchronously to the caller of the operation
/// that hit it; nothing is retried internally, and a failed schema
/// synchronization leaves its database unmarked so the next use
/// re-attempts it.
#[derive(Debug, Error)]
pub enum OrmError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A predicate used an expression shape the compiler does not
    /// translate.
    #[error("predicate compilation failed: {0}")]
    Compilation(#[from] CompileError),

    /// A query chain set a second predicate or repeated an ordering
    /// column.
    #[error(transparent)]
    DuplicateClause(#[from] QueryError),

    /// The engine rejected a schema statement. The database stays
    /// unsynchronized.
    #[error("schema synchronization failed while executing `{statement}`: {source}")]
    Schema {
        /// The rejected DDL statement.
        statement: String,
        /// The driver error.
        source: sqlx::Error,
    },

    /// Update or delete was invoked on a model type without an identity
    /// column.
    #[error("model `{0}` has no identity column")]
    IdentityMissing(&'static str),

    /// A result cell could not be converted into the destination field.
    #[error("column `{column}` cannot be materialized: {message}")]
    Materialize {
        /// Column name.
        column: String,
        /// Conversion failure detail.
        message: String,
    },

    /// A field value could not be encoded as a bound parameter.
    #[error("column `{column}` cannot be bound: {message}")]
    Encode {
        /// Column name.
        column: String,
        /// Conversion failure detail.
        message: String,
    },
}

/// Result type alias for ORM operations.
pub type Result<T> = std::result::Result<T, OrmError>;
