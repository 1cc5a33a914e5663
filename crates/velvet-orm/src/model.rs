//! The model contract.

use sqlx::sqlite::SqliteRow;
use velvet_sql_core::{ColumnDescriptor, SqlValue};

use crate::error::Result;

/// A struct persistable through a [`crate::Collection`].
///
/// Implemented by `#[derive(Model)]`: the derive emits the ordered
/// column descriptors, per-field encoding and decoding, and the
/// identity accessors. Column order follows field declaration order;
/// the field whose column name is `id` (case-insensitive) is the
/// auto-incrementing identity and is left out of INSERT and UPDATE
/// value lists.
///
/// # Example
///
/// ```ignore
/// use velvet_orm::Model;
///
/// #[derive(Model)]
/// struct Track {
///     id: i64,
///     name: String,
///     score: f64,
/// }
/// ```
pub trait Model: Send + Sync + Sized + 'static {
    /// The type name, used in error messages.
    const NAME: &'static str;

    /// Ordered column descriptors.
    fn columns() -> &'static [ColumnDescriptor];

    /// Encodes all column values, aligned with [`Model::columns`].
    fn values(&self) -> Result<Vec<SqlValue>>;

    /// The current identity value, if the type declares an identity
    /// column and the instance holds one.
    fn identity(&self) -> Option<i64>;

    /// Writes a database-assigned identity back into the instance.
    fn set_identity(&mut self, id: i64);

    /// Materializes one result row.
    fn from_row(row: &SqliteRow) -> Result<Self>;

    /// The identity column descriptor, if the type declares one.
    fn identity_column() -> Option<&'static ColumnDescriptor> {
        Self::columns().iter().find(|column| column.identity)
    }
}
