//! # velvet-orm
//!
//! An embedded ORM over SQLite: model structs bind to tables, the live
//! schema is evolved automatically to match the models, and queries are
//! composed as typed predicate expressions — never raw SQL.
//!
//! ## Quick Start
//!
//! ```ignore
//! use velvet_orm::{Connection, Model, col};
//!
//! #[derive(Model)]
//! struct Track {
//!     id: i64,
//!     name: String,
//!     score: f64,
//! }
//!
//! async fn example() -> velvet_orm::Result<()> {
//!     let db = Connection::open("jukebox.db").await?;
//!     let tracks = db.collection::<Track>("tracks");
//!
//!     // First use creates (or evolves) the table.
//!     let track = tracks
//!         .add(Track { id: 0, name: String::from("Aria"), score: 9.5 })
//!         .await?;
//!     assert!(track.id > 0);
//!
//!     // Deferred, composable queries.
//!     let best = tracks
//!         .filter(col("score").gt(9.0))?
//!         .order_by_desc("id")?
//!         .take(10)
//!         .fetch()
//!         .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Predicates
//!
//! Predicates are expression trees over one row, built with [`col`],
//! [`val`], and [`null`]:
//!
//! ```ignore
//! // Comparison and boolean structure.
//! tracks.filter(col("score").gt(0).and(col("name").starts_with("Ar")))?;
//!
//! // NULL tests compile to IS NULL / IS NOT NULL.
//! tracks.filter(col("genre").eq(null()))?;
//!
//! // Membership.
//! tracks.filter(col("id").in_list([1, 2, 3]))?;
//! ```
//!
//! One predicate per chain: a second `filter` fails rather than
//! guessing at a merge. Conjunctions belong inside the expression.

pub mod collection;
pub mod connection;
pub mod error;
pub mod materialize;
pub mod model;
pub mod registry;
pub mod sync;

pub use collection::Collection;
pub use connection::{Connection, DatabaseId};
pub use error::{OrmError, Result};
pub use materialize::{ColumnValue, Json};
pub use model::Model;
pub use registry::{LiveSchema, LiveTable, SyncRegistry, registry};
pub use sync::{scan_database, synchronize};

pub use velvet_sql_core::{
    ColumnDescriptor, ColumnKind, CompileError, CompiledQuery, Expr, Parameter, QueryError,
    QueryState, SqlValue, TableSchema, ToSqlValue, col, null, val,
};

/// Derives [`Model`] for a named-field struct.
pub use velvet_sql_derive::Model;

// Re-exported for the code generated by `#[derive(Model)]`.
pub use sqlx;
