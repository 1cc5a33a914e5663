//! # velvet-sql-core
//!
//! Driver-free building blocks for the velvet ORM:
//!
//! - [`SqlValue`] / [`ToSqlValue`] — values bound as statement parameters
//! - [`ColumnDescriptor`] / [`TableSchema`] — model column layouts
//! - [`Expr`] and [`compile`] — predicate trees compiled to SQL fragments
//! - [`QueryState`] — immutable accumulation of SELECT clauses
//!
//! Nothing in this crate talks to a database; `velvet-orm` supplies the
//! driver glue.
//!
//! ## Compiling a predicate
//!
//! ```
//! use velvet_sql_core::{col, compile, QueryState, SqlValue};
//!
//! let predicate = compile(&col("score").gt(0)).unwrap();
//! let query = QueryState::new()
//!     .filter(predicate)
//!     .unwrap()
//!     .order_by("id", false)
//!     .unwrap()
//!     .select("tracks");
//!
//! assert_eq!(
//!     query.sql,
//!     "SELECT * FROM \"tracks\" WHERE (((\"score\") > (@param_0))) ORDER BY \"id\" DESC"
//! );
//! assert_eq!(query.params[0].value, SqlValue::Int(0));
//! ```

pub mod compile;
pub mod expr;
pub mod query;
pub mod schema;
pub mod value;

pub use compile::{CompileError, CompiledPredicate, compile};
pub use expr::{BinOp, Expr, PatternKind, col, null, val};
pub use query::{CompiledQuery, OrderSegment, QueryError, QueryState};
pub use schema::{ColumnDescriptor, ColumnKind, TableSchema};
pub use value::{Parameter, SqlValue, ToSqlValue, quote_ident};
