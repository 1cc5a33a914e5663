//! Connections and logical database identity.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use sqlx::ConnectOptions;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use tokio::sync::{Mutex, MutexGuard};

use crate::collection::Collection;
use crate::error::Result;
use crate::model::Model;

/// Identifies a logical database for schema-synchronization caching.
///
/// Connections to the same file path are the same database. An
/// in-memory database exists only inside its own connection, so each
/// such connection gets a process-unique identity regardless of how it
/// was opened.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DatabaseId {
    /// A database file, identified by its textual path.
    File(String),
    /// A private in-memory database, identified per connection.
    Transient(u64),
}

impl fmt::Display for DatabaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{path}"),
            Self::Transient(id) => write!(f, ":memory:#{id}"),
        }
    }
}

static NEXT_TRANSIENT: AtomicU64 = AtomicU64::new(0);

/// An open database connection.
///
/// Cheap to clone; all clones share one underlying driver connection
/// guarded by a mutex, which also serializes the insert-then-read of
/// the generated identity value (that value is connection-local state
/// in the engine).
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

struct Inner {
    database: DatabaseId,
    raw: Mutex<SqliteConnection>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("database", &self.inner.database)
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Opens a database file, creating it if missing.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let raw = options.connect().await?;
        let database = DatabaseId::File(path.to_string_lossy().into_owned());
        Ok(Self::from_parts(database, raw))
    }

    /// Opens a private in-memory database.
    ///
    /// Two in-memory connections never share data, and are therefore
    /// distinct logical databases.
    pub async fn open_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::new().in_memory(true);
        let raw = options.connect().await?;
        let database = DatabaseId::Transient(NEXT_TRANSIENT.fetch_add(1, Ordering::Relaxed));
        Ok(Self::from_parts(database, raw))
    }

    fn from_parts(database: DatabaseId, raw: SqliteConnection) -> Self {
        Self {
            inner: Arc::new(Inner {
                database,
                raw: Mutex::new(raw),
            }),
        }
    }

    /// The logical database this connection points at.
    #[must_use]
    pub fn database(&self) -> &DatabaseId {
        &self.inner.database
    }

    /// A collection of `M` models stored in the table named `table`.
    #[must_use]
    pub fn collection<M: Model>(&self, table: &str) -> Collection<M> {
        Collection::new(self.clone(), table)
    }

    pub(crate) async fn lock(&self) -> MutexGuard<'_, SqliteConnection> {
        self.inner.raw.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_connections_share_identity() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.db");
        let first = Connection::open(&path).await.unwrap();
        let second = Connection::open(&path).await.unwrap();
        assert_eq!(first.database(), second.database());
    }

    #[tokio::test]
    async fn memory_connections_are_distinct() {
        let first = Connection::open_in_memory().await.unwrap();
        let second = Connection::open_in_memory().await.unwrap();
        assert_ne!(first.database(), second.database());
    }
}
