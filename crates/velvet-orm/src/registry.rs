//! The process-wide synchronization registry.
//!
//! One explicit object owns the shared state the ORM keeps between
//! operations: which (database, schema) pairs are already reconciled,
//! the per-database synchronization mutexes, and the last scanned live
//! schema per database. All three maps are populated with double-checked
//! lazy initialization, so steady-state reads take only a read lock.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock, RwLock};

use tokio::sync::Mutex;

use crate::connection::DatabaseId;

/// The columns of one live table.
#[derive(Debug, Clone)]
pub struct LiveTable {
    /// Table name, as reported by the engine.
    pub name: String,
    /// Column names, in result order.
    pub columns: Vec<String>,
}

impl LiveTable {
    /// Whether the table has `name`, case-insensitively.
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.columns
            .iter()
            .any(|column| column.eq_ignore_ascii_case(name))
    }
}

/// A scan of one database: its user tables and their columns.
#[derive(Debug, Clone, Default)]
pub struct LiveSchema {
    tables: Vec<LiveTable>,
}

impl LiveSchema {
    /// Creates a schema from scanned tables.
    #[must_use]
    pub fn new(tables: Vec<LiveTable>) -> Self {
        Self { tables }
    }

    /// Looks a table up by exact name.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&LiveTable> {
        self.tables.iter().find(|table| table.name == name)
    }

    /// All scanned tables.
    #[must_use]
    pub fn tables(&self) -> &[LiveTable] {
        &self.tables
    }
}

/// Shared registry of synchronization state. See the module docs.
#[derive(Default)]
pub struct SyncRegistry {
    synchronized: RwLock<HashSet<(DatabaseId, String)>>,
    locks: RwLock<HashMap<DatabaseId, Arc<Mutex<()>>>>,
    live: RwLock<HashMap<DatabaseId, LiveSchema>>,
}

impl SyncRegistry {
    /// Whether `signature` has already been reconciled against
    /// `database`.
    pub fn is_synchronized(&self, database: &DatabaseId, signature: &str) -> bool {
        self.synchronized
            .read()
            .expect("registry lock poisoned")
            .contains(&(database.clone(), String::from(signature)))
    }

    /// Records a reconciled (database, schema) pair.
    pub fn mark_synchronized(&self, database: &DatabaseId, signature: &str) {
        self.synchronized
            .write()
            .expect("registry lock poisoned")
            .insert((database.clone(), String::from(signature)));
    }

    /// Returns the mutex serializing schema work on `database`,
    /// creating it on first use.
    pub fn database_lock(&self, database: &DatabaseId) -> Arc<Mutex<()>> {
        if let Some(lock) = self
            .locks
            .read()
            .expect("registry lock poisoned")
            .get(database)
        {
            return Arc::clone(lock);
        }
        let mut locks = self.locks.write().expect("registry lock poisoned");
        // Re-check: another task may have created it while we waited.
        Arc::clone(
            locks
                .entry(database.clone())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    /// The most recent scan of `database`, if any.
    pub fn live_schema(&self, database: &DatabaseId) -> Option<LiveSchema> {
        self.live
            .read()
            .expect("registry lock poisoned")
            .get(database)
            .cloned()
    }

    /// Stores a fresh scan of `database`.
    pub fn store_live_schema(&self, database: &DatabaseId, schema: LiveSchema) {
        self.live
            .write()
            .expect("registry lock poisoned")
            .insert(database.clone(), schema);
    }
}

/// The registry shared by the whole process, created on first use.
pub fn registry() -> &'static SyncRegistry {
    static REGISTRY: OnceLock<SyncRegistry> = OnceLock::new();
    REGISTRY.get_or_init(SyncRegistry::default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marking_is_per_database_and_signature() {
        let registry = SyncRegistry::default();
        let first = DatabaseId::Transient(u64::MAX);
        let second = DatabaseId::Transient(u64::MAX - 1);

        registry.mark_synchronized(&first, "tracks(id,name)");
        assert!(registry.is_synchronized(&first, "tracks(id,name)"));
        assert!(!registry.is_synchronized(&first, "tracks(id,name,tag)"));
        assert!(!registry.is_synchronized(&second, "tracks(id,name)"));
    }

    #[test]
    fn database_lock_is_created_once() {
        let registry = SyncRegistry::default();
        let database = DatabaseId::File(String::from("/tmp/lock-test.db"));
        let first = registry.database_lock(&database);
        let second = registry.database_lock(&database);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn live_table_columns_compare_case_insensitively() {
        let table = LiveTable {
            name: String::from("tracks"),
            columns: vec![String::from("Id"), String::from("Name")],
        };
        assert!(table.has_column("id"));
        assert!(table.has_column("NAME"));
        assert!(!table.has_column("score"));
    }
}
