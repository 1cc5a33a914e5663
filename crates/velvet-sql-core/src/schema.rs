//! Table and column descriptors.
//!
//! Column layouts are derived from model types at compile time; a
//! [`TableSchema`] pairs such a layout with the table name chosen by the
//! collection handle that owns it.

/// Semantic type of a column, as seen by the materializer.
///
/// The engine itself stores values with per-value affinity; the kind is
/// not part of the DDL this library issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Boolean, stored as integer.
    Boolean,
    /// Integer of any width.
    Integer,
    /// Floating point.
    Real,
    /// UTF-8 text.
    Text,
    /// Raw bytes.
    Blob,
    /// Point in time.
    DateTime,
    /// Unique identifier.
    Uuid,
    /// Composite value stored as JSON text.
    Json,
}

/// One column of a model type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDescriptor {
    /// Column name. Unique within a table, case-insensitively.
    pub name: &'static str,
    /// Semantic type.
    pub kind: ColumnKind,
    /// Whether this is the auto-incrementing identity column.
    pub identity: bool,
}

/// A desired table layout: a name plus the ordered column descriptors of
/// the model type stored in it.
#[derive(Debug, Clone)]
pub struct TableSchema {
    name: String,
    columns: &'static [ColumnDescriptor],
}

impl TableSchema {
    /// Creates a schema for `columns` stored under `name`.
    #[must_use]
    pub fn new(name: impl Into<String>, columns: &'static [ColumnDescriptor]) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// The table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All columns, in declaration order.
    #[must_use]
    pub fn columns(&self) -> &'static [ColumnDescriptor] {
        self.columns
    }

    /// The identity column, if the model declares one.
    #[must_use]
    pub fn identity(&self) -> Option<&'static ColumnDescriptor> {
        self.columns.iter().find(|column| column.identity)
    }

    /// Non-identity columns, in declaration order.
    pub fn data_columns(&self) -> impl Iterator<Item = &'static ColumnDescriptor> {
        self.columns.iter().filter(|column| !column.identity)
    }

    /// Whether the schema declares `name`, case-insensitively.
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.columns
            .iter()
            .any(|column| column.name.eq_ignore_ascii_case(name))
    }

    /// A stable key identifying this (table, column set) pair.
    ///
    /// Used to remember which desired schemas have already been
    /// reconciled against which databases.
    #[must_use]
    pub fn signature(&self) -> String {
        let names: Vec<&str> = self.columns.iter().map(|column| column.name).collect();
        format!("{}({})", self.name, names.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn identity_lookup() {
        let schema = TableSchema::new("tracks", COLUMNS);
        assert_eq!(schema.identity().map(|column| column.name), Some("id"));
        let data: Vec<&str> = schema.data_columns().map(|column| column.name).collect();
        assert_eq!(data, vec!["name", "score"]);
    }

    #[test]
    fn column_lookup_is_case_insensitive() {
        let schema = TableSchema::new("tracks", COLUMNS);
        assert!(schema.has_column("NAME"));
        assert!(schema.has_column("Id"));
        assert!(!schema.has_column("missing"));
    }

    #[test]
    fn signature_includes_name_and_columns() {
        let schema = TableSchema::new("tracks", COLUMNS);
        assert_eq!(schema.signature(), "tracks(id,name,score)");
    }
}
