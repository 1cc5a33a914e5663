//! Row materialization and field value encoding.
//!
//! [`ColumnValue`] is the per-type capability that replaces runtime
//! reflection: each field type knows its semantic kind, how to encode
//! itself as a bound parameter, and how to read itself out of a result
//! cell. The derive macro wires model fields to these impls through
//! [`read`] and [`encode`].

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column as _, Row, ValueRef};
use uuid::Uuid;
use velvet_sql_core::{ColumnKind, SqlValue, ToSqlValue};

use crate::error::{OrmError, Result};

/// Per-type column capability: semantic kind, parameter encoding, and
/// cell decoding.
///
/// Implemented for the primitive, temporal, identifier, binary, and
/// optional field types; [`Json`] covers composite fields. User-defined
/// enumerations implement it over their integral code.
pub trait ColumnValue: Send + Sync + Sized {
    /// The semantic kind recorded in the column descriptor.
    const KIND: ColumnKind;

    /// Encodes the value as a bound parameter.
    fn to_sql(&self) -> std::result::Result<SqlValue, sqlx::Error>;

    /// Reads the value from the cell at `index`.
    fn from_cell(row: &SqliteRow, index: usize) -> std::result::Result<Self, sqlx::Error>;
}

/// Reads the named column of `row` into a field value.
pub fn read<T: ColumnValue>(row: &SqliteRow, column: &str) -> Result<T> {
    let index = row
        .try_column(column)
        .map_err(|error| OrmError::Materialize {
            column: String::from(column),
            message: error.to_string(),
        })?
        .ordinal();
    T::from_cell(row, index).map_err(|error| OrmError::Materialize {
        column: String::from(column),
        message: error.to_string(),
    })
}

/// Encodes a field value as a bound parameter.
pub fn encode<T: ColumnValue>(value: &T, column: &str) -> Result<SqlValue> {
    value.to_sql().map_err(|error| OrmError::Encode {
        column: String::from(column),
        message: error.to_string(),
    })
}

macro_rules! driver_column_value {
    ($($ty:ty => $kind:expr),+ $(,)?) => {
        $(impl ColumnValue for $ty {
            const KIND: ColumnKind = $kind;

            fn to_sql(&self) -> std::result::Result<SqlValue, sqlx::Error> {
                Ok(self.clone().to_sql_value())
            }

            fn from_cell(
                row: &SqliteRow,
                index: usize,
            ) -> std::result::Result<Self, sqlx::Error> {
                row.try_get(index)
            }
        })+
    };
}

driver_column_value! {
    bool => ColumnKind::Boolean,
    i32 => ColumnKind::Integer,
    i64 => ColumnKind::Integer,
    f32 => ColumnKind::Real,
    f64 => ColumnKind::Real,
    String => ColumnKind::Text,
    Vec<u8> => ColumnKind::Blob,
    DateTime<Utc> => ColumnKind::DateTime,
    NaiveDateTime => ColumnKind::DateTime,
    Uuid => ColumnKind::Uuid,
}

macro_rules! narrow_column_value {
    ($($ty:ty),+ $(,)?) => {
        $(impl ColumnValue for $ty {
            const KIND: ColumnKind = ColumnKind::Integer;

            fn to_sql(&self) -> std::result::Result<SqlValue, sqlx::Error> {
                Ok((*self).to_sql_value())
            }

            fn from_cell(
                row: &SqliteRow,
                index: usize,
            ) -> std::result::Result<Self, sqlx::Error> {
                let wide: i64 = row.try_get(index)?;
                <$ty>::try_from(wide).map_err(|_| {
                    sqlx::Error::Decode(
                        format!(
                            "integer {wide} is out of range for {}",
                            stringify!($ty)
                        )
                        .into(),
                    )
                })
            }
        })+
    };
}

narrow_column_value!(i8, i16, u8, u16, u32);

impl<T: ColumnValue> ColumnValue for Option<T> {
    const KIND: ColumnKind = T::KIND;

    fn to_sql(&self) -> std::result::Result<SqlValue, sqlx::Error> {
        match self {
            Some(inner) => inner.to_sql(),
            None => Ok(SqlValue::Null),
        }
    }

    fn from_cell(row: &SqliteRow, index: usize) -> std::result::Result<Self, sqlx::Error> {
        if row.try_get_raw(index)?.is_null() {
            return Ok(None);
        }
        T::from_cell(row, index).map(Some)
    }
}

/// A composite field stored as JSON text.
///
/// The wrapped value round-trips through `serde_json`; this is the only
/// place structured text is used, and it is how nested structures are
/// persisted without a relational decomposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Json<T>(pub T);

impl<T> From<T> for Json<T> {
    fn from(value: T) -> Self {
        Json(value)
    }
}

impl<T> std::ops::Deref for Json<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> std::ops::DerefMut for Json<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

impl<T> ColumnValue for Json<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    const KIND: ColumnKind = ColumnKind::Json;

    fn to_sql(&self) -> std::result::Result<SqlValue, sqlx::Error> {
        serde_json::to_string(&self.0)
            .map(SqlValue::Text)
            .map_err(|error| sqlx::Error::Encode(Box::new(error)))
    }

    fn from_cell(row: &SqliteRow, index: usize) -> std::result::Result<Self, sqlx::Error> {
        let text: String = row.try_get(index)?;
        serde_json::from_str(&text)
            .map(Json)
            .map_err(|error| sqlx::Error::Decode(Box::new(error)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_encodes_absence_as_null() {
        assert_eq!(None::<String>.to_sql().unwrap(), SqlValue::Null);
        assert_eq!(
            Some(String::from("x")).to_sql().unwrap(),
            SqlValue::Text(String::from("x"))
        );
    }

    #[test]
    fn json_encodes_as_text() {
        let value = Json(vec![1, 2, 3]);
        assert_eq!(
            value.to_sql().unwrap(),
            SqlValue::Text(String::from("[1,2,3]"))
        );
    }

    #[test]
    fn uuid_encodes_as_bytes() {
        let id = Uuid::nil();
        match id.to_sql().unwrap() {
            SqlValue::Blob(bytes) => assert_eq!(bytes.len(), 16),
            other => panic!("unexpected encoding: {other:?}"),
        }
    }

    #[test]
    fn kinds_reflect_field_semantics() {
        assert_eq!(<Option<i64>>::KIND, ColumnKind::Integer);
        assert_eq!(<Json<Vec<String>>>::KIND, ColumnKind::Json);
        assert_eq!(<DateTime<Utc>>::KIND, ColumnKind::DateTime);
    }
}
