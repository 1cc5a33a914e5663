//! SQL values and bound parameters.
//!
//! Every value that crosses the driver boundary is carried as a
//! [`SqlValue`] and bound as a parameter, never spliced into SQL text.

/// A value bound to a SQL statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL.
    Null,
    /// Boolean, stored as an integer by the engine.
    Bool(bool),
    /// 64-bit integer.
    Int(i64),
    /// 64-bit float.
    Float(f64),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Blob(Vec<u8>),
}

impl SqlValue {
    /// Returns whether this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Renders the value as a SQL literal.
    ///
    /// Used for diagnostics only; statements always bind values as
    /// parameters.
    #[must_use]
    pub fn literal(&self) -> String {
        match self {
            Self::Null => String::from("NULL"),
            Self::Bool(value) => String::from(if *value { "1" } else { "0" }),
            Self::Int(value) => value.to_string(),
            Self::Float(value) => value.to_string(),
            Self::Text(value) => format!("'{}'", value.replace('\'', "''")),
            Self::Blob(bytes) => {
                let hex: String = bytes.iter().map(|byte| format!("{byte:02X}")).collect();
                format!("X'{hex}'")
            }
        }
    }
}

/// A named parameter produced by predicate compilation.
///
/// Names follow the order of first appearance (`@param_0`, `@param_1`,
/// ...), so binding the list positionally matches the placeholders in
/// the rendered SQL.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// Placeholder name, including the `@` prefix.
    pub name: String,
    /// Bound value.
    pub value: SqlValue,
}

/// Quotes an identifier for direct inclusion in SQL text.
#[must_use]
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Conversion into a [`SqlValue`].
pub trait ToSqlValue {
    /// Converts the value.
    fn to_sql_value(self) -> SqlValue;
}

impl ToSqlValue for SqlValue {
    fn to_sql_value(self) -> SqlValue {
        self
    }
}

impl ToSqlValue for bool {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Bool(self)
    }
}

macro_rules! int_to_sql_value {
    ($($ty:ty),+) => {
        $(impl ToSqlValue for $ty {
            fn to_sql_value(self) -> SqlValue {
                SqlValue::Int(i64::from(self))
            }
        })+
    };
}

int_to_sql_value!(i8, i16, i32, i64, u8, u16, u32);

impl ToSqlValue for f64 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Float(self)
    }
}

impl ToSqlValue for f32 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Float(f64::from(self))
    }
}

impl ToSqlValue for String {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(self)
    }
}

impl ToSqlValue for &str {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(String::from(self))
    }
}

impl ToSqlValue for Vec<u8> {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Blob(self)
    }
}

impl ToSqlValue for &[u8] {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Blob(self.to_vec())
    }
}

impl<T: ToSqlValue> ToSqlValue for Option<T> {
    fn to_sql_value(self) -> SqlValue {
        match self {
            Some(value) => value.to_sql_value(),
            None => SqlValue::Null,
        }
    }
}

#[cfg(feature = "chrono")]
impl ToSqlValue for chrono::DateTime<chrono::Utc> {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(self.to_rfc3339())
    }
}

#[cfg(feature = "chrono")]
impl ToSqlValue for chrono::NaiveDateTime {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(self.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
    }
}

#[cfg(feature = "uuid")]
impl ToSqlValue for uuid::Uuid {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Blob(self.as_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_escapes_quotes() {
        assert_eq!(
            SqlValue::Text(String::from("O'Brien")).literal(),
            "'O''Brien'"
        );
    }

    #[test]
    fn literal_basic_values() {
        assert_eq!(SqlValue::Null.literal(), "NULL");
        assert_eq!(SqlValue::Bool(true).literal(), "1");
        assert_eq!(SqlValue::Int(-4).literal(), "-4");
        assert_eq!(SqlValue::Blob(vec![0xAB, 0x01]).literal(), "X'AB01'");
    }

    #[test]
    fn quote_ident_doubles_embedded_quotes() {
        assert_eq!(quote_ident("plain"), "\"plain\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn conversions() {
        assert_eq!(7_i32.to_sql_value(), SqlValue::Int(7));
        assert_eq!(2.5_f64.to_sql_value(), SqlValue::Float(2.5));
        assert_eq!("x".to_sql_value(), SqlValue::Text(String::from("x")));
        assert_eq!(None::<i64>.to_sql_value(), SqlValue::Null);
        assert_eq!(Some(false).to_sql_value(), SqlValue::Bool(false));
    }
}
