//! Predicate expression trees.
//!
//! An [`Expr`] describes a boolean expression over the columns of one
//! row, mixed with captured external values. Trees are built with the
//! [`col`]/[`val`]/[`null`] constructors and the combinator methods, and
//! handed to [`crate::compile`] to obtain a SQL fragment plus bound
//! parameters.
//!
//! # Example
//!
//! ```
//! use velvet_sql_core::{col, compile};
//!
//! let predicate = col("score").gt(0).and(col("name").starts_with("Ar"));
//! let compiled = compile(&predicate).unwrap();
//! assert!(compiled.sql.contains("LIKE"));
//! ```

use std::fmt;

use crate::value::{SqlValue, ToSqlValue};

/// Binary operators understood by the expression tree.
///
/// The compiler renders the logical and comparison operators to SQL; the
/// arithmetic operators exist so captured computations can be folded to
/// a single bound value, and are rejected when they touch a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    /// Logical AND.
    And,
    /// Logical OR.
    Or,
    /// Equality.
    Eq,
    /// Inequality.
    Ne,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Ge,
    /// Less than.
    Lt,
    /// Less than or equal.
    Le,
    /// Addition (numeric) or concatenation (text).
    Add,
    /// Subtraction.
    Sub,
    /// Multiplication.
    Mul,
    /// Division.
    Div,
}

impl BinOp {
    /// The SQL spelling of the operator.
    #[must_use]
    pub fn sql(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
        }
    }

    pub(crate) fn is_logical(self) -> bool {
        matches!(self, Self::And | Self::Or)
    }

    pub(crate) fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Ne | Self::Gt | Self::Ge | Self::Lt | Self::Le
        )
    }
}

/// Which string pattern test a [`Expr::Like`] node performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    /// The column value begins with the pattern.
    StartsWith,
    /// The column value ends with the pattern.
    EndsWith,
    /// The column value contains the pattern.
    Contains,
}

impl PatternKind {
    /// Rewrites a bound pattern with `%` wildcards.
    pub(crate) fn apply_wildcards(self, pattern: &str) -> String {
        match self {
            Self::StartsWith => format!("{pattern}%"),
            Self::EndsWith => format!("%{pattern}"),
            Self::Contains => format!("%{pattern}%"),
        }
    }

    /// Evaluates the test against in-memory strings.
    pub(crate) fn test(self, receiver: &str, pattern: &str) -> bool {
        match self {
            Self::StartsWith => receiver.starts_with(pattern),
            Self::EndsWith => receiver.ends_with(pattern),
            Self::Contains => receiver.contains(pattern),
        }
    }

    fn method_name(self) -> &'static str {
        match self {
            Self::StartsWith => "starts_with",
            Self::EndsWith => "ends_with",
            Self::Contains => "contains",
        }
    }
}

/// A node in a predicate expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A captured external value.
    Value(SqlValue),
    /// A reference to a column of the row being tested.
    Column(String),
    /// A binary operation.
    Binary {
        /// Operator.
        op: BinOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// A string pattern test.
    Like {
        /// Which test.
        kind: PatternKind,
        /// The tested expression.
        expr: Box<Expr>,
        /// The pattern.
        pattern: Box<Expr>,
    },
    /// A membership test against a list of candidate values.
    InList {
        /// The tested expression.
        expr: Box<Expr>,
        /// Candidate values.
        items: Vec<Expr>,
    },
    /// A value-widening coercion. Compiles to nothing; the operand is
    /// compiled in its place.
    Coerce(Box<Expr>),
}

/// References a column of the row under test.
#[must_use]
pub fn col(name: &str) -> Expr {
    Expr::Column(String::from(name))
}

/// Captures an external value.
#[must_use]
pub fn val<T: ToSqlValue>(value: T) -> Expr {
    Expr::Value(value.to_sql_value())
}

/// The NULL sentinel.
#[must_use]
pub fn null() -> Expr {
    Expr::Value(SqlValue::Null)
}

macro_rules! value_to_expr {
    ($($ty:ty),+ $(,)?) => {
        $(impl From<$ty> for Expr {
            fn from(value: $ty) -> Self {
                Expr::Value(value.to_sql_value())
            }
        })+
    };
}

value_to_expr!(bool, i8, i16, i32, i64, u8, u16, u32, f32, f64, String, Vec<u8>, SqlValue);

impl<'a> From<&'a str> for Expr {
    fn from(value: &'a str) -> Self {
        Expr::Value(value.to_sql_value())
    }
}

impl<'a> From<&'a [u8]> for Expr {
    fn from(value: &'a [u8]) -> Self {
        Expr::Value(value.to_sql_value())
    }
}

impl<T: ToSqlValue> From<Option<T>> for Expr {
    fn from(value: Option<T>) -> Self {
        Expr::Value(value.to_sql_value())
    }
}

#[cfg(feature = "chrono")]
impl From<chrono::DateTime<chrono::Utc>> for Expr {
    fn from(value: chrono::DateTime<chrono::Utc>) -> Self {
        Expr::Value(value.to_sql_value())
    }
}

#[cfg(feature = "chrono")]
impl From<chrono::NaiveDateTime> for Expr {
    fn from(value: chrono::NaiveDateTime) -> Self {
        Expr::Value(value.to_sql_value())
    }
}

#[cfg(feature = "uuid")]
impl From<uuid::Uuid> for Expr {
    fn from(value: uuid::Uuid) -> Self {
        Expr::Value(value.to_sql_value())
    }
}

impl Expr {
    fn binary(op: BinOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Logical AND.
    #[must_use]
    pub fn and(self, other: impl Into<Expr>) -> Expr {
        Self::binary(BinOp::And, self, other.into())
    }

    /// Logical OR.
    #[must_use]
    pub fn or(self, other: impl Into<Expr>) -> Expr {
        Self::binary(BinOp::Or, self, other.into())
    }

    /// Equality. Comparing against NULL compiles to `IS NULL`.
    #[must_use]
    pub fn eq(self, other: impl Into<Expr>) -> Expr {
        Self::binary(BinOp::Eq, self, other.into())
    }

    /// Inequality. Comparing against NULL compiles to `IS NOT NULL`.
    #[must_use]
    pub fn ne(self, other: impl Into<Expr>) -> Expr {
        Self::binary(BinOp::Ne, self, other.into())
    }

    /// Greater than.
    #[must_use]
    pub fn gt(self, other: impl Into<Expr>) -> Expr {
        Self::binary(BinOp::Gt, self, other.into())
    }

    /// Greater than or equal.
    #[must_use]
    pub fn ge(self, other: impl Into<Expr>) -> Expr {
        Self::binary(BinOp::Ge, self, other.into())
    }

    /// Less than.
    #[must_use]
    pub fn lt(self, other: impl Into<Expr>) -> Expr {
        Self::binary(BinOp::Lt, self, other.into())
    }

    /// Less than or equal.
    #[must_use]
    pub fn le(self, other: impl Into<Expr>) -> Expr {
        Self::binary(BinOp::Le, self, other.into())
    }

    /// Addition, or concatenation for text values. Only valid on
    /// captured values; the compiler cannot translate arithmetic over
    /// columns.
    #[must_use]
    pub fn add(self, other: impl Into<Expr>) -> Expr {
        Self::binary(BinOp::Add, self, other.into())
    }

    /// Subtraction. Same column restriction as [`Expr::add`].
    #[must_use]
    pub fn sub(self, other: impl Into<Expr>) -> Expr {
        Self::binary(BinOp::Sub, self, other.into())
    }

    /// Multiplication. Same column restriction as [`Expr::add`].
    #[must_use]
    pub fn mul(self, other: impl Into<Expr>) -> Expr {
        Self::binary(BinOp::Mul, self, other.into())
    }

    /// Division. Same column restriction as [`Expr::add`].
    #[must_use]
    pub fn div(self, other: impl Into<Expr>) -> Expr {
        Self::binary(BinOp::Div, self, other.into())
    }

    /// Prefix test, compiled to `LIKE` with a trailing wildcard.
    #[must_use]
    pub fn starts_with(self, pattern: impl Into<Expr>) -> Expr {
        Expr::Like {
            kind: PatternKind::StartsWith,
            expr: Box::new(self),
            pattern: Box::new(pattern.into()),
        }
    }

    /// Suffix test, compiled to `LIKE` with a leading wildcard.
    #[must_use]
    pub fn ends_with(self, pattern: impl Into<Expr>) -> Expr {
        Expr::Like {
            kind: PatternKind::EndsWith,
            expr: Box::new(self),
            pattern: Box::new(pattern.into()),
        }
    }

    /// Substring test, compiled to `LIKE` with wildcards on both sides.
    #[must_use]
    pub fn contains(self, pattern: impl Into<Expr>) -> Expr {
        Expr::Like {
            kind: PatternKind::Contains,
            expr: Box::new(self),
            pattern: Box::new(pattern.into()),
        }
    }

    /// Membership test, compiled to `IN` with one placeholder per item.
    #[must_use]
    pub fn in_list<I>(self, items: I) -> Expr
    where
        I: IntoIterator,
        I::Item: Into<Expr>,
    {
        Expr::InList {
            expr: Box::new(self),
            items: items.into_iter().map(Into::into).collect(),
        }
    }

    /// Wraps the expression in a transparent widening coercion.
    #[must_use]
    pub fn coerce(self) -> Expr {
        Expr::Coerce(Box::new(self))
    }

    /// Whether any node in this subtree references a column.
    #[must_use]
    pub fn references_column(&self) -> bool {
        match self {
            Expr::Column(_) => true,
            Expr::Value(_) => false,
            Expr::Binary { left, right, .. } => {
                left.references_column() || right.references_column()
            }
            Expr::Like { expr, pattern, .. } => {
                expr.references_column() || pattern.references_column()
            }
            Expr::InList { expr, items } => {
                expr.references_column() || items.iter().any(Expr::references_column)
            }
            Expr::Coerce(inner) => inner.references_column(),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Value(value) => write!(f, "{}", value.literal()),
            Expr::Column(name) => write!(f, "{name}"),
            Expr::Binary { op, left, right } => write!(f, "({left} {} {right})", op.sql()),
            Expr::Like {
                kind,
                expr,
                pattern,
            } => write!(f, "{expr}.{}({pattern})", kind.method_name()),
            Expr::InList { expr, items } => {
                let rendered: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "{expr} IN [{}]", rendered.join(", "))
            }
            Expr::Coerce(inner) => write!(f, "coerce({inner})"),
        }
    }
}
