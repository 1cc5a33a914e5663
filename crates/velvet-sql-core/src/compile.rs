//! Predicate compilation.
//!
//! Translates an [`Expr`] tree into a SQL fragment plus an ordered list
//! of bound parameters. The pass is recursive and depth-first: any
//! subtree that does not reference a column is evaluated up front and
//! becomes a single bound parameter (or the NULL marker), and only then
//! are the remaining column-bearing shapes dispatched. A shape outside
//! the supported subset is a hard error; a silently dropped clause could
//! widen a mutation to the whole table.

use std::cmp::Ordering;

use thiserror::Error;

use crate::expr::{BinOp, Expr};
use crate::value::{Parameter, SqlValue, quote_ident};

/// Errors raised while compiling a predicate.
#[derive(Debug, Error)]
pub enum CompileError {
    /// The expression shape is outside the supported subset.
    #[error("unsupported predicate shape: {0}")]
    Unsupported(String),
    /// A constant subexpression could not be evaluated.
    #[error("cannot evaluate constant expression {expr}: {reason}")]
    Fold {
        /// The offending subexpression.
        expr: String,
        /// Why evaluation failed.
        reason: String,
    },
}

/// A compiled predicate: SQL fragment plus bound parameters in
/// placeholder order.
#[derive(Debug, Clone)]
pub struct CompiledPredicate {
    /// The WHERE fragment, fully parenthesized.
    pub sql: String,
    /// Parameters, in order of first appearance.
    pub params: Vec<Parameter>,
}

/// Compiles `expr` into a SQL fragment and its parameters.
pub fn compile(expr: &Expr) -> Result<CompiledPredicate, CompileError> {
    let mut params = Vec::new();
    let segment = lower(expr, &mut params)?;
    Ok(CompiledPredicate {
        sql: segment.render(),
        params,
    })
}

/// One compiled piece of a predicate.
enum Segment {
    Text(String),
    Column(String),
    Param(usize),
    Null,
}

impl Segment {
    fn render(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Column(name) => quote_ident(name),
            Self::Param(index) => param_name(*index),
            Self::Null => String::from("NULL"),
        }
    }
}

fn param_name(index: usize) -> String {
    format!("@param_{index}")
}

fn push_param(params: &mut Vec<Parameter>, value: SqlValue) -> usize {
    let index = params.len();
    params.push(Parameter {
        name: param_name(index),
        value,
    });
    index
}

fn lower(expr: &Expr, params: &mut Vec<Parameter>) -> Result<Segment, CompileError> {
    // Anything not touching the row becomes a bound value up front.
    if !expr.references_column() {
        return Ok(match fold(expr)? {
            SqlValue::Null => Segment::Null,
            value => Segment::Param(push_param(params, value)),
        });
    }

    match expr {
        Expr::Column(name) => Ok(Segment::Column(name.clone())),
        Expr::Binary { op, left, right } if op.is_logical() || op.is_comparison() => {
            let lhs = lower(left, params)?;
            let rhs = lower(right, params)?;

            // Equality against an evaluated NULL rewrites to IS / IS NOT.
            if matches!(op, BinOp::Eq | BinOp::Ne) {
                let null_op = if *op == BinOp::Eq { "IS" } else { "IS NOT" };
                match (&lhs, &rhs) {
                    (Segment::Null, Segment::Null) => {
                        return Ok(Segment::Text(format!("(NULL {null_op} NULL)")));
                    }
                    (Segment::Null, other) | (other, Segment::Null) => {
                        return Ok(Segment::Text(format!(
                            "(({}) {null_op} NULL)",
                            other.render()
                        )));
                    }
                    _ => {}
                }
            }

            Ok(Segment::Text(format!(
                "(({}) {} ({}))",
                lhs.render(),
                op.sql(),
                rhs.render()
            )))
        }
        Expr::Like {
            kind,
            expr: receiver,
            pattern,
        } => {
            let lhs = lower(receiver, params)?;
            let rhs = lower(pattern, params)?;
            if let (Segment::Column(_), Segment::Param(index)) = (&lhs, &rhs) {
                if let SqlValue::Text(text) = &params[*index].value {
                    params[*index].value = SqlValue::Text(kind.apply_wildcards(text));
                    return Ok(Segment::Text(format!(
                        "(({}) LIKE ({}))",
                        lhs.render(),
                        rhs.render()
                    )));
                }
            }
            Err(CompileError::Unsupported(expr.to_string()))
        }
        Expr::InList {
            expr: needle,
            items,
        } => {
            let target = lower(needle, params)?;
            if !matches!(target, Segment::Column(_)) {
                return Err(CompileError::Unsupported(expr.to_string()));
            }
            let mut placeholders = Vec::with_capacity(items.len());
            for item in items {
                if item.references_column() {
                    return Err(CompileError::Unsupported(expr.to_string()));
                }
                placeholders.push(match fold(item)? {
                    SqlValue::Null => String::from("NULL"),
                    value => param_name(push_param(params, value)),
                });
            }
            Ok(Segment::Text(format!(
                "(({}) IN ({}))",
                target.render(),
                placeholders.join(", ")
            )))
        }
        Expr::Coerce(inner) => lower(inner, params),
        _ => Err(CompileError::Unsupported(expr.to_string())),
    }
}

fn fold_error(expr: &Expr, reason: &str) -> CompileError {
    CompileError::Fold {
        expr: expr.to_string(),
        reason: String::from(reason),
    }
}

/// Evaluates a column-free subtree to a single value.
fn fold(expr: &Expr) -> Result<SqlValue, CompileError> {
    match expr {
        Expr::Value(value) => Ok(value.clone()),
        Expr::Column(_) => Err(fold_error(expr, "references the row")),
        Expr::Binary { op, left, right } => {
            let lhs = fold(left)?;
            let rhs = fold(right)?;
            eval_binary(expr, *op, lhs, rhs)
        }
        Expr::Like {
            kind,
            expr: receiver,
            pattern,
        } => match (fold(receiver)?, fold(pattern)?) {
            (SqlValue::Text(text), SqlValue::Text(needle)) => {
                Ok(SqlValue::Bool(kind.test(&text, &needle)))
            }
            _ => Err(fold_error(expr, "pattern test needs text operands")),
        },
        Expr::InList {
            expr: needle,
            items,
        } => {
            let value = fold(needle)?;
            for item in items {
                if values_equal(&fold(item)?, &value) {
                    return Ok(SqlValue::Bool(true));
                }
            }
            Ok(SqlValue::Bool(false))
        }
        Expr::Coerce(inner) => fold(inner),
    }
}

fn eval_binary(
    expr: &Expr,
    op: BinOp,
    lhs: SqlValue,
    rhs: SqlValue,
) -> Result<SqlValue, CompileError> {
    match op {
        BinOp::And | BinOp::Or => match (lhs, rhs) {
            (SqlValue::Bool(a), SqlValue::Bool(b)) => Ok(SqlValue::Bool(if op == BinOp::And {
                a && b
            } else {
                a || b
            })),
            _ => Err(fold_error(expr, "logical operands must be boolean")),
        },
        BinOp::Eq => Ok(SqlValue::Bool(values_equal(&lhs, &rhs))),
        BinOp::Ne => Ok(SqlValue::Bool(!values_equal(&lhs, &rhs))),
        BinOp::Gt | BinOp::Ge | BinOp::Lt | BinOp::Le => {
            let ordering = compare_values(&lhs, &rhs)
                .ok_or_else(|| fold_error(expr, "operands are not comparable"))?;
            Ok(SqlValue::Bool(match op {
                BinOp::Gt => ordering == Ordering::Greater,
                BinOp::Ge => ordering != Ordering::Less,
                BinOp::Lt => ordering == Ordering::Less,
                _ => ordering != Ordering::Greater,
            }))
        }
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div => eval_arithmetic(expr, op, lhs, rhs),
    }
}

fn values_equal(lhs: &SqlValue, rhs: &SqlValue) -> bool {
    match (lhs, rhs) {
        (SqlValue::Int(int), SqlValue::Float(float))
        | (SqlValue::Float(float), SqlValue::Int(int)) => (*int as f64) == *float,
        _ => lhs == rhs,
    }
}

fn compare_values(lhs: &SqlValue, rhs: &SqlValue) -> Option<Ordering> {
    match (lhs, rhs) {
        (SqlValue::Int(a), SqlValue::Int(b)) => Some(a.cmp(b)),
        (SqlValue::Float(a), SqlValue::Float(b)) => a.partial_cmp(b),
        (SqlValue::Int(a), SqlValue::Float(b)) => (*a as f64).partial_cmp(b),
        (SqlValue::Float(a), SqlValue::Int(b)) => a.partial_cmp(&(*b as f64)),
        (SqlValue::Text(a), SqlValue::Text(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn eval_arithmetic(
    expr: &Expr,
    op: BinOp,
    lhs: SqlValue,
    rhs: SqlValue,
) -> Result<SqlValue, CompileError> {
    match (lhs, rhs) {
        (SqlValue::Text(a), SqlValue::Text(b)) if op == BinOp::Add => Ok(SqlValue::Text(a + &b)),
        (SqlValue::Int(a), SqlValue::Int(b)) => {
            let result = match op {
                BinOp::Add => a.checked_add(b),
                BinOp::Sub => a.checked_sub(b),
                BinOp::Mul => a.checked_mul(b),
                _ => a.checked_div(b),
            };
            result
                .map(SqlValue::Int)
                .ok_or_else(|| fold_error(expr, "integer arithmetic out of range"))
        }
        (lhs, rhs) => {
            let (a, b) = match (as_float(&lhs), as_float(&rhs)) {
                (Some(a), Some(b)) => (a, b),
                _ => return Err(fold_error(expr, "operands do not support arithmetic")),
            };
            Ok(SqlValue::Float(match op {
                BinOp::Add => a + b,
                BinOp::Sub => a - b,
                BinOp::Mul => a * b,
                _ => a / b,
            }))
        }
    }
}

fn as_float(value: &SqlValue) -> Option<f64> {
    match value {
        SqlValue::Int(int) => Some(*int as f64),
        SqlValue::Float(float) => Some(*float),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{col, null, val};

    #[test]
    fn comparison_binds_value() {
        let compiled = compile(&col("name").eq("Arash")).unwrap();
        assert_eq!(compiled.sql, "((\"name\") = (@param_0))");
        assert_eq!(compiled.params.len(), 1);
        assert_eq!(
            compiled.params[0].value,
            SqlValue::Text(String::from("Arash"))
        );
        assert_eq!(compiled.params[0].name, "@param_0");
    }

    #[test]
    fn null_equality_rewrites_to_is_null() {
        let compiled = compile(&col("name").eq(null())).unwrap();
        assert_eq!(compiled.sql, "((\"name\") IS NULL)");
        assert!(compiled.params.is_empty());

        let compiled = compile(&col("name").ne(None::<String>)).unwrap();
        assert_eq!(compiled.sql, "((\"name\") IS NOT NULL)");
        assert!(compiled.params.is_empty());
    }

    #[test]
    fn null_on_the_left_uses_the_column_side() {
        let compiled = compile(&null().eq(col("name"))).unwrap();
        assert_eq!(compiled.sql, "((\"name\") IS NULL)");
    }

    #[test]
    fn starts_with_appends_wildcard() {
        let compiled = compile(&col("name").starts_with("Ar")).unwrap();
        assert_eq!(compiled.sql, "((\"name\") LIKE (@param_0))");
        assert_eq!(compiled.params[0].value, SqlValue::Text(String::from("Ar%")));
    }

    #[test]
    fn ends_with_and_contains_wrap_wildcards() {
        let compiled = compile(&col("name").ends_with("edi")).unwrap();
        assert_eq!(
            compiled.params[0].value,
            SqlValue::Text(String::from("%edi"))
        );

        let compiled = compile(&col("name").contains("ras")).unwrap();
        assert_eq!(
            compiled.params[0].value,
            SqlValue::Text(String::from("%ras%"))
        );
    }

    #[test]
    fn membership_explodes_into_placeholders() {
        let compiled = compile(&col("id").in_list([1, 2, 3])).unwrap();
        assert_eq!(
            compiled.sql,
            "((\"id\") IN (@param_0, @param_1, @param_2))"
        );
        assert_eq!(compiled.params.len(), 3);
    }

    #[test]
    fn parameters_follow_first_appearance() {
        let predicate = col("a").eq(1).and(col("b").eq(2)).or(col("c").eq(3));
        let compiled = compile(&predicate).unwrap();
        let values: Vec<&SqlValue> = compiled
            .params
            .iter()
            .map(|parameter| &parameter.value)
            .collect();
        assert_eq!(
            values,
            vec![&SqlValue::Int(1), &SqlValue::Int(2), &SqlValue::Int(3)]
        );
        let first = compiled.sql.find("@param_0").unwrap();
        let second = compiled.sql.find("@param_1").unwrap();
        let third = compiled.sql.find("@param_2").unwrap();
        assert!(first < second && second < third);
    }

    #[test]
    fn constant_subtrees_fold_to_one_parameter() {
        let compiled = compile(&val(1).add(2).eq(col("score"))).unwrap();
        assert_eq!(compiled.sql, "((@param_0) = ((\"score\")))");
        assert_eq!(compiled.params[0].value, SqlValue::Int(3));
    }

    #[test]
    fn constant_text_concatenation_folds() {
        let compiled = compile(&col("name").eq(val("Ar").add("ash"))).unwrap();
        assert_eq!(
            compiled.params[0].value,
            SqlValue::Text(String::from("Arash"))
        );
    }

    #[test]
    fn fully_constant_predicate_folds_to_bound_boolean() {
        let compiled = compile(&null().eq(null())).unwrap();
        assert_eq!(compiled.sql, "@param_0");
        assert_eq!(compiled.params[0].value, SqlValue::Bool(true));

        let compiled = compile(&val("abc").starts_with("a")).unwrap();
        assert_eq!(compiled.params[0].value, SqlValue::Bool(true));

        let compiled = compile(&val(2).in_list([1, 2])).unwrap();
        assert_eq!(compiled.params[0].value, SqlValue::Bool(true));
    }

    #[test]
    fn arithmetic_over_a_column_is_rejected() {
        let error = compile(&col("score").add(1).gt(2)).unwrap_err();
        match error {
            CompileError::Unsupported(message) => assert!(message.contains("score")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn pattern_test_needs_column_and_text() {
        assert!(compile(&val("abc").starts_with(col("name"))).is_err());
        assert!(compile(&col("name").starts_with(5)).is_err());
    }

    #[test]
    fn membership_items_must_be_constant() {
        assert!(compile(&col("id").in_list([col("other")])).is_err());
    }

    #[test]
    fn division_by_zero_is_a_fold_error() {
        let error = compile(&val(1).div(0).eq(col("score"))).unwrap_err();
        assert!(matches!(error, CompileError::Fold { .. }));
    }

    #[test]
    fn coercion_is_transparent() {
        let plain = compile(&col("age").eq(3)).unwrap();
        let coerced = compile(&col("age").coerce().eq(3)).unwrap();
        assert_eq!(plain.sql, coerced.sql);
    }

    #[test]
    fn null_in_membership_renders_inline() {
        let compiled = compile(&col("id").in_list([val(1), null()])).unwrap();
        assert_eq!(compiled.sql, "((\"id\") IN (@param_0, NULL))");
        assert_eq!(compiled.params.len(), 1);
    }
}
