//! Deferred query state.
//!
//! A [`QueryState`] is an immutable value accumulating the clauses of a
//! SELECT. Every mutator returns a new state, so earlier links of a
//! chain stay valid and can fork freely. Nothing executes here;
//! [`QueryState::select`] renders the final SQL on demand.

use thiserror::Error;

use crate::compile::CompiledPredicate;
use crate::value::{Parameter, quote_ident};

/// Errors raised while extending a query chain.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    /// A predicate is already set in this chain. Conjunctions belong
    /// inside a single expression.
    #[error("a predicate is already set in this query chain")]
    DuplicateWhere,
    /// The column already appears in the ordering of this chain.
    #[error("duplicate ORDER BY column `{0}` in this query chain")]
    DuplicateOrder(String),
}

/// One ordering key.
#[derive(Debug, Clone)]
pub struct OrderSegment {
    /// Column name.
    pub column: String,
    /// Ascending or descending.
    pub ascending: bool,
}

/// A rendered statement: SQL text plus bound parameters.
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    /// The statement text.
    pub sql: String,
    /// Parameters, in placeholder order.
    pub params: Vec<Parameter>,
}

/// Accumulated SELECT clauses. Immutable; see the module docs.
#[derive(Debug, Clone, Default)]
pub struct QueryState {
    distinct: bool,
    predicate: Option<CompiledPredicate>,
    order: Vec<OrderSegment>,
    skip: Option<i64>,
    take: Option<i64>,
}

impl QueryState {
    /// An empty state: `SELECT * FROM <table>`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a state with DISTINCT set.
    #[must_use]
    pub fn distinct(&self) -> Self {
        Self {
            distinct: true,
            ..self.clone()
        }
    }

    /// Returns a state with the WHERE predicate set.
    ///
    /// At most one predicate per chain; a second call fails with
    /// [`QueryError::DuplicateWhere`].
    pub fn filter(&self, predicate: CompiledPredicate) -> Result<Self, QueryError> {
        if self.predicate.is_some() {
            return Err(QueryError::DuplicateWhere);
        }
        Ok(Self {
            predicate: Some(predicate),
            ..self.clone()
        })
    }

    /// Returns a state with one more ordering key. Keys apply in the
    /// order they were added; repeating a column fails.
    pub fn order_by(&self, column: &str, ascending: bool) -> Result<Self, QueryError> {
        if self
            .order
            .iter()
            .any(|segment| segment.column.eq_ignore_ascii_case(column))
        {
            return Err(QueryError::DuplicateOrder(String::from(column)));
        }
        let mut next = self.clone();
        next.order.push(OrderSegment {
            column: String::from(column),
            ascending,
        });
        Ok(next)
    }

    /// Returns a state skipping the first `count` rows.
    #[must_use]
    pub fn skip(&self, count: i64) -> Self {
        Self {
            skip: Some(count),
            ..self.clone()
        }
    }

    /// Returns a state keeping at most `count` rows.
    #[must_use]
    pub fn take(&self, count: i64) -> Self {
        Self {
            take: Some(count),
            ..self.clone()
        }
    }

    /// The compiled predicate, if one is set.
    #[must_use]
    pub fn predicate(&self) -> Option<&CompiledPredicate> {
        self.predicate.as_ref()
    }

    /// Renders the SELECT against `table`.
    ///
    /// The engine's grammar requires LIMIT before OFFSET; a skip without
    /// a take renders `LIMIT -1` to keep the OFFSET clause valid.
    #[must_use]
    pub fn select(&self, table: &str) -> CompiledQuery {
        let mut sql = String::from("SELECT ");
        if self.distinct {
            sql.push_str("DISTINCT ");
        }
        sql.push('*');
        sql.push_str(" FROM ");
        sql.push_str(&quote_ident(table));

        let mut params = Vec::new();
        if let Some(predicate) = &self.predicate {
            sql.push_str(" WHERE (");
            sql.push_str(&predicate.sql);
            sql.push(')');
            params.extend(predicate.params.iter().cloned());
        }

        if !self.order.is_empty() {
            sql.push_str(" ORDER BY ");
            let keys: Vec<String> = self
                .order
                .iter()
                .map(|segment| {
                    let direction = if segment.ascending { "ASC" } else { "DESC" };
                    format!("{} {direction}", quote_ident(&segment.column))
                })
                .collect();
            sql.push_str(&keys.join(", "));
        }

        match (self.take, self.skip) {
            (Some(take), Some(skip)) => sql.push_str(&format!(" LIMIT {take} OFFSET {skip}")),
            (Some(take), None) => sql.push_str(&format!(" LIMIT {take}")),
            (None, Some(skip)) => sql.push_str(&format!(" LIMIT -1 OFFSET {skip}")),
            (None, None) => {}
        }

        CompiledQuery { sql, params }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::compile;
    use crate::expr::{col, val};

    #[test]
    fn empty_state_selects_everything() {
        let query = QueryState::new().select("tracks");
        assert_eq!(query.sql, "SELECT * FROM \"tracks\"");
        assert!(query.params.is_empty());
    }

    #[test]
    fn distinct_is_rendered() {
        let query = QueryState::new().distinct().select("tracks");
        assert_eq!(query.sql, "SELECT DISTINCT * FROM \"tracks\"");
    }

    #[test]
    fn predicate_is_wrapped_and_parameters_carried() {
        let predicate = compile(&col("score").gt(0)).unwrap();
        let query = QueryState::new()
            .filter(predicate)
            .unwrap()
            .select("tracks");
        assert_eq!(
            query.sql,
            "SELECT * FROM \"tracks\" WHERE (((\"score\") > (@param_0)))"
        );
        assert_eq!(query.params.len(), 1);
    }

    #[test]
    fn second_predicate_fails() {
        let first = compile(&col("a").eq(1)).unwrap();
        let second = compile(&col("b").eq(2)).unwrap();
        let state = QueryState::new().filter(first).unwrap();
        assert_eq!(state.filter(second).unwrap_err(), QueryError::DuplicateWhere);
    }

    #[test]
    fn earlier_links_stay_usable() {
        let base = QueryState::new();
        let filtered = base.filter(compile(&val(true)).unwrap()).unwrap();
        // The base state is unaffected and can be extended separately.
        let other = base.filter(compile(&val(false)).unwrap()).unwrap();
        assert!(filtered.predicate().is_some());
        assert!(other.predicate().is_some());
        assert!(base.predicate().is_none());
    }

    #[test]
    fn order_keys_render_in_insertion_order() {
        let query = QueryState::new()
            .order_by("name", true)
            .unwrap()
            .order_by("id", false)
            .unwrap()
            .select("tracks");
        assert_eq!(
            query.sql,
            "SELECT * FROM \"tracks\" ORDER BY \"name\" ASC, \"id\" DESC"
        );
    }

    #[test]
    fn duplicate_order_column_fails_case_insensitively() {
        let state = QueryState::new().order_by("name", true).unwrap();
        assert_eq!(
            state.order_by("NAME", false).unwrap_err(),
            QueryError::DuplicateOrder(String::from("NAME"))
        );
    }

    #[test]
    fn paging_renders_limit_before_offset() {
        let query = QueryState::new().take(5).skip(10).select("tracks");
        assert_eq!(query.sql, "SELECT * FROM \"tracks\" LIMIT 5 OFFSET 10");

        let query = QueryState::new().take(5).select("tracks");
        assert_eq!(query.sql, "SELECT * FROM \"tracks\" LIMIT 5");

        let query = QueryState::new().skip(10).select("tracks");
        assert_eq!(query.sql, "SELECT * FROM \"tracks\" LIMIT -1 OFFSET 10");
    }
}
