//! WHERE clause building blocks.

use tabula_core::{Row, Value};

/// Generic placeholder token inside raw SQL filters.
///
/// Each occurrence is replaced, left to right, with the dialect's next
/// placeholder when the statement is rendered. Occurrences inside quoted
/// strings or identifiers are kept, and `??` renders as a literal `?`.
pub const PARAM_TOKEN: char = '?';

/// One entry of a query's filter list. Clauses are joined with `AND`.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// Raw SQL with `?` tokens and their parameters, in order.
    Raw { sql: String, params: Vec<Value> },
    /// Equality map: one condition per key.
    ///
    /// - `NULL` renders `col IS NULL`;
    /// - an empty array renders `FALSE`, so the query matches nothing;
    /// - a non-empty array is bound as one value for `col IN (...)`;
    /// - anything else renders `col = ?`.
    Equals(Row),
}

impl Clause {
    pub fn raw(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Clause::Raw {
            sql: sql.into(),
            params,
        }
    }

    pub fn equals(conditions: Row) -> Self {
        Clause::Equals(conditions)
    }

    /// Whether this clause can never match a row.
    #[must_use]
    pub fn is_always_false(&self) -> bool {
        match self {
            Clause::Equals(row) => row
                .values()
                .any(|v| v.as_array().is_some_and(<[Value]>::is_empty)),
            Clause::Raw { .. } => false,
        }
    }
}

impl From<Row> for Clause {
    fn from(row: Row) -> Self {
        Clause::Equals(row)
    }
}
