//! SQL dialect differences between supported backends.

use serde::{Deserialize, Serialize};
use tabula_core::{InsertResult, Value};

/// Target database dialect.
///
/// A dialect is pure data: one value per backend, never mutated, freely shared
/// across concurrent queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// PostgreSQL: `$1` placeholders, `= ANY ($1)` for array membership.
    #[default]
    Postgres,
    /// MySQL: positional `?` placeholders, backtick identifiers.
    Mysql,
    /// SQLite: numbered `?1` placeholders.
    Sqlite,
}

impl Dialect {
    /// Identifier quote character.
    #[must_use]
    pub const fn quote_char(self) -> char {
        match self {
            Dialect::Postgres | Dialect::Sqlite => '"',
            Dialect::Mysql => '`',
        }
    }

    /// Quote an identifier, doubling any embedded quote character.
    #[must_use]
    pub fn quote(self, ident: &str) -> String {
        let q = self.quote_char();
        let mut out = String::with_capacity(ident.len() + 2);
        out.push(q);
        for c in ident.chars() {
            if c == q {
                out.push(q);
            }
            out.push(c);
        }
        out.push(q);
        out
    }

    /// Placeholder for the 1-based parameter `index`.
    #[must_use]
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${index}"),
            Dialect::Mysql => "?".to_string(),
            Dialect::Sqlite => format!("?{index}"),
        }
    }

    /// Operator placed between a column and a bound array value.
    #[must_use]
    pub const fn in_keyword(self) -> &'static str {
        match self {
            Dialect::Postgres => "= ANY",
            Dialect::Mysql | Dialect::Sqlite => "IN",
        }
    }

    /// Render the limit clause for two already-reserved parameter positions.
    ///
    /// Parameters are always bound offset first, then limit.
    #[must_use]
    pub fn limit_clause(self, offset_index: usize, limit_index: usize) -> String {
        match self {
            Dialect::Postgres => format!(
                "OFFSET {} LIMIT {}",
                self.placeholder(offset_index),
                self.placeholder(limit_index)
            ),
            Dialect::Mysql => format!(
                "LIMIT {}, {}",
                self.placeholder(offset_index),
                self.placeholder(limit_index)
            ),
            Dialect::Sqlite => format!(
                "LIMIT {} OFFSET {}",
                self.placeholder(limit_index),
                self.placeholder(offset_index)
            ),
        }
    }

    /// Fragment used instead of a column list when inserting no columns.
    #[must_use]
    pub const fn empty_insert(self) -> &'static str {
        match self {
            Dialect::Postgres | Dialect::Sqlite => " DEFAULT VALUES",
            Dialect::Mysql => " () VALUES ()",
        }
    }

    /// Fragment appended verbatim to every INSERT (may be empty).
    #[must_use]
    pub const fn returning(self) -> &'static str {
        match self {
            Dialect::Postgres => " RETURNING *",
            Dialect::Mysql | Dialect::Sqlite => "",
        }
    }

    /// Pull the generated primary key out of an insert result.
    ///
    /// `pk_column` is only consulted for backends that report keys through
    /// `RETURNING` rows. A zero `last_insert_id` means the table has no
    /// generated key.
    #[must_use]
    pub fn extract_insert_id(self, result: &InsertResult, pk_column: &str) -> Option<Value> {
        match self {
            Dialect::Postgres => result
                .rows
                .first()
                .and_then(|row| row.get(pk_column))
                .filter(|v| !v.is_null())
                .cloned(),
            Dialect::Mysql | Dialect::Sqlite => result
                .last_insert_id
                .filter(|id| *id > 0)
                .map(Value::BigInt),
        }
    }
}
