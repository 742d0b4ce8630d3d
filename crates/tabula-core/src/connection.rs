//! The database driver collaborator.
//!
//! The ORM never speaks a wire protocol. It renders SQL plus an ordered list of
//! parameters and hands them to a `Connection`; pooling, isolation, retries and
//! timeouts all belong to the implementation behind this trait.

use std::future::Future;

use asupersync::{Cx, Outcome};

use crate::error::Error;
use crate::row::Row;
use crate::value::Value;

/// What a driver reports back from an INSERT.
///
/// Which field carries the generated key depends on the backend: MySQL and
/// SQLite fill `last_insert_id`, PostgreSQL returns rows through `RETURNING`.
/// The dialect knows which one to read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertResult {
    pub last_insert_id: Option<i64>,
    /// Rows produced by a `RETURNING` clause.
    pub rows: Vec<Row>,
    pub rows_affected: u64,
}

impl InsertResult {
    /// Result carrying only a generated id.
    pub fn with_id(id: i64) -> Self {
        Self {
            last_insert_id: Some(id),
            rows: Vec::new(),
            rows_affected: 1,
        }
    }

    /// Result carrying only `RETURNING` rows.
    pub fn with_rows(rows: Vec<Row>) -> Self {
        let rows_affected = rows.len() as u64;
        Self {
            last_insert_id: None,
            rows,
            rows_affected,
        }
    }
}

/// A database connection.
///
/// Bind parameters are standard scalars plus `Value::Array`, which is bound as
/// a single value for `IN` filters.
pub trait Connection: Send + Sync {
    /// Run a statement that returns rows.
    fn query(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send;

    /// Run a statement and return the number of affected rows.
    fn execute(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send;

    /// Run an INSERT and report generated keys.
    fn insert(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<InsertResult, Error>> + Send;
}
