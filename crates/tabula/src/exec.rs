//! Statement execution with SQL logging.
//!
//! Every round trip of the pipeline goes through one of these helpers, so each
//! rendered statement is logged once under the `tabula::sql` target and each
//! driver failure is logged before it is propagated unchanged.

use tabula_core::{Connection, Cx, Error, InsertResult, Outcome, Row};
use tabula_query::Statement;

fn log_statement(verb: &'static str, stmt: &Statement) {
    tracing::debug!(
        target: "tabula::sql",
        verb,
        sql = %stmt.sql,
        params = stmt.params.len(),
        "executing statement"
    );
}

fn log_outcome<T>(stmt: &Statement, outcome: Outcome<T, Error>) -> Outcome<T, Error> {
    if let Outcome::Err(e) = &outcome {
        tracing::error!(target: "tabula::sql", sql = %stmt.sql, error = %e, "statement failed");
    }
    outcome
}

pub(crate) async fn query<C: Connection>(
    cx: &Cx,
    conn: &C,
    stmt: &Statement,
) -> Outcome<Vec<Row>, Error> {
    log_statement("query", stmt);
    log_outcome(stmt, conn.query(cx, &stmt.sql, &stmt.params).await)
}

pub(crate) async fn execute<C: Connection>(
    cx: &Cx,
    conn: &C,
    stmt: &Statement,
) -> Outcome<u64, Error> {
    log_statement("execute", stmt);
    log_outcome(stmt, conn.execute(cx, &stmt.sql, &stmt.params).await)
}

pub(crate) async fn insert<C: Connection>(
    cx: &Cx,
    conn: &C,
    stmt: &Statement,
) -> Outcome<InsertResult, Error> {
    log_statement("insert", stmt);
    log_outcome(stmt, conn.insert(cx, &stmt.sql, &stmt.params).await)
}
