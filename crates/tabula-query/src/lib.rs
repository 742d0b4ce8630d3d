//! SQL generation for tabula.
//!
//! `tabula-query` is the **statement construction layer**. It owns the
//! description of a query (`QuerySpec`) and the pure function that turns one
//! into SQL text plus an ordered parameter list for a given `Dialect`.
//!
//! # Role In The Architecture
//!
//! - **Dialects**: quoting, placeholders, `IN`, `LIMIT`, empty inserts and
//!   `RETURNING` for PostgreSQL, MySQL and SQLite.
//! - **Query specifications**: verb, filters, projection, ordering, grouping,
//!   pagination intent, eager-load requests and active scopes.
//! - **Rendering**: `render(&spec, dialect)` for select/count/insert/update/delete.
//!
//! Nothing here touches a connection; execution lives in the `tabula` facade.

pub mod clause;
pub mod dialect;
pub mod ident;
pub mod spec;
pub mod sql;

pub use clause::{Clause, PARAM_TOKEN};
pub use dialect::Dialect;
pub use ident::is_valid_identifier;
pub use spec::{Includes, QuerySpec, Verb};
pub use sql::{Statement, render, render_raw};
