//! Core types and traits for tabula.
//!
//! `tabula-core` is the **foundation layer** of the workspace. It defines the
//! data types every other crate exchanges and the single trait a database
//! driver has to implement.
//!
//! # Role In The Architecture
//!
//! - **Contract layer**: `Connection` is the driver collaborator. The ORM only
//!   ever hands it SQL text plus an ordered parameter list.
//! - **Data model**: `Row` and `Value` carry query inputs and outputs;
//!   `SemanticType` drives write serialization and read coercion.
//! - **Structured concurrency**: re-exports `Cx` and `Outcome` from asupersync so
//!   every database round trip is cancel-correct.
//!
//! # Who Uses This Crate
//!
//! - `tabula-query` renders `QuerySpec`s into SQL over `Value` parameters.
//! - `tabula-schema` uses `SemanticType` to describe and coerce columns.
//! - `tabula` drives `Connection` through the execution pipeline.

// Re-export asupersync primitives for structured concurrency
pub use asupersync::{Cx, Outcome};

pub mod connection;
pub mod error;
pub mod row;
pub mod types;
pub mod value;

pub use connection::{Connection, InsertResult};
pub use error::{DriverError, Error, Result};
pub use row::Row;
pub use types::{SemanticType, parse_date};
pub use value::Value;

/// Unwrap an `Outcome::Ok`, returning every other variant from the enclosing
/// function unchanged.
///
/// ```ignore
/// let rows = try_outcome!(conn.query(cx, sql, &params).await);
/// ```
#[macro_export]
macro_rules! try_outcome {
    ($outcome:expr) => {
        match $outcome {
            $crate::Outcome::Ok(value) => value,
            $crate::Outcome::Err(e) => return $crate::Outcome::Err(e),
            $crate::Outcome::Cancelled(r) => return $crate::Outcome::Cancelled(r),
            $crate::Outcome::Panicked(p) => return $crate::Outcome::Panicked(p),
        }
    };
}

/// Build a [`Row`] from `key => value` pairs, preserving their order.
///
/// ```
/// use tabula_core::{Value, row};
///
/// let filter = row! { "status" => "active", "deleted_at" => Value::Null };
/// assert_eq!(filter.len(), 2);
/// assert_eq!(filter.keys().next(), Some("status"));
/// ```
#[macro_export]
macro_rules! row {
    () => {
        $crate::Row::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut row = $crate::Row::new();
        $(
            row.insert($key, $value);
        )+
        row
    }};
}
