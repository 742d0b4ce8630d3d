//! Identifier validation for schema definitions.
//!
//! Identifiers end up quoted inside generated SQL, so they are restricted to a
//! conservative character set when a schema is registered.

use tabula_core::{Error, Result};

pub use tabula_query::is_valid_identifier;

/// Fail with a schema error naming `what` unless `name` is a valid identifier.
pub(crate) fn check_identifier(what: &str, name: &str) -> Result<()> {
    if is_valid_identifier(name) {
        Ok(())
    } else {
        Err(Error::schema(format!("invalid {what} identifier '{name}'")))
    }
}
