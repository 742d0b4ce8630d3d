//! Plain SQL identifiers.
//!
//! Table, column and attribute names are restricted to a conservative
//! character set. Names outside it are treated as SQL expressions and are
//! never quoted.

use std::sync::OnceLock;

use regex::Regex;

const IDENTIFIER_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]*$";

fn identifier_regex() -> Option<&'static Regex> {
    static REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    REGEX
        .get_or_init(|| match Regex::new(IDENTIFIER_PATTERN) {
            Ok(re) => Some(re),
            Err(e) => {
                tracing::error!(pattern = IDENTIFIER_PATTERN, error = %e, "identifier regex failed to compile");
                None
            }
        })
        .as_ref()
}

/// Whether `name` is a valid table, column or attribute identifier.
#[must_use]
pub fn is_valid_identifier(name: &str) -> bool {
    identifier_regex().is_some_and(|re| re.is_match(name))
}
