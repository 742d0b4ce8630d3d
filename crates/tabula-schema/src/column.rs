//! Column definitions.

use serde::{Deserialize, Serialize};
use tabula_core::{SemanticType, Value};

/// Metadata about one stored column.
///
/// `attribute` is the name the column goes by on entities. The mapping is
/// fixed when the schema is built and works in both directions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Database column name
    pub name: String,
    /// Entity attribute name
    pub attribute: String,
    pub semantic_type: SemanticType,
    /// Explicit `strftime` format for `date` columns.
    pub format: Option<String>,
}

impl Column {
    /// A column whose attribute shares its name.
    pub fn new(name: impl Into<String>, semantic_type: SemanticType) -> Self {
        let name = name.into();
        Self {
            attribute: name.clone(),
            name,
            semantic_type,
            format: None,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, SemanticType::String)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, SemanticType::Integer)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, SemanticType::Float)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, SemanticType::Boolean)
    }

    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, SemanticType::Date)
    }

    pub fn json(name: impl Into<String>) -> Self {
        Self::new(name, SemanticType::Json)
    }

    pub fn raw(name: impl Into<String>) -> Self {
        Self::new(name, SemanticType::Raw)
    }

    /// Expose this column under a different attribute name.
    #[must_use]
    pub fn attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = attribute.into();
        self
    }

    /// Parse and format dates with an explicit `strftime` pattern.
    #[must_use]
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Read-side coercion of a driver value.
    pub fn coerce(&self, value: Value) -> Value {
        self.semantic_type.coerce(value, self.format.as_deref())
    }

    /// Write-side normalization of an attribute value.
    pub fn serialize(&self, value: Value) -> Value {
        self.semantic_type.serialize(value, self.format.as_deref())
    }
}
