//! Association metadata.
//!
//! An association describes how to find related entities without a SQL join:
//! the loader collects the foreign-key values of the fetched rows and issues
//! one secondary query on the target filtered to `reference IN (ids)`.

use serde::{Deserialize, Serialize};
use tabula_query::Clause;

/// Cardinality of an association.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationKind {
    /// At most one related entity per key (also covers belongs-to).
    #[default]
    HasOne,
    /// Every related entity sharing the key.
    HasMany,
}

/// Metadata about an association between two entity types.
#[derive(Debug, Clone, PartialEq)]
pub struct Association {
    pub kind: AssociationKind,
    /// Attribute the related data is attached under.
    pub attribute: String,
    /// Registered type name of the related entity.
    pub target: String,
    /// Attribute on the source entity holding the key (scalar or array).
    pub foreign_key: String,
    /// Attribute on the target entity the key is matched against.
    pub reference: String,
    /// Additional filter applied to the secondary query.
    pub extra_filter: Option<Clause>,
}

impl Association {
    /// Build an association with the default keys: `{attribute}_id` on the
    /// source, `id` on the target.
    pub fn new(
        kind: AssociationKind,
        attribute: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        let attribute = attribute.into();
        Self {
            kind,
            foreign_key: format!("{attribute}_id"),
            attribute,
            target: target.into(),
            reference: "id".to_string(),
            extra_filter: None,
        }
    }

    /// `Post.author -> User`, keyed by `author_id`.
    pub fn has_one(attribute: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(AssociationKind::HasOne, attribute, target)
    }

    /// `Post.comments -> [Comment]`.
    ///
    /// The defaults rarely fit a has-many; usually chain
    /// `.foreign_key("id").reference("post_id")`.
    pub fn has_many(attribute: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(AssociationKind::HasMany, attribute, target)
    }

    #[must_use]
    pub fn foreign_key(mut self, foreign_key: impl Into<String>) -> Self {
        self.foreign_key = foreign_key.into();
        self
    }

    #[must_use]
    pub fn reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = reference.into();
        self
    }

    #[must_use]
    pub fn filter(mut self, clause: impl Into<Clause>) -> Self {
        self.extra_filter = Some(clause.into());
        self
    }

    pub fn is_many(&self) -> bool {
        self.kind == AssociationKind::HasMany
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabula_core::row;

    #[test]
    fn test_default_keys() {
        let assoc = Association::has_one("author", "User");
        assert_eq!(assoc.foreign_key, "author_id");
        assert_eq!(assoc.reference, "id");
        assert!(!assoc.is_many());
    }

    #[test]
    fn test_overrides() {
        let assoc = Association::has_many("comments", "Comment")
            .foreign_key("id")
            .reference("post_id")
            .filter(row! { "hidden" => false });
        assert!(assoc.is_many());
        assert_eq!(assoc.reference, "post_id");
        assert!(matches!(assoc.extra_filter, Some(Clause::Equals(_))));
    }
}
