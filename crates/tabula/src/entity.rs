//! Materialized entities.
//!
//! An [`Entity`] is an attribute bag tagged with its concrete type. It carries
//! no behaviour of its own: the tag resolves, through the registry, to the
//! schema and hooks of that type, and every database operation an entity
//! offers builds a fresh unscoped query pinned to its primary key.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use tabula_core::{Connection, Cx, Error, Outcome, Row, Value, try_outcome};
use tabula_query::Includes;
use tabula_schema::{CREATED_AT, UPDATED_AT};

use crate::model::Model;

/// Related data attached by eager loading.
#[derive(Debug, Clone, PartialEq)]
pub enum Related {
    /// A has-one association: the match, or `None`.
    One(Option<Box<Entity>>),
    /// A has-many association, or any association keyed by an array.
    Many(Vec<Entity>),
}

impl Related {
    /// Default for an association with no matches.
    pub(crate) fn empty(many: bool) -> Self {
        if many {
            Related::Many(Vec::new())
        } else {
            Related::One(None)
        }
    }

    pub fn as_one(&self) -> Option<&Entity> {
        match self {
            Related::One(one) => one.as_deref(),
            Related::Many(_) => None,
        }
    }

    pub fn as_many(&self) -> &[Entity] {
        match self {
            Related::Many(many) => many,
            Related::One(_) => &[],
        }
    }
}

impl Serialize for Related {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Related::One(None) => serializer.serialize_none(),
            Related::One(Some(entity)) => entity.serialize(serializer),
            Related::Many(entities) => entities.serialize(serializer),
        }
    }
}

/// One materialized row.
#[derive(Clone)]
pub struct Entity {
    model: Model,
    attributes: Row,
    related: Vec<(String, Related)>,
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("type_name", &self.type_name())
            .field("attributes", &self.attributes)
            .field("related", &self.related)
            .finish()
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.model == other.model
            && self.attributes == other.attributes
            && self.related == other.related
    }
}

impl Serialize for Entity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.attributes.len() + self.related.len()))?;
        for (name, value) in self.attributes.iter() {
            map.serialize_entry(name, value)?;
        }
        for (name, related) in &self.related {
            map.serialize_entry(name, related)?;
        }
        map.end()
    }
}

impl Entity {
    pub(crate) fn new(model: Model, attributes: Row) -> Self {
        Self {
            model,
            attributes,
            related: Vec::new(),
        }
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    /// The concrete type tag.
    pub fn type_name(&self) -> &str {
        self.model.type_name()
    }

    /// Whether this entity materialized as `type_name`.
    pub fn is(&self, type_name: &str) -> bool {
        self.type_name() == type_name
    }

    pub fn attributes(&self) -> &Row {
        &self.attributes
    }

    pub fn into_attributes(self) -> Row {
        self.attributes
    }

    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.attributes.get(attribute)
    }

    /// Set an attribute locally. Nothing is written until `update`.
    pub fn set(&mut self, attribute: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(attribute, value);
    }

    pub fn related(&self, attribute: &str) -> Option<&Related> {
        self.related
            .iter()
            .find(|(name, _)| name == attribute)
            .map(|(_, r)| r)
    }

    /// The entity attached by a has-one include, if loaded and present.
    pub fn one(&self, attribute: &str) -> Option<&Entity> {
        self.related(attribute).and_then(Related::as_one)
    }

    /// The entities attached by a has-many include (empty if not loaded).
    pub fn many(&self, attribute: &str) -> &[Entity] {
        self.related(attribute).map_or(&[][..], Related::as_many)
    }

    pub(crate) fn attach(&mut self, attribute: &str, related: Related) {
        match self.related.iter_mut().find(|(name, _)| name == attribute) {
            Some(slot) => slot.1 = related,
            None => self.related.push((attribute.to_string(), related)),
        }
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.get(CREATED_AT).and_then(Value::as_timestamp)
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.get(UPDATED_AT).and_then(Value::as_timestamp)
    }

    /// Primary-key attributes and their current values.
    pub fn primary_key_value(&self) -> Row {
        self.model
            .schema()
            .primary_key()
            .iter()
            .map(|attr| {
                let value = self.attributes.get(attr).cloned().unwrap_or_default();
                (attr.clone(), value)
            })
            .collect()
    }

    /// Fetch a fresh copy of this entity, optionally with eager loads.
    ///
    /// Returns `None` if the row no longer exists.
    #[tracing::instrument(level = "debug", skip(self, cx, conn, includes), fields(model = %self.type_name()))]
    pub async fn reload<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        includes: impl Into<Includes>,
    ) -> Outcome<Option<Entity>, Error> {
        let query = match self.model.unscoped().includes(includes) {
            Ok(query) => query,
            Err(e) => return Outcome::Err(e),
        };
        query.find_where(cx, conn, self.primary_key_value()).await
    }

    /// Write `values` to this entity's row and apply them locally.
    ///
    /// Primary-key attributes are immutable and are dropped from `values`.
    #[tracing::instrument(level = "debug", skip(self, cx, conn, values), fields(model = %self.type_name()))]
    pub async fn update<C: Connection>(
        &mut self,
        cx: &Cx,
        conn: &C,
        mut values: Row,
    ) -> Outcome<u64, Error> {
        for attr in self.model.schema().primary_key() {
            if values.remove(attr).is_some() {
                tracing::warn!(
                    model = %self.type_name(),
                    attribute = %attr,
                    "ignoring update of primary key attribute"
                );
            }
        }

        let (affected, written) = try_outcome!(
            self.model
                .unscoped()
                .where_eq(self.primary_key_value())
                .update_returning_values(cx, conn, values)
                .await
        );

        let schema = self.model.schema();
        for (attr, value) in written {
            if schema.has_attribute(&attr) {
                self.attributes.insert(attr, value);
            }
        }
        Outcome::Ok(affected)
    }

    /// Delete this entity's row.
    #[tracing::instrument(level = "debug", skip(self, cx, conn), fields(model = %self.type_name()))]
    pub async fn destroy<C: Connection>(&self, cx: &Cx, conn: &C) -> Outcome<u64, Error> {
        self.model
            .unscoped()
            .where_eq(self.primary_key_value())
            .delete(cx, conn)
            .await
    }
}

/// Coerce driver rows and materialize them, dispatching on the discriminator.
///
/// Rows whose discriminator is unmapped, or maps to a type that was never
/// registered, materialize as `model`'s own type.
pub(crate) fn materialize(model: &Model, rows: Vec<Row>) -> Vec<Entity> {
    let schema = model.schema();
    rows.into_iter()
        .map(|row| {
            let attributes = schema.to_attributes(row);
            let concrete = match schema.inheritance() {
                Some(inheritance) => {
                    let discriminator = attributes
                        .get(&inheritance.attribute)
                        .cloned()
                        .unwrap_or_default();
                    let type_name = schema.resolve_concrete_type(&discriminator);
                    match model.sibling(type_name) {
                        Ok(concrete) => concrete,
                        Err(_) => {
                            tracing::trace!(
                                model = %model.type_name(),
                                subclass = %type_name,
                                "subclass not registered, using base type"
                            );
                            model.clone()
                        }
                    }
                }
                None => model.clone(),
            };
            Entity::new(concrete, attributes)
        })
        .collect()
}
