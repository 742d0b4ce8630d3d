//! Entity schemas and their builder.
//!
//! A [`Schema`] is built once per entity type and is read-only afterwards. It
//! is shared (behind an `Arc`) by every query against that type, so nothing
//! in the execution pipeline ever mutates it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tabula_core::{Error, Result, Row, Value};
use tabula_query::QuerySpec;

use crate::association::Association;
use crate::column::Column;
use crate::validate::check_identifier;

/// A named transformation over a query, applied by name at execution time.
pub type Scope = Arc<dyn Fn(&mut QuerySpec) + Send + Sync>;

/// Attribute names stamped by `create` and `update`.
pub const CREATED_AT: &str = "created_at";
pub const UPDATED_AT: &str = "updated_at";

/// Single-table-inheritance configuration on a base schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inheritance {
    /// Discriminator attribute.
    pub attribute: String,
    /// Discriminator value to registered type name, in declaration order.
    pub subclasses: Vec<(String, String)>,
}

impl Inheritance {
    /// Type registered for a discriminator value, if any.
    pub fn type_for(&self, discriminator: &Value) -> Option<&str> {
        let key = discriminator.lookup_key()?;
        self.subclasses
            .iter()
            .find(|(value, _)| *value == key)
            .map(|(_, ty)| ty.as_str())
    }

    /// Discriminator value registered for a type name, if any.
    pub fn key_for(&self, type_name: &str) -> Option<&str> {
        self.subclasses
            .iter()
            .find(|(_, ty)| ty == type_name)
            .map(|(value, _)| value.as_str())
    }
}

/// Storage mapping for one entity type.
#[derive(Clone)]
pub struct Schema {
    type_name: String,
    table: String,
    columns: Vec<Column>,
    primary_key: Vec<String>,
    scopes: HashMap<String, Scope>,
    associations: Vec<Association>,
    inheritance: Option<Inheritance>,
    /// Set when this schema describes a subclass: its discriminator value.
    discriminator_key: Option<String>,
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut scopes: Vec<&str> = self.scopes.keys().map(String::as_str).collect();
        scopes.sort_unstable();
        f.debug_struct("Schema")
            .field("type_name", &self.type_name)
            .field("table", &self.table)
            .field("columns", &self.columns)
            .field("primary_key", &self.primary_key)
            .field("scopes", &scopes)
            .field("associations", &self.associations)
            .field("inheritance", &self.inheritance)
            .field("discriminator_key", &self.discriminator_key)
            .finish()
    }
}

impl Schema {
    /// Start defining the schema of `type_name`, stored in `table`.
    pub fn builder(type_name: impl Into<String>, table: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(type_name, table)
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Primary-key attribute names, in declaration order.
    pub fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    pub fn associations(&self) -> &[Association] {
        &self.associations
    }

    pub fn association(&self, attribute: &str) -> Option<&Association> {
        self.associations.iter().find(|a| a.attribute == attribute)
    }

    pub fn scope(&self, name: &str) -> Option<&Scope> {
        self.scopes.get(name)
    }

    pub fn inheritance(&self) -> Option<&Inheritance> {
        self.inheritance.as_ref()
    }

    /// `(attribute, value)` pinning rows to this subclass, if it is one.
    pub fn discriminator(&self) -> Option<(&str, &str)> {
        let inheritance = self.inheritance.as_ref()?;
        let key = self.discriminator_key.as_deref()?;
        Some((inheritance.attribute.as_str(), key))
    }

    /// Column for an attribute name. Unknown attributes yield `None`.
    pub fn column_for_attribute(&self, attribute: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.attribute == attribute)
    }

    pub fn column_by_name(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn attribute_for_column(&self, name: &str) -> Option<&str> {
        self.column_by_name(name).map(|c| c.attribute.as_str())
    }

    /// Column name for an attribute, or the attribute itself when unmapped.
    pub fn column_name<'a>(&'a self, attribute: &'a str) -> &'a str {
        self.column_for_attribute(attribute)
            .map_or(attribute, |c| c.name.as_str())
    }

    /// Attribute name for something that may be an attribute or a column name.
    pub fn resolve_attribute<'a>(&'a self, name: &'a str) -> &'a str {
        if self.has_attribute(name) {
            return name;
        }
        self.attribute_for_column(name).unwrap_or(name)
    }

    pub fn has_attribute(&self, attribute: &str) -> bool {
        self.column_for_attribute(attribute).is_some()
    }

    /// Whether both timestamp attributes are declared.
    pub fn has_timestamps(&self) -> bool {
        self.has_attribute(CREATED_AT) && self.has_attribute(UPDATED_AT)
    }

    /// Type to materialize a row as, given its discriminator value.
    ///
    /// Unmapped values (and schemas without inheritance) fall back to this
    /// schema's own type.
    pub fn resolve_concrete_type(&self, discriminator: &Value) -> &str {
        self.inheritance
            .as_ref()
            .and_then(|inh| inh.type_for(discriminator))
            .unwrap_or(&self.type_name)
    }

    /// Coerce every known column of a driver row in place.
    pub fn coerce(&self, row: &mut Row) {
        for column in &self.columns {
            if let Some(slot) = row.get_mut(&column.name) {
                let raw = std::mem::take(slot);
                *slot = column.coerce(raw);
            }
        }
    }

    /// Coerce a driver row and rename its columns to attribute names.
    ///
    /// Columns the schema does not know (computed projections, counts) are
    /// kept under their own name.
    pub fn to_attributes(&self, mut row: Row) -> Row {
        self.coerce(&mut row);
        row.into_iter()
            .map(|(name, value)| match self.attribute_for_column(&name) {
                Some(attr) => (attr.to_string(), value),
                None => (name, value),
            })
            .collect()
    }

    /// Map attribute values to column values for INSERT/UPDATE.
    ///
    /// Unknown attributes are dropped so plain objects with extra fields can be
    /// written directly.
    pub fn to_write_values(&self, attributes: &Row) -> Row {
        let mut out = Row::with_capacity(attributes.len());
        for (attr, value) in attributes.iter() {
            match self.column_for_attribute(attr) {
                Some(column) => {
                    out.insert(column.name.clone(), column.serialize(value.clone()));
                }
                None => tracing::trace!(
                    model = %self.type_name,
                    attribute = attr,
                    "ignoring unknown attribute on write"
                ),
            }
        }
        out
    }

    /// Map an equality filter from attribute names to column names.
    ///
    /// Unknown keys pass through untouched. Array elements are normalized one
    /// by one.
    pub fn to_filter(&self, conditions: Row) -> Row {
        conditions
            .into_iter()
            .map(|(key, value)| match self.column_for_attribute(&key) {
                Some(column) => {
                    let value = match value {
                        Value::Array(items) => {
                            Value::Array(items.into_iter().map(|v| column.serialize(v)).collect())
                        }
                        other => column.serialize(other),
                    };
                    (column.name.clone(), value)
                }
                None => (key, value),
            })
            .collect()
    }

    /// Copy of this schema registered as the subclass `type_name` with the
    /// discriminator value `key`.
    pub(crate) fn derive_subclass(&self, type_name: &str, key: &str) -> Schema {
        let mut schema = self.clone();
        schema.type_name = type_name.to_string();
        schema.discriminator_key = Some(key.to_string());
        schema
    }
}

/// Builder for [`Schema`]. Validation happens in [`build`](Self::build).
pub struct SchemaBuilder {
    type_name: String,
    table: String,
    columns: Vec<Column>,
    primary_key: Option<Vec<String>>,
    scopes: HashMap<String, Scope>,
    associations: Vec<Association>,
    discriminator: Option<String>,
    subclasses: Vec<(String, String)>,
}

impl SchemaBuilder {
    pub fn new(type_name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            table: table.into(),
            columns: Vec::new(),
            primary_key: None,
            scopes: HashMap::new(),
            associations: Vec::new(),
            discriminator: None,
            subclasses: Vec::new(),
        }
    }

    #[must_use]
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    #[must_use]
    pub fn columns(mut self, columns: impl IntoIterator<Item = Column>) -> Self {
        self.columns.extend(columns);
        self
    }

    /// Primary-key attributes (or column names). Defaults to `["id"]`.
    #[must_use]
    pub fn primary_key<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.primary_key = Some(names.iter().map(|n| n.as_ref().to_string()).collect());
        self
    }

    /// Declare `created_at` and `updated_at` date columns.
    #[must_use]
    pub fn timestamps(self) -> Self {
        self.column(Column::date(CREATED_AT))
            .column(Column::date(UPDATED_AT))
    }

    #[must_use]
    pub fn association(mut self, association: Association) -> Self {
        self.associations.push(association);
        self
    }

    /// Register a named scope. A later registration under the same name wins.
    #[must_use]
    pub fn scope<F>(mut self, name: impl Into<String>, scope: F) -> Self
    where
        F: Fn(&mut QuerySpec) + Send + Sync + 'static,
    {
        self.scopes.insert(name.into(), Arc::new(scope));
        self
    }

    /// Register the scope every query starts with.
    #[must_use]
    pub fn default_scope<F>(self, scope: F) -> Self
    where
        F: Fn(&mut QuerySpec) + Send + Sync + 'static,
    {
        self.scope(QuerySpec::DEFAULT_SCOPE, scope)
    }

    /// Use `attribute` as the single-table-inheritance discriminator.
    #[must_use]
    pub fn discriminator(mut self, attribute: impl Into<String>) -> Self {
        self.discriminator = Some(attribute.into());
        self
    }

    /// Map a discriminator value to a registered subclass type name.
    #[must_use]
    pub fn subclass(mut self, value: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.subclasses.push((value.into(), type_name.into()));
        self
    }

    /// Validate and freeze the schema.
    pub fn build(self) -> Result<Schema> {
        let type_name = self.type_name;
        check_identifier("table", &self.table)?;

        for (i, column) in self.columns.iter().enumerate() {
            check_identifier("column", &column.name)?;
            check_identifier("attribute", &column.attribute)?;
            let earlier = &self.columns[..i];
            if earlier.iter().any(|c| c.name == column.name) {
                return Err(Error::schema(format!(
                    "duplicate column '{}' on '{type_name}'",
                    column.name
                )));
            }
            if earlier.iter().any(|c| c.attribute == column.attribute) {
                return Err(Error::schema(format!(
                    "duplicate attribute '{}' on '{type_name}'",
                    column.attribute
                )));
            }
        }

        let find = |name: &str| {
            self.columns
                .iter()
                .find(|c| c.attribute == name)
                .or_else(|| self.columns.iter().find(|c| c.name == name))
        };

        let requested = self.primary_key.unwrap_or_else(|| vec!["id".to_string()]);
        if requested.is_empty() {
            return Err(Error::schema(format!(
                "'{type_name}' declares an empty primary key"
            )));
        }
        let mut primary_key = Vec::with_capacity(requested.len());
        for name in &requested {
            match find(name) {
                Some(column) if !primary_key.contains(&column.attribute) => {
                    primary_key.push(column.attribute.clone());
                }
                Some(_) => {}
                None => {
                    return Err(Error::schema(format!(
                        "primary key column '{name}' is not declared on '{type_name}'"
                    )));
                }
            }
        }

        for (i, assoc) in self.associations.iter().enumerate() {
            check_identifier("association", &assoc.attribute)?;
            check_identifier("foreign key", &assoc.foreign_key)?;
            check_identifier("reference", &assoc.reference)?;
            if self.associations[..i]
                .iter()
                .any(|a| a.attribute == assoc.attribute)
            {
                return Err(Error::schema(format!(
                    "association '{}' is declared twice on '{type_name}'",
                    assoc.attribute
                )));
            }
            if self.columns.iter().any(|c| c.attribute == assoc.attribute) {
                return Err(Error::schema(format!(
                    "association '{}' shadows a column on '{type_name}'",
                    assoc.attribute
                )));
            }
        }

        let inheritance = match (self.discriminator, self.subclasses) {
            (None, subclasses) if subclasses.is_empty() => None,
            (None, _) => {
                return Err(Error::schema(format!(
                    "'{type_name}' maps subclasses without a discriminator"
                )));
            }
            (Some(name), subclasses) => {
                let attribute = match find(&name) {
                    Some(column) => column.attribute.clone(),
                    None => {
                        return Err(Error::schema(format!(
                            "discriminator '{name}' is not declared on '{type_name}'"
                        )));
                    }
                };
                Some(Inheritance {
                    attribute,
                    subclasses,
                })
            }
        };

        tracing::debug!(
            model = %type_name,
            table = %self.table,
            columns = self.columns.len(),
            associations = self.associations.len(),
            "schema defined"
        );

        Ok(Schema {
            type_name,
            table: self.table,
            columns: self.columns,
            primary_key,
            scopes: self.scopes,
            associations: self.associations,
            inheritance,
            discriminator_key: None,
        })
    }
}
