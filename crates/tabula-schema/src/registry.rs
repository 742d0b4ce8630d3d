//! The type registry: every schema and lifecycle hook, keyed by type name.
//!
//! Entities never carry behaviour of their own. A materialized row is a bag
//! of attributes plus a type tag, and anything that depends on the concrete
//! type (its schema, its hooks) is found here by that tag.

use std::collections::HashMap;
use std::sync::Arc;

use tabula_core::{Error, Result, Row};

use crate::schema::Schema;

/// Per-type lifecycle callbacks.
///
/// Both hooks receive attribute values (not column values) and may add to or
/// rewrite them before they are written.
pub trait EntityHooks: Send + Sync {
    /// Called by `create` after timestamps and the discriminator are set.
    fn before_create(&self, values: &mut Row) {
        let _ = values;
    }

    /// Called by every update after `updated_at` is set.
    fn before_update(&self, values: &mut Row) {
        let _ = values;
    }
}

/// Read-only registry of every entity type.
#[derive(Clone, Default)]
pub struct Registry {
    schemas: HashMap<String, Arc<Schema>>,
    hooks: HashMap<String, Arc<dyn EntityHooks>>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<&str> = self.schemas.keys().map(String::as_str).collect();
        types.sort_unstable();
        let mut hooked: Vec<&str> = self.hooks.keys().map(String::as_str).collect();
        hooked.sort_unstable();
        f.debug_struct("Registry")
            .field("types", &types)
            .field("hooks", &hooked)
            .finish()
    }
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Schema registered under `type_name`.
    pub fn schema(&self, type_name: &str) -> Result<&Arc<Schema>> {
        self.schemas
            .get(type_name)
            .ok_or_else(|| Error::UnknownModel(type_name.to_string()))
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.schemas.contains_key(type_name)
    }

    pub fn hooks(&self, type_name: &str) -> Option<&dyn EntityHooks> {
        self.hooks.get(type_name).map(|h| &**h)
    }

    /// Registered type names, sorted.
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.schemas.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Collects schema definitions and validates them together.
#[derive(Default)]
pub struct RegistryBuilder {
    schemas: Vec<Schema>,
    subclasses: Vec<(String, String)>,
    hooks: HashMap<String, Arc<dyn EntityHooks>>,
}

impl RegistryBuilder {
    #[must_use]
    pub fn register(mut self, schema: Schema) -> Self {
        self.schemas.push(schema);
        self
    }

    /// Register `type_name` as a single-table-inheritance subclass of
    /// `parent`. The parent must map a discriminator value to `type_name`.
    #[must_use]
    pub fn register_subclass(
        mut self,
        type_name: impl Into<String>,
        parent: impl Into<String>,
    ) -> Self {
        self.subclasses.push((type_name.into(), parent.into()));
        self
    }

    #[must_use]
    pub fn hooks(mut self, type_name: impl Into<String>, hooks: impl EntityHooks + 'static) -> Self {
        self.hooks.insert(type_name.into(), Arc::new(hooks));
        self
    }

    /// Validate cross-schema references and freeze the registry.
    pub fn build(self) -> Result<Registry> {
        let mut schemas: HashMap<String, Arc<Schema>> = HashMap::new();
        for schema in self.schemas {
            let name = schema.type_name().to_string();
            if schemas.insert(name.clone(), Arc::new(schema)).is_some() {
                return Err(Error::schema(format!("type '{name}' is registered twice")));
            }
        }

        for (type_name, parent) in &self.subclasses {
            let base = schemas.get(parent).ok_or_else(|| {
                Error::schema(format!(
                    "subclass '{type_name}' names unknown parent type '{parent}'"
                ))
            })?;
            let key = base
                .inheritance()
                .and_then(|inh| inh.key_for(type_name))
                .ok_or_else(|| {
                    Error::schema(format!(
                        "'{parent}' has no discriminator value for subclass '{type_name}'"
                    ))
                })?;
            let derived = base.derive_subclass(type_name, key);
            if schemas.insert(type_name.clone(), Arc::new(derived)).is_some() {
                return Err(Error::schema(format!(
                    "type '{type_name}' is registered twice"
                )));
            }
        }

        for schema in schemas.values() {
            for assoc in schema.associations() {
                if !schemas.contains_key(&assoc.target) {
                    return Err(Error::schema(format!(
                        "association '{}' on '{}' targets unknown type '{}'",
                        assoc.attribute,
                        schema.type_name(),
                        assoc.target
                    )));
                }
            }
            if let Some(inheritance) = schema.inheritance() {
                for (value, ty) in &inheritance.subclasses {
                    if !schemas.contains_key(ty) {
                        tracing::warn!(
                            model = schema.type_name(),
                            discriminator = %value,
                            subclass = %ty,
                            "subclass is mapped but not registered; rows will materialize as the base type"
                        );
                    }
                }
            }
        }

        for type_name in self.hooks.keys() {
            if !schemas.contains_key(type_name) {
                return Err(Error::UnknownModel(type_name.clone()));
            }
        }

        tracing::info!(types = schemas.len(), "registry built");

        Ok(Registry {
            schemas,
            hooks: self.hooks,
        })
    }
}
