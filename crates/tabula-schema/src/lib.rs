//! Schema metadata for tabula.
//!
//! `tabula-schema` is the **metadata layer**. Everything here is built once at
//! startup and is read-only afterwards.
//!
//! # Role In The Architecture
//!
//! - **Schemas**: table name, columns with semantic types and attribute names,
//!   primary key, named scopes, associations, inheritance mapping.
//! - **Registry**: an arena of schemas and lifecycle hooks keyed by type name.
//!   Single-table-inheritance subclasses are registered against their parent
//!   and resolved by discriminator value.
//! - **Validation**: malformed definitions fail with `Error::Schema` when they
//!   are registered, never at query time.

pub mod association;
pub mod column;
pub mod registry;
pub mod schema;
pub mod validate;

pub use association::{Association, AssociationKind};
pub use column::Column;
pub use registry::{EntityHooks, Registry, RegistryBuilder};
pub use schema::{CREATED_AT, Inheritance, Schema, SchemaBuilder, Scope, UPDATED_AT};
pub use validate::is_valid_identifier;
