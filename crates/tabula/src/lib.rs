//! Tabula: a schema-driven ORM core.
//!
//! `tabula` is the **facade crate** for the workspace. It wires schemas from
//! `tabula-schema` and SQL rendering from `tabula-query` into an execution
//! pipeline that runs against any `tabula_core::Connection`.
//!
//! # Role In The Architecture
//!
//! - **Model handles**: one [`Model`] per registered type, the entry point for
//!   queries and convenience wrappers (`find`, `create`, `list`, ...).
//! - **Query builder**: a fluent [`QueryBuilder`] owning one query spec;
//!   terminal methods apply scopes, paginate, render, execute, materialize and
//!   eager-load.
//! - **Entities**: rows materialized as [`Entity`] values tagged with their
//!   concrete type, resolved by discriminator for single-table inheritance.
//! - **Configuration**: [`OrmConfig`] selects the dialect, pagination window
//!   and timestamp behaviour.
//!
//! # Example
//!
//! ```ignore
//! use tabula::prelude::*;
//!
//! let registry = Registry::builder()
//!     .register(
//!         Schema::builder("User", "users")
//!             .column(Column::integer("id"))
//!             .column(Column::string("name"))
//!             .build()?,
//!     )
//!     .build()?;
//! let orm = Orm::new(registry, OrmConfig::default());
//! let users = orm.model("User")?;
//!
//! let ada = users.find(&cx, &conn, 1).await;
//! ```

pub mod builder;
pub mod config;
mod eager;
pub mod entity;
mod exec;
pub mod model;
pub mod orm;
pub mod pagination;

pub use builder::QueryBuilder;
pub use config::{OrmConfig, PaginationConfig};
pub use entity::{Entity, Related};
pub use model::Model;
pub use orm::Orm;
pub use pagination::{Page, PageInfo, PageLink};

pub use tabula_core::{
    Connection, Cx, DriverError, Error, InsertResult, Outcome, Result, Row, SemanticType, Value,
    row, try_outcome,
};
pub use tabula_query::{Clause, Dialect, Includes, QuerySpec, Statement, Verb, render, render_raw};
pub use tabula_schema::{
    Association, AssociationKind, Column, EntityHooks, Inheritance, Registry, RegistryBuilder,
    Schema, SchemaBuilder, Scope,
};

/// Everything needed to define schemas and run queries.
pub mod prelude {
    pub use crate::{
        Association, Clause, Column, Connection, Cx, Dialect, Entity, EntityHooks, Error,
        Includes, InsertResult, Model, Orm, OrmConfig, Outcome, Page, PageInfo, QueryBuilder,
        QuerySpec, Registry, Related, Row, Schema, SemanticType, Value, row, try_outcome,
    };
}
