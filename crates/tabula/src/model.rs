//! Per-type model handles and their convenience wrappers.
//!
//! A [`Model`] is the entry point for one registered entity type. Every query
//! method starts a fresh [`QueryBuilder`]; every async method is shorthand for
//! building one and calling a terminal operation on it.

use std::fmt;
use std::sync::Arc;

use tabula_core::{Connection, Cx, Error, Outcome, Result, Row, Value};
use tabula_query::{Clause, Dialect, Includes};
use tabula_schema::{EntityHooks, Schema};

use crate::builder::QueryBuilder;
use crate::config::OrmConfig;
use crate::entity::Entity;
use crate::orm::Orm;
use crate::pagination::Page;

/// Handle for one registered entity type.
///
/// Cheap to clone: it is two `Arc`s.
#[derive(Clone)]
pub struct Model {
    orm: Arc<Orm>,
    schema: Arc<Schema>,
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("type_name", &self.schema.type_name())
            .field("table", &self.schema.table())
            .finish()
    }
}

impl PartialEq for Model {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.orm, &other.orm) && self.schema.type_name() == other.schema.type_name()
    }
}

impl Model {
    pub(crate) fn new(orm: Arc<Orm>, schema: Arc<Schema>) -> Self {
        Self { orm, schema }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn type_name(&self) -> &str {
        self.schema.type_name()
    }

    pub fn orm(&self) -> &Arc<Orm> {
        &self.orm
    }

    pub fn config(&self) -> &OrmConfig {
        self.orm.config()
    }

    pub fn dialect(&self) -> Dialect {
        self.orm.dialect()
    }

    /// Handle for another registered type sharing this context.
    pub fn sibling(&self, type_name: &str) -> Result<Model> {
        if type_name == self.type_name() {
            return Ok(self.clone());
        }
        self.orm.model(type_name)
    }

    pub(crate) fn hooks(&self) -> Option<&dyn EntityHooks> {
        self.orm.registry().hooks(self.type_name())
    }

    // ==================== Builder entry points ====================

    /// A fresh builder over this type, with the default scope active.
    pub fn query(&self) -> QueryBuilder {
        QueryBuilder::new(self.clone())
    }

    pub fn where_eq(&self, conditions: Row) -> QueryBuilder {
        self.query().where_eq(conditions)
    }

    pub fn where_raw(&self, sql: impl Into<String>, params: Vec<Value>) -> QueryBuilder {
        self.query().where_raw(sql, params)
    }

    pub fn filter(&self, clause: impl Into<Clause>) -> QueryBuilder {
        self.query().filter(clause)
    }

    pub fn includes(&self, includes: impl Into<Includes>) -> Result<QueryBuilder> {
        self.query().includes(includes)
    }

    pub fn scope(&self, name: impl Into<String>) -> QueryBuilder {
        self.query().scope(name)
    }

    pub fn unscoped(&self) -> QueryBuilder {
        self.query().unscoped()
    }

    pub fn select(&self, projection: impl Into<String>) -> QueryBuilder {
        self.query().select(projection)
    }

    pub fn order(&self, expr: impl Into<String>) -> QueryBuilder {
        self.query().order(expr)
    }

    pub fn limit(&self, limit: u64) -> QueryBuilder {
        self.query().limit(limit)
    }

    pub fn page(&self, page: u64, page_size: u64) -> QueryBuilder {
        self.query().page(page, page_size)
    }

    pub fn distinct<S: AsRef<str>>(&self, attributes: &[S]) -> QueryBuilder {
        self.query().distinct(attributes)
    }

    pub fn group<S: AsRef<str>>(&self, attributes: &[S]) -> QueryBuilder {
        self.query().group(attributes)
    }

    // ==================== Terminal wrappers ====================

    /// Find by the first primary-key attribute.
    pub async fn find<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        id: impl Into<Value>,
    ) -> Outcome<Option<Entity>, Error> {
        self.query().find(cx, conn, id).await
    }

    /// Find the first entity matching an equality map.
    pub async fn find_where<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        conditions: Row,
    ) -> Outcome<Option<Entity>, Error> {
        self.query().find_where(cx, conn, conditions).await
    }

    pub async fn first<C: Connection>(&self, cx: &Cx, conn: &C) -> Outcome<Option<Entity>, Error> {
        self.query().first(cx, conn).await
    }

    pub async fn last<C: Connection>(&self, cx: &Cx, conn: &C) -> Outcome<Option<Entity>, Error> {
        self.query().last(cx, conn).await
    }

    pub async fn list<C: Connection>(&self, cx: &Cx, conn: &C) -> Outcome<Vec<Entity>, Error> {
        self.query().list(cx, conn).await
    }

    pub async fn all<C: Connection>(&self, cx: &Cx, conn: &C) -> Outcome<Vec<Entity>, Error> {
        self.query().all(cx, conn).await
    }

    pub async fn paginate<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        page: u64,
        page_size: u64,
    ) -> Outcome<Page, Error> {
        self.query().page(page, page_size).paginate(cx, conn).await
    }

    pub async fn count<C: Connection>(&self, cx: &Cx, conn: &C) -> Outcome<u64, Error> {
        self.query().count(cx, conn).await
    }

    /// Insert `values` and return the stored entity.
    pub async fn create<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        values: Row,
    ) -> Outcome<Option<Entity>, Error> {
        self.query().create(cx, conn, values).await
    }

    /// Update every row of the table, ignoring scopes.
    pub async fn update_all<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        values: Row,
    ) -> Outcome<u64, Error> {
        self.unscoped().update(cx, conn, values).await
    }

    /// Delete the row whose first primary-key attribute is `id`, ignoring scopes.
    pub async fn destroy<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        id: impl Into<Value>,
    ) -> Outcome<u64, Error> {
        let Some(pk) = self.schema.primary_key().first() else {
            return Outcome::Err(Error::schema(format!(
                "'{}' has no primary key",
                self.type_name()
            )));
        };
        let mut key = Row::new();
        key.insert(pk.clone(), id);
        self.unscoped().where_eq(key).delete(cx, conn).await
    }

    /// Delete every row of the table, ignoring scopes.
    pub async fn destroy_all<C: Connection>(&self, cx: &Cx, conn: &C) -> Outcome<u64, Error> {
        self.unscoped().delete(cx, conn).await
    }
}
