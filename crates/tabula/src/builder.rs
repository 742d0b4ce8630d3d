//! The fluent query builder and its execution pipeline.
//!
//! A [`QueryBuilder`] owns one [`QuerySpec`] for one logical query. Chained
//! methods accumulate into it; a terminal method consumes the builder and runs
//! the pipeline:
//!
//! 1. apply active scopes in order, then map attribute names to columns;
//! 2. for `first`/`last` without an explicit order, order by the primary key;
//! 3. for paginated queries, count matching rows, clamp the page and derive
//!    offset/limit;
//! 4. render and execute;
//! 5. for inserts, re-query the stored row;
//! 6. for selects, coerce and materialize rows, then resolve eager loads one
//!    include at a time;
//! 7. shape the result.
//!
//! Driver errors end the pipeline immediately: no eager loading or
//! materialization happens after a failed statement.

use chrono::Utc;
use tabula_core::{
    Connection, Cx, Error, InsertResult, Outcome, Result, Row, SemanticType, Value, try_outcome,
};
use tabula_query::{Clause, Includes, QuerySpec, Verb, render};
use tabula_schema::{CREATED_AT, Schema, UPDATED_AT};

use crate::eager;
use crate::entity::{self, Entity};
use crate::exec;
use crate::model::Model;
use crate::pagination::{Page, PageInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Take {
    All,
    First,
    Last,
}

/// Fluent builder for one query against one entity type.
///
/// # Example
///
/// ```ignore
/// let page = posts
///     .where_eq(row! { "status" => "active" })
///     .order("name ASC")
///     .page(2, 10)
///     .includes("author")?
///     .paginate(&cx, &conn)
///     .await;
/// ```
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    model: Model,
    spec: QuerySpec,
}

impl QueryBuilder {
    /// Start a query over `model`.
    ///
    /// Subclass models are pinned to their discriminator value here, as a
    /// plain filter rather than a scope, so `unscoped()` cannot remove it.
    pub fn new(model: Model) -> Self {
        let mut spec = QuerySpec::new(model.schema().table());
        if let Some((attribute, key)) = model.schema().discriminator() {
            let mut pin = Row::new();
            pin.insert(attribute, key);
            spec.where_eq(pin);
        }
        Self { model, spec }
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    /// The accumulated specification, before scopes are applied.
    pub fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    // ==================== Chainable ====================

    /// Filter by an equality map keyed by attribute name.
    #[must_use]
    pub fn where_eq(mut self, conditions: Row) -> Self {
        self.spec.where_eq(conditions);
        self
    }

    /// Filter by raw SQL with `?` tokens.
    #[must_use]
    pub fn where_raw(mut self, sql: impl Into<String>, params: Vec<Value>) -> Self {
        self.spec.where_raw(sql, params);
        self
    }

    #[must_use]
    pub fn filter(mut self, clause: impl Into<Clause>) -> Self {
        self.spec.clauses.push(clause.into());
        self
    }

    #[must_use]
    pub fn order(mut self, expr: impl Into<String>) -> Self {
        self.spec.order(expr);
        self
    }

    /// Limit to `limit` rows from offset 0.
    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.spec.limit(limit, None);
        self
    }

    #[must_use]
    pub fn offset_limit(mut self, offset: u64, limit: u64) -> Self {
        self.spec.limit(offset, Some(limit));
        self
    }

    #[must_use]
    pub fn page(mut self, page: u64, page_size: u64) -> Self {
        self.spec.page(page, page_size);
        self
    }

    /// Request `page` with the configured default page size.
    #[must_use]
    pub fn page_number(self, page: u64) -> Self {
        let size = self.model.config().pagination.default_page_size;
        self.page(page, size)
    }

    #[must_use]
    pub fn distinct<S: AsRef<str>>(mut self, attributes: &[S]) -> Self {
        self.spec.distinct(attributes);
        self
    }

    /// Group by attributes or SQL expressions. Expressions such as
    /// `DATE(created_at)` are emitted as written.
    #[must_use]
    pub fn group<S: AsRef<str>>(mut self, attributes: &[S]) -> Self {
        self.spec.group(attributes);
        self
    }

    /// Explicit projection SQL, used verbatim.
    #[must_use]
    pub fn select(mut self, projection: impl Into<String>) -> Self {
        self.spec.select(projection);
        self
    }

    /// Activate a named scope. Unknown names fail when the query executes.
    #[must_use]
    pub fn scope(mut self, name: impl Into<String>) -> Self {
        self.spec.scope(name);
        self
    }

    /// Drop every active scope, including the default one.
    #[must_use]
    pub fn unscoped(mut self) -> Self {
        self.spec.unscoped();
        self
    }

    /// Whether inserts append the dialect's `RETURNING` clause (default on).
    #[must_use]
    pub fn returning(mut self, enabled: bool) -> Self {
        self.spec.returning = enabled;
        self
    }

    /// Eager-load associations, e.g. `"author"` or `"comments.author"`.
    ///
    /// Fails immediately with `Error::UnknownAssociation` if any name, at any
    /// nesting level, is not declared.
    pub fn includes(mut self, includes: impl Into<Includes>) -> Result<Self> {
        let includes = includes.into();
        validate_includes(&self.model, &includes)?;
        self.spec.includes.merge(includes);
        Ok(self)
    }

    // ==================== Terminal: reads ====================

    /// Find by the first primary-key attribute. Absence is `None`, not an error.
    #[tracing::instrument(level = "debug", skip(self, cx, conn, id), fields(model = %self.model.type_name()))]
    pub async fn find<C: Connection>(
        self,
        cx: &Cx,
        conn: &C,
        id: impl Into<Value>,
    ) -> Outcome<Option<Entity>, Error> {
        let Some(pk) = self.model.schema().primary_key().first().cloned() else {
            return Outcome::Err(Error::schema(format!(
                "'{}' has no primary key",
                self.model.type_name()
            )));
        };
        let mut key = Row::new();
        key.insert(pk, id);
        self.find_where(cx, conn, key).await
    }

    /// First entity matching `conditions`, in storage order.
    #[tracing::instrument(level = "debug", skip(self, cx, conn, conditions), fields(model = %self.model.type_name()))]
    pub async fn find_where<C: Connection>(
        self,
        cx: &Cx,
        conn: &C,
        conditions: Row,
    ) -> Outcome<Option<Entity>, Error> {
        let mut query = self.where_eq(conditions);
        query.spec.limit(1, None);
        query.spec.page = None;
        query.spec.page_size = None;
        query
            .fetch(cx, conn, Take::All)
            .await
            .map(|(rows, _)| rows.into_iter().next())
    }

    /// First entity, ordered by primary key unless an order was given.
    #[tracing::instrument(level = "debug", skip(self, cx, conn), fields(model = %self.model.type_name()))]
    pub async fn first<C: Connection>(self, cx: &Cx, conn: &C) -> Outcome<Option<Entity>, Error> {
        self.fetch(cx, conn, Take::First)
            .await
            .map(|(rows, _)| rows.into_iter().next())
    }

    /// Last entity, ordered by primary key descending unless an order was given.
    #[tracing::instrument(level = "debug", skip(self, cx, conn), fields(model = %self.model.type_name()))]
    pub async fn last<C: Connection>(self, cx: &Cx, conn: &C) -> Outcome<Option<Entity>, Error> {
        self.fetch(cx, conn, Take::Last)
            .await
            .map(|(rows, _)| rows.into_iter().next())
    }

    /// Every matching entity. Page settings are honoured; the envelope is not
    /// returned (see [`paginate`](Self::paginate)).
    #[tracing::instrument(level = "debug", skip(self, cx, conn), fields(model = %self.model.type_name()))]
    pub async fn list<C: Connection>(self, cx: &Cx, conn: &C) -> Outcome<Vec<Entity>, Error> {
        self.fetch(cx, conn, Take::All).await.map(|(rows, _)| rows)
    }

    /// Alias of [`list`](Self::list).
    pub async fn all<C: Connection>(self, cx: &Cx, conn: &C) -> Outcome<Vec<Entity>, Error> {
        self.list(cx, conn).await
    }

    /// A page of entities with navigation info.
    ///
    /// Without an explicit `page`, the first page at the default size is used.
    #[tracing::instrument(level = "debug", skip(self, cx, conn), fields(model = %self.model.type_name()))]
    pub async fn paginate<C: Connection>(mut self, cx: &Cx, conn: &C) -> Outcome<Page, Error> {
        if !self.spec.is_paginated() {
            self = self.page_number(1);
        }
        let (rows, info) = try_outcome!(self.fetch(cx, conn, Take::All).await);
        match info {
            Some(pagination) => Outcome::Ok(Page { pagination, rows }),
            None => Outcome::Err(Error::Custom("pagination info missing".to_string())),
        }
    }

    /// Number of matching rows. Order, group and limit never apply.
    #[tracing::instrument(level = "debug", skip(self, cx, conn), fields(model = %self.model.type_name()))]
    pub async fn count<C: Connection>(mut self, cx: &Cx, conn: &C) -> Outcome<u64, Error> {
        if let Err(e) = self.prepare() {
            return Outcome::Err(e);
        }
        run_count(cx, conn, &self.model, self.spec).await
    }

    // ==================== Terminal: writes ====================

    /// Insert `values` (attribute names) and return the stored entity.
    ///
    /// The builder does not validate values; constraint violations surface as
    /// driver errors. The stored row is re-queried by generated id, else by
    /// primary key, else by the written values that round-trip exactly
    /// (timestamps, dates, JSON and arrays are left out). With nothing left to
    /// match on, no re-query runs and the result is `None`.
    #[tracing::instrument(level = "debug", skip(self, cx, conn, values), fields(model = %self.model.type_name()))]
    pub async fn create<C: Connection>(
        mut self,
        cx: &Cx,
        conn: &C,
        values: Row,
    ) -> Outcome<Option<Entity>, Error> {
        let schema = self.model.schema();
        let mut attrs = values;

        if self.model.config().timestamps && schema.has_timestamps() {
            let now = Value::Timestamp(Utc::now());
            for name in [CREATED_AT, UPDATED_AT] {
                if attrs.get(name).is_none_or(Value::is_null) {
                    attrs.insert(name, now.clone());
                }
            }
        }
        if let Some((attribute, key)) = schema.discriminator() {
            if attrs.get(attribute).is_none_or(Value::is_null) {
                attrs.insert(attribute, key);
            }
        }
        if let Some(hooks) = self.model.hooks() {
            hooks.before_create(&mut attrs);
        }

        self.spec.verb = Verb::Insert;
        self.spec.values = Some(schema.to_write_values(&attrs));
        let stmt = render(&self.spec, self.model.dialect());
        let result = try_outcome!(exec::insert(cx, conn, &stmt).await);

        let lookup = insert_lookup(&self.model, &result, &attrs);
        if lookup.is_empty() {
            tracing::debug!(
                model = %self.model.type_name(),
                "inserted row has no identifying values; skipping re-query"
            );
            return Outcome::Ok(None);
        }
        tracing::debug!(
            model = %self.model.type_name(),
            keys = ?lookup.keys().collect::<Vec<_>>(),
            "re-querying inserted row"
        );
        self.model.unscoped().find_where(cx, conn, lookup).await
    }

    /// Update matching rows with `values` (attribute names).
    #[tracing::instrument(level = "debug", skip(self, cx, conn, values), fields(model = %self.model.type_name()))]
    pub async fn update<C: Connection>(self, cx: &Cx, conn: &C, values: Row) -> Outcome<u64, Error> {
        self.update_returning_values(cx, conn, values)
            .await
            .map(|(affected, _)| affected)
    }

    /// Update and hand back the attribute values that were written, after
    /// timestamps and hooks.
    pub(crate) async fn update_returning_values<C: Connection>(
        mut self,
        cx: &Cx,
        conn: &C,
        values: Row,
    ) -> Outcome<(u64, Row), Error> {
        if let Err(e) = self.prepare() {
            return Outcome::Err(e);
        }
        let schema = self.model.schema();
        let mut attrs = values;
        if self.model.config().timestamps && schema.has_timestamps() {
            attrs.insert(UPDATED_AT, Value::Timestamp(Utc::now()));
        }
        if let Some(hooks) = self.model.hooks() {
            hooks.before_update(&mut attrs);
        }

        let write = schema.to_write_values(&attrs);
        if write.is_empty() {
            tracing::trace!(model = %self.model.type_name(), "no known attributes to update, skipping");
            return Outcome::Ok((0, attrs));
        }
        self.spec.verb = Verb::Update;
        self.spec.values = Some(write);
        let stmt = render(&self.spec, self.model.dialect());
        exec::execute(cx, conn, &stmt)
            .await
            .map(|affected| (affected, attrs))
    }

    /// Delete matching rows.
    #[tracing::instrument(level = "debug", skip(self, cx, conn), fields(model = %self.model.type_name()))]
    pub async fn delete<C: Connection>(mut self, cx: &Cx, conn: &C) -> Outcome<u64, Error> {
        if let Err(e) = self.prepare() {
            return Outcome::Err(e);
        }
        self.spec.verb = Verb::Delete;
        let stmt = render(&self.spec, self.model.dialect());
        exec::execute(cx, conn, &stmt).await
    }

    // ==================== Pipeline ====================

    /// Apply scopes, then translate attribute names to column names.
    fn prepare(&mut self) -> Result<()> {
        self.apply_scopes()?;

        let schema = self.model.schema();
        self.spec.clauses = std::mem::take(&mut self.spec.clauses)
            .into_iter()
            .map(|clause| match clause {
                Clause::Equals(conditions) => Clause::Equals(schema.to_filter(conditions)),
                raw @ Clause::Raw { .. } => raw,
            })
            .collect();
        if let Some(distinct) = self.spec.distinct.as_mut() {
            to_columns(schema, distinct);
        }
        to_columns(schema, &mut self.spec.group);
        Ok(())
    }

    /// Apply every active scope once, in activation order.
    ///
    /// A scope may activate further scopes; those run after it. The implicit
    /// default scope is optional, any other unknown name is an error.
    fn apply_scopes(&mut self) -> Result<()> {
        let schema = self.model.schema();
        let mut applied: Vec<String> = Vec::new();
        loop {
            let pending = std::mem::take(&mut self.spec.scopes);
            if pending.is_empty() {
                return Ok(());
            }
            for name in pending {
                if applied.contains(&name) {
                    continue;
                }
                match schema.scope(&name) {
                    Some(scope) => {
                        tracing::debug!(model = %schema.type_name(), scope = %name, "applying scope");
                        scope(&mut self.spec);
                    }
                    None if name == QuerySpec::DEFAULT_SCOPE => {}
                    None => {
                        return Err(Error::UnknownScope {
                            model: schema.type_name().to_string(),
                            name,
                        });
                    }
                }
                applied.push(name);
            }
        }
    }

    fn order_by_primary_key(&mut self, descending: bool) {
        let dialect = self.model.dialect();
        let schema = self.model.schema();
        let direction = if descending { "DESC" } else { "ASC" };
        for attr in schema.primary_key() {
            let column = dialect.quote(schema.column_name(attr));
            self.spec.order(format!("{column} {direction}"));
        }
    }

    async fn fetch<C: Connection>(
        mut self,
        cx: &Cx,
        conn: &C,
        take: Take,
    ) -> Outcome<(Vec<Entity>, Option<PageInfo>), Error> {
        if let Err(e) = self.prepare() {
            return Outcome::Err(e);
        }

        if take != Take::All {
            if self.spec.order.is_empty() {
                self.order_by_primary_key(take == Take::Last);
            }
            self.spec.limit(1, None);
            self.spec.page = None;
            self.spec.page_size = None;
        }

        let page_info = if self.spec.is_paginated() {
            let config = &self.model.config().pagination;
            let page_size = self.spec.page_size.unwrap_or(config.default_page_size);
            let total = try_outcome!(run_count(cx, conn, &self.model, self.spec.clone()).await);
            let info = PageInfo::compute(self.spec.page.unwrap_or(1), page_size, total, config);
            tracing::debug!(
                model = %self.model.type_name(),
                page = info.page,
                page_count = info.page_count,
                total_count = info.total_count,
                "pagination resolved"
            );
            self.spec.limit(info.offset(), Some(info.page_size));
            Some(info)
        } else {
            None
        };

        let rows = if self.spec.is_always_empty() {
            tracing::debug!(model = %self.model.type_name(), "filter can never match; skipping select");
            Vec::new()
        } else {
            let stmt = render(&self.spec, self.model.dialect());
            try_outcome!(exec::query(cx, conn, &stmt).await)
        };

        let mut entities = entity::materialize(&self.model, rows);
        if !self.spec.includes.is_empty() && !entities.is_empty() {
            try_outcome!(eager::load(cx, conn, &self.model, &mut entities, &self.spec.includes).await);
        }

        tracing::debug!(model = %self.model.type_name(), rows = entities.len(), "fetched");
        Outcome::Ok((entities, page_info))
    }
}

fn to_columns(schema: &Schema, names: &mut [String]) {
    for name in names.iter_mut() {
        if let Some(column) = schema.column_for_attribute(name) {
            *name = column.name.clone();
        }
    }
}

fn validate_includes(model: &Model, includes: &Includes) -> Result<()> {
    for (name, nested) in includes.iter() {
        let Some(assoc) = model.schema().association(name) else {
            return Err(Error::UnknownAssociation {
                model: model.type_name().to_string(),
                name: name.to_string(),
            });
        };
        if !nested.is_empty() {
            validate_includes(&model.sibling(&assoc.target)?, nested)?;
        }
    }
    Ok(())
}

/// Count rows matching an already prepared spec.
async fn run_count<C: Connection>(
    cx: &Cx,
    conn: &C,
    model: &Model,
    mut spec: QuerySpec,
) -> Outcome<u64, Error> {
    if spec.is_always_empty() {
        return Outcome::Ok(0);
    }
    spec.verb = Verb::Count;
    let stmt = render(&spec, model.dialect());
    let rows = try_outcome!(exec::query(cx, conn, &stmt).await);
    let count = rows
        .first()
        .and_then(|row| row.get("count").or_else(|| row.values().next()))
        .map(|v| SemanticType::Integer.coerce(v.clone(), None))
        .and_then(|v| v.as_i64())
        .unwrap_or(0);
    Outcome::Ok(u64::try_from(count).unwrap_or(0))
}

/// Conditions that find a just-inserted row.
fn insert_lookup(model: &Model, result: &InsertResult, attrs: &Row) -> Row {
    let schema = model.schema();
    let pk = schema.primary_key();

    if let [single] = pk {
        if let Some(id) = model
            .dialect()
            .extract_insert_id(result, schema.column_name(single))
        {
            let mut key = Row::new();
            key.insert(single.clone(), id);
            return key;
        }
    }

    if pk
        .iter()
        .all(|attr| attrs.get(attr).is_some_and(|v| !v.is_null()))
    {
        return pk
            .iter()
            .filter_map(|attr| attrs.get(attr).map(|v| (attr.clone(), v.clone())))
            .collect();
    }

    // Values the database may store at a different precision or shape never
    // compare equal on the way back, so they cannot identify the row.
    attrs
        .iter()
        .filter(|(attr, value)| {
            let Some(column) = schema.column_for_attribute(attr) else {
                return false;
            };
            !matches!(*attr, CREATED_AT | UPDATED_AT)
                && !matches!(column.semantic_type, SemanticType::Date | SemanticType::Json)
                && !matches!(value, Value::Array(_) | Value::Json(_) | Value::Timestamp(_))
        })
        .map(|(attr, v)| (attr.to_string(), v.clone()))
        .collect()
}
