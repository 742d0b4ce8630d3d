//! Shared fixtures for the integration tests: a scripted connection that
//! records every statement, and a small blog-shaped registry.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};

use asupersync::runtime::RuntimeBuilder;
use tabula::prelude::*;
use tabula::{Association, Dialect, RegistryBuilder};

pub fn unwrap_outcome<T>(outcome: Outcome<T, Error>) -> T {
    match outcome {
        Outcome::Ok(v) => v,
        Outcome::Err(e) => panic!("unexpected error: {e}"),
        Outcome::Cancelled(r) => panic!("cancelled: {r:?}"),
        Outcome::Panicked(p) => panic!("panicked: {p:?}"),
    }
}

pub fn expect_err<T: std::fmt::Debug>(outcome: Outcome<T, Error>) -> Error {
    match outcome {
        Outcome::Err(e) => e,
        other => panic!("expected an error, got {other:?}"),
    }
}

/// Drive `future` to completion on a fresh current-thread runtime.
pub fn run<F: Future<Output = ()>>(future: F) {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    rt.block_on(future);
}

/// A scripted reply, consumed in order by whichever call comes next.
#[derive(Debug)]
pub enum Reply {
    Rows(Vec<Row>),
    Affected(u64),
    Inserted(InsertResult),
    Fail(Error),
}

/// Connection double that answers from a queue and records what it ran.
///
/// With an empty queue, queries return no rows, executes affect nothing and
/// inserts report no generated key.
#[derive(Debug, Default)]
pub struct MockConnection {
    replies: Mutex<VecDeque<Reply>>,
    log: Mutex<Vec<(String, Vec<Value>)>>,
}

impl MockConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, reply: Reply) -> &Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn reply_rows(&self, rows: Vec<Row>) -> &Self {
        self.reply(Reply::Rows(rows))
    }

    pub fn reply_count(&self, count: i64) -> &Self {
        self.reply_rows(vec![row! { "count" => count }])
    }

    pub fn reply_affected(&self, affected: u64) -> &Self {
        self.reply(Reply::Affected(affected))
    }

    pub fn reply_insert(&self, result: InsertResult) -> &Self {
        self.reply(Reply::Inserted(result))
    }

    pub fn reply_error(&self, message: &str) -> &Self {
        self.reply(Reply::Fail(Error::driver(message)))
    }

    /// Every statement run so far, with its bound parameters.
    pub fn statements(&self) -> Vec<(String, Vec<Value>)> {
        self.log.lock().unwrap().clone()
    }

    /// Just the SQL text of every statement run so far.
    pub fn sql(&self) -> Vec<String> {
        self.statements().into_iter().map(|(sql, _)| sql).collect()
    }

    pub fn params(&self, index: usize) -> Vec<Value> {
        self.statements()[index].1.clone()
    }

    fn next(&self, sql: &str, params: &[Value]) -> Option<Reply> {
        self.log
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));
        self.replies.lock().unwrap().pop_front()
    }
}

impl Connection for MockConnection {
    fn query(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        let result = match self.next(sql, params) {
            None => Outcome::Ok(Vec::new()),
            Some(Reply::Rows(rows)) => Outcome::Ok(rows),
            Some(Reply::Fail(e)) => Outcome::Err(e),
            Some(other) => panic!("query got unexpected reply {other:?}"),
        };
        async move { result }
    }

    fn execute(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        let result = match self.next(sql, params) {
            None => Outcome::Ok(0),
            Some(Reply::Affected(n)) => Outcome::Ok(n),
            Some(Reply::Fail(e)) => Outcome::Err(e),
            Some(other) => panic!("execute got unexpected reply {other:?}"),
        };
        async move { result }
    }

    fn insert(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<InsertResult, Error>> + Send {
        let result = match self.next(sql, params) {
            None => Outcome::Ok(InsertResult::default()),
            Some(Reply::Inserted(r)) => Outcome::Ok(r),
            Some(Reply::Fail(e)) => Outcome::Err(e),
            Some(other) => panic!("insert got unexpected reply {other:?}"),
        };
        async move { result }
    }
}

// ==================== Fixture schemas ====================

pub fn user_schema() -> Schema {
    Schema::builder("User", "users")
        .column(Column::integer("id"))
        .column(Column::string("name"))
        .column(Column::string("email").attribute("emailAddress"))
        .column(Column::string("type"))
        .column(Column::boolean("active"))
        .timestamps()
        .discriminator("type")
        .subclass("admin", "Admin")
        .subclass("guest", "Guest")
        .scope("active", |q| {
            q.where_eq(row! { "active" => true });
        })
        .build()
        .expect("user schema")
}

pub fn post_schema() -> Schema {
    Schema::builder("Post", "posts")
        .column(Column::integer("id"))
        .column(Column::string("title"))
        .column(Column::integer("author_id"))
        .column(Column::string("status"))
        .column(Column::raw("tag_ids"))
        .association(Association::has_one("author", "User"))
        .association(
            Association::has_many("comments", "Comment")
                .foreign_key("id")
                .reference("post_id"),
        )
        .association(
            Association::has_many("visible_comments", "Comment")
                .foreign_key("id")
                .reference("post_id")
                .filter(Clause::raw("\"score\" > ?", vec![Value::from(0)])),
        )
        .association(Association::has_many("tags", "Tag").foreign_key("tag_ids"))
        .scope("published", |q| {
            q.where_eq(row! { "status" => "published" });
        })
        .scope("recent", |q| {
            q.order("\"id\" DESC");
        })
        .scope("featured", |q| {
            q.scope("published").limit(3, None);
        })
        .build()
        .expect("post schema")
}

pub fn comment_schema() -> Schema {
    Schema::builder("Comment", "comments")
        .column(Column::integer("id"))
        .column(Column::integer("post_id"))
        .column(Column::integer("author_id"))
        .column(Column::string("comment_body").attribute("body"))
        .column(Column::integer("score"))
        .column(Column::boolean("hidden"))
        .association(Association::has_one("author", "User"))
        .default_scope(|q| {
            q.where_eq(row! { "hidden" => false });
        })
        .build()
        .expect("comment schema")
}

pub fn tag_schema() -> Schema {
    Schema::builder("Tag", "tags")
        .column(Column::integer("id"))
        .column(Column::string("label"))
        .build()
        .expect("tag schema")
}

/// Keyed by two attributes, one of which maps to a differently named column.
pub fn membership_schema() -> Schema {
    Schema::builder("Membership", "memberships")
        .column(Column::integer("tenant_id"))
        .column(Column::string("code_col").attribute("code"))
        .column(Column::string("role"))
        .primary_key(&["tenant_id", "code"])
        .build()
        .expect("membership schema")
}

/// Every fixture type. `Guest` is mapped by `User` but deliberately left
/// unregistered.
pub fn registry_builder() -> RegistryBuilder {
    Registry::builder()
        .register(user_schema())
        .register_subclass("Admin", "User")
        .register(post_schema())
        .register(comment_schema())
        .register(tag_schema())
        .register(membership_schema())
}

pub fn orm_with(dialect: Dialect) -> Arc<Orm> {
    let registry = registry_builder().build().expect("fixture registry");
    Orm::new(registry, OrmConfig::default().dialect(dialect))
}

pub fn orm() -> Arc<Orm> {
    orm_with(Dialect::Postgres)
}

pub fn model(orm: &Arc<Orm>, type_name: &str) -> Model {
    orm.model(type_name).expect("registered model")
}
