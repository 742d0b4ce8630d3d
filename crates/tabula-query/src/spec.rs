//! The mutable description of a single logical query.

use tabula_core::{Row, Value};

use crate::clause::Clause;

/// The statement kind a query will render as.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Verb {
    #[default]
    Select,
    Insert,
    Update,
    Delete,
    Count,
}

/// Eager-load requests: association name to nested requests, in request order.
///
/// ```
/// use tabula_query::Includes;
///
/// let inc = Includes::from("comments.author");
/// assert_eq!(inc.names().collect::<Vec<_>>(), vec!["comments"]);
/// assert!(inc.get("comments").unwrap().get("author").is_some());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Includes {
    entries: Vec<(String, Includes)>,
}

impl Includes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request `name`, returning its nested requests for further chaining.
    ///
    /// Requesting the same name twice merges into one entry.
    pub fn add(&mut self, name: impl Into<String>) -> &mut Includes {
        let name = name.into();
        let idx = match self.entries.iter().position(|(n, _)| *n == name) {
            Some(idx) => idx,
            None => {
                self.entries.push((name, Includes::new()));
                self.entries.len() - 1
            }
        };
        &mut self.entries[idx].1
    }

    /// Builder form: request `name` with the given nested requests.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, nested: Includes) -> Self {
        self.add(name).merge(nested);
        self
    }

    /// Request a dotted path such as `"comments.author"`.
    pub fn add_path(&mut self, path: &str) {
        let mut node = self;
        for part in path.split('.').filter(|p| !p.is_empty()) {
            node = node.add(part);
        }
    }

    pub fn merge(&mut self, other: Includes) {
        for (name, nested) in other.entries {
            self.add(name).merge(nested);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Includes> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, i)| i)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Includes)> {
        self.entries.iter().map(|(n, i)| (n.as_str(), i))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl From<&str> for Includes {
    fn from(path: &str) -> Self {
        let mut inc = Includes::new();
        inc.add_path(path);
        inc
    }
}

impl From<&[&str]> for Includes {
    fn from(paths: &[&str]) -> Self {
        let mut inc = Includes::new();
        for path in paths {
            inc.add_path(path);
        }
        inc
    }
}

/// Everything a query builder has accumulated.
///
/// Owned by exactly one builder and discarded after execution. Scopes receive
/// it mutably and may call any of the mutators below.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    pub table: String,
    pub verb: Verb,
    /// Explicit projection SQL, used verbatim.
    pub projection: Option<String>,
    pub distinct: Option<Vec<String>>,
    pub clauses: Vec<Clause>,
    /// Column values for insert/update, in render order.
    pub values: Option<Row>,
    /// Order terms, rendered verbatim.
    pub order: Vec<String>,
    pub group: Vec<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub includes: Includes,
    pub scopes: Vec<String>,
    /// Whether inserts append the dialect's `RETURNING` fragment.
    pub returning: bool,
}

impl QuerySpec {
    /// Name of the scope every query starts with.
    pub const DEFAULT_SCOPE: &'static str = "default";

    /// A fresh select over `table` with the default scope active.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            verb: Verb::Select,
            projection: None,
            distinct: None,
            clauses: Vec::new(),
            values: None,
            order: Vec::new(),
            group: Vec::new(),
            limit: None,
            offset: None,
            page: None,
            page_size: None,
            includes: Includes::new(),
            scopes: vec![Self::DEFAULT_SCOPE.to_string()],
            returning: true,
        }
    }

    /// Add an equality-map filter.
    pub fn where_eq(&mut self, conditions: Row) -> &mut Self {
        self.clauses.push(Clause::Equals(conditions));
        self
    }

    /// Add a raw SQL filter with `?` tokens.
    pub fn where_raw(&mut self, sql: impl Into<String>, params: Vec<Value>) -> &mut Self {
        self.clauses.push(Clause::raw(sql, params));
        self
    }

    pub fn order(&mut self, expr: impl Into<String>) -> &mut Self {
        self.order.push(expr.into());
        self
    }

    pub fn group<S: AsRef<str>>(&mut self, columns: &[S]) -> &mut Self {
        self.group
            .extend(columns.iter().map(|c| c.as_ref().to_string()));
        self
    }

    pub fn distinct<S: AsRef<str>>(&mut self, columns: &[S]) -> &mut Self {
        self.distinct = Some(columns.iter().map(|c| c.as_ref().to_string()).collect());
        self
    }

    pub fn select(&mut self, projection: impl Into<String>) -> &mut Self {
        self.projection = Some(projection.into());
        self
    }

    /// `limit(n, None)` limits to `n` rows from offset 0;
    /// `limit(offset, Some(n))` sets both.
    pub fn limit(&mut self, offset_or_limit: u64, limit: Option<u64>) -> &mut Self {
        match limit {
            Some(limit) => {
                self.offset = Some(offset_or_limit);
                self.limit = Some(limit);
            }
            None => {
                self.offset = Some(0);
                self.limit = Some(offset_or_limit);
            }
        }
        self
    }

    pub fn page(&mut self, page: u64, page_size: u64) -> &mut Self {
        self.page = Some(page);
        self.page_size = Some(page_size);
        self
    }

    pub fn scope(&mut self, name: impl Into<String>) -> &mut Self {
        self.scopes.push(name.into());
        self
    }

    /// Drop every active scope, including the implicit default.
    pub fn unscoped(&mut self) -> &mut Self {
        self.scopes.clear();
        self
    }

    pub fn is_paginated(&self) -> bool {
        self.page.is_some() || self.page_size.is_some()
    }

    /// Whether any filter guarantees an empty result.
    pub fn is_always_empty(&self) -> bool {
        self.clauses.iter().any(Clause::is_always_false)
    }
}
