//! Rendering a [`QuerySpec`] into SQL text and an ordered parameter list.
//!
//! Placeholders are handed out by one counter per statement, in exactly the
//! order values are pushed onto `params`, so positional binding holds no matter
//! how clauses are arranged.

use tabula_core::{Row, Value};

use crate::clause::{Clause, PARAM_TOKEN};
use crate::dialect::Dialect;
use crate::ident::is_valid_identifier;
use crate::spec::{QuerySpec, Verb};

/// A rendered statement, ready for the driver.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Render `spec` for `dialect`.
///
/// Pure: the same spec and dialect always produce the same statement.
#[must_use]
pub fn render(spec: &QuerySpec, dialect: Dialect) -> Statement {
    let mut w = SqlWriter::new(dialect);
    match spec.verb {
        Verb::Select => w.select(spec),
        Verb::Count => w.count(spec),
        Verb::Insert => w.insert(spec),
        Verb::Update => w.update(spec),
        Verb::Delete => w.delete(spec),
    }
    w.finish()
}

/// Render hand-written SQL, expanding each `?` into the dialect's next
/// placeholder. Quoted literals are left untouched.
///
/// ```
/// use tabula_core::Value;
/// use tabula_query::{Dialect, render_raw};
///
/// let stmt = render_raw("SELECT * FROM t WHERE a = ? AND b = ?", &[Value::from(1), Value::from(2)], Dialect::Postgres);
/// assert_eq!(stmt.sql, "SELECT * FROM t WHERE a = $1 AND b = $2");
///
/// let stmt = render_raw("SELECT * FROM t WHERE s = '?' AND a = ?", &[Value::from(1)], Dialect::Sqlite);
/// assert_eq!(stmt.sql, "SELECT * FROM t WHERE s = '?' AND a = ?1");
/// ```
#[must_use]
pub fn render_raw(sql: &str, params: &[Value], dialect: Dialect) -> Statement {
    let mut w = SqlWriter::new(dialect);
    let expanded = w.expand_raw(sql, params);
    w.sql = expanded;
    w.finish()
}

struct SqlWriter {
    dialect: Dialect,
    sql: String,
    params: Vec<Value>,
}

impl SqlWriter {
    fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            sql: String::with_capacity(128),
            params: Vec::new(),
        }
    }

    fn finish(self) -> Statement {
        Statement {
            sql: self.sql,
            params: self.params,
        }
    }

    /// Bind `value` and return its placeholder.
    fn bind(&mut self, value: Value) -> String {
        self.params.push(value);
        self.dialect.placeholder(self.params.len())
    }

    fn quote(&self, ident: &str) -> String {
        self.dialect.quote(ident)
    }

    fn quote_list(&self, idents: &[String]) -> String {
        idents
            .iter()
            .map(|c| self.quote(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Quote plain column names; anything else is an expression and is kept
    /// verbatim.
    fn column_list(&self, entries: &[String]) -> String {
        entries
            .iter()
            .map(|e| {
                if is_valid_identifier(e) {
                    self.quote(e)
                } else {
                    e.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    // ==================== Verbs ====================

    fn select(&mut self, spec: &QuerySpec) {
        let table = self.quote(&spec.table);
        let projection = match (&spec.distinct, &spec.projection) {
            (Some(cols), _) if !cols.is_empty() => format!("DISTINCT {}", self.quote_list(cols)),
            (_, Some(expr)) => expr.clone(),
            _ => format!("{table}.*"),
        };
        self.sql.push_str("SELECT ");
        self.sql.push_str(&projection);
        self.sql.push_str(" FROM ");
        self.sql.push_str(&table);

        self.where_clause(&spec.clauses);

        if !spec.group.is_empty() {
            let group = self.column_list(&spec.group);
            self.sql.push_str(" GROUP BY ");
            self.sql.push_str(&group);
        }
        if !spec.order.is_empty() {
            self.sql.push_str(" ORDER BY ");
            self.sql.push_str(&spec.order.join(", "));
        }
        if let Some(limit) = spec.limit {
            let offset_index = self.params.len() + 1;
            self.params.push(Value::from(spec.offset.unwrap_or(0)));
            self.params.push(Value::from(limit));
            self.sql.push(' ');
            self.sql
                .push_str(&self.dialect.limit_clause(offset_index, offset_index + 1));
        }
    }

    fn count(&mut self, spec: &QuerySpec) {
        let count = self.quote("count");
        let table = self.quote(&spec.table);
        self.sql
            .push_str(&format!("SELECT COUNT(0) AS {count} FROM {table}"));
        self.where_clause(&spec.clauses);
    }

    fn insert(&mut self, spec: &QuerySpec) {
        let table = self.quote(&spec.table);
        self.sql.push_str("INSERT INTO ");
        self.sql.push_str(&table);

        match spec.values.as_ref().filter(|v| !v.is_empty()) {
            Some(values) => {
                let mut columns = Vec::with_capacity(values.len());
                let mut placeholders = Vec::with_capacity(values.len());
                for (column, value) in values.iter() {
                    columns.push(self.quote(column));
                    placeholders.push(self.bind(value.clone()));
                }
                self.sql.push_str(&format!(
                    " ({}) VALUES ({})",
                    columns.join(", "),
                    placeholders.join(", ")
                ));
            }
            None => self.sql.push_str(self.dialect.empty_insert()),
        }

        if spec.returning {
            self.sql.push_str(self.dialect.returning());
        }
    }

    fn update(&mut self, spec: &QuerySpec) {
        let table = self.quote(&spec.table);
        self.sql.push_str("UPDATE ");
        self.sql.push_str(&table);
        self.sql.push_str(" SET ");

        let empty = Row::new();
        let values = spec.values.as_ref().unwrap_or(&empty);
        let mut sets = Vec::with_capacity(values.len());
        for (column, value) in values.iter() {
            let column = self.quote(column);
            let placeholder = self.bind(value.clone());
            sets.push(format!("{column} = {placeholder}"));
        }
        self.sql.push_str(&sets.join(", "));

        self.where_clause(&spec.clauses);
    }

    fn delete(&mut self, spec: &QuerySpec) {
        let table = self.quote(&spec.table);
        self.sql.push_str("DELETE FROM ");
        self.sql.push_str(&table);
        self.where_clause(&spec.clauses);
    }

    // ==================== WHERE ====================

    fn where_clause(&mut self, clauses: &[Clause]) {
        let mut parts = Vec::new();
        let wrap = clauses.len() > 1;
        for clause in clauses {
            match clause {
                Clause::Raw { sql, params } => {
                    let expanded = self.expand_raw(sql, params);
                    if expanded.trim().is_empty() {
                        continue;
                    }
                    parts.push(if wrap {
                        format!("({expanded})")
                    } else {
                        expanded
                    });
                }
                Clause::Equals(conditions) => {
                    for (column, value) in conditions.iter() {
                        let part = self.equality(column, value);
                        parts.push(part);
                    }
                }
            }
        }
        if !parts.is_empty() {
            self.sql.push_str(" WHERE ");
            self.sql.push_str(&parts.join(" AND "));
        }
    }

    fn equality(&mut self, column: &str, value: &Value) -> String {
        match value {
            Value::Null => format!("{} IS NULL", self.quote(column)),
            Value::Array(items) if items.is_empty() => "FALSE".to_string(),
            Value::Array(_) => {
                let column = self.quote(column);
                let placeholder = self.bind(value.clone());
                format!("{column} {} ({placeholder})", self.dialect.in_keyword())
            }
            _ => {
                let column = self.quote(column);
                let placeholder = self.bind(value.clone());
                format!("{column} = {placeholder}")
            }
        }
    }

    /// Expand each `?` in `sql` into the next dialect placeholder.
    fn expand_raw(&mut self, sql: &str, params: &[Value]) -> String {
        let pieces = raw_pieces(sql);
        let tokens = pieces.iter().filter(|p| matches!(p, RawPiece::Param)).count();
        if tokens != params.len() {
            tracing::warn!(
                sql,
                tokens,
                params = params.len(),
                "raw clause placeholder count does not match its parameters"
            );
        }

        let mut params = params.iter();
        let mut out = String::with_capacity(sql.len() + tokens * 2);
        for piece in pieces {
            match piece {
                RawPiece::Text(text) => out.push_str(text),
                RawPiece::Param => {
                    let value = params.next().cloned().unwrap_or(Value::Null);
                    let placeholder = self.bind(value);
                    out.push_str(&placeholder);
                }
            }
        }
        out
    }
}

#[derive(Debug, PartialEq)]
enum RawPiece<'a> {
    Text(&'a str),
    Param,
}

/// Split raw SQL into literal text and parameter tokens.
///
/// Tokens inside quoted strings or quoted identifiers are text. A doubled
/// token outside quotes stands for one literal `?`, which keeps operators such
/// as PostgreSQL's jsonb `?` usable.
fn raw_pieces(sql: &str) -> Vec<RawPiece<'_>> {
    let mut pieces = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;
    let mut chars = sql.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
            }
            None if matches!(c, '\'' | '"' | '`') => quote = Some(c),
            None if c == PARAM_TOKEN => {
                pieces.push(RawPiece::Text(&sql[start..i]));
                let end = i + c.len_utf8();
                if chars.next_if(|&(_, next)| next == PARAM_TOKEN).is_some() {
                    pieces.push(RawPiece::Text(&sql[i..end]));
                    start = end + c.len_utf8();
                } else {
                    pieces.push(RawPiece::Param);
                    start = end;
                }
            }
            None => {}
        }
    }
    pieces.push(RawPiece::Text(&sql[start..]));
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabula_core::row;

    fn select(table: &str) -> QuerySpec {
        QuerySpec::new(table)
    }

    #[test]
    fn test_plain_select() {
        let stmt = render(&select("users"), Dialect::Postgres);
        assert_eq!(stmt.sql, "SELECT \"users\".* FROM \"users\"");
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn test_equality_map_rules() {
        let mut spec = select("posts");
        spec.where_eq(row! {
            "status" => "active",
            "deleted_at" => Value::Null,
            "author_id" => vec![1_i64, 2],
        });

        let stmt = render(&spec, Dialect::Postgres);
        assert_eq!(
            stmt.sql,
            "SELECT \"posts\".* FROM \"posts\" WHERE \"status\" = $1 AND \"deleted_at\" IS NULL AND \"author_id\" = ANY ($2)"
        );
        assert_eq!(
            stmt.params,
            vec![Value::from("active"), Value::from(vec![1_i64, 2])]
        );

        let stmt = render(&spec, Dialect::Mysql);
        assert_eq!(
            stmt.sql,
            "SELECT `posts`.* FROM `posts` WHERE `status` = ? AND `deleted_at` IS NULL AND `author_id` IN (?)"
        );
    }

    #[test]
    fn test_empty_array_renders_false_without_param() {
        let mut spec = select("posts");
        spec.where_eq(row! { "id" => Vec::<i64>::new(), "status" => "x" });

        let stmt = render(&spec, Dialect::Sqlite);
        assert_eq!(
            stmt.sql,
            "SELECT \"posts\".* FROM \"posts\" WHERE FALSE AND \"status\" = ?1"
        );
        assert_eq!(stmt.params, vec![Value::from("x")]);
        assert!(!stmt.sql.contains("IN ()"));
    }

    #[test]
    fn test_raw_clause_expansion_continues_numbering() {
        let mut spec = select("posts");
        spec.where_eq(row! { "status" => "active" })
            .where_raw("score > ? AND score < ?", vec![Value::from(1), Value::from(9)]);

        let stmt = render(&spec, Dialect::Postgres);
        assert_eq!(
            stmt.sql,
            "SELECT \"posts\".* FROM \"posts\" WHERE \"status\" = $1 AND (score > $2 AND score < $3)"
        );
        assert_eq!(stmt.params.len(), 3);
    }

    #[test]
    fn test_single_raw_clause_is_not_wrapped() {
        let mut spec = select("posts");
        spec.where_raw("id = ?", vec![Value::from(3)]);
        let stmt = render(&spec, Dialect::Sqlite);
        assert_eq!(stmt.sql, "SELECT \"posts\".* FROM \"posts\" WHERE id = ?1");
    }

    #[test]
    fn test_raw_clause_missing_params_bind_null() {
        let mut spec = select("posts");
        spec.where_raw("a = ? OR b = ?", vec![Value::from(1)]);
        let stmt = render(&spec, Dialect::Postgres);
        assert_eq!(stmt.params, vec![Value::from(1), Value::Null]);
    }

    #[test]
    fn test_raw_clause_leaves_quoted_tokens_alone() {
        let mut spec = select("posts");
        spec.where_raw(
            "title LIKE '%?%' AND \"a?b\" = ? AND id = ?",
            vec![Value::from("x"), Value::from(7)],
        );
        let stmt = render(&spec, Dialect::Postgres);
        assert_eq!(
            stmt.sql,
            "SELECT \"posts\".* FROM \"posts\" WHERE title LIKE '%?%' AND \"a?b\" = $1 AND id = $2"
        );
        assert_eq!(stmt.params, vec![Value::from("x"), Value::from(7)]);
    }

    #[test]
    fn test_raw_clause_escaped_quote_stays_inside_literal() {
        let mut spec = select("posts");
        spec.where_raw("note = 'it''s ?' AND id = ?", vec![Value::from(1)]);
        let stmt = render(&spec, Dialect::Sqlite);
        assert_eq!(
            stmt.sql,
            "SELECT \"posts\".* FROM \"posts\" WHERE note = 'it''s ?' AND id = ?1"
        );
        assert_eq!(stmt.params, vec![Value::from(1)]);
    }

    #[test]
    fn test_raw_clause_doubled_token_is_literal() {
        let mut spec = select("docs");
        spec.where_raw("meta ?? 'tag' AND id = ?", vec![Value::from(4)]);
        let stmt = render(&spec, Dialect::Postgres);
        assert_eq!(
            stmt.sql,
            "SELECT \"docs\".* FROM \"docs\" WHERE meta ? 'tag' AND id = $1"
        );
        assert_eq!(stmt.params, vec![Value::from(4)]);
    }

    #[test]
    fn test_limit_params_follow_where_params() {
        let mut spec = select("posts");
        spec.where_eq(row! { "status" => "active" })
            .order("name ASC")
            .limit(10, Some(10));

        let pg = render(&spec, Dialect::Postgres);
        assert_eq!(
            pg.sql,
            "SELECT \"posts\".* FROM \"posts\" WHERE \"status\" = $1 ORDER BY name ASC OFFSET $2 LIMIT $3"
        );
        assert_eq!(
            pg.params,
            vec![Value::from("active"), Value::BigInt(10), Value::BigInt(10)]
        );

        let lite = render(&spec, Dialect::Sqlite);
        assert!(lite.sql.ends_with("ORDER BY name ASC LIMIT ?3 OFFSET ?2"));

        let my = render(&spec, Dialect::Mysql);
        assert!(my.sql.ends_with("ORDER BY name ASC LIMIT ?, ?"));
    }

    #[test]
    fn test_projection_priority() {
        let mut spec = select("posts");
        spec.select("id, title");
        assert_eq!(
            render(&spec, Dialect::Postgres).sql,
            "SELECT id, title FROM \"posts\""
        );

        spec.distinct(&["author_id"]);
        assert_eq!(
            render(&spec, Dialect::Postgres).sql,
            "SELECT DISTINCT \"author_id\" FROM \"posts\""
        );
    }

    #[test]
    fn test_group_by() {
        let mut spec = select("posts");
        spec.select("author_id, COUNT(*)").group(&["author_id"]);
        assert_eq!(
            render(&spec, Dialect::Mysql).sql,
            "SELECT author_id, COUNT(*) FROM `posts` GROUP BY `author_id`"
        );
    }

    #[test]
    fn test_group_by_keeps_expressions_verbatim() {
        let mut spec = select("posts");
        spec.select("DATE(created_at), author_id, COUNT(*)")
            .group(&["DATE(created_at)", "author_id"]);
        assert_eq!(
            render(&spec, Dialect::Postgres).sql,
            "SELECT DATE(created_at), author_id, COUNT(*) FROM \"posts\" GROUP BY DATE(created_at), \"author_id\""
        );
    }

    #[test]
    fn test_count_ignores_order_group_and_limit() {
        let mut spec = select("posts");
        spec.where_eq(row! { "status" => "active" })
            .order("name")
            .group(&["status"])
            .limit(5, None);
        spec.verb = Verb::Count;

        let stmt = render(&spec, Dialect::Postgres);
        assert_eq!(
            stmt.sql,
            "SELECT COUNT(0) AS \"count\" FROM \"posts\" WHERE \"status\" = $1"
        );
        assert_eq!(stmt.params, vec![Value::from("active")]);
    }

    #[test]
    fn test_insert_in_mapping_order_with_returning() {
        let mut spec = select("users");
        spec.verb = Verb::Insert;
        spec.values = Some(row! { "name" => "Ada", "age" => 36 });

        let pg = render(&spec, Dialect::Postgres);
        assert_eq!(
            pg.sql,
            "INSERT INTO \"users\" (\"name\", \"age\") VALUES ($1, $2) RETURNING *"
        );
        assert_eq!(pg.params, vec![Value::from("Ada"), Value::from(36)]);

        let my = render(&spec, Dialect::Mysql);
        assert_eq!(my.sql, "INSERT INTO `users` (`name`, `age`) VALUES (?, ?)");

        spec.returning = false;
        assert!(!render(&spec, Dialect::Postgres).sql.contains("RETURNING"));
    }

    #[test]
    fn test_empty_insert_fallback() {
        let mut spec = select("events");
        spec.verb = Verb::Insert;
        spec.values = Some(Row::new());

        assert_eq!(
            render(&spec, Dialect::Postgres).sql,
            "INSERT INTO \"events\" DEFAULT VALUES RETURNING *"
        );
        assert_eq!(
            render(&spec, Dialect::Mysql).sql,
            "INSERT INTO `events` () VALUES ()"
        );
    }

    #[test]
    fn test_update_set_then_where() {
        let mut spec = select("users");
        spec.verb = Verb::Update;
        spec.values = Some(row! { "name" => "Grace", "age" => 45 });
        spec.where_eq(row! { "id" => 7 });

        let stmt = render(&spec, Dialect::Postgres);
        assert_eq!(
            stmt.sql,
            "UPDATE \"users\" SET \"name\" = $1, \"age\" = $2 WHERE \"id\" = $3"
        );
        assert_eq!(
            stmt.params,
            vec![Value::from("Grace"), Value::from(45), Value::from(7)]
        );
    }

    #[test]
    fn test_render_raw_for_each_dialect() {
        let params = [Value::from("a"), Value::from(2)];
        let sql = "SELECT * FROM t WHERE x = ? AND y > ?";
        assert_eq!(
            render_raw(sql, &params, Dialect::Sqlite).sql,
            "SELECT * FROM t WHERE x = ?1 AND y > ?2"
        );
        let my = render_raw(sql, &params, Dialect::Mysql);
        assert_eq!(my.sql, sql);
        assert_eq!(my.params, params.to_vec());
    }

    #[test]
    fn test_delete_where_only() {
        let mut spec = select("users");
        spec.verb = Verb::Delete;
        spec.where_eq(row! { "id" => vec![1_i64, 2] }).order("id").limit(1, None);

        let stmt = render(&spec, Dialect::Sqlite);
        assert_eq!(stmt.sql, "DELETE FROM \"users\" WHERE \"id\" IN (?1)");
        assert_eq!(stmt.params.len(), 1);
    }
}
