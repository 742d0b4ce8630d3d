//! The shared ORM context: registry plus configuration.

use std::sync::Arc;

use tabula_core::{Connection, Cx, Error, Outcome, Result, Row, Value};
use tabula_query::{Dialect, render_raw};
use tabula_schema::Registry;

use crate::config::OrmConfig;
use crate::exec;
use crate::model::Model;

/// Read-only state shared by every model handle and query.
///
/// Built once at startup and cloned around behind an `Arc`. Concurrent queries
/// share it freely; nothing in here is mutated after construction.
#[derive(Debug)]
pub struct Orm {
    registry: Registry,
    config: OrmConfig,
}

impl Orm {
    pub fn new(registry: Registry, config: OrmConfig) -> Arc<Self> {
        tracing::info!(
            dialect = ?config.dialect,
            types = registry.type_names().len(),
            "ORM context created"
        );
        Arc::new(Self { registry, config })
    }

    /// Handle for the registered type `type_name`.
    pub fn model(self: &Arc<Self>, type_name: &str) -> Result<Model> {
        let schema = Arc::clone(self.registry.schema(type_name)?);
        Ok(Model::new(Arc::clone(self), schema))
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &OrmConfig {
        &self.config
    }

    pub fn dialect(&self) -> Dialect {
        self.config.dialect
    }

    /// Run hand-written SQL returning rows. `?` tokens become placeholders.
    #[tracing::instrument(level = "debug", skip(self, cx, conn, params))]
    pub async fn raw_query<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        sql: &str,
        params: &[Value],
    ) -> Outcome<Vec<Row>, Error> {
        let stmt = render_raw(sql, params, self.dialect());
        exec::query(cx, conn, &stmt).await
    }

    /// Run hand-written SQL returning an affected-row count.
    #[tracing::instrument(level = "debug", skip(self, cx, conn, params))]
    pub async fn raw_execute<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        sql: &str,
        params: &[Value],
    ) -> Outcome<u64, Error> {
        let stmt = render_raw(sql, params, self.dialect());
        exec::execute(cx, conn, &stmt).await
    }
}
