//! Runtime configuration.

use serde::{Deserialize, Serialize};
use tabula_core::{Error, Result};
use tabula_query::Dialect;

/// Configuration for an [`Orm`](crate::Orm) context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrmConfig {
    /// SQL dialect of the connection queries are handed to.
    pub dialect: Dialect,
    pub pagination: PaginationConfig,
    /// Whether `create`/`update` stamp `created_at`/`updated_at` on schemas
    /// that declare them.
    pub timestamps: bool,
}

impl Default for OrmConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::Postgres,
            pagination: PaginationConfig::default(),
            timestamps: true,
        }
    }
}

impl OrmConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    ///
    /// ```
    /// use tabula::{Dialect, OrmConfig};
    ///
    /// let config = OrmConfig::from_json(r#"{"dialect": "sqlite"}"#).unwrap();
    /// assert_eq!(config.dialect, Dialect::Sqlite);
    /// assert!(config.timestamps);
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Custom(format!("invalid ORM config: {e}")))
    }

    #[must_use]
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    #[must_use]
    pub fn timestamps(mut self, enabled: bool) -> Self {
        self.timestamps = enabled;
        self
    }
}

/// Pagination defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    /// Maximum number of entries in the navigation window.
    pub max_links: u64,
    /// How many pages before the current one the window shows, at most.
    pub links_before_current: u64,
    /// Page size used by `page_number`.
    pub default_page_size: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            max_links: 10,
            links_before_current: 5,
            default_page_size: 20,
        }
    }
}
