//! Error types.

use std::fmt;

/// Convenience alias used across the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// Every failure the ORM core can report.
///
/// Schema, association and scope errors are programming errors and are never
/// retried. Driver errors are passed through exactly as the driver raised them.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Malformed schema definition, raised at registration time.
    Schema(String),
    /// A type name that was never registered.
    UnknownModel(String),
    /// `includes()` named an association the schema does not declare.
    UnknownAssociation { model: String, name: String },
    /// A requested scope is not defined on the schema.
    UnknownScope { model: String, name: String },
    /// Failure surfaced by the database driver.
    Driver(DriverError),
    /// Anything else.
    Custom(String),
}

impl Error {
    pub fn schema(message: impl Into<String>) -> Self {
        Error::Schema(message.into())
    }

    pub fn driver(message: impl Into<String>) -> Self {
        Error::Driver(DriverError::new(message))
    }

    #[must_use]
    pub const fn is_driver(&self) -> bool {
        matches!(self, Error::Driver(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Schema(msg) => write!(f, "schema error: {msg}"),
            Error::UnknownModel(name) => write!(f, "unknown model '{name}'"),
            Error::UnknownAssociation { model, name } => {
                write!(f, "missing association '{name}' on '{model}' schema")
            }
            Error::UnknownScope { model, name } => {
                write!(f, "missing scope '{name}' on '{model}' schema")
            }
            Error::Driver(err) => write!(f, "{err}"),
            Error::Custom(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Driver(err) => Some(err),
            _ => None,
        }
    }
}

/// Error raised by a `Connection`: connection loss, constraint violation,
/// syntax error and so on.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverError {
    pub message: String,
    /// The statement that failed, when the driver reports it.
    pub sql: Option<String>,
}

impl DriverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            sql: None,
        }
    }

    #[must_use]
    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sql {
            Some(sql) => write!(f, "database error: {} (sql: {sql})", self.message),
            None => write!(f, "database error: {}", self.message),
        }
    }
}

impl std::error::Error for DriverError {}

impl From<DriverError> for Error {
    fn from(err: DriverError) -> Self {
        Error::Driver(err)
    }
}
