//! Driver abstraction layer for db-probe.
//!
//! A [`Driver`] opens [`Connection`]s; a connection hands out a [`Statement`];
//! executing a statement yields a forward-only [`Cursor`]. Drivers are
//! registered by name in a [`DriverRegistry`] at startup and resolved from the
//! configured driver identifier.

mod fake;
mod postgres;
mod sqlite;
mod types;

pub use fake::{FakeCall, FakeDriver, FakeFailure};
pub use postgres::PostgresDriver;
pub use sqlite::SqliteDriver;
pub use types::{ColumnDescriptor, DatabaseMetadata, Row, SqlType, Value};

use crate::error::{ProbeError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Version of the sqlx driver layer, reported as the driver version.
pub const SQLX_VERSION: &str = "0.8";

/// Errors raised by drivers. The probe pipeline decides which
/// [`ProbeError`] category a driver error belongs to.
#[derive(Error, Debug)]
pub enum DriverError {
    /// An error reported by the database or the sqlx layer.
    #[error("{0}")]
    Database(String),

    /// The resource was used after being closed.
    #[error("{0} is closed")]
    Closed(&'static str),

    /// Any other driver failure.
    #[error("{0}")]
    Other(String),
}

impl DriverError {
    /// Creates a generic driver error with the given message.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

impl From<sqlx::Error> for DriverError {
    fn from(error: sqlx::Error) -> Self {
        Self::Database(format_sqlx_error(&error))
    }
}

/// Result type alias for driver operations.
pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// A database driver that can open connections.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Opens a connection using only the address.
    async fn connect(&self, url: &str) -> DriverResult<Box<dyn Connection>>;

    /// Opens a connection with explicit (possibly absent) credentials.
    async fn connect_with(
        &self,
        url: &str,
        user: Option<&str>,
        password: Option<&str>,
    ) -> DriverResult<Box<dyn Connection>>;
}

/// A live database session.
#[async_trait]
pub trait Connection: Send {
    /// Fetches driver and database identification fields.
    async fn metadata(&mut self) -> DriverResult<DatabaseMetadata>;

    /// Creates a statement bound to this connection.
    async fn create_statement(&mut self) -> DriverResult<Box<dyn Statement>>;

    /// Closes the connection.
    async fn close(&mut self) -> DriverResult<()>;
}

/// An execution context created from a connection.
#[async_trait]
pub trait Statement: Send {
    /// Executes one query and returns a cursor over its rows.
    async fn execute_query(&mut self, sql: &str) -> DriverResult<Box<dyn Cursor>>;

    /// Closes the statement.
    async fn close(&mut self) -> DriverResult<()>;
}

/// A forward-only, single-pass cursor over query results.
#[async_trait]
pub trait Cursor: Send {
    /// Returns the column descriptors of the result.
    async fn columns(&mut self) -> DriverResult<Vec<ColumnDescriptor>>;

    /// Advances to the next row. Returns false once the rows are exhausted.
    async fn next(&mut self) -> DriverResult<bool>;

    /// Reads column `index` (zero-based) of the current row.
    fn get(&mut self, index: usize) -> DriverResult<Value>;

    /// Closes the cursor.
    async fn close(&mut self) -> DriverResult<()>;
}

/// Drivers registered by name.
#[derive(Default, Clone)]
pub struct DriverRegistry {
    drivers: BTreeMap<String, Arc<dyn Driver>>,
}

impl DriverRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in sqlx drivers.
    pub fn with_default_drivers() -> Self {
        let mut registry = Self::new();

        let postgres: Arc<dyn Driver> = Arc::new(PostgresDriver);
        for name in ["postgres", "postgresql", "org.postgresql.Driver"] {
            registry.register(name, Arc::clone(&postgres));
        }

        let sqlite: Arc<dyn Driver> = Arc::new(SqliteDriver);
        for name in ["sqlite", "org.sqlite.JDBC"] {
            registry.register(name, Arc::clone(&sqlite));
        }

        registry
    }

    /// Registers `driver` under `name`, replacing any driver of that name.
    /// Names are matched case-insensitively.
    pub fn register(&mut self, name: &str, driver: Arc<dyn Driver>) {
        self.drivers.insert(name.to_lowercase(), driver);
    }

    /// Returns the registered names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.drivers.keys().map(String::as_str).collect()
    }

    /// Resolves a driver by name.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Driver>> {
        self.drivers
            .get(&name.to_lowercase())
            .cloned()
            .ok_or_else(|| {
                ProbeError::driver_load(
                    name,
                    format!(
                        "no driver registered under that name (available: {})",
                        self.names().join(", ")
                    ),
                )
            })
    }
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("drivers", &self.names())
            .finish()
    }
}

/// Formats a sqlx error, including server detail and hint when available.
fn format_sqlx_error(error: &sqlx::Error) -> String {
    let Some(db_error) = error.as_database_error() else {
        return error.to_string();
    };

    let mut result = String::from("ERROR: ");
    result.push_str(db_error.message());

    if let Some(code) = db_error.code() {
        result.push_str(" (");
        result.push_str(&code);
        result.push(')');
    }

    if let Some(pg_error) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
        if let Some(detail) = pg_error.detail() {
            result.push_str("\n  DETAIL: ");
            result.push_str(detail);
        }

        if let Some(hint) = pg_error.hint() {
            result.push_str("\n  HINT: ");
            result.push_str(hint);
        }
    }

    result
}
