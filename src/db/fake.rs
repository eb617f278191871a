//! Fake driver for testing.
//!
//! Serves a scripted result set and records every call it receives, so tests
//! can assert which connect variant was used, how many values were read and
//! in which order resources were released.

use super::{
    ColumnDescriptor, Connection, Cursor, DatabaseMetadata, Driver, DriverError, DriverResult,
    Row, Statement, Value,
};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// A call observed by the fake driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeCall {
    Connect {
        url: String,
    },
    ConnectWith {
        url: String,
        user: Option<String>,
        password: Option<String>,
    },
    Metadata,
    CreateStatement,
    Execute(String),
    Columns,
    Next,
    Get {
        row: usize,
        column: usize,
    },
    CloseCursor,
    CloseStatement,
    CloseConnection,
}

impl FakeCall {
    /// Returns true for the connect variants.
    pub fn is_connect(&self) -> bool {
        matches!(self, Self::Connect { .. } | Self::ConnectWith { .. })
    }

    /// Returns true for the three release calls.
    pub fn is_close(&self) -> bool {
        matches!(
            self,
            Self::CloseCursor | Self::CloseStatement | Self::CloseConnection
        )
    }
}

/// Operations the fake driver can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FakeFailure {
    Connect,
    Metadata,
    CreateStatement,
    Execute,
    Next,
    CloseCursor,
    CloseStatement,
    CloseConnection,
}

#[derive(Debug, Clone, Default)]
struct Script {
    metadata: DatabaseMetadata,
    columns: Vec<ColumnDescriptor>,
    rows: Vec<Row>,
    failures: HashSet<FakeFailure>,
}

#[derive(Debug)]
struct Shared {
    script: Script,
    calls: Mutex<Vec<FakeCall>>,
}

impl Shared {
    fn record(&self, call: FakeCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    fn check(&self, failure: FakeFailure) -> DriverResult<()> {
        if self.script.failures.contains(&failure) {
            Err(DriverError::other(format!("injected {failure:?} failure")))
        } else {
            Ok(())
        }
    }
}

/// A driver that serves a scripted result set and records calls.
///
/// Clones share the same script and call log.
#[derive(Debug, Clone)]
pub struct FakeDriver {
    shared: Arc<Shared>,
}

impl Default for FakeDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeDriver {
    /// Creates a fake driver returning a single `1` in column `?column?`.
    pub fn new() -> Self {
        let script = Script {
            metadata: DatabaseMetadata {
                driver_name: "fake".to_string(),
                driver_version: "1.0".to_string(),
                protocol_major_version: 1,
                protocol_minor_version: 0,
                database_product_name: "FakeDB".to_string(),
                database_product_version: "0.0.1".to_string(),
            },
            columns: vec![ColumnDescriptor::new("?column?", "INT4")],
            rows: vec![vec![Value::Int(1)]],
            failures: HashSet::new(),
        };
        Self::from_script(script)
    }

    fn from_script(script: Script) -> Self {
        Self {
            shared: Arc::new(Shared {
                script,
                calls: Mutex::new(Vec::new()),
            }),
        }
    }

    fn rebuild(self, edit: impl FnOnce(&mut Script)) -> Self {
        let mut script = match Arc::try_unwrap(self.shared) {
            Ok(shared) => shared.script,
            Err(shared) => shared.script.clone(),
        };
        edit(&mut script);
        Self::from_script(script)
    }

    /// Replaces the result set.
    pub fn with_result(self, columns: Vec<ColumnDescriptor>, rows: Vec<Row>) -> Self {
        self.rebuild(|script| {
            script.columns = columns;
            script.rows = rows;
        })
    }

    /// Makes the given operation fail.
    pub fn failing(self, failure: FakeFailure) -> Self {
        self.rebuild(|script| {
            script.failures.insert(failure);
        })
    }

    /// Returns every call recorded so far.
    pub fn calls(&self) -> Vec<FakeCall> {
        self.shared
            .calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    fn open(&self) -> DriverResult<Box<dyn Connection>> {
        self.shared.check(FakeFailure::Connect)?;
        Ok(Box::new(FakeConnection {
            shared: Arc::clone(&self.shared),
        }))
    }
}

#[async_trait]
impl Driver for FakeDriver {
    async fn connect(&self, url: &str) -> DriverResult<Box<dyn Connection>> {
        self.shared.record(FakeCall::Connect {
            url: url.to_string(),
        });
        self.open()
    }

    async fn connect_with(
        &self,
        url: &str,
        user: Option<&str>,
        password: Option<&str>,
    ) -> DriverResult<Box<dyn Connection>> {
        self.shared.record(FakeCall::ConnectWith {
            url: url.to_string(),
            user: user.map(String::from),
            password: password.map(String::from),
        });
        self.open()
    }
}

struct FakeConnection {
    shared: Arc<Shared>,
}

#[async_trait]
impl Connection for FakeConnection {
    async fn metadata(&mut self) -> DriverResult<DatabaseMetadata> {
        self.shared.record(FakeCall::Metadata);
        self.shared.check(FakeFailure::Metadata)?;
        Ok(self.shared.script.metadata.clone())
    }

    async fn create_statement(&mut self) -> DriverResult<Box<dyn Statement>> {
        self.shared.record(FakeCall::CreateStatement);
        self.shared.check(FakeFailure::CreateStatement)?;
        Ok(Box::new(FakeStatement {
            shared: Arc::clone(&self.shared),
        }))
    }

    async fn close(&mut self) -> DriverResult<()> {
        self.shared.record(FakeCall::CloseConnection);
        self.shared.check(FakeFailure::CloseConnection)
    }
}

struct FakeStatement {
    shared: Arc<Shared>,
}

#[async_trait]
impl Statement for FakeStatement {
    async fn execute_query(&mut self, sql: &str) -> DriverResult<Box<dyn Cursor>> {
        self.shared.record(FakeCall::Execute(sql.to_string()));
        self.shared.check(FakeFailure::Execute)?;
        Ok(Box::new(FakeCursor {
            shared: Arc::clone(&self.shared),
            position: None,
        }))
    }

    async fn close(&mut self) -> DriverResult<()> {
        self.shared.record(FakeCall::CloseStatement);
        self.shared.check(FakeFailure::CloseStatement)
    }
}

struct FakeCursor {
    shared: Arc<Shared>,
    /// Index of the current row; `None` before the first `next`.
    position: Option<usize>,
}

#[async_trait]
impl Cursor for FakeCursor {
    async fn columns(&mut self) -> DriverResult<Vec<ColumnDescriptor>> {
        self.shared.record(FakeCall::Columns);
        Ok(self.shared.script.columns.clone())
    }

    async fn next(&mut self) -> DriverResult<bool> {
        self.shared.record(FakeCall::Next);
        self.shared.check(FakeFailure::Next)?;
        let next = self.position.map_or(0, |p| p + 1);
        self.position = Some(next);
        Ok(next < self.shared.script.rows.len())
    }

    fn get(&mut self, index: usize) -> DriverResult<Value> {
        let row = self
            .position
            .filter(|&p| p < self.shared.script.rows.len())
            .ok_or_else(|| DriverError::other("No current row"))?;
        self.shared.record(FakeCall::Get { row, column: index });
        self.shared.script.rows[row]
            .get(index)
            .cloned()
            .ok_or_else(|| DriverError::other(format!("Column index {index} out of range")))
    }

    async fn close(&mut self) -> DriverResult<()> {
        self.shared.record(FakeCall::CloseCursor);
        self.shared.check(FakeFailure::CloseCursor)
    }
}
