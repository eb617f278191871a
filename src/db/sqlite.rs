//! SQLite driver built on sqlx.
//!
//! The connection is handed to a row reader task for the life of a cursor.
//! The task steps the query only when the cursor asks for the next row.

use super::{
    ColumnDescriptor, Connection, Cursor, DatabaseMetadata, Driver, DriverError, DriverResult,
    Statement, Value, SQLX_VERSION,
};
use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{
    Column as _, ConnectOptions, Connection as _, Executor, Row as _, Statement as _, TypeInfo,
    ValueRef,
};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tracing::debug;

type SharedConnection = Arc<Mutex<Option<SqliteConnection>>>;

/// One pull from the row reader: the next row, `None` at the end, or the
/// error raised while stepping the query.
type RowRequest = oneshot::Sender<DriverResult<Option<SqliteRow>>>;

/// SQLite driver.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteDriver;

#[async_trait]
impl Driver for SqliteDriver {
    async fn connect(&self, url: &str) -> DriverResult<Box<dyn Connection>> {
        let conn = SqliteConnectOptions::from_str(url)?.connect().await?;
        debug!("Opened SQLite database");
        Ok(Box::new(SqliteProbeConnection {
            inner: Arc::new(Mutex::new(Some(conn))),
        }))
    }

    async fn connect_with(
        &self,
        url: &str,
        user: Option<&str>,
        password: Option<&str>,
    ) -> DriverResult<Box<dyn Connection>> {
        if user.is_some() || password.is_some() {
            debug!("SQLite has no authentication; ignoring supplied credentials");
        }
        self.connect(url).await
    }
}

struct SqliteProbeConnection {
    inner: SharedConnection,
}

#[async_trait]
impl Connection for SqliteProbeConnection {
    async fn metadata(&mut self) -> DriverResult<DatabaseMetadata> {
        let mut guard = self.inner.lock().await;
        let conn = guard.as_mut().ok_or(DriverError::Closed("connection"))?;

        let version: String = sqlx::query_scalar("SELECT sqlite_version()")
            .fetch_one(&mut *conn)
            .await?;
        let (major, minor) = parse_major_minor(&version);

        Ok(DatabaseMetadata {
            driver_name: "sqlx-sqlite".to_string(),
            driver_version: SQLX_VERSION.to_string(),
            protocol_major_version: major,
            protocol_minor_version: minor,
            database_product_name: "SQLite".to_string(),
            database_product_version: version,
        })
    }

    async fn create_statement(&mut self) -> DriverResult<Box<dyn Statement>> {
        if self.inner.lock().await.is_none() {
            return Err(DriverError::Closed("connection"));
        }
        Ok(Box::new(SqliteProbeStatement {
            inner: Arc::clone(&self.inner),
            closed: false,
        }))
    }

    async fn close(&mut self) -> DriverResult<()> {
        if let Some(conn) = self.inner.lock().await.take() {
            conn.close().await?;
        }
        Ok(())
    }
}

struct SqliteProbeStatement {
    inner: SharedConnection,
    closed: bool,
}

#[async_trait]
impl Statement for SqliteProbeStatement {
    async fn execute_query(&mut self, sql: &str) -> DriverResult<Box<dyn Cursor>> {
        if self.closed {
            return Err(DriverError::Closed("statement"));
        }

        let mut guard = Arc::clone(&self.inner).lock_owned().await;
        let conn = guard.as_mut().ok_or(DriverError::Closed("connection"))?;

        let prepared = Executor::prepare(&mut *conn, sql).await?;
        let columns: Vec<ColumnDescriptor> = prepared
            .columns()
            .iter()
            .map(|col| ColumnDescriptor::new(col.name(), col.type_info().name()))
            .collect();

        if columns.is_empty() {
            return Err(DriverError::other("The query did not return a result set"));
        }

        let (requests, pending) = mpsc::channel(1);
        let reader = tokio::spawn(read_rows(guard, sql.to_string(), pending));

        Ok(Box::new(SqliteCursor {
            columns,
            requests: Some(requests),
            reader: Some(reader),
            current: None,
            exhausted: false,
        }))
    }

    async fn close(&mut self) -> DriverResult<()> {
        self.closed = true;
        Ok(())
    }
}

/// Steps the query once per request, holding the connection until the
/// result is exhausted, fails, or the cursor hangs up.
async fn read_rows(
    mut guard: OwnedMutexGuard<Option<SqliteConnection>>,
    sql: String,
    mut pending: mpsc::Receiver<RowRequest>,
) {
    let Some(conn) = guard.as_mut() else {
        return;
    };
    let mut rows = sqlx::query(&sql).fetch(&mut *conn);

    while let Some(reply) = pending.recv().await {
        let next = rows.try_next().await.map_err(DriverError::from);
        let finished = !matches!(next, Ok(Some(_)));
        let _ = reply.send(next);
        if finished {
            break;
        }
    }
    debug!("SQLite row reader finished");
}

struct SqliteCursor {
    columns: Vec<ColumnDescriptor>,
    requests: Option<mpsc::Sender<RowRequest>>,
    reader: Option<JoinHandle<()>>,
    current: Option<SqliteRow>,
    exhausted: bool,
}

#[async_trait]
impl Cursor for SqliteCursor {
    async fn columns(&mut self) -> DriverResult<Vec<ColumnDescriptor>> {
        Ok(self.columns.clone())
    }

    async fn next(&mut self) -> DriverResult<bool> {
        let requests = self.requests.as_ref().ok_or(DriverError::Closed("cursor"))?;
        self.current = None;
        if self.exhausted {
            return Ok(false);
        }

        let (reply, response) = oneshot::channel();
        let next = match requests.send(reply).await {
            Ok(()) => response
                .await
                .map_err(|_| DriverError::other("SQLite row reader stopped unexpectedly"))?,
            Err(_) => Err(DriverError::other("SQLite row reader stopped unexpectedly")),
        };

        match next {
            Ok(Some(row)) => {
                self.current = Some(row);
                Ok(true)
            }
            Ok(None) => {
                self.exhausted = true;
                Ok(false)
            }
            Err(e) => {
                self.exhausted = true;
                Err(e)
            }
        }
    }

    fn get(&mut self, index: usize) -> DriverResult<Value> {
        let row = self
            .current
            .as_ref()
            .ok_or_else(|| DriverError::other("No current row"))?;
        convert_value(row, index)
    }

    async fn close(&mut self) -> DriverResult<()> {
        self.current = None;
        // Hanging up ends the reader, which hands the connection back
        self.requests = None;
        if let Some(reader) = self.reader.take() {
            reader
                .await
                .map_err(|e| DriverError::other(format!("SQLite row reader failed: {e}")))?;
        }
        Ok(())
    }
}

/// Converts a value using its storage class, which may differ per row.
fn convert_value(row: &SqliteRow, index: usize) -> DriverResult<Value> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let type_name = raw.type_info().name().to_uppercase();

    let value = match type_name.as_str() {
        "BOOLEAN" => row.try_get_unchecked::<bool, _>(index).map(Value::Bool),
        "INTEGER" | "INT8" | "BIGINT" => row.try_get_unchecked::<i64, _>(index).map(Value::Int),
        "REAL" => row.try_get_unchecked::<f64, _>(index).map(Value::Float),
        "BLOB" => row.try_get_unchecked::<Vec<u8>, _>(index).map(Value::Bytes),
        _ => row.try_get_unchecked::<String, _>(index).map(Value::String),
    };

    Ok(value?)
}

fn parse_major_minor(version: &str) -> (u32, u32) {
    let mut parts = version.split('.').map(|p| p.trim().parse::<u32>().unwrap_or(0));
    (parts.next().unwrap_or(0), parts.next().unwrap_or(0))
}
