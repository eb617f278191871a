//! PostgreSQL driver built on sqlx.
//!
//! The cursor is a server-side `NO SCROLL` cursor declared inside a
//! transaction and read forward in batches, so large results are never
//! materialized on the client.

use super::{
    ColumnDescriptor, Connection, Cursor, DatabaseMetadata, Driver, DriverError, DriverResult,
    Statement, Value, SQLX_VERSION,
};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow};
use sqlx::{
    Column as _, ConnectOptions, Connection as _, Executor, Row as _, Statement as _, TypeInfo,
    ValueRef,
};
use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Rows fetched from the server cursor per round trip.
const FETCH_SIZE: usize = 100;

/// Name of the server-side cursor.
const CURSOR_NAME: &str = "dbprobe_cursor";

/// Frontend/backend protocol version spoken by sqlx.
const PROTOCOL_VERSION: (u32, u32) = (3, 0);

type SharedConnection = Arc<Mutex<Option<PgConnection>>>;

/// PostgreSQL driver.
#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresDriver;

impl PostgresDriver {
    async fn open(&self, options: PgConnectOptions) -> DriverResult<Box<dyn Connection>> {
        let conn = options.connect().await?;
        debug!("Connected to PostgreSQL");
        Ok(Box::new(PostgresConnection {
            inner: Arc::new(Mutex::new(Some(conn))),
        }))
    }
}

fn parse_options(url: &str) -> DriverResult<PgConnectOptions> {
    Ok(PgConnectOptions::from_str(url)?)
}

#[async_trait]
impl Driver for PostgresDriver {
    async fn connect(&self, url: &str) -> DriverResult<Box<dyn Connection>> {
        self.open(parse_options(url)?).await
    }

    async fn connect_with(
        &self,
        url: &str,
        user: Option<&str>,
        password: Option<&str>,
    ) -> DriverResult<Box<dyn Connection>> {
        let mut options = parse_options(url)?;
        if let Some(user) = user {
            options = options.username(user);
        }
        if let Some(password) = password {
            options = options.password(password);
        }
        self.open(options).await
    }
}

struct PostgresConnection {
    inner: SharedConnection,
}

#[async_trait]
impl Connection for PostgresConnection {
    async fn metadata(&mut self) -> DriverResult<DatabaseMetadata> {
        let mut guard = self.inner.lock().await;
        let conn = guard.as_mut().ok_or(DriverError::Closed("connection"))?;

        let server_version: String = sqlx::query_scalar("SHOW server_version")
            .fetch_one(&mut *conn)
            .await?;

        Ok(DatabaseMetadata {
            driver_name: "sqlx-postgres".to_string(),
            driver_version: SQLX_VERSION.to_string(),
            protocol_major_version: PROTOCOL_VERSION.0,
            protocol_minor_version: PROTOCOL_VERSION.1,
            database_product_name: "PostgreSQL".to_string(),
            database_product_version: server_version,
        })
    }

    async fn create_statement(&mut self) -> DriverResult<Box<dyn Statement>> {
        if self.inner.lock().await.is_none() {
            return Err(DriverError::Closed("connection"));
        }
        Ok(Box::new(PostgresStatement {
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

struct PostgresStatement {
    inner: SharedConnection,
    closed: bool,
}

#[async_trait]
impl Statement for PostgresStatement {
    async fn execute_query(&mut self, sql: &str) -> DriverResult<Box<dyn Cursor>> {
        if self.closed {
            return Err(DriverError::Closed("statement"));
        }

        let mut guard = self.inner.lock().await;
        let conn = guard.as_mut().ok_or(DriverError::Closed("connection"))?;

        let sql = sql.trim().trim_end_matches(';').trim_end();

        let prepared = Executor::prepare(&mut *conn, sql).await?;
        let columns: Vec<ColumnDescriptor> = prepared
            .columns()
            .iter()
            .map(|col| ColumnDescriptor::new(col.name(), col.type_info().name()))
            .collect();

        if columns.is_empty() {
            return Err(DriverError::other("The query did not return a result set"));
        }

        (&mut *conn).execute(sqlx::raw_sql("BEGIN")).await?;

        let declare = format!("DECLARE {CURSOR_NAME} NO SCROLL CURSOR FOR {sql}");
        if let Err(e) = (&mut *conn).execute(sqlx::raw_sql(&declare)).await {
            if let Err(rollback) = (&mut *conn).execute(sqlx::raw_sql("ROLLBACK")).await {
                debug!("Ignoring rollback failure: {rollback}");
            }
            return Err(e.into());
        }

        Ok(Box::new(PostgresCursor {
            inner: Arc::clone(&self.inner),
            columns,
            batch: VecDeque::new(),
            current: None,
            exhausted: false,
            open: true,
        }))
    }

    async fn close(&mut self) -> DriverResult<()> {
        self.closed = true;
        Ok(())
    }
}

struct PostgresCursor {
    inner: SharedConnection,
    columns: Vec<ColumnDescriptor>,
    batch: VecDeque<PgRow>,
    current: Option<PgRow>,
    exhausted: bool,
    open: bool,
}

impl PostgresCursor {
    async fn fetch_batch(&mut self) -> DriverResult<()> {
        let mut guard = self.inner.lock().await;
        let conn = guard.as_mut().ok_or(DriverError::Closed("connection"))?;

        // Simple-protocol rows arrive in text format, which every type can be read from
        let fetch = format!("FETCH FORWARD {FETCH_SIZE} FROM {CURSOR_NAME}");
        let rows = (&mut *conn).fetch_all(sqlx::raw_sql(&fetch)).await?;

        debug!("Fetched {} rows from cursor", rows.len());
        if rows.len() < FETCH_SIZE {
            self.exhausted = true;
        }
        self.batch.extend(rows);
        Ok(())
    }
}

#[async_trait]
impl Cursor for PostgresCursor {
    async fn columns(&mut self) -> DriverResult<Vec<ColumnDescriptor>> {
        Ok(self.columns.clone())
    }

    async fn next(&mut self) -> DriverResult<bool> {
        if !self.open {
            return Err(DriverError::Closed("cursor"));
        }
        if self.batch.is_empty() && !self.exhausted {
            self.fetch_batch().await?;
        }
        self.current = self.batch.pop_front();
        Ok(self.current.is_some())
    }

    fn get(&mut self, index: usize) -> DriverResult<Value> {
        let row = self
            .current
            .as_ref()
            .ok_or_else(|| DriverError::other("No current row"))?;
        convert_value(row, index)
    }

    async fn close(&mut self) -> DriverResult<()> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        self.batch.clear();
        self.current = None;

        let mut guard = self.inner.lock().await;
        let conn = guard.as_mut().ok_or(DriverError::Closed("connection"))?;

        let close_result = (&mut *conn).execute(sqlx::raw_sql(&format!("CLOSE {CURSOR_NAME}")))
            .await;
        // COMMIT ends the transaction even when CLOSE failed (it rolls back an aborted one)
        let commit_result = (&mut *conn).execute(sqlx::raw_sql("COMMIT")).await;

        close_result?;
        commit_result?;
        Ok(())
    }
}

/// Converts a single column value from a PgRow to our Value type.
fn convert_value(row: &PgRow, index: usize) -> DriverResult<Value> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let type_name = raw.type_info().name().to_uppercase();

    let value = match type_name.as_str() {
        "BOOL" => row.try_get::<bool, _>(index).map(Value::Bool),
        "INT2" => row.try_get::<i16, _>(index).map(|v| Value::Int(v.into())),
        "INT4" => row.try_get::<i32, _>(index).map(|v| Value::Int(v.into())),
        "INT8" => row.try_get::<i64, _>(index).map(Value::Int),
        "FLOAT4" => row.try_get::<f32, _>(index).map(|v| Value::Float(v.into())),
        "FLOAT8" => row.try_get::<f64, _>(index).map(Value::Float),
        "BYTEA" => row.try_get::<Vec<u8>, _>(index).map(Value::Bytes),
        // Text-format values of any other type read back as their string form
        _ => row.try_get_unchecked::<String, _>(index).map(Value::String),
    };

    Ok(value?)
}
