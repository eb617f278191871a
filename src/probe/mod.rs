//! The probe run: load settings, connect, report metadata, execute one
//! query, inspect the result, release everything and report timings.

pub mod inspect;
pub mod timing;

pub use inspect::{InspectError, InspectSummary};
pub use timing::{format_elapsed, Phase, PhaseClock};

use crate::config::{ConfigSource, ProbeSettings};
use crate::db::{
    Connection, Cursor, DatabaseMetadata, Driver, DriverRegistry, DriverResult, Statement,
};
use crate::error::{ProbeError, Result};
use std::io::{self, Write};
use tracing::{debug, info, warn};

/// Resources acquired during a run, released in reverse order.
#[derive(Default)]
struct Resources {
    connection: Option<Box<dyn Connection>>,
    statement: Option<Box<dyn Statement>>,
    cursor: Option<Box<dyn Cursor>>,
}

impl Resources {
    /// Releases cursor, statement and connection. Each release is attempted
    /// regardless of how the previous one went; failures are only logged.
    async fn release(&mut self) {
        if let Some(mut cursor) = self.cursor.take() {
            log_release("cursor", cursor.close().await);
        }
        if let Some(mut statement) = self.statement.take() {
            log_release("statement", statement.close().await);
        }
        if let Some(mut connection) = self.connection.take() {
            log_release("connection", connection.close().await);
        }
    }
}

fn log_release(resource: &str, result: DriverResult<()>) {
    match result {
        Ok(()) => debug!("Released {resource}"),
        Err(e) => debug!("Ignoring failure while releasing {resource}: {e}"),
    }
}

/// Runs one probe and returns the process exit code.
///
/// Report lines go to `out`; warnings and failure causes go to `err`.
pub async fn run<O: Write, E: Write>(
    source: &ConfigSource,
    registry: &DriverRegistry,
    out: &mut O,
    err: &mut E,
) -> i32 {
    let settings = match source
        .load()
        .and_then(|props| ProbeSettings::from_properties(&props))
    {
        Ok(settings) => settings,
        Err(e) => return report_failure(err, &e),
    };

    for warning in settings.credential_warnings() {
        let _ = writeln!(err, "{warning}");
    }

    let driver = match registry.resolve(&settings.driver) {
        Ok(driver) => driver,
        Err(e) => return report_failure(err, &e),
    };
    info!("Using driver '{}' for {}", settings.driver, settings.display_url());

    let mut clock = PhaseClock::new();
    let mut resources = Resources::default();

    clock.mark(Phase::Start);
    let outcome = execute(&settings, driver.as_ref(), &mut resources, &mut clock, out).await;
    resources.release().await;
    clock.mark(Phase::Complete);

    match outcome {
        Ok(summary) => {
            debug!(
                "Read {} values from {} rows",
                summary.values_read, summary.rows_read
            );
            if let Err(e) = clock.write_report(out, settings.long_timing_test) {
                warn!("Failed to write timing report: {e}");
            }
            0
        }
        Err(e) => report_failure(err, &e),
    }
}

fn report_failure<E: Write>(err: &mut E, error: &ProbeError) -> i32 {
    debug!("{}: {}", error.category(), error);
    let _ = writeln!(err, "{error}");
    error.exit_code()
}

/// Runs the connection-bound phases, storing each acquired resource in
/// `resources` as soon as it exists.
async fn execute<O: Write>(
    settings: &ProbeSettings,
    driver: &dyn Driver,
    resources: &mut Resources,
    clock: &mut PhaseClock,
    out: &mut O,
) -> Result<InspectSummary> {
    let connection = resources
        .connection
        .insert(connect(driver, settings).await?);
    writeln!(out, "Connected").map_err(|e| ProbeError::connect(e.to_string()))?;
    clock.mark(Phase::PostConnect);
    clock.mark_same(Phase::PostEnhance, Phase::PostConnect);

    let metadata = connection
        .metadata()
        .await
        .map_err(|e| ProbeError::metadata(e.to_string()))?;
    clock.mark(Phase::PostConnectionMetadata);

    write_metadata(out, &metadata).map_err(|e| ProbeError::metadata(e.to_string()))?;
    clock.mark(Phase::PostMetadataOutput);

    let statement = resources.statement.insert(
        connection
            .create_statement()
            .await
            .map_err(|e| ProbeError::execution(e.to_string()))?,
    );
    clock.mark(Phase::PostStatementCreate);
    clock.mark_same(Phase::PostStatementEnhance, Phase::PostStatementCreate);

    writeln!(out, "Executing query: {}", settings.sql)
        .map_err(|e| ProbeError::execution(e.to_string()))?;
    let cursor = resources.cursor.insert(
        statement
            .execute_query(&settings.sql)
            .await
            .map_err(|e| ProbeError::execution(e.to_string()))?,
    );
    clock.mark(Phase::PostExecute);

    let inspected = if settings.long_timing_test {
        inspect::scan_all(&mut **cursor, settings.show_result_metadata, out, clock).await
    } else {
        inspect::show_first_row(&mut **cursor, settings.max_display_width, out, clock).await
    };
    let summary = inspected.map_err(|e| ProbeError::execution(e.to_string()))?;
    clock.mark_same(Phase::PostUnenhance, Phase::PostIterate);

    Ok(summary)
}

/// Opens the connection, choosing the connect variant from the credentials.
async fn connect(driver: &dyn Driver, settings: &ProbeSettings) -> Result<Box<dyn Connection>> {
    let result = match (settings.user.as_deref(), settings.password.as_deref()) {
        (None, None) => driver.connect(&settings.url).await,
        (user, password) => driver.connect_with(&settings.url, user, password).await,
    };
    result.map_err(|e| ProbeError::connect(e.to_string()))
}

fn write_metadata<W: Write>(out: &mut W, metadata: &DatabaseMetadata) -> io::Result<()> {
    writeln!(out, "Driver And Database Information")?;
    writeln!(out, "Driver Name: {}", metadata.driver_name)?;
    writeln!(out, "Driver Version: {}", metadata.driver_version)?;
    writeln!(out, "Protocol Version: {}", metadata.protocol_version())?;
    writeln!(out, "Database Product Name: {}", metadata.database_product_name)?;
    writeln!(
        out,
        "Database Product Version: {}",
        metadata.database_product_version
    )
}
