//! SQLite integration tests.
//!
//! Runs the full probe against in-memory and on-disk SQLite databases,
//! loading settings from TOML files.

use super::common::{ambient, run_probe};
use db_probe::config::{keys, ConfigSource};
use db_probe::db::DriverRegistry;
use db_probe::error::EXIT_CONFIG_LOAD;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn test_sqlite_memory_from_config_file() {
    let config = write_config(
        r#"
[db]
sql = "SELECT 42 AS answer, 'hello' AS greeting"
driver = "sqlite"
url = "sqlite::memory:"
max_display_width = 3
"#,
    );
    let source = ConfigSource::File(config.path().to_path_buf());
    let output = run_probe(&source, &DriverRegistry::with_default_drivers()).await;

    assert_eq!(output.code, 0, "stderr: {}", output.stderr);
    assert!(output.stdout.contains("Database Product Name: SQLite\n"));
    assert!(output.stdout.contains("Column Count: 2\n"));
    assert!(output.stdout.contains("Column Name: answer / Value: 42\n"));
    assert!(output.stdout.contains("Column Name: greeting / Value: hel\n"));
}

#[tokio::test]
async fn test_sqlite_timing_mode_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("probe.db");
    let url = format!("sqlite://{}?mode=rwc", db_path.display());

    seed(&url).await;

    let source = ambient(&[
        (keys::SQL, "SELECT id, name FROM items ORDER BY id"),
        (keys::DRIVER, "org.sqlite.JDBC"),
        (keys::URL, url.as_str()),
        (keys::LONG_TIMING_TEST, "true"),
    ]);
    let output = run_probe(&source, &DriverRegistry::with_default_drivers()).await;

    assert_eq!(output.code, 0, "stderr: {}", output.stderr);
    assert!(output.stdout.contains("    Name: id\n"));
    assert!(output.stdout.contains("    Name: name\n"));
    assert!(output.stdout.contains("Column Count: 2\n"));
    assert!(!output.stdout.contains("No rows!"));
    assert!(output.stdout.contains("Time to iterate over entire Resultset - "));
}

async fn seed(url: &str) {
    use sqlx::Connection;
    let mut conn = sqlx::SqliteConnection::connect(url).await.unwrap();
    sqlx::raw_sql(
        "CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT);
         INSERT INTO items (name) VALUES ('a'), ('b'), ('c');",
    )
    .execute(&mut conn)
    .await
    .unwrap();
    conn.close().await.unwrap();
}

const FAILS_ON_SECOND_ROW: &str = "SELECT CASE WHEN x = 2 THEN abs(-9223372036854775808) ELSE x END AS v \
     FROM (SELECT 1 AS x UNION ALL SELECT 2)";

#[tokio::test]
async fn test_sqlite_first_row_does_not_evaluate_later_rows() {
    let source = ambient(&[
        (keys::SQL, FAILS_ON_SECOND_ROW),
        (keys::DRIVER, "sqlite"),
        (keys::URL, "sqlite::memory:"),
    ]);
    let output = run_probe(&source, &DriverRegistry::with_default_drivers()).await;

    assert_eq!(output.code, 0, "stderr: {}", output.stderr);
    assert!(output.stdout.contains("Column Name: v / Value: 1\n"));
    assert!(output.stdout.contains("Total Time - "));
}

#[tokio::test]
async fn test_sqlite_timing_mode_reports_late_row_failure() {
    let source = ambient(&[
        (keys::SQL, FAILS_ON_SECOND_ROW),
        (keys::DRIVER, "sqlite"),
        (keys::URL, "sqlite::memory:"),
        (keys::LONG_TIMING_TEST, "true"),
    ]);
    let output = run_probe(&source, &DriverRegistry::with_default_drivers()).await;

    assert_eq!(output.code, 9);
    assert!(output.stdout.contains("Column Count: 1\n"));
    assert!(output.stderr.contains("overflow"));
}

#[tokio::test]
async fn test_sqlite_query_error_exit_code() {
    let source = ambient(&[
        (keys::SQL, "SELECT * FROM nonexistent_table_xyz"),
        (keys::DRIVER, "sqlite"),
        (keys::URL, "sqlite::memory:"),
    ]);
    let output = run_probe(&source, &DriverRegistry::with_default_drivers()).await;

    assert_eq!(output.code, 9);
    assert!(output.stderr.contains("nonexistent_table_xyz"));
}

#[tokio::test]
async fn test_sqlite_connect_failure_exit_code() {
    let source = ambient(&[
        (keys::SQL, "SELECT 1"),
        (keys::DRIVER, "sqlite"),
        (keys::URL, "sqlite:///nonexistent/dir/probe.db?mode=ro"),
    ]);
    let output = run_probe(&source, &DriverRegistry::with_default_drivers()).await;

    assert_eq!(output.code, 6);
    assert!(output.stderr.starts_with("Warning - user not supplied"));
    assert!(output.stderr.contains("Failed to connect"));
}

#[tokio::test]
async fn test_missing_config_file() {
    let source = ConfigSource::File(PathBuf::from("/nonexistent/dbprobe.toml"));
    let output = run_probe(&source, &DriverRegistry::with_default_drivers()).await;

    assert_eq!(output.code, EXIT_CONFIG_LOAD);
    assert!(output.stdout.is_empty());
    assert!(output.stderr.contains("Error loading properties"));
}

#[tokio::test]
async fn test_malformed_config_file() {
    let config = write_config("[db\nsql = \"SELECT 1\"\n");
    let source = ConfigSource::File(config.path().to_path_buf());
    let output = run_probe(&source, &DriverRegistry::with_default_drivers()).await;

    assert_eq!(output.code, EXIT_CONFIG_LOAD);
    assert!(output.stdout.is_empty());
}
