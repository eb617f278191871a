//! End-to-end probe runs against the fake driver.
//!
//! Covers validation exit codes, failure codes for each phase, release order
//! and the output of both inspection modes.

use super::common::{ambient, fake_source, registry_with, run_probe};
use db_probe::config::keys;
use db_probe::db::{ColumnDescriptor, DriverRegistry, FakeCall, FakeDriver, FakeFailure, Value};
use pretty_assertions::assert_eq;

fn closes(driver: &FakeDriver) -> Vec<FakeCall> {
    driver
        .calls()
        .into_iter()
        .filter(FakeCall::is_close)
        .collect()
}

#[tokio::test]
async fn test_select_one_end_to_end() {
    let driver = FakeDriver::new();
    let output = run_probe(&fake_source(&[]), &registry_with(&driver)).await;

    assert_eq!(output.code, 0);
    assert!(!output.stdout.contains("No rows"));
    assert_eq!(output.stdout.matches("Column Name:").count(), 1);
    assert!(output
        .stdout
        .contains("Column Name: ?column? / Value: 1\n"));
    assert!(output.stdout.contains("Executing query: SELECT 1\n"));
    assert!(output.stdout.contains("Database Product Name: FakeDB\n"));
    assert!(output.stdout.contains("Total Time - "));
    assert!(!output.stdout.contains("Time to Connect"));
}

#[tokio::test]
async fn test_default_mode_output_order() {
    let driver = FakeDriver::new();
    let output = run_probe(&fake_source(&[]), &registry_with(&driver)).await;

    let lines: Vec<&str> = output.stdout.lines().collect();
    assert_eq!(
        &lines[..11],
        &[
            "Connected",
            "Driver And Database Information",
            "Driver Name: fake",
            "Driver Version: 1.0",
            "Protocol Version: 1.0",
            "Database Product Name: FakeDB",
            "Database Product Version: 0.0.1",
            "Executing query: SELECT 1",
            "First row of data (max width=50)",
            "Column Count: 1",
            "Column Name: ?column? / Value: 1",
        ]
    );
    assert!(lines[11].starts_with("Total Time - "));
    assert_eq!(lines.len(), 12);
}

#[tokio::test]
async fn test_successful_run_releases_in_order() {
    let driver = FakeDriver::new();
    run_probe(&fake_source(&[]), &registry_with(&driver)).await;

    assert_eq!(
        closes(&driver),
        vec![
            FakeCall::CloseCursor,
            FakeCall::CloseStatement,
            FakeCall::CloseConnection,
        ]
    );
}

#[tokio::test]
async fn test_release_failures_do_not_block_later_releases() {
    let driver = FakeDriver::new()
        .failing(FakeFailure::CloseCursor)
        .failing(FakeFailure::CloseStatement)
        .failing(FakeFailure::CloseConnection);
    let output = run_probe(&fake_source(&[]), &registry_with(&driver)).await;

    assert_eq!(output.code, 0);
    assert_eq!(
        closes(&driver),
        vec![
            FakeCall::CloseCursor,
            FakeCall::CloseStatement,
            FakeCall::CloseConnection,
        ]
    );
}

#[tokio::test]
async fn test_missing_required_settings() {
    let cases: [(&[(&str, &str)], i32); 3] = [
        (&[(keys::DRIVER, "fake"), (keys::URL, "fake://db")], 1),
        (&[(keys::SQL, "SELECT 1"), (keys::URL, "fake://db")], 2),
        (&[(keys::SQL, "SELECT 1"), (keys::DRIVER, "fake")], 3),
    ];

    for (pairs, expected) in cases {
        let driver = FakeDriver::new();
        let output = run_probe(&ambient(pairs), &registry_with(&driver)).await;

        assert_eq!(output.code, expected);
        assert!(driver.calls().is_empty(), "no driver call expected");
        assert!(output.stdout.is_empty());
        assert!(!output.stderr.is_empty());
    }
}

#[tokio::test]
async fn test_query_checked_before_driver_and_address() {
    let output = run_probe(&ambient(&[]), &DriverRegistry::new()).await;
    assert_eq!(output.code, 1);
    assert!(output.stderr.contains("SQL not specified"));
}

#[tokio::test]
async fn test_unknown_driver() {
    let driver = FakeDriver::new();
    let source = ambient(&[
        (keys::SQL, "SELECT 1"),
        (keys::DRIVER, "com.example.NoSuchDriver"),
        (keys::URL, "fake://db"),
    ]);
    let output = run_probe(&source, &registry_with(&driver)).await;

    assert_eq!(output.code, 4);
    assert!(output.stderr.contains("com.example.NoSuchDriver"));
    assert!(driver.calls().is_empty());
}

#[tokio::test]
async fn test_phase_failure_codes() {
    let cases = [
        (FakeFailure::Connect, 6),
        (FakeFailure::Metadata, 5),
        (FakeFailure::CreateStatement, 9),
        (FakeFailure::Execute, 9),
        (FakeFailure::Next, 9),
    ];

    for (failure, expected) in cases {
        let driver = FakeDriver::new().failing(failure);
        let output = run_probe(&fake_source(&[]), &registry_with(&driver)).await;

        assert_eq!(output.code, expected, "failure {failure:?}");
        assert!(
            output.stderr.contains("injected"),
            "cause should be printed for {failure:?}"
        );
        assert!(!output.stdout.contains("Total Time"));
    }
}

#[tokio::test]
async fn test_failures_release_what_was_acquired() {
    let driver = FakeDriver::new().failing(FakeFailure::Connect);
    run_probe(&fake_source(&[]), &registry_with(&driver)).await;
    assert!(closes(&driver).is_empty());

    let driver = FakeDriver::new().failing(FakeFailure::Metadata);
    run_probe(&fake_source(&[]), &registry_with(&driver)).await;
    assert_eq!(closes(&driver), vec![FakeCall::CloseConnection]);

    let driver = FakeDriver::new().failing(FakeFailure::Execute);
    run_probe(&fake_source(&[]), &registry_with(&driver)).await;
    assert_eq!(
        closes(&driver),
        vec![FakeCall::CloseStatement, FakeCall::CloseConnection]
    );

    let driver = FakeDriver::new().failing(FakeFailure::Next);
    run_probe(&fake_source(&[]), &registry_with(&driver)).await;
    assert_eq!(
        closes(&driver),
        vec![
            FakeCall::CloseCursor,
            FakeCall::CloseStatement,
            FakeCall::CloseConnection,
        ]
    );
}

#[tokio::test]
async fn test_no_rows_default_mode() {
    let driver =
        FakeDriver::new().with_result(vec![ColumnDescriptor::new("id", "INT4")], vec![]);
    let output = run_probe(&fake_source(&[]), &registry_with(&driver)).await;

    assert_eq!(output.code, 0);
    assert!(output.stdout.contains("No rows\n"));
    assert!(!output.stdout.contains("Column Name:"));
}

#[tokio::test]
async fn test_display_width_truncation() {
    let driver = FakeDriver::new().with_result(
        vec![
            ColumnDescriptor::new("payload", "TEXT"),
            ColumnDescriptor::new("nothing", "TEXT"),
        ],
        vec![vec![Value::from("x".repeat(80)), Value::Null]],
    );
    let output = run_probe(
        &fake_source(&[(keys::MAX_DISPLAY_WIDTH, "10")]),
        &registry_with(&driver),
    )
    .await;

    assert!(output.stdout.contains("First row of data (max width=10)\n"));
    assert!(output
        .stdout
        .contains(&format!("Column Name: payload / Value: {}\n", "x".repeat(10))));
    assert!(output.stdout.contains("Column Name: nothing / Value: null\n"));
}

#[tokio::test]
async fn test_default_width_is_fifty() {
    let driver = FakeDriver::new().with_result(
        vec![ColumnDescriptor::new("payload", "TEXT")],
        vec![vec![Value::from("y".repeat(80))]],
    );
    let output = run_probe(&fake_source(&[]), &registry_with(&driver)).await;

    let line = output
        .stdout
        .lines()
        .find(|line| line.starts_with("Column Name: payload"))
        .unwrap();
    assert_eq!(line, format!("Column Name: payload / Value: {}", "y".repeat(50)));
}

#[tokio::test]
async fn test_timing_mode_scans_everything() {
    let rows: Vec<Vec<Value>> = (0..4)
        .map(|i| vec![Value::Int(i), Value::from(format!("row {i}")), Value::Null])
        .collect();
    let driver = FakeDriver::new().with_result(
        vec![
            ColumnDescriptor::new("id", "INT8"),
            ColumnDescriptor::new("label", "VARCHAR"),
            ColumnDescriptor::new("extra", "TEXT"),
        ],
        rows,
    );
    let output = run_probe(
        &fake_source(&[(keys::LONG_TIMING_TEST, "true")]),
        &registry_with(&driver),
    )
    .await;

    assert_eq!(output.code, 0);

    let gets = driver
        .calls()
        .into_iter()
        .filter(|call| matches!(call, FakeCall::Get { .. }))
        .count();
    assert_eq!(gets, 12);

    assert!(output.stdout.contains(" *** Display ResultSet Metadata ***\n"));
    assert!(output.stdout.contains("Column Count: 3\n"));
    assert!(!output.stdout.contains("Column Name:"));
    assert!(!output.stdout.contains("row 1"));
    assert!(!output.stdout.contains("No rows!"));

    for label in [
        "Time to Connect - ",
        "Time to get Connection Metadata - ",
        "Time to display Connection Metadata - ",
        "Time to create statement - ",
        "Time to execute Query - ",
        "Time to get Resultset Metadata - ",
        "Time to iterate over entire Resultset - ",
        "Time to unenhance connection - ",
        "Total Time - ",
    ] {
        assert_eq!(output.stdout.matches(label).count(), 1, "{label}");
    }
}

#[tokio::test]
async fn test_timing_mode_without_metadata_dump() {
    let driver = FakeDriver::new();
    let output = run_probe(
        &fake_source(&[
            (keys::LONG_TIMING_TEST, "TRUE"),
            (keys::SHOW_RESULT_METADATA, "false"),
        ]),
        &registry_with(&driver),
    )
    .await;

    assert_eq!(output.code, 0);
    assert!(!output.stdout.contains("Display ResultSet Metadata"));
    assert!(output.stdout.contains("Column Count: 1\n"));
}

#[tokio::test]
async fn test_timing_mode_no_rows() {
    let driver =
        FakeDriver::new().with_result(vec![ColumnDescriptor::new("id", "INT4")], vec![]);
    let output = run_probe(
        &fake_source(&[(keys::LONG_TIMING_TEST, "true")]),
        &registry_with(&driver),
    )
    .await;

    assert_eq!(output.code, 0);
    assert!(output.stdout.contains("No rows!\n"));
}
