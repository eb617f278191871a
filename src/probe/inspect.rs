//! Result inspection: a full timed scan, or a look at the first row.

use super::timing::{Phase, PhaseClock};
use crate::db::{ColumnDescriptor, Cursor, DriverError};
use std::io::Write;

/// Errors raised while inspecting a cursor.
#[derive(Debug, thiserror::Error)]
pub enum InspectError {
    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("Failed to write output: {0}")]
    Io(#[from] std::io::Error),
}

/// Counts gathered while inspecting a cursor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InspectSummary {
    pub column_count: usize,
    pub rows_read: usize,
    pub values_read: usize,
}

/// Reads every column of every row without printing any value.
///
/// Column descriptors are dumped first when `show_metadata` is set.
pub async fn scan_all<W: Write>(
    cursor: &mut dyn Cursor,
    show_metadata: bool,
    out: &mut W,
    clock: &mut PhaseClock,
) -> Result<InspectSummary, InspectError> {
    let columns = cursor.columns().await?;

    if show_metadata {
        writeln!(out, " *** Display ResultSet Metadata ***")?;
        for (i, column) in columns.iter().enumerate() {
            write_descriptor(out, i + 1, column)?;
        }
    }
    clock.mark(Phase::PostResultMetadata);

    let mut summary = InspectSummary {
        column_count: columns.len(),
        ..Default::default()
    };
    writeln!(out, "Column Count: {}", summary.column_count)?;

    while cursor.next().await? {
        summary.rows_read += 1;
        for i in 0..summary.column_count {
            std::hint::black_box(cursor.get(i)?);
            summary.values_read += 1;
        }
    }

    if summary.rows_read == 0 {
        writeln!(out, "No rows!")?;
    }
    clock.mark(Phase::PostIterate);

    Ok(summary)
}

/// Prints the first row, each value truncated to `max_width` characters.
pub async fn show_first_row<W: Write>(
    cursor: &mut dyn Cursor,
    max_width: usize,
    out: &mut W,
    clock: &mut PhaseClock,
) -> Result<InspectSummary, InspectError> {
    if !cursor.next().await? {
        writeln!(out, "No rows")?;
        return Ok(InspectSummary::default());
    }

    writeln!(out, "First row of data (max width={max_width})")?;
    let columns = cursor.columns().await?;
    writeln!(out, "Column Count: {}", columns.len())?;
    clock.mark(Phase::PostResultMetadata);

    for (i, column) in columns.iter().enumerate() {
        let value = cursor.get(i)?.to_display_string();
        writeln!(
            out,
            "Column Name: {} / Value: {}",
            column.name,
            truncate(&value, max_width)
        )?;
    }
    clock.mark(Phase::PostIterate);

    Ok(InspectSummary {
        column_count: columns.len(),
        rows_read: 1,
        values_read: columns.len(),
    })
}

/// Returns the first `max_width` characters of `value`.
pub fn truncate(value: &str, max_width: usize) -> &str {
    match value.char_indices().nth(max_width) {
        Some((end, _)) => &value[..end],
        None => value,
    }
}

fn write_descriptor<W: Write>(
    out: &mut W,
    number: usize,
    column: &ColumnDescriptor,
) -> std::io::Result<()> {
    writeln!(out, "    Column Number: {number}")?;
    writeln!(out, "    Name: {}", column.name)?;
    writeln!(out, "    Label: {}", column.label)?;
    writeln!(out, "    Type Number: {}", column.type_code)?;
    writeln!(out, "    Type Class: {}", column.class_name)?;
    writeln!(out, "    Type Name: {}", column.type_name)?;
    writeln!(out, "    Display Size: {}", column.display_size)?;
    writeln!(out, "    Scale: {}", column.scale)?;
    writeln!(out, "    --------")?;
    writeln!(out)
}
