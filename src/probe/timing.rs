//! Phase-boundary timing.
//!
//! The runner marks each phase boundary on a [`PhaseClock`]; after cleanup
//! the report prints elapsed time between selected pairs of markers.

use std::collections::HashMap;
use std::io::{self, Write};
use std::time::{Duration, Instant};

/// Phase boundaries, in the order a full run passes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Start,
    PostConnect,
    PostEnhance,
    PostConnectionMetadata,
    PostMetadataOutput,
    PostStatementCreate,
    PostStatementEnhance,
    PostExecute,
    PostResultMetadata,
    PostIterate,
    PostUnenhance,
    Complete,
}

/// Lines printed in timing mode: label, from-marker, to-marker.
pub const TIMING_LINES: [(&str, Phase, Phase); 8] = [
    ("Time to Connect", Phase::Start, Phase::PostConnect),
    (
        "Time to get Connection Metadata",
        Phase::PostEnhance,
        Phase::PostConnectionMetadata,
    ),
    (
        "Time to display Connection Metadata",
        Phase::PostConnectionMetadata,
        Phase::PostMetadataOutput,
    ),
    (
        "Time to create statement",
        Phase::PostMetadataOutput,
        Phase::PostStatementCreate,
    ),
    (
        "Time to execute Query",
        Phase::PostStatementEnhance,
        Phase::PostExecute,
    ),
    (
        "Time to get Resultset Metadata",
        Phase::PostExecute,
        Phase::PostResultMetadata,
    ),
    (
        "Time to iterate over entire Resultset",
        Phase::PostResultMetadata,
        Phase::PostIterate,
    ),
    (
        "Time to unenhance connection",
        Phase::PostIterate,
        Phase::PostUnenhance,
    ),
];

/// Label of the total elapsed-time line.
pub const TOTAL_LABEL: &str = "Total Time";

/// Timestamps captured at phase boundaries.
#[derive(Debug, Clone, Default)]
pub struct PhaseClock {
    markers: HashMap<Phase, Instant>,
}

impl PhaseClock {
    /// Creates a clock with no markers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the current time for `phase`.
    pub fn mark(&mut self, phase: Phase) {
        self.mark_at(phase, Instant::now());
    }

    /// Records `at` for `phase`.
    pub fn mark_at(&mut self, phase: Phase, at: Instant) {
        self.markers.insert(phase, at);
    }

    /// Copies the marker of `source` onto `phase` (used for no-op phases).
    pub fn mark_same(&mut self, phase: Phase, source: Phase) {
        if let Some(at) = self.markers.get(&source).copied() {
            self.markers.insert(phase, at);
        }
    }

    /// Returns the marker for `phase`, if it was captured.
    pub fn get(&self, phase: Phase) -> Option<Instant> {
        self.markers.get(&phase).copied()
    }

    /// Absolute time between two markers. A missing marker counts as the
    /// run start; with no start either the result is zero.
    pub fn elapsed(&self, from: Phase, to: Phase) -> Duration {
        let start = self.get(Phase::Start);
        let (Some(a), Some(b)) = (self.get(from).or(start), self.get(to).or(start)) else {
            return Duration::ZERO;
        };
        b.checked_duration_since(a)
            .unwrap_or_else(|| a.duration_since(b))
    }

    /// Writes the timing report: every phase line plus the total in timing
    /// mode, only the total otherwise.
    pub fn write_report<W: Write>(&self, out: &mut W, long_timing_test: bool) -> io::Result<()> {
        if long_timing_test {
            for (label, from, to) in TIMING_LINES {
                write_elapsed(out, label, self.elapsed(from, to))?;
            }
        }
        write_elapsed(
            out,
            TOTAL_LABEL,
            self.elapsed(Phase::Start, Phase::Complete),
        )
    }
}

fn write_elapsed<W: Write>(out: &mut W, label: &str, elapsed: Duration) -> io::Result<()> {
    writeln!(out, "{label} - {}", format_elapsed(elapsed))
}

/// Renders a duration as `M minute(s), S second(s)`.
///
/// Hours are split off but never printed, so durations of an hour or more
/// wrap around: 3661 s renders as `1 minute(s), 1 second(s)`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let mut time_in_seconds = elapsed.as_secs();
    let hours = time_in_seconds / 3600;
    time_in_seconds -= hours * 3600;
    let minutes = time_in_seconds / 60;
    time_in_seconds -= minutes * 60;
    let seconds = time_in_seconds % 60;
    format!("{minutes} minute(s), {seconds} second(s)")
}
