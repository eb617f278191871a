//! Command-line argument parsing for db-probe.

use clap::error::ErrorKind;
use clap::Parser;
use db_probe::error::EXIT_USAGE;
use std::path::PathBuf;

/// Connect to a database, run one query, and report metadata, the first row
/// (or a full timed scan) and elapsed times.
///
/// Without CONFIG, settings are read from DBPROBE_* environment variables
/// (a .env file in the working directory is loaded first).
#[derive(Parser, Debug)]
#[command(name = "dbprobe")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// TOML configuration file (keys such as db.sql, db.driver, db.url)
    #[arg(value_name = "CONFIG")]
    pub config: Option<PathBuf>,

    /// Print the names of the registered drivers and exit
    #[arg(long)]
    pub list_drivers: bool,
}

impl Cli {
    /// Parses command-line arguments.
    ///
    /// Help and version requests also come back as errors; see [`usage_exit_code`].
    pub fn parse_args() -> Result<Self, clap::Error> {
        Self::try_parse()
    }
}

/// Exit code for a parse outcome that stops the run before it starts.
///
/// Help and version output are successful runs; every other parse error gets
/// its own code so it can't be mistaken for a missing setting.
pub fn usage_exit_code(err: &clap::Error) -> i32 {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
        _ => EXIT_USAGE,
    }
}
