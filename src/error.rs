//! Error types for db-probe.
//!
//! Every fatal failure of a probe run maps to one variant, and every variant
//! maps to one process exit code.

use thiserror::Error;

/// Exit code used when the configuration file cannot be loaded.
pub const EXIT_CONFIG_LOAD: i32 = -9;

/// Exit code used when the tool itself fails to start (e.g. no async runtime).
pub const EXIT_INTERNAL: i32 = 70;

/// Exit code used when the command line cannot be parsed.
pub const EXIT_USAGE: i32 = 64;

/// A required setting that was absent from the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingSetting {
    /// `db.sql`
    Query,
    /// `db.driver`
    Driver,
    /// `db.url`
    Address,
}

impl MissingSetting {
    /// Returns the message shown to the user for this missing setting.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Query => {
                "SQL not specified - you must supply db.sql=<some select> to specify your SQL."
            }
            Self::Driver => {
                "Driver not specified. You must supply db.driver=<some driver> to select a registered database driver."
            }
            Self::Address => {
                "Database URL not specified. You must supply db.url=<some url> to specify the connection address."
            }
        }
    }
}

/// Main error type for probe runs.
#[derive(Error, Debug)]
pub enum ProbeError {
    /// The configuration file was unreadable or malformed.
    #[error("Error loading properties. Aborting. ({0})")]
    ConfigLoad(String),

    /// A required setting was not supplied.
    #[error("{}", .0.message())]
    MissingSetting(MissingSetting),

    /// The driver name did not resolve to a registered driver.
    #[error("Failed to load driver {driver}: {cause}")]
    DriverLoad { driver: String, cause: String },

    /// Opening the connection failed.
    #[error("Failed to connect: {0}")]
    Connect(String),

    /// Connection metadata could not be fetched.
    #[error("Failed to obtain Database Metadata: {0}")]
    Metadata(String),

    /// Statement creation, execution or result iteration failed.
    #[error("Failed to execute: {0}")]
    Execution(String),
}

impl ProbeError {
    /// Creates a configuration load error with the given message.
    pub fn config_load(msg: impl Into<String>) -> Self {
        Self::ConfigLoad(msg.into())
    }

    /// Creates a driver load error.
    pub fn driver_load(driver: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::DriverLoad {
            driver: driver.into(),
            cause: cause.into(),
        }
    }

    /// Creates a connection error with the given message.
    pub fn connect(msg: impl Into<String>) -> Self {
        Self::Connect(msg.into())
    }

    /// Creates a metadata error with the given message.
    pub fn metadata(msg: impl Into<String>) -> Self {
        Self::Metadata(msg.into())
    }

    /// Creates an execution error with the given message.
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// Returns the process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConfigLoad(_) => EXIT_CONFIG_LOAD,
            Self::MissingSetting(MissingSetting::Query) => 1,
            Self::MissingSetting(MissingSetting::Driver) => 2,
            Self::MissingSetting(MissingSetting::Address) => 3,
            Self::DriverLoad { .. } => 4,
            Self::Metadata(_) => 5,
            Self::Connect(_) => 6,
            Self::Execution(_) => 9,
        }
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::ConfigLoad(_) => "Configuration Error",
            Self::MissingSetting(_) => "Validation Error",
            Self::DriverLoad { .. } => "Driver Error",
            Self::Connect(_) => "Connection Error",
            Self::Metadata(_) => "Metadata Error",
            Self::Execution(_) => "Execution Error",
        }
    }
}

/// Result type alias using ProbeError.
pub type Result<T> = std::result::Result<T, ProbeError>;
