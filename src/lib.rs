//! db-probe - Connect to a database, run one query, report what happened.
//!
//! This library exposes the core modules for use by the binary and in
//! integration tests.

pub mod config;
pub mod db;
pub mod error;
pub mod probe;
