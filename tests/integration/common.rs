//! Shared helpers for integration tests.

use db_probe::config::{keys, ConfigSource, Properties};
use db_probe::db::{DriverRegistry, FakeDriver};
use std::sync::Arc;

/// Output captured from one probe run.
pub struct ProbeOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Builds an ambient config source from key/value pairs.
pub fn ambient(pairs: &[(&str, &str)]) -> ConfigSource {
    ConfigSource::Ambient(pairs.iter().copied().collect::<Properties>())
}

/// Ambient settings selecting the `fake` driver, plus `extra` pairs.
pub fn fake_source(extra: &[(&str, &str)]) -> ConfigSource {
    let mut pairs = vec![
        (keys::SQL, "SELECT 1"),
        (keys::DRIVER, "fake"),
        (keys::URL, "fake://localhost/test"),
    ];
    pairs.extend_from_slice(extra);
    ambient(&pairs)
}

/// Registry holding `driver` under the name `fake`.
pub fn registry_with(driver: &FakeDriver) -> DriverRegistry {
    let mut registry = DriverRegistry::new();
    registry.register("fake", Arc::new(driver.clone()));
    registry
}

/// Runs a probe and captures its output.
pub async fn run_probe(source: &ConfigSource, registry: &DriverRegistry) -> ProbeOutput {
    let mut out = Vec::new();
    let mut err = Vec::new();
    let code = db_probe::probe::run(source, registry, &mut out, &mut err).await;
    ProbeOutput {
        code,
        stdout: String::from_utf8(out).unwrap(),
        stderr: String::from_utf8(err).unwrap(),
    }
}
