//! Configuration management for db-probe.
//!
//! Settings are a flat mapping of dotted keys to string values. They come
//! either from a TOML file (nested tables are flattened into dotted keys) or
//! from an ambient key/value source handed to the entry point, usually built
//! from `DBPROBE_*` environment variables.

use crate::error::{MissingSetting, ProbeError, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use url::Url;

/// Well-known configuration keys.
pub mod keys {
    pub const SQL: &str = "db.sql";
    pub const DRIVER: &str = "db.driver";
    pub const URL: &str = "db.url";
    pub const USER: &str = "db.user";
    pub const PASSWORD: &str = "db.password";
    pub const MAX_DISPLAY_WIDTH: &str = "db.max_display_width";
    pub const LONG_TIMING_TEST: &str = "db.long_timing_test";
    pub const SHOW_RESULT_METADATA: &str = "db.show_result_metadata";
}

/// Prefix of environment variables that feed the ambient configuration.
pub const ENV_PREFIX: &str = "DBPROBE_";

/// Display width used when none (or an unparsable one) is configured.
pub const DEFAULT_MAX_DISPLAY_WIDTH: usize = 50;

/// Flat string-to-string configuration store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    values: BTreeMap<String, String>,
}

impl Properties {
    /// Creates an empty property set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value for `key`, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Returns the value for `key`, or `default` when absent.
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Sets `key` to `value`, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Returns the number of keys.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if no keys are set.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Loads properties from a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProbeError::config_load(format!("Failed to read {}: {e}", path.display()))
        })?;

        Self::parse_toml(&content).map_err(|e| match e {
            ProbeError::ConfigLoad(msg) => {
                ProbeError::config_load(format!("{}: {msg}", path.display()))
            }
            other => other,
        })
    }

    /// Parses properties from a TOML string, flattening nested tables.
    pub fn parse_toml(content: &str) -> Result<Self> {
        let table: toml::Table = toml::from_str(content)
            .map_err(|e| ProbeError::config_load(format!("Invalid TOML: {e}")))?;

        let mut props = Self::new();
        flatten_table(&mut props, None, &table)?;
        Ok(props)
    }

    /// Builds properties from `DBPROBE_*` environment-style pairs.
    ///
    /// `DBPROBE_MAX_DISPLAY_WIDTH` becomes `db.max_display_width`. Pairs
    /// without the prefix are ignored.
    pub fn from_env_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut props = Self::new();
        for (name, value) in vars {
            if let Some(rest) = name.as_ref().strip_prefix(ENV_PREFIX) {
                if !rest.is_empty() {
                    props.set(format!("db.{}", rest.to_lowercase()), value);
                }
            }
        }
        props
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Properties {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut props = Self::new();
        for (k, v) in iter {
            props.set(k, v);
        }
        props
    }
}

fn flatten_table(props: &mut Properties, prefix: Option<&str>, table: &toml::Table) -> Result<()> {
    for (key, value) in table {
        let full_key = match prefix {
            Some(p) => format!("{p}.{key}"),
            None => key.clone(),
        };

        match value {
            toml::Value::Table(inner) => flatten_table(props, Some(&full_key), inner)?,
            toml::Value::String(s) => props.set(full_key, s.clone()),
            toml::Value::Integer(i) => props.set(full_key, i.to_string()),
            toml::Value::Float(f) => props.set(full_key, f.to_string()),
            toml::Value::Boolean(b) => props.set(full_key, b.to_string()),
            toml::Value::Datetime(d) => props.set(full_key, d.to_string()),
            toml::Value::Array(_) => {
                return Err(ProbeError::config_load(format!(
                    "Key '{full_key}' is an array; only scalar values are supported"
                )));
            }
        }
    }
    Ok(())
}

/// Where the run's configuration comes from.
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// A TOML file given on the command line.
    File(PathBuf),
    /// Key/value pairs supplied by the caller.
    Ambient(Properties),
}

impl ConfigSource {
    /// Picks the file source when a path is given, the ambient one otherwise.
    pub fn from_arg(path: Option<PathBuf>, ambient: impl FnOnce() -> Properties) -> Self {
        match path {
            Some(path) => Self::File(path),
            None => Self::Ambient(ambient()),
        }
    }

    /// Loads the properties from this source.
    pub fn load(&self) -> Result<Properties> {
        match self {
            Self::File(path) => Properties::load_from_file(path),
            Self::Ambient(props) => Ok(props.clone()),
        }
    }
}

/// Validated settings for one probe run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeSettings {
    pub sql: String,
    pub driver: String,
    pub url: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub max_display_width: usize,
    pub long_timing_test: bool,
    pub show_result_metadata: bool,
}

impl ProbeSettings {
    /// Validates required keys in order (query, driver, address) and reads
    /// the optional ones.
    pub fn from_properties(props: &Properties) -> Result<Self> {
        let sql = props
            .get(keys::SQL)
            .ok_or(ProbeError::MissingSetting(MissingSetting::Query))?;
        let driver = props
            .get(keys::DRIVER)
            .ok_or(ProbeError::MissingSetting(MissingSetting::Driver))?;
        let url = props
            .get(keys::URL)
            .ok_or(ProbeError::MissingSetting(MissingSetting::Address))?;

        let max_display_width = props
            .get(keys::MAX_DISPLAY_WIDTH)
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(DEFAULT_MAX_DISPLAY_WIDTH);

        Ok(Self {
            sql: sql.to_string(),
            driver: driver.to_string(),
            url: url.to_string(),
            user: props.get(keys::USER).map(String::from),
            password: props.get(keys::PASSWORD).map(String::from),
            max_display_width,
            long_timing_test: is_true(props.get(keys::LONG_TIMING_TEST)),
            show_result_metadata: is_true(Some(props.get_or(keys::SHOW_RESULT_METADATA, "true"))),
        })
    }

    /// Warnings for credentials that were not supplied.
    pub fn credential_warnings(&self) -> Vec<&'static str> {
        let mut warnings = Vec::new();
        if self.user.is_none() {
            warnings.push("Warning - user not supplied. Will be trying system user.");
        }
        if self.password.is_none() {
            warnings.push("Warning - password not supplied. Will pass no password to the driver.");
        }
        warnings
    }

    /// Returns the connection address with any password masked, for logs.
    pub fn display_url(&self) -> String {
        redact_url(&self.url)
    }
}

fn is_true(value: Option<&str>) -> bool {
    value.is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
}

/// Masks the password component of a URL-shaped address.
///
/// Addresses that do not parse as URLs are returned unchanged.
pub fn redact_url(address: &str) -> String {
    match Url::parse(address) {
        Ok(mut url) if url.password().is_some() => {
            // set_password only fails for cannot-be-a-base URLs, which have no password
            let _ = url.set_password(Some("****"));
            url.to_string()
        }
        _ => address.to_string(),
    }
}
