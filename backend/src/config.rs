//! Service settings.
//!
//! Read from the environment (a `.env` file is loaded first when present),
//! then optionally overridden by command-line flags.
//!
//! | Variable                 | Default             |
//! |--------------------------|---------------------|
//! | `BBL_PORT`               | `8080`              |
//! | `BBL_SCHEMA_DIR`         | `schemas`           |
//! | `BBL_API_VERSION`        | crate version       |
//! | `BBL_CONNECT_TIMEOUT_MS` | `10000`             |
//! | `BBL_READ_TIMEOUT_MS`    | `10000`             |
//! | `BBL_ENGINE_CMD`         | `csv-validator-cmd` |
//! | `BBL_ENGINE_ARGS`        | (none)              |
//! | `BBL_MAX_CELL_LENGTH`    | engine default      |
//! | `BBL_MAX_BODY_BYTES`     | `67108864`          |

use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::engine::{CommandEngine, DEFAULT_ENGINE_COMMAND};
use crate::error::ConfigError;
use crate::temp::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_SCHEMA_DIR: &str = "schemas";
pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Everything needed to start the service
#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    /// Schema directory as configured; see [`Settings::schema_path`]
    pub schema_dir: PathBuf,
    /// Reported by `/version` and the version response header
    pub api_version: String,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub engine_command: String,
    pub engine_args: Vec<String>,
    pub max_cell_length: Option<usize>,
    /// Largest accepted request body
    pub max_body_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            schema_dir: PathBuf::from(DEFAULT_SCHEMA_DIR),
            api_version: env!("CARGO_PKG_VERSION").to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            engine_command: DEFAULT_ENGINE_COMMAND.to_string(),
            engine_args: Vec::new(),
            max_cell_length: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl Settings {
    /// Settings from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Settings from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut settings = Self::default();

        if let Some(port) = parse_var(&lookup, "BBL_PORT")? {
            settings.port = port;
        }
        if let Some(dir) = lookup("BBL_SCHEMA_DIR").filter(|v| !v.trim().is_empty()) {
            settings.schema_dir = PathBuf::from(dir);
        }
        if let Some(version) = lookup("BBL_API_VERSION").filter(|v| !v.trim().is_empty()) {
            settings.api_version = version;
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "BBL_CONNECT_TIMEOUT_MS")? {
            settings.connect_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "BBL_READ_TIMEOUT_MS")? {
            settings.read_timeout = Duration::from_millis(ms);
        }
        if let Some(cmd) = lookup("BBL_ENGINE_CMD").filter(|v| !v.trim().is_empty()) {
            settings.engine_command = cmd;
        }
        if let Some(args) = lookup("BBL_ENGINE_ARGS") {
            settings.engine_args = args.split_whitespace().map(String::from).collect();
        }
        settings.max_cell_length = parse_var(&lookup, "BBL_MAX_CELL_LENGTH")?;
        if let Some(max) = parse_var(&lookup, "BBL_MAX_BODY_BYTES")? {
            settings.max_body_bytes = max;
        }

        Ok(settings)
    }

    /// Schema directory, relative paths resolved against the working directory
    pub fn schema_path(&self) -> PathBuf {
        resolve_from_cwd(&self.schema_dir)
    }

    /// Engine adapter described by these settings
    pub fn engine(&self) -> CommandEngine {
        CommandEngine::new(self.engine_command.clone()).with_args(self.engine_args.clone())
    }
}

/// Parse an optional variable; present-but-invalid is an error
fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            }),
    }
}

fn resolve_from_cwd(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(settings.port, 8080);
        assert_eq!(settings.schema_dir, PathBuf::from("schemas"));
        assert_eq!(settings.connect_timeout, Duration::from_secs(10));
        assert_eq!(settings.engine_command, "csv-validator-cmd");
        assert_eq!(settings.max_cell_length, None);
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::from_lookup(lookup_from(&[
            ("BBL_PORT", "9000"),
            ("BBL_SCHEMA_DIR", "/srv/schemas"),
            ("BBL_API_VERSION", "2.1.0"),
            ("BBL_READ_TIMEOUT_MS", "2500"),
            ("BBL_ENGINE_CMD", "java"),
            ("BBL_ENGINE_ARGS", "-jar  /opt/validator.jar"),
            ("BBL_MAX_CELL_LENGTH", "4096"),
        ]))
        .unwrap();

        assert_eq!(settings.port, 9000);
        assert_eq!(settings.schema_path(), PathBuf::from("/srv/schemas"));
        assert_eq!(settings.api_version, "2.1.0");
        assert_eq!(settings.read_timeout, Duration::from_millis(2500));
        assert_eq!(settings.engine_args, vec!["-jar", "/opt/validator.jar"]);
        assert_eq!(settings.max_cell_length, Some(4096));
        assert_eq!(settings.engine().program(), "java");
    }

    #[test]
    fn test_invalid_number_is_an_error() {
        let err = Settings::from_lookup(lookup_from(&[("BBL_PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("BBL_PORT"));
        assert!(err.to_string().contains("eighty"));
    }

    #[test]
    fn test_relative_schema_dir_uses_cwd() {
        let settings = Settings::default();
        let resolved = settings.schema_path();
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("schemas"));
    }
}
