//! Error types for the validation service.
//!
//! One enum per component, converging on [`ValidateError`] at the
//! orchestration boundary:
//!
//! - [`RegistryError`] - schema directory loading
//! - [`TempError`] - materializing input into the temp area
//! - [`EngineError`] - the external CSV validation engine
//! - [`ConfigError`] - settings taken from the environment
//! - [`ValidateError`] - what a validation request reports to its caller
//! - [`ServerError`] - startup and serving
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

// =============================================================================
// Registry Errors
// =============================================================================

/// Errors while loading the schema registry.
///
/// The first three variants are fatal at startup. The others describe a
/// single bad entry, which the loader logs and skips.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Configured schema directory does not exist.
    #[error("Schemas directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    /// Configured schema path exists but is not a directory.
    #[error("Schema path is not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Directory could not be read (permissions, I/O).
    #[error("Cannot read schema directory {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Metadata file is not a valid schema record.
    #[error("Invalid schema metadata in {path}: {source}")]
    InvalidMetadata {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Metadata file has no paired schema document.
    #[error("Schema file not found for metadata: {0}")]
    MissingDocument(PathBuf),

    /// Another metadata file already claimed this identifier.
    #[error("Duplicate schema id '{id}' in {path}")]
    DuplicateId { id: String, path: PathBuf },

    /// IO error on a single entry.
    #[error("Registry IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RegistryError {
    /// Whether this error must abort startup.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RegistryError::DirectoryNotFound(_)
                | RegistryError::NotADirectory(_)
                | RegistryError::Unreadable { .. }
        )
    }
}

// =============================================================================
// Temp Resource Errors
// =============================================================================

/// Errors while materializing input on disk.
#[derive(Debug, Error)]
pub enum TempError {
    /// URL is malformed, unreachable, answered with a non-200 status,
    /// or its body could not be stored.
    #[error("Non resolvable url: {url} ({reason})")]
    NotResolvable { url: String, reason: String },

    /// Writing inline content failed.
    #[error("Temp file IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The shared temp directory could not be created.
    #[error("Failed to create temp directory: {0}")]
    Root(#[source] std::io::Error),

    /// The HTTP client could not be built.
    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

impl TempError {
    pub fn not_resolvable(url: &str, reason: impl ToString) -> Self {
        TempError::NotResolvable {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

// =============================================================================
// Engine Errors
// =============================================================================

/// The validation engine failed instead of returning a failure list.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Engine process could not be started.
    #[error("Failed to start validation engine '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Engine exited with a status that is neither pass nor fail.
    #[error("Validation engine exited with {status}: {stderr}")]
    Exit { status: String, stderr: String },

    /// Engine produced output that is not a failure record.
    #[error("Unreadable engine output on line {line}: {reason}")]
    Output { line: usize, reason: String },

    /// Engine panicked or its task was cancelled.
    #[error("Validation engine aborted: {0}")]
    Aborted(String),
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Invalid settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable is set but cannot be parsed.
    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

// =============================================================================
// Validation Request Errors (top-level)
// =============================================================================

/// Machine-readable error code returned to API callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Provided schema id does not exist.
    SchemaNotFound,
    /// A fatal error has occurred.
    UnexpectedError,
    /// No CSV content to validate.
    NoCsv,
    /// The url is malformed or does not resolve.
    NonResolvableUrl,
    /// The validation engine itself failed.
    ValidationError,
}

/// Errors reported by [`crate::validation::Validator::run_validation`].
///
/// A CSV that breaks schema rules is not an error: it is a successful
/// run whose outcome has `passed == false`.
#[derive(Debug, Error)]
pub enum ValidateError {
    /// Unknown or empty schema identifier.
    #[error("Schema not found with ID: {0}")]
    SchemaNotFound(String),

    /// No input was supplied.
    #[error("{0}")]
    NoCsv(String),

    /// The input URL could not be fetched.
    #[error("Unable to resolve url: {0}")]
    NonResolvableUrl(String),

    /// Local I/O failure or internal inconsistency.
    #[error("Unexpected error: {0}")]
    Unexpected(String),

    /// The engine failed rather than reporting failures.
    #[error("An error occurred: {0}")]
    Validation(#[from] EngineError),
}

impl ValidateError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ValidateError::SchemaNotFound(_) => ErrorCode::SchemaNotFound,
            ValidateError::NoCsv(_) => ErrorCode::NoCsv,
            ValidateError::NonResolvableUrl(_) => ErrorCode::NonResolvableUrl,
            ValidateError::Unexpected(_) => ErrorCode::UnexpectedError,
            ValidateError::Validation(_) => ErrorCode::ValidationError,
        }
    }

    /// Whether the caller caused this error (bad id, no input, bad url).
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            ValidateError::SchemaNotFound(_)
                | ValidateError::NoCsv(_)
                | ValidateError::NonResolvableUrl(_)
        )
    }

    /// Text safe to show to a caller.
    ///
    /// Internal faults are reduced to a generic message; the detail stays
    /// in the server log.
    pub fn description(&self) -> String {
        match self {
            ValidateError::Unexpected(_) => "Internal error processing CSV".to_string(),
            ValidateError::Validation(_) => "An error occurred while validating the CSV".to_string(),
            other => other.to_string(),
        }
    }
}

// =============================================================================
// Server Errors
// =============================================================================

/// Startup and serving errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Schema registry could not be loaded.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Temp area or HTTP client could not be set up.
    #[error("Temp resource error: {0}")]
    Temp(#[from] TempError),

    /// Invalid settings.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Listener failure.
    #[error("Server IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Result type for temp resource operations.
pub type TempResult<T> = Result<T, TempError>;

/// Result type for engine calls.
pub type EngineResult<T> = Result<T, EngineError>;

/// Result type for validation requests.
pub type ValidateResult<T> = Result<T, ValidateError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
