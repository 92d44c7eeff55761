//! CSV validation engine adapter.
//!
//! The rules of a CSV Schema are evaluated by an external engine. The
//! service only needs one call from it, captured by [`ValidationEngine`]:
//! given a CSV file, a schema file and a set of options, return every
//! failure found.
//!
//! [`CommandEngine`] runs the engine as a child process. The process gets
//! the options as flags and the two paths as positional arguments, and
//! reports one JSON object per failure on stdout:
//!
//! ```text
//! {"message": "is(concat($c1, $c2)) fails for row: 3, column: c3, value: \"ccccc\"", "line": 3, "column": 2}
//! ```
//!
//! Columns are 0-based as emitted by the engine.

use serde::Deserialize;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Command;
use tracing::{debug, trace};

use crate::error::{EngineError, EngineResult};

/// Prefix the engine puts on messages about invalid UTF-8 input
pub const UTF8_ERROR_TAG: &str = "[UTF-8 Error]";

/// Encoding used for both the CSV and the schema
pub const DEFAULT_ENCODING: &str = "UTF-8";

/// Default engine executable
pub const DEFAULT_ENGINE_COMMAND: &str = "csv-validator-cmd";

// =============================================================================
// Request / Response
// =============================================================================

/// Rewrites a path prefix referenced from inside a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    pub from: String,
    pub to: String,
}

/// Everything the engine needs for one run.
#[derive(Debug, Clone)]
pub struct EngineRequest {
    pub csv_path: PathBuf,
    pub csv_encoding: String,
    pub validate_utf8: bool,
    pub schema_path: PathBuf,
    pub schema_encoding: String,
    pub strict: bool,
    pub fail_fast: bool,
    pub substitutions: Vec<Substitution>,
    pub case_sensitive_paths: bool,
    pub trace: bool,
    pub skip_file_checks: bool,
    /// `None` lets the engine apply its own limit
    pub max_cell_length: Option<usize>,
}

impl EngineRequest {
    /// The option set the service always validates with: UTF-8 input and
    /// schema, UTF-8 checking on, every failure collected, no path
    /// substitutions, case-insensitive path checks, no tracing.
    pub fn for_paths(csv_path: impl Into<PathBuf>, schema_path: impl Into<PathBuf>) -> Self {
        Self {
            csv_path: csv_path.into(),
            csv_encoding: DEFAULT_ENCODING.to_string(),
            validate_utf8: true,
            schema_path: schema_path.into(),
            schema_encoding: DEFAULT_ENCODING.to_string(),
            strict: true,
            fail_fast: false,
            substitutions: Vec::new(),
            case_sensitive_paths: false,
            trace: false,
            skip_file_checks: false,
            max_cell_length: None,
        }
    }

    pub fn with_max_cell_length(mut self, max: Option<usize>) -> Self {
        self.max_cell_length = max;
        self
    }
}

/// One failure as reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FailMessage {
    pub message: String,
    pub line: i64,
    /// 0-based column index
    pub column: i64,
}

impl FailMessage {
    pub fn new(message: impl Into<String>, line: i64, column: i64) -> Self {
        Self {
            message: message.into(),
            line,
            column,
        }
    }

    /// Whether this failure reports invalid UTF-8 input
    pub fn is_utf8_error(&self) -> bool {
        self.message.starts_with(UTF8_ERROR_TAG)
    }
}

// =============================================================================
// Engine trait
// =============================================================================

/// A synchronous CSV validation engine.
///
/// Returns `Ok` with an empty list when the file passes, `Ok` with the
/// failures in emission order when it does not, and `Err` only when the
/// engine itself could not do its job.
pub trait ValidationEngine: Send + Sync {
    fn validate(&self, request: &EngineRequest) -> EngineResult<Vec<FailMessage>>;
}

// =============================================================================
// Command engine
// =============================================================================

/// Runs the engine as an external program.
#[derive(Debug, Clone)]
pub struct CommandEngine {
    program: String,
    /// Arguments placed before the generated flags
    args: Vec<String>,
}

impl CommandEngine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Full argument list for a request
    pub fn build_args(&self, request: &EngineRequest) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.args.iter().map(OsString::from).collect();

        let mut flag = |name: &str, value: String| {
            args.push(OsString::from(name));
            args.push(OsString::from(value));
        };
        flag("--csv-encoding", request.csv_encoding.clone());
        flag("--csv-schema-encoding", request.schema_encoding.clone());
        flag("--fail-fast", request.fail_fast.to_string());
        flag("--case-sensitive-paths", request.case_sensitive_paths.to_string());
        for sub in &request.substitutions {
            flag("--path", format!("{},{}", sub.from, sub.to));
        }
        if let Some(max) = request.max_cell_length {
            flag("--max-chars-per-cell", max.to_string());
        }

        // `strict` has no command-line switch; the command is always strict.
        if !request.validate_utf8 {
            args.push(OsString::from("--disable-utf8-validation"));
        }
        if request.trace {
            args.push(OsString::from("--trace"));
        }
        if request.skip_file_checks {
            args.push(OsString::from("--skip-file-checks"));
        }

        args.push(request.csv_path.clone().into_os_string());
        args.push(request.schema_path.clone().into_os_string());
        args
    }
}

impl ValidationEngine for CommandEngine {
    fn validate(&self, request: &EngineRequest) -> EngineResult<Vec<FailMessage>> {
        debug!(
            program = %self.program,
            csv = %request.csv_path.display(),
            schema = %request.schema_path.display(),
            "Running validation engine"
        );

        let output = Command::new(&self.program)
            .args(self.build_args(request))
            .output()
            .map_err(|e| EngineError::Spawn {
                program: self.program.clone(),
                source: e,
            })?;

        // 0: passed, 1: failures reported, anything else: engine fault
        match output.status.code() {
            Some(0) | Some(1) => {}
            _ => {
                return Err(EngineError::Exit {
                    status: output.status.to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                })
            }
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_output(&stdout)
    }
}

/// Parse JSON-lines engine output
pub fn parse_output(stdout: &str) -> EngineResult<Vec<FailMessage>> {
    let mut messages = Vec::new();
    for (i, line) in stdout.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let message: FailMessage = serde_json::from_str(line).map_err(|e| EngineError::Output {
            line: i + 1,
            reason: e.to_string(),
        })?;
        trace!(line = message.line, column = message.column, "{}", message.message);
        messages.push(message);
    }
    Ok(messages)
}
