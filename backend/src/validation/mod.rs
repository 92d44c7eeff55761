//! Validation orchestration.
//!
//! [`Validator::run_validation`] is the single entry point used by the HTTP
//! layer and the CLI. One call runs these steps in order:
//!
//! 1. Reject an unknown schema id (nothing created yet)
//! 2. Reject empty input
//! 3. Materialize the input as a temp file
//! 4. Resolve the schema document path
//! 5. Run the engine once, timing the call
//! 6. Map engine messages to [`ValidationFailure`]s
//! 7. Delete the temp file
//!
//! The temp file is held by a [`crate::temp::TempResource`] guard from
//! step 3 on, so step 7 also happens when the engine fails, panics, or the
//! request future is dropped.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use bbl_validator::{CommandEngine, InputSource, SchemaRegistry, TempResourceManager, Validator};
//!
//! let validator = Validator::new(
//!     Arc::new(SchemaRegistry::load("schemas")?),
//!     Arc::new(TempResourceManager::with_defaults()?),
//!     Arc::new(CommandEngine::new("csv-validator-cmd")),
//! );
//! let outcome = validator
//!     .run_validation("concat", InputSource::Content(b"c1,c2,c3\na,b,ab\n".to_vec()))
//!     .await?;
//! assert!(outcome.passed);
//! ```

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error};

use crate::api::logs::{log_error, log_info, log_success, log_warning};
use crate::engine::{EngineRequest, FailMessage, ValidationEngine};
use crate::error::{EngineError, ValidateError, ValidateResult};
use crate::models::{InputSource, ValidationFailure, ValidationOutcome};
use crate::registry::SchemaRegistry;
use crate::temp::{TempResource, TempResourceManager};

/// Description used when inline content is empty
pub const EMPTY_CONTENT_MESSAGE: &str = "Empty CSV content";

/// Description used when the URL is empty
pub const EMPTY_URL_MESSAGE: &str = "No CSV URL provided";

/// Orchestrates registry, temp files and engine for each request.
///
/// Cheap to clone; clones share the same components.
#[derive(Clone)]
pub struct Validator {
    registry: Arc<SchemaRegistry>,
    temp: Arc<TempResourceManager>,
    engine: Arc<dyn ValidationEngine>,
    max_cell_length: Option<usize>,
}

impl Validator {
    pub fn new(
        registry: Arc<SchemaRegistry>,
        temp: Arc<TempResourceManager>,
        engine: Arc<dyn ValidationEngine>,
    ) -> Self {
        Self {
            registry,
            temp,
            engine,
            max_cell_length: None,
        }
    }

    /// Cap on characters per cell passed to the engine
    pub fn with_max_cell_length(mut self, max: Option<usize>) -> Self {
        self.max_cell_length = max;
        self
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn temp(&self) -> &TempResourceManager {
        &self.temp
    }

    /// Validate `input` against the schema `schema_id`.
    pub async fn run_validation(
        &self,
        schema_id: &str,
        input: InputSource,
    ) -> ValidateResult<ValidationOutcome> {
        if schema_id.is_empty() || !self.registry.contains(schema_id) {
            debug!(schema_id, "Unknown schema");
            return Err(ValidateError::SchemaNotFound(schema_id.to_string()));
        }

        log_info(schema_id, format!("Validating {}", input.describe()));

        let resource = self.materialize(schema_id, input).await?;
        let result = self.validate_file(schema_id, &resource).await;

        if let Err(e) = resource.release().await {
            log_warning(schema_id, format!("Failed to delete temp file: {}", e));
        }

        let outcome = result?;
        if outcome.passed {
            log_success(schema_id, format!("Passed ({}ms)", outcome.execution_time));
        } else {
            log_warning(
                schema_id,
                format!(
                    "Failed with {} failure(s) ({}ms)",
                    outcome.failures.len(),
                    outcome.execution_time
                ),
            );
        }
        Ok(outcome)
    }

    /// Steps 2 and 3: reject empty input, then write it to disk
    async fn materialize(&self, schema_id: &str, input: InputSource) -> ValidateResult<TempResource> {
        if input.is_empty() {
            let message = match input {
                InputSource::Url(_) => EMPTY_URL_MESSAGE,
                InputSource::Content(_) => EMPTY_CONTENT_MESSAGE,
            };
            return Err(ValidateError::NoCsv(message.to_string()));
        }

        match input {
            InputSource::Url(url) => {
                self.temp.fetch_to_temp(&url).await.map_err(|e| {
                    log_warning(schema_id, format!("Failed to download file from URL: {}", e));
                    ValidateError::NonResolvableUrl(url)
                })
            }
            InputSource::Content(bytes) => {
                self.temp.write_to_temp(&bytes).await.map_err(|e| {
                    error!(schema_id, "Failed to save CSV content to temp file: {}", e);
                    log_error(schema_id, "Failed to save CSV content");
                    ValidateError::Unexpected(e.to_string())
                })
            }
        }
    }

    /// Steps 4 to 6
    async fn validate_file(
        &self,
        schema_id: &str,
        resource: &TempResource,
    ) -> ValidateResult<ValidationOutcome> {
        let schema_path = self
            .registry
            .file_path(schema_id)
            .ok_or_else(|| {
                ValidateError::Unexpected(format!("schema '{}' has no document path", schema_id))
            })?
            .to_path_buf();

        let request = EngineRequest::for_paths(resource.path(), schema_path)
            .with_max_cell_length(self.max_cell_length);
        let engine = Arc::clone(&self.engine);

        let started = Instant::now();
        let joined = tokio::task::spawn_blocking(move || engine.validate(&request)).await;
        let execution_time = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let messages = match joined {
            Ok(Ok(messages)) => messages,
            Ok(Err(e)) => {
                error!(schema_id, "Validation engine failed: {}", e);
                log_error(schema_id, "Validation engine failed");
                return Err(e.into());
            }
            Err(join) => {
                error!(schema_id, "Validation engine aborted: {}", join);
                log_error(schema_id, "Validation engine aborted");
                return Err(EngineError::Aborted(join.to_string()).into());
            }
        };

        Ok(map_result(messages, execution_time))
    }
}

/// Turn engine messages into an outcome.
///
/// Messages keep their order; columns become 1-based.
pub fn map_result(messages: Vec<FailMessage>, execution_time: u64) -> ValidationOutcome {
    if messages.is_empty() {
        return ValidationOutcome::success(execution_time);
    }

    let utf8_valid = !messages.iter().any(FailMessage::is_utf8_error);
    let failures = messages
        .into_iter()
        .map(|m| ValidationFailure {
            message: m.message,
            line: m.line,
            column: m.column + 1,
        })
        .collect();

    ValidationOutcome {
        passed: false,
        failures,
        execution_time,
        utf8_valid,
    }
}
