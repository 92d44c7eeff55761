//! Domain models for the validation service.
//!
//! - [`SchemaInfo`] - public description of a registered schema
//! - [`SchemaRecord`] - registry entry: info, document text and location
//! - [`InputSource`] - where the CSV to validate comes from
//! - [`ValidationFailure`] - one rule violation with a 1-based location
//! - [`ValidationOutcome`] - aggregate result of one validation run

use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

// =============================================================================
// Schemas
// =============================================================================

/// Metadata of a schema, as read from its `.json` metadata file.
///
/// Two infos are equal when their identifiers are equal; the other fields
/// are descriptive only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaInfo {
    /// Unique identifier
    pub id: String,
    /// Human-readable name
    #[serde(default)]
    pub name: String,
    /// Schema version string
    #[serde(default)]
    pub version: String,
    /// Publication date
    #[serde(default)]
    pub date: String,
    /// Public URL of the schema document, filled in by the HTTP layer
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub description: String,
}

impl SchemaInfo {
    /// Copy of this info pointing at `url`.
    pub fn with_url(&self, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..self.clone()
        }
    }
}

impl PartialEq for SchemaInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for SchemaInfo {}

impl Hash for SchemaInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// A loaded schema. Immutable once the registry has been built.
#[derive(Debug, Clone)]
pub struct SchemaRecord {
    pub info: SchemaInfo,
    /// Raw CSV Schema text
    pub content: String,
    /// Absolute path of the `.csvs` document
    pub path: PathBuf,
}

impl SchemaRecord {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

// =============================================================================
// Input
// =============================================================================

/// The CSV a request wants validated.
#[derive(Debug, Clone)]
pub enum InputSource {
    /// Fetch the CSV from a remote URL.
    Url(String),
    /// CSV bytes supplied inline. Not required to be valid UTF-8.
    Content(Vec<u8>),
}

impl InputSource {
    /// Whether no input was actually supplied.
    pub fn is_empty(&self) -> bool {
        match self {
            InputSource::Url(url) => url.trim().is_empty(),
            InputSource::Content(bytes) => bytes.is_empty(),
        }
    }

    /// Short label for logs.
    pub fn describe(&self) -> String {
        match self {
            InputSource::Url(url) => format!("url {}", url),
            InputSource::Content(bytes) => format!("{} bytes of inline content", bytes.len()),
        }
    }
}

// =============================================================================
// Outcome
// =============================================================================

/// A single rule violation reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFailure {
    pub message: String,
    /// 1-based line number
    pub line: i64,
    /// 1-based column number
    pub column: i64,
}

/// Result of one validation run.
///
/// `passed` is true exactly when `failures` is empty. `utf8_valid` is
/// tracked separately: it is false when any failure is a UTF-8 error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOutcome {
    pub passed: bool,
    pub failures: Vec<ValidationFailure>,
    /// Engine wall-clock time in milliseconds
    pub execution_time: u64,
    pub utf8_valid: bool,
}

impl ValidationOutcome {
    /// A run with no failures.
    pub fn success(execution_time: u64) -> Self {
        Self {
            passed: true,
            failures: Vec::new(),
            execution_time,
            utf8_valid: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn info(id: &str, name: &str) -> SchemaInfo {
        SchemaInfo {
            id: id.to_string(),
            name: name.to_string(),
            version: "1.0".to_string(),
            date: "2025-01-01".to_string(),
            url: String::new(),
            description: String::new(),
        }
    }

    #[test]
    fn test_schema_identity_is_the_id() {
        let a = info("concat", "Concat");
        let b = info("concat", "Renamed");
        assert_eq!(a, b);

        let set: HashSet<SchemaInfo> = [a, b, info("other", "Other")].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_metadata_parse_with_missing_fields() {
        let parsed: SchemaInfo = serde_json::from_str(r#"{"id": "concat", "name": "Concat"}"#).unwrap();
        assert_eq!(parsed.id, "concat");
        assert!(parsed.url.is_empty());
    }

    #[test]
    fn test_outcome_wire_format() {
        let outcome = ValidationOutcome {
            passed: false,
            failures: vec![ValidationFailure {
                message: "bad".into(),
                line: 3,
                column: 3,
            }],
            execution_time: 12,
            utf8_valid: true,
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["passed"], false);
        assert_eq!(json["executionTime"], 12);
        assert_eq!(json["utf8Valid"], true);
        assert_eq!(json["failures"][0]["line"], 3);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(InputSource::Url("  ".into()).is_empty());
        assert!(InputSource::Content(Vec::new()).is_empty());
        assert!(!InputSource::Content(b"a,b".to_vec()).is_empty());
    }
}
