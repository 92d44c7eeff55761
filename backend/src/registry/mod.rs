//! Schema Registry - named CSV Schemas loaded from a directory
//!
//! Each schema is a pair of files sharing a basename:
//!
//! ```text
//! schemas/
//! ├── concat.json   metadata: id, name, version, date, url, description
//! └── concat.csvs   the CSV Schema document
//! ```
//!
//! The registry is built once by [`SchemaRegistry::load`] before the server
//! accepts requests and is read-only afterwards, so it can be shared behind
//! an `Arc` without locking.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, trace, warn};

use crate::error::{RegistryError, RegistryResult};
use crate::models::{SchemaInfo, SchemaRecord};

/// Extension of schema metadata files
pub const METADATA_EXTENSION: &str = "json";

/// Extension of CSV Schema documents
pub const DOCUMENT_EXTENSION: &str = "csvs";

/// Registry of all schemas found in the schema directory
#[derive(Debug)]
pub struct SchemaRegistry {
    /// Directory the schemas were loaded from
    directory: PathBuf,
    /// Records in load order
    records: Vec<SchemaRecord>,
    /// id -> position in `records`
    index: HashMap<String, usize>,
}

impl SchemaRegistry {
    /// Load every schema pair found at the top level of `dir`.
    ///
    /// A missing, non-directory or unreadable `dir` is an error. A single
    /// bad entry is logged and skipped.
    pub fn load(dir: impl AsRef<Path>) -> RegistryResult<Self> {
        let dir = dir.as_ref();

        let metadata = fs::metadata(dir).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => RegistryError::DirectoryNotFound(dir.to_path_buf()),
            _ => RegistryError::Unreadable {
                path: dir.to_path_buf(),
                source: e,
            },
        })?;
        if !metadata.is_dir() {
            return Err(RegistryError::NotADirectory(dir.to_path_buf()));
        }

        let directory = fs::canonicalize(dir).map_err(|e| RegistryError::Unreadable {
            path: dir.to_path_buf(),
            source: e,
        })?;

        let mut registry = Self {
            directory,
            records: Vec::new(),
            index: HashMap::new(),
        };

        for path in registry.metadata_files()? {
            if let Err(e) = registry.load_entry(&path) {
                warn!(path = %path.display(), "Skipping schema: {}", e);
            }
        }

        info!(
            count = registry.records.len(),
            directory = %registry.directory.display(),
            "Loaded schemas"
        );
        Ok(registry)
    }

    /// Metadata files at the top level of the directory, sorted by name
    fn metadata_files(&self) -> RegistryResult<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.directory).map_err(|e| RegistryError::Unreadable {
            path: self.directory.clone(),
            source: e,
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!(directory = %self.directory.display(), "Error scanning schema directory: {}", e);
                    continue;
                }
            };
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|e| e == METADATA_EXTENSION) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Load one metadata file and its paired document
    fn load_entry(&mut self, metadata_path: &Path) -> RegistryResult<()> {
        let document_path = metadata_path.with_extension(DOCUMENT_EXTENSION);
        if !document_path.is_file() {
            return Err(RegistryError::MissingDocument(document_path));
        }

        let raw = fs::read_to_string(metadata_path)?;
        let info: SchemaInfo =
            serde_json::from_str(&raw).map_err(|e| RegistryError::InvalidMetadata {
                path: metadata_path.to_path_buf(),
                source: e,
            })?;

        if self.index.contains_key(&info.id) {
            return Err(RegistryError::DuplicateId {
                id: info.id,
                path: metadata_path.to_path_buf(),
            });
        }

        let content = fs::read_to_string(&document_path)?;
        debug!(id = %info.id, path = %document_path.display(), "Loaded schema");

        self.index.insert(info.id.clone(), self.records.len());
        self.records.push(SchemaRecord {
            info,
            content,
            path: document_path,
        });
        Ok(())
    }

    /// Directory the schemas were loaded from
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// All schemas, in load order
    pub fn list(&self) -> Vec<&SchemaInfo> {
        self.records.iter().map(|r| &r.info).collect()
    }

    /// Get a schema record by ID
    pub fn get(&self, id: &str) -> Option<&SchemaRecord> {
        let found = self.index.get(id).map(|&i| &self.records[i]);
        if found.is_none() {
            trace!(id, "Schema lookup missed");
        }
        found
    }

    /// Whether a schema with this ID is loaded
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// CSV Schema text for an ID
    pub fn content(&self, id: &str) -> Option<&str> {
        self.get(id).map(|r| r.content.as_str())
    }

    /// Location of the CSV Schema document for an ID
    pub fn file_path(&self, id: &str) -> Option<&Path> {
        self.get(id).map(SchemaRecord::path)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::tempdir;

    /// Write a metadata/document pair into `dir`.
    pub(crate) fn write_schema(dir: &Path, basename: &str, id: &str, document: &str) {
        let metadata = serde_json::json!({
            "id": id,
            "name": format!("{} schema", id),
            "version": "1.0",
            "date": "2025-06-01",
            "url": "",
            "description": format!("Test schema {}", id),
        });
        fs::write(dir.join(format!("{}.json", basename)), metadata.to_string()).unwrap();
        fs::write(dir.join(format!("{}.csvs", basename)), document).unwrap();
    }

    #[test]
    fn test_load_pairs() {
        let dir = tempdir().unwrap();
        write_schema(dir.path(), "concat", "concat", "version 1.0\n@totalColumns 3\n");
        write_schema(dir.path(), "simple", "simple", "version 1.1\n");

        let registry = SchemaRegistry::load(dir.path()).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.content("concat"),
            Some("version 1.0\n@totalColumns 3\n")
        );
        let path = registry.file_path("simple").unwrap();
        assert!(path.is_absolute());
        assert!(path.ends_with("simple.csvs"));
    }

    #[test]
    fn test_list_is_ordered_by_file_name() {
        let dir = tempdir().unwrap();
        write_schema(dir.path(), "b-second", "second", "version 1.0\n");
        write_schema(dir.path(), "a-first", "first", "version 1.0\n");
        write_schema(dir.path(), "c-third", "third", "version 1.0\n");

        let registry = SchemaRegistry::load(dir.path()).unwrap();
        let ids: Vec<&str> = registry.list().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_missing_document_is_skipped() {
        let dir = tempdir().unwrap();
        write_schema(dir.path(), "concat", "concat", "version 1.0\n");
        fs::write(dir.path().join("orphan.json"), r#"{"id": "orphan"}"#).unwrap();

        let registry = SchemaRegistry::load(dir.path()).unwrap();
        assert!(registry.contains("concat"));
        assert!(!registry.contains("orphan"));
    }

    #[test]
    fn test_malformed_metadata_is_skipped() {
        let dir = tempdir().unwrap();
        write_schema(dir.path(), "concat", "concat", "version 1.0\n");
        fs::write(dir.path().join("broken.json"), "{ not json").unwrap();
        fs::write(dir.path().join("broken.csvs"), "version 1.0\n").unwrap();

        let registry = SchemaRegistry::load(dir.path()).unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_id_keeps_first() {
        let dir = tempdir().unwrap();
        write_schema(dir.path(), "a", "dup", "first\n");
        write_schema(dir.path(), "b", "dup", "second\n");

        let registry = SchemaRegistry::load(dir.path()).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.content("dup"), Some("first\n"));
    }

    #[test]
    fn test_subdirectories_not_scanned() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("nested");
        fs::create_dir(&nested).unwrap();
        write_schema(&nested, "deep", "deep", "version 1.0\n");

        let registry = SchemaRegistry::load(dir.path()).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_missing_directory_is_fatal() {
        let dir = tempdir().unwrap();
        let err = SchemaRegistry::load(dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, RegistryError::DirectoryNotFound(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_file_instead_of_directory_is_fatal() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("schemas");
        fs::write(&file, "").unwrap();

        let err = SchemaRegistry::load(&file).unwrap_err();
        assert!(matches!(err, RegistryError::NotADirectory(_)));
    }

    #[test]
    fn test_unknown_lookups() {
        let dir = tempdir().unwrap();
        let registry = SchemaRegistry::load(dir.path()).unwrap();
        assert!(registry.get("missing").is_none());
        assert!(registry.content("").is_none());
        assert!(registry.file_path("missing").is_none());
    }
}
