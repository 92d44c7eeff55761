//! # BBL Validator - CSV validation as a service
//!
//! Validates CSV files against a registry of named CSV Schemas. The CSV
//! comes either from a URL or from inline content; each run materializes it
//! as a temporary file, hands it to an external validation engine and maps
//! the engine's messages into a uniform result.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  URL / CSV  │────▶│ Temp files  │────▶│   Engine    │────▶│   Outcome   │
//! │  (+schema)  │     │ (download)  │     │ (external)  │     │   (JSON)    │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//!        │                                       ▲
//!        └──────────▶ Schema registry ───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use bbl_validator::{CommandEngine, InputSource, SchemaRegistry, TempResourceManager, Validator};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let validator = Validator::new(
//!         Arc::new(SchemaRegistry::load("schemas").unwrap()),
//!         Arc::new(TempResourceManager::with_defaults().unwrap()),
//!         Arc::new(CommandEngine::new("csv-validator-cmd")),
//!     );
//!     let outcome = validator
//!         .run_validation("concat", InputSource::Url("https://example.org/data.csv".into()))
//!         .await
//!         .unwrap();
//!     println!("passed: {}", outcome.passed);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`config`] - Settings from the environment
//! - [`models`] - Schema metadata, inputs and outcomes
//! - [`registry`] - Schema registry loaded from disk
//! - [`temp`] - Temporary files and downloads
//! - [`engine`] - External validation engine adapter
//! - [`validation`] - Validation orchestration
//! - [`api`] - HTTP API server

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Resources
pub mod registry;
pub mod temp;

// Validation
pub mod engine;
pub mod validation;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError, EngineError, ErrorCode, RegistryError, ServerError, TempError, ValidateError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    InputSource, SchemaInfo, SchemaRecord, ValidationFailure, ValidationOutcome,
};

// =============================================================================
// Re-exports - Components
// =============================================================================

pub use config::Settings;
pub use engine::{CommandEngine, EngineRequest, FailMessage, ValidationEngine};
pub use registry::SchemaRegistry;
pub use temp::{TempResource, TempResourceManager};
pub use validation::{map_result, Validator};

// Server
pub mod server {
    pub use crate::api::server::{router, start_server, AppState};
}
