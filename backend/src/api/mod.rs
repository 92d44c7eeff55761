//! HTTP API module.
//!
//! This module provides the HTTP server, wire types and the SSE event feed.

pub mod logs;
pub mod server;
pub mod types;

pub use logs::{LogEntry, LogLevel, LOG_BROADCASTER};
pub use server::{router, start_server, AppState};
pub use types::{ApiVersion, ErrorResponse, ValidationResponse};
