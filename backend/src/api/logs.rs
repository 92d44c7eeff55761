//! Real-time validation events via Server-Sent Events (SSE).
//!
//! Validation runs publish short [`LogEntry`] events on a broadcast
//! channel; `GET /api/logs` streams them to any connected client. Every
//! entry is also emitted through `tracing`.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Buffered entries per subscriber before slow clients start lagging
const CHANNEL_CAPACITY: usize = 100;

/// Log level for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A single log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    /// Schema the event relates to, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            schema_id: None,
            timestamp: Utc::now(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, message)
    }

    pub fn with_schema(mut self, schema_id: impl Into<String>) -> Self {
        self.schema_id = Some(schema_id.into());
        self
    }
}

/// Global log broadcaster
pub static LOG_BROADCASTER: Lazy<LogBroadcaster> = Lazy::new(LogBroadcaster::new);

/// Broadcasts log entries to all connected SSE clients
pub struct LogBroadcaster {
    sender: broadcast::Sender<LogEntry>,
}

impl LogBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Send a log entry to all subscribers
    pub fn log(&self, entry: LogEntry) {
        let schema = entry.schema_id.as_deref().unwrap_or("-");
        match entry.level {
            LogLevel::Info | LogLevel::Success => {
                tracing::info!(schema, "{}", entry.message)
            }
            LogLevel::Warning => tracing::warn!(schema, "{}", entry.message),
            LogLevel::Error => tracing::error!(schema, "{}", entry.message),
        }

        // No receivers is fine
        let _ = self.sender.send(entry);
    }

    /// Get a receiver for SSE streaming
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.sender.subscribe()
    }
}

impl Default for LogBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenient logging functions
pub fn log_info(schema_id: &str, msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::info(msg).with_schema(schema_id));
}

pub fn log_success(schema_id: &str, msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::success(msg).with_schema(schema_id));
}

pub fn log_warning(schema_id: &str, msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::warning(msg).with_schema(schema_id));
}

pub fn log_error(schema_id: &str, msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::error(msg).with_schema(schema_id));
}
