//! Log entry data structures
//!
//! Defines the log levels and the shape of a single line in the log file.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Severity of a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Progress mirror, only written in debug mode
    Debug,
    /// Normal operation
    Info,
    /// Operation phase transition (start, success, failure)
    Oper,
    /// Something was skipped or could not be cleaned up
    Warn,
    /// Operation failed
    Error,
}

impl Level {
    /// Parse a `LOG_LEVEL` setting; unknown names mean `Info`
    pub fn from_setting(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "debug" | "trace" => Level::Debug,
            "warn" | "warning" => Level::Warn,
            "error" => Level::Error,
            _ => Level::Info,
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Level::Debug => write!(f, "DEBUG"),
            Level::Info => write!(f, "INFO"),
            Level::Oper => write!(f, "OPER"),
            Level::Warn => write!(f, "WARN"),
            Level::Error => write!(f, "ERROR"),
        }
    }
}

/// A single log line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Local wall-clock time of the event
    pub timestamp: DateTime<Local>,

    pub level: Level,

    /// Name or id of the writing thread
    pub thread: String,

    /// Correlates all lines written by one backup/restore/list run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<Uuid>,

    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LogEntry {
    /// Create an entry stamped with the current time and thread
    pub fn new(level: Level, message: impl Into<String>, details: Option<String>) -> Self {
        let current = std::thread::current();
        let thread = current
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("{:?}", current.id()));

        Self {
            timestamp: Local::now(),
            level,
            thread,
            operation_id: None,
            message: message.into(),
            details: details.filter(|d| !d.is_empty()),
        }
    }

    /// Attach an operation id
    pub fn with_operation(mut self, operation_id: Option<Uuid>) -> Self {
        self.operation_id = operation_id;
        self
    }

    /// Format the entry for human-readable output
    pub fn format_human_readable(&self) -> String {
        let mut output = format!(
            "[{}] [{}] [{}] {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            self.level,
            self.thread,
            self.message
        );

        if let Some(details) = &self.details {
            output.push_str(&format!(" | {}", details));
        }

        output
    }
}
