//! Append-only file logger
//!
//! Each entry is written as a single JSON line and flushed immediately.
//! Writes are serialized by a mutex so worker threads and the CLI thread can
//! share one logger. Logging never fails the caller: if the log file cannot
//! be written, the entry goes to a fallback error file and is otherwise
//! dropped.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use chrono::Local;
use uuid::Uuid;

use crate::error::{ProfileError, ProfileResult};

use super::entry::{Level, LogEntry};

const LOG_FILE_PREFIX: &str = "ProfileCopy_";
const FALLBACK_FILE: &str = "ProfileCopy_Error.log";

/// Handles writing log entries to the daily log file
pub struct FileLogger {
    log_path: PathBuf,
    min_level: Level,
    write_lock: Mutex<()>,
}

impl FileLogger {
    /// Create a logger writing to today's file in `log_dir`
    pub fn new(log_dir: &Path, min_level: Level) -> Self {
        let _ = fs::create_dir_all(log_dir);
        let file_name = format!("{}{}.log", LOG_FILE_PREFIX, Local::now().format("%Y%m%d"));
        Self::with_path(log_dir.join(file_name), min_level)
    }

    /// Create a logger writing to an explicit file
    pub fn with_path(log_path: PathBuf, min_level: Level) -> Self {
        Self {
            log_path,
            min_level,
            write_lock: Mutex::new(()),
        }
    }

    /// Log an entry
    ///
    /// Entries below the configured level are dropped.
    pub fn log(&self, entry: &LogEntry) {
        if entry.level < self.min_level {
            return;
        }

        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
        if let Err(e) = self.append(entry) {
            self.write_fallback(entry, &e);
        }
    }

    fn append(&self, entry: &LogEntry) -> ProfileResult<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(|e| ProfileError::Io(format!("Failed to open log: {}", e)))?;

        let json = serde_json::to_string(entry)
            .map_err(|e| ProfileError::Json(format!("Failed to serialize log entry: {}", e)))?;

        writeln!(file, "{}", json)
            .map_err(|e| ProfileError::Io(format!("Failed to write log entry: {}", e)))?;

        file.flush()
            .map_err(|e| ProfileError::Io(format!("Failed to flush log: {}", e)))?;

        Ok(())
    }

    fn write_fallback(&self, entry: &LogEntry, error: &ProfileError) {
        let fallback = self
            .log_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(std::env::temp_dir)
            .join(FALLBACK_FILE);

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(fallback) {
            let _ = writeln!(
                file,
                "[{}] LOG ERROR: {} | Original: {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                error,
                entry.format_human_readable()
            );
        }
    }

    pub fn debug(&self, message: impl Into<String>, details: Option<String>) {
        self.log(&LogEntry::new(Level::Debug, message, details));
    }

    pub fn info(&self, message: impl Into<String>, details: Option<String>) {
        self.log(&LogEntry::new(Level::Info, message, details));
    }

    pub fn warn(&self, message: impl Into<String>, details: Option<String>) {
        self.log(&LogEntry::new(Level::Warn, message, details));
    }

    pub fn error(&self, message: impl Into<String>, details: Option<String>) {
        self.log(&LogEntry::new(Level::Error, message, details));
    }

    /// Record a session boundary (`--- Backup started ---`)
    pub fn session(&self, session: &str, action: &str) {
        self.log(&LogEntry::new(
            Level::Oper,
            format!("--- {} {} ---", session, action),
            None,
        ));
    }

    /// Read all entries from the current log file
    ///
    /// Returns entries in chronological order (oldest first).
    pub fn read_all(&self) -> ProfileResult<Vec<LogEntry>> {
        if !self.log_path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.log_path)
            .map_err(|e| ProfileError::Io(format!("Failed to open log: {}", e)))?;

        let reader = BufReader::new(file);
        let mut entries = Vec::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| {
                ProfileError::Io(format!("Failed to read log line {}: {}", line_num + 1, e))
            })?;

            if line.trim().is_empty() {
                continue;
            }

            let entry: LogEntry = serde_json::from_str(&line).map_err(|e| {
                ProfileError::Json(format!(
                    "Failed to parse log entry at line {}: {}",
                    line_num + 1,
                    e
                ))
            })?;

            entries.push(entry);
        }

        Ok(entries)
    }

    /// Read the most recent N entries from the log
    pub fn read_recent(&self, count: usize) -> ProfileResult<Vec<LogEntry>> {
        let all_entries = self.read_all()?;
        let start = all_entries.len().saturating_sub(count);
        Ok(all_entries[start..].to_vec())
    }

    /// Delete log files in the log directory older than `retention_days`
    ///
    /// Returns the deleted paths. Files that cannot be deleted are logged
    /// as warnings and skipped.
    pub fn cleanup_old_logs(&self, retention_days: u64) -> Vec<PathBuf> {
        let Some(dir) = self.log_path.parent() else {
            return Vec::new();
        };
        let Some(cutoff) =
            SystemTime::now().checked_sub(Duration::from_secs(retention_days * 24 * 60 * 60))
        else {
            return Vec::new();
        };

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                self.warn("Log cleanup failed", Some(e.to_string()));
                return Vec::new();
            }
        };

        let mut deleted = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            let is_log = path
                .file_name()
                .map(|n| n.to_string_lossy())
                .is_some_and(|n| n.starts_with(LOG_FILE_PREFIX) && n.ends_with(".log"));
            if !is_log || path == self.log_path {
                continue;
            }

            let modified = entry.metadata().and_then(|m| m.modified());
            if !matches!(modified, Ok(time) if time < cutoff) {
                continue;
            }

            match fs::remove_file(&path) {
                Ok(()) => {
                    self.info("Deleted old log file", Some(path.display().to_string()));
                    deleted.push(path);
                }
                Err(e) => self.warn(
                    "Could not delete old log file",
                    Some(format!("{} | {}", path.display(), e)),
                ),
            }
        }

        deleted
    }

    /// Check if the log file exists
    pub fn exists(&self) -> bool {
        self.log_path.exists()
    }

    /// Get the path to the log file
    pub fn path(&self) -> &Path {
        &self.log_path
    }
}

/// Logger view that tags every entry with one operation id
#[derive(Clone)]
pub struct OperationLog {
    logger: Arc<FileLogger>,
    operation_id: Uuid,
    name: &'static str,
}

impl OperationLog {
    /// Start a new operation with a fresh id
    pub fn start(logger: Arc<FileLogger>, name: &'static str) -> Self {
        Self {
            logger,
            operation_id: Uuid::new_v4(),
            name,
        }
    }

    pub fn operation_id(&self) -> Uuid {
        self.operation_id
    }

    fn write(&self, level: Level, message: impl Into<String>, details: Option<String>) {
        self.logger
            .log(&LogEntry::new(level, message, details).with_operation(Some(self.operation_id)));
    }

    pub fn debug(&self, message: impl Into<String>, details: Option<String>) {
        self.write(Level::Debug, message, details);
    }

    pub fn info(&self, message: impl Into<String>, details: Option<String>) {
        self.write(Level::Info, message, details);
    }

    pub fn warn(&self, message: impl Into<String>, details: Option<String>) {
        self.write(Level::Warn, message, details);
    }

    pub fn error(&self, message: impl Into<String>, details: Option<String>) {
        self.write(Level::Error, message, details);
    }

    /// Record a phase transition of this operation (`Backup -> Started`)
    pub fn phase(&self, status: &str, details: Option<String>) {
        self.write(Level::Oper, format!("{} -> {}", self.name, status), details);
    }
}
