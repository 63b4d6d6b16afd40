//! Custom error types for profilecopy
//!
//! This module defines the error hierarchy for backup, restore and catalog
//! operations using thiserror for ergonomic error definitions.
//!
//! Partial failures (a locked file during archiving, a file that could not be
//! deleted, a process that refused to die) are not errors: they are counted in
//! the operation reports and surfaced as warnings.

use std::path::PathBuf;

use thiserror::Error;

/// The main error type for profilecopy operations
#[derive(Error, Debug)]
pub enum ProfileError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// YAML serialization errors
    #[error("YAML error: {0}")]
    Yaml(String),

    /// Invalid user input, detected before any side effect
    #[error("Validation error: {0}")]
    Validation(String),

    /// The directory to archive does not exist
    #[error("Source directory not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    /// The directory to archive contains no files
    #[error("Source directory contains no files: {}", .0.display())]
    EmptyDirectory(PathBuf),

    /// Entity not found errors
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },

    /// The archive is missing or empty after it was written
    #[error("Archive could not be written: {0}")]
    ArchiveWriteFailed(String),

    /// Errors reading or writing the zip container itself
    #[error("Archive error: {0}")]
    Archive(String),

    /// The pre-restore snapshot could not be taken
    #[error("Snapshot failed, restore aborted: {0}")]
    Snapshot(String),

    /// Process enumeration errors
    #[error("Process error: {0}")]
    Process(String),

    /// The user asked the operation to stop
    #[error("Operation cancelled")]
    Cancelled,
}

impl ProfileError {
    /// Create a "not found" error for backup archives
    pub fn backup_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Backup",
            identifier: identifier.into(),
        }
    }

    /// Create a "not found" error for scenarios
    pub fn scenario_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Scenario",
            identifier: identifier.into(),
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::SourceNotFound(_) | Self::EmptyDirectory(_)
        )
    }

    /// Check if the user cancelled the operation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Short label used in log lines and final progress events
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Yaml(_) => "yaml",
            Self::Validation(_) | Self::SourceNotFound(_) | Self::EmptyDirectory(_) => {
                "validation"
            }
            Self::NotFound { .. } => "not-found",
            Self::ArchiveWriteFailed(_) => "integrity",
            Self::Archive(_) => "archive",
            Self::Snapshot(_) => "snapshot",
            Self::Process(_) => "process",
            Self::Cancelled => "cancelled",
        }
    }
}

// Implement From traits for common error types

impl From<std::io::Error> for ProfileError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ProfileError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<serde_yaml::Error> for ProfileError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Yaml(err.to_string())
    }
}

impl From<zip::result::ZipError> for ProfileError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::Archive(err.to_string())
    }
}

/// Result type alias for profilecopy operations
pub type ProfileResult<T> = Result<T, ProfileError>;
