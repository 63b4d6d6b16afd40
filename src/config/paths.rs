//! Path management for profilecopy
//!
//! Resolves where the configuration file and the log directory live, and
//! which OS user name the share folder is keyed by.
//!
//! ## Configuration file resolution order
//!
//! 1. `PROFILECOPY_CONFIG` environment variable (if set)
//! 2. `host.local` next to the executable
//! 3. `host.local` in the platform config directory
//!    (`~/.config/profilecopy` or `%APPDATA%\profilecopy\config`)
//!
//! ## Log directory resolution order
//!
//! 1. `PROFILECOPY_LOG_DIR` environment variable (if set)
//! 2. `<temp>/ProfileCopy_Logs`

use std::path::{Path, PathBuf};

use crate::error::ProfileError;

/// Name of the configuration file
pub const CONFIG_FILE_NAME: &str = "host.local";

/// Manages all paths used by profilecopy
#[derive(Debug, Clone)]
pub struct ToolPaths {
    config_file: PathBuf,
    log_dir: PathBuf,
}

impl ToolPaths {
    /// Resolve paths from the environment
    ///
    /// `config_override` (the `--config` flag) wins over every other source.
    pub fn new(config_override: Option<PathBuf>) -> Self {
        let config_file = config_override
            .or_else(|| std::env::var_os("PROFILECOPY_CONFIG").map(PathBuf::from))
            .unwrap_or_else(resolve_default_config);

        let log_dir = std::env::var_os("PROFILECOPY_LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("ProfileCopy_Logs"));

        Self {
            config_file,
            log_dir,
        }
    }

    /// Create ToolPaths with explicit locations (useful for testing)
    pub fn with_locations(config_file: PathBuf, log_dir: PathBuf) -> Self {
        Self {
            config_file,
            log_dir,
        }
    }

    /// Path to `host.local`
    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// Directory holding the daily log files
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Ensure the log directory exists
    pub fn ensure_directories(&self) -> Result<(), ProfileError> {
        std::fs::create_dir_all(&self.log_dir)
            .map_err(|e| ProfileError::Io(format!("Failed to create log directory: {}", e)))
    }
}

/// `host.local` beside the executable if present, else the platform config dir
fn resolve_default_config() -> PathBuf {
    let beside_exe = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(CONFIG_FILE_NAME)));

    if let Some(path) = beside_exe.as_ref().filter(|p| p.exists()) {
        return path.clone();
    }

    directories::ProjectDirs::from("", "", "profilecopy")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
        .or(beside_exe)
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
}

/// Name of the OS user; archives are stored under `<share>/<user>/`
pub fn current_user_name() -> String {
    ["USERNAME", "USER", "LOGNAME"]
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .map(|name| name.trim().to_string())
        .find(|name| !name.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}
