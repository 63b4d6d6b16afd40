//! CLI command handlers
//!
//! This module contains the implementation of CLI commands,
//! bridging the clap argument parsing with the backup service.

pub mod backup;
pub mod runner;

use std::sync::Arc;

use crate::backup::BackupService;
use crate::config::{ScenarioConfig, Settings, ToolPaths};
use crate::journal::FileLogger;

pub use backup::{handle_backup_command, BackupCommands, OutputFormat};
pub use runner::run_with_progress;

/// Everything a command handler needs, resolved once at startup
pub struct AppContext {
    pub paths: ToolPaths,
    pub settings: Settings,
    /// Scenario selected by `--scenario` or `ACTIVE_SCENARIO`
    pub scenario: ScenarioConfig,
    /// Name of the user's folder on the share
    pub user: String,
    pub logger: Arc<FileLogger>,
}

impl AppContext {
    /// A backup service for the selected scenario
    pub fn service(&self) -> BackupService {
        BackupService::new(&self.settings, self.scenario.clone(), Arc::clone(&self.logger))
            .with_user(self.user.clone())
    }
}
