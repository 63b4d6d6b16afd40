//! Typed settings for profilecopy
//!
//! [`Settings`] is built once at startup from a [`HostFile`] and then shared
//! read-only. It carries the global switches and every configured
//! [`ScenarioConfig`].

use std::path::PathBuf;

use serde::Serialize;

use super::host::{HostFile, Section};
use crate::error::{ProfileError, ProfileResult};

/// Scenario tag assigned to archives that use the legacy file name scheme,
/// and name of the scenario synthesized when the file defines none
pub const DEFAULT_SCENARIO: &str = "QGIS_Default";

/// Process names terminated when a scenario does not list its own
pub const DEFAULT_PROCESS_NAMES: &[&str] = &["qgis", "qgis-bin", "qgis-ltr-bin"];

fn default_kill_delay_ms() -> u64 {
    2000
}

fn default_log_retention_days() -> u64 {
    30
}

/// One named backup target
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioConfig {
    /// Section name in the configuration file
    pub name: String,
    /// Local profile directory to back up and restore into
    pub source_path: PathBuf,
    /// Share root; archives go to `<share>/<user>/`
    pub target_share: PathBuf,
    /// Processes to stop before touching the profile
    pub process_names: Vec<String>,
    /// Token embedded in archive file names; empty selects the legacy scheme
    pub zip_postfix: String,
    /// Human-readable title
    pub title: String,
}

impl ScenarioConfig {
    fn from_section(name: &str, section: &Section, defaults: &Section) -> Self {
        let source_path = section
            .get_non_empty("SOURCE_PATH")
            .or_else(|| defaults.get_non_empty("SOURCE_PATH"))
            .map(PathBuf::from)
            .unwrap_or_else(default_profile_dir);

        let target_share = section
            .get_non_empty("TARGET_SHARE")
            .or_else(|| defaults.get_non_empty("TARGET_SHARE"))
            .or_else(|| defaults.get_non_empty("DEFAULT_SHARE"))
            .map(PathBuf::from)
            .unwrap_or_default();

        let process_names = section
            .get("PROCESS_NAMES")
            .or_else(|| defaults.get("PROCESS_NAMES"))
            .map(parse_process_names)
            .unwrap_or_else(|| DEFAULT_PROCESS_NAMES.iter().map(|s| s.to_string()).collect());

        // An explicitly empty ZIP_POSTFIX is meaningful (legacy names)
        let zip_postfix = section
            .get("ZIP_POSTFIX")
            .map(|v| v.trim().to_string())
            .unwrap_or_else(|| name.to_string());

        let title = section
            .get_non_empty("SCENARIO_TITLE")
            .map(str::to_string)
            .unwrap_or_else(|| name.to_string());

        Self {
            name: name.to_string(),
            source_path,
            target_share,
            process_names,
            zip_postfix,
            title,
        }
    }

    /// Whether new archives are written with the legacy two-segment name
    pub fn uses_legacy_names(&self) -> bool {
        self.zip_postfix.is_empty()
    }
}

/// Global settings plus all scenarios
#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    /// Name of the scenario used when none is given on the command line
    pub active_scenario: String,
    /// Safety delay after stopping processes before a backup
    pub process_kill_delay_ms: u64,
    /// Ask for confirmation before killing processes
    pub show_kill_warning: bool,
    /// List archives of all scenarios instead of only the active one
    pub show_all_backups: bool,
    /// Mirror every progress event into the log
    pub debug_mode: bool,
    /// Minimum level written to the log
    pub log_level: String,
    /// Days to keep old log files
    pub log_retention_days: u64,
    /// Configured scenarios in file order
    pub scenarios: Vec<ScenarioConfig>,
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_host_file(&HostFile::default())
    }
}

impl Settings {
    /// Build settings from a parsed configuration file
    ///
    /// When the file has no sections, a single [`DEFAULT_SCENARIO`] is
    /// synthesized from the top-level keys.
    pub fn from_host_file(file: &HostFile) -> Self {
        let global = &file.global;

        let mut scenarios: Vec<ScenarioConfig> = file
            .sections
            .iter()
            .map(|(name, section)| ScenarioConfig::from_section(name, section, global))
            .collect();

        if scenarios.is_empty() {
            scenarios.push(ScenarioConfig::from_section(
                DEFAULT_SCENARIO,
                &Section::default(),
                global,
            ));
        }

        let active_scenario = global
            .get_non_empty("ACTIVE_SCENARIO")
            .map(str::to_string)
            .unwrap_or_else(|| scenarios[0].name.clone());

        Self {
            active_scenario,
            process_kill_delay_ms: global.get_u64("PROCESS_KILL_DELAY_MS", default_kill_delay_ms()),
            show_kill_warning: global.get_bool("SHOW_KILL_WARNING", true),
            show_all_backups: global.get_bool("SHOW_ALL_BACKUPS", false),
            debug_mode: global.get_bool("DEBUG_MODE", false),
            log_level: global
                .get_non_empty("LOG_LEVEL")
                .unwrap_or("Info")
                .to_string(),
            log_retention_days: global
                .get_u64("LOG_RETENTION_DAYS", default_log_retention_days()),
            scenarios,
        }
    }

    /// Parse settings from configuration text
    pub fn parse(contents: &str) -> Self {
        Self::from_host_file(&HostFile::parse(contents))
    }

    /// Load settings from `path`, or defaults if the file does not exist
    pub fn load_or_default(path: &std::path::Path) -> ProfileResult<Self> {
        if path.exists() {
            Ok(Self::from_host_file(&HostFile::load(path)?))
        } else {
            Ok(Self::default())
        }
    }

    /// Look up a scenario by name, case-insensitively
    pub fn scenario(&self, name: &str) -> ProfileResult<&ScenarioConfig> {
        self.scenarios
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| ProfileError::scenario_not_found(name))
    }

    /// The scenario named by `ACTIVE_SCENARIO`
    pub fn active(&self) -> ProfileResult<&ScenarioConfig> {
        self.scenario(&self.active_scenario).map_err(|_| {
            ProfileError::Config(format!(
                "ACTIVE_SCENARIO '{}' has no matching [section]",
                self.active_scenario
            ))
        })
    }

    /// Kill safety delay as a duration
    pub fn process_kill_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.process_kill_delay_ms)
    }
}

fn parse_process_names(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Platform location of QGIS 3 profiles
fn default_profile_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| dirs.data_dir().join("QGIS").join("QGIS3").join("profiles"))
        .unwrap_or_else(|| PathBuf::from("profiles"))
}
