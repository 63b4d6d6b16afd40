//! Listing of the backups in a user's share folder
//!
//! The scanner only reads; apart from creating a missing user folder it
//! never touches the share.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDateTime};
use serde::Serialize;

use crate::cancel::CancellationToken;
use crate::config::settings::DEFAULT_SCENARIO;
use crate::error::{ProfileError, ProfileResult};
use crate::progress::{ProgressEvent, ProgressSink};

use super::naming::{parse_archive_name, UNKNOWN_VERSION};

/// One archive found on the share
#[derive(Debug, Clone, Serialize)]
pub struct BackupRecord {
    pub path: PathBuf,
    pub file_name: String,
    pub version: String,
    /// Declared scenario; empty when the name could not be parsed
    pub scenario: String,
    /// From the file name, else the file's last write time
    pub timestamp: NaiveDateTime,
    pub size_bytes: u64,
    /// Usable by the active scenario
    pub compatible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl BackupRecord {
    /// Whether the file name matched one of the archive grammars
    pub fn is_parsed(&self) -> bool {
        !self.scenario.is_empty()
    }
}

/// Counts over every archive scanned, before filtering
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogSummary {
    pub total: usize,
    /// Archives whose name could be parsed
    pub valid: usize,
    /// Keyed by the first spelling seen; scenarios compare case-insensitively
    pub per_scenario: BTreeMap<String, usize>,
}

impl CatalogSummary {
    fn count_scenario(&mut self, scenario: &str) {
        let key = self
            .per_scenario
            .keys()
            .find(|key| key.eq_ignore_ascii_case(scenario))
            .cloned()
            .unwrap_or_else(|| scenario.to_string());
        *self.per_scenario.entry(key).or_insert(0) += 1;
    }
}

impl std::fmt::Display for CatalogSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Total: {} | Valid: {}", self.total, self.valid)?;
        if !self.per_scenario.is_empty() {
            let counts: Vec<String> = self
                .per_scenario
                .iter()
                .map(|(scenario, count)| format!("{}: {}", scenario, count))
                .collect();
            write!(f, " | {}", counts.join(", "))?;
        }
        Ok(())
    }
}

/// Result of a catalog scan
#[derive(Debug, Default, Clone, Serialize)]
pub struct Catalog {
    /// Records in directory enumeration order
    pub records: Vec<BackupRecord>,
    pub summary: CatalogSummary,
}

impl Catalog {
    /// Sort records newest first, as they are displayed
    pub fn sort_newest_first(&mut self) {
        self.records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    }

    pub fn latest(&self) -> Option<&BackupRecord> {
        self.records.iter().max_by_key(|r| r.timestamp)
    }
}

fn is_zip(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case("zip"))
}

fn last_write_time(metadata: &fs::Metadata) -> NaiveDateTime {
    metadata
        .modified()
        .map(|time| DateTime::<Local>::from(time).naive_local())
        .unwrap_or_else(|_| Local::now().naive_local())
}

/// Build the record for one archive
fn read_record(path: PathBuf, active_postfix: &str) -> ProfileResult<BackupRecord> {
    let metadata = fs::metadata(&path)
        .map_err(|e| ProfileError::Io(format!("Failed to stat {}: {}", path.display(), e)))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let record = match parse_archive_name(&file_name) {
        Some(parsed) => {
            let compatible =
                parsed.legacy || parsed.scenario.eq_ignore_ascii_case(active_postfix);
            let mut warning = (!compatible)
                .then(|| format!("Created for scenario '{}'", parsed.scenario));
            let timestamp = match parsed.timestamp {
                Some(timestamp) => timestamp,
                None => {
                    if warning.is_none() {
                        warning = Some("Invalid timestamp in file name, using file date".into());
                    }
                    last_write_time(&metadata)
                }
            };
            BackupRecord {
                path,
                file_name,
                version: parsed.version,
                scenario: parsed.scenario,
                timestamp,
                size_bytes: metadata.len(),
                compatible,
                warning,
            }
        }
        None => BackupRecord {
            path,
            file_name,
            version: UNKNOWN_VERSION.to_string(),
            scenario: String::new(),
            timestamp: last_write_time(&metadata),
            size_bytes: metadata.len(),
            compatible: false,
            warning: Some("Unrecognized file name".to_string()),
        },
    };

    Ok(record)
}

/// List the archives in `<share_root>/<user>`
///
/// A missing share yields an empty catalog. A missing user folder is
/// created and yields an empty catalog. With `show_all` false only
/// records whose scenario matches `active_postfix` are returned, so
/// legacy archives appear only for the default scenario. The summary
/// always counts every archive scanned.
pub fn list_backups(
    share_root: &Path,
    user: &str,
    active_postfix: &str,
    show_all: bool,
    progress: &dyn ProgressSink,
    cancel: &CancellationToken,
) -> ProfileResult<Catalog> {
    if !share_root.is_dir() {
        progress.report(ProgressEvent::indeterminate(
            "Share not reachable",
            share_root.display().to_string(),
        ));
        return Ok(Catalog::default());
    }

    let user_dir = share_root.join(user);
    if !user_dir.is_dir() {
        fs::create_dir_all(&user_dir).map_err(|e| {
            ProfileError::Io(format!("Failed to create {}: {}", user_dir.display(), e))
        })?;
        progress.report(ProgressEvent::indeterminate(
            "No backups found",
            user_dir.display().to_string(),
        ));
        return Ok(Catalog::default());
    }

    let entries = fs::read_dir(&user_dir)
        .map_err(|e| ProfileError::Io(format!("Failed to read {}: {}", user_dir.display(), e)))?;
    let archives: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_zip(path))
        .collect();

    // An empty postfix writes legacy names, which carry the default scenario
    let view_postfix = if active_postfix.is_empty() {
        DEFAULT_SCENARIO
    } else {
        active_postfix
    };
    let total = archives.len() as u64;
    let mut catalog = Catalog::default();

    for (index, path) in archives.into_iter().enumerate() {
        cancel.check()?;

        let record = read_record(path, active_postfix)?;
        progress.report(ProgressEvent::determinate(
            "Scanning backups...",
            index as u64 + 1,
            total,
            record.file_name.clone(),
        ));

        catalog.summary.total += 1;
        if record.is_parsed() {
            catalog.summary.valid += 1;
            catalog.summary.count_scenario(&record.scenario);
        }

        if show_all || record.scenario.eq_ignore_ascii_case(view_postfix) {
            catalog.records.push(record);
        }
    }

    progress.report(ProgressEvent::indeterminate(
        "Scan complete",
        catalog.summary.to_string(),
    ));
    Ok(catalog)
}
