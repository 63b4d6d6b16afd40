//! Backup and restore orchestration
//!
//! [`BackupService`] runs one top-level operation at a time through its
//! phases, strictly in order:
//!
//! - backup: validate, stop processes, compress to a local temp file,
//!   verify, copy to `<share>/<user>/`, verify
//! - restore: validate, stop processes, snapshot the current profile,
//!   delete it, recreate the directory, extract
//!
//! Every run ends with exactly one final progress event: completed, failed
//! or cancelled. Failures are logged with the operation id; cancellation is
//! logged as information only.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;

use crate::archive::{create_archive, extract_archive, verify_archive, ArchiveReport, ExtractReport};
use crate::cancel::CancellationToken;
use crate::config::paths::current_user_name;
use crate::config::{ScenarioConfig, Settings};
use crate::error::{ProfileError, ProfileResult};
use crate::journal::{FileLogger, OperationLog};
use crate::process::{ProcessTerminator, TerminationReport};
use crate::progress::{ProgressEvent, ProgressSink};
use crate::transfer::{copy_tree, copy_with_progress, delete_tree, DeleteReport};

use super::naming::build_archive_name;

/// Characters that cannot appear in a version because it becomes part of a
/// file name
const INVALID_VERSION_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Delays between and after phases
#[derive(Debug, Clone, Copy)]
pub struct ServiceTimings {
    /// Pause between phases so each status is readable
    pub phase_pause: Duration,
    /// Wait after stopping processes before a backup reads the profile
    pub backup_kill_delay: Duration,
    /// Wait after stopping processes before a restore deletes the profile
    pub restore_kill_delay: Duration,
    /// How long the final success event stays visible
    pub final_hold: Duration,
}

impl ServiceTimings {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            phase_pause: Duration::from_millis(200),
            backup_kill_delay: settings.process_kill_delay(),
            restore_kill_delay: Duration::from_millis(1000),
            final_hold: Duration::from_millis(500),
        }
    }

    /// No delays at all
    pub fn immediate() -> Self {
        Self {
            phase_pause: Duration::ZERO,
            backup_kill_delay: Duration::ZERO,
            restore_kill_delay: Duration::ZERO,
            final_hold: Duration::ZERO,
        }
    }
}

/// Result of a successful backup
#[derive(Debug)]
pub struct BackupOutcome {
    /// Archive on the share
    pub archive_path: PathBuf,
    pub archive: ArchiveReport,
    pub termination: Option<TerminationReport>,
}

/// Result of a successful restore
#[derive(Debug)]
pub struct RestoreOutcome {
    pub target: PathBuf,
    /// Copy of the previous profile, if one was taken
    pub snapshot: Option<PathBuf>,
    /// `None` when the target did not exist before the restore
    pub deleted: Option<DeleteReport>,
    pub extract: ExtractReport,
    pub termination: Option<TerminationReport>,
}

/// Removes a file when dropped unless disarmed
struct FileCleanup {
    path: PathBuf,
    armed: bool,
}

impl FileCleanup {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for FileCleanup {
    fn drop(&mut self) {
        if self.armed && self.path.exists() {
            let _ = fs::remove_file(&self.path);
        }
    }
}

/// Progress sink that also writes every event to the log
struct MirroredProgress<'a> {
    inner: &'a dyn ProgressSink,
    log: Option<&'a OperationLog>,
}

impl ProgressSink for MirroredProgress<'_> {
    fn report(&self, event: ProgressEvent) {
        if let Some(log) = self.log {
            log.debug(format!("Progress: {}", event.status), Some(event.detail.clone()));
        }
        self.inner.report(event);
    }
}

/// Sibling directory for the pre-restore copy of `target`
///
/// `<name>_Snapshot_<YYYYMMDD-HHMMSS>`, with a numeric suffix if that
/// already exists.
fn snapshot_path(target: &Path) -> PathBuf {
    let parent = target
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "profile".to_string());
    let base = format!("{}_Snapshot_{}", name, Local::now().format("%Y%m%d-%H%M%S"));

    let mut candidate = parent.join(&base);
    let mut counter = 2;
    while candidate.exists() {
        candidate = parent.join(format!("{}_{}", base, counter));
        counter += 1;
    }
    candidate
}

fn validate_version(version: &str) -> ProfileResult<&str> {
    let version = version.trim();
    if version.is_empty() {
        return Err(ProfileError::Validation("Version must not be empty".into()));
    }
    if version.contains(INVALID_VERSION_CHARS) {
        return Err(ProfileError::Validation(format!(
            "Version '{}' contains characters not allowed in file names",
            version
        )));
    }
    Ok(version)
}

/// Runs backups and restores for one scenario
pub struct BackupService {
    scenario: ScenarioConfig,
    user: String,
    debug_mode: bool,
    logger: Arc<FileLogger>,
    terminator: ProcessTerminator,
    timings: ServiceTimings,
    temp_dir: PathBuf,
}

impl BackupService {
    /// Create a service for `scenario` using the real process table
    pub fn new(settings: &Settings, scenario: ScenarioConfig, logger: Arc<FileLogger>) -> Self {
        Self {
            scenario,
            user: current_user_name(),
            debug_mode: settings.debug_mode,
            logger,
            terminator: ProcessTerminator::system(),
            timings: ServiceTimings::from_settings(settings),
            temp_dir: std::env::temp_dir(),
        }
    }

    pub fn with_terminator(mut self, terminator: ProcessTerminator) -> Self {
        self.terminator = terminator;
        self
    }

    pub fn with_timings(mut self, timings: ServiceTimings) -> Self {
        self.timings = timings;
        self
    }

    /// Override the share sub-folder name (defaults to the OS user)
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    /// Directory for the local archive before it is copied to the share
    pub fn with_temp_dir(mut self, temp_dir: PathBuf) -> Self {
        self.temp_dir = temp_dir;
        self
    }

    pub fn scenario(&self) -> &ScenarioConfig {
        &self.scenario
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    /// Folder holding this user's archives
    pub fn user_dir(&self, share_root: &Path) -> PathBuf {
        share_root.join(&self.user)
    }

    /// Back up `source` to the share
    ///
    /// With `kill`, the scenario's processes are stopped first. The local
    /// temp archive is removed on every exit path; a partial copy on the
    /// share is removed on failure or cancellation.
    pub fn create_backup(
        &mut self,
        source: &Path,
        share_root: &Path,
        version: &str,
        kill: bool,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> ProfileResult<BackupOutcome> {
        let op = OperationLog::start(Arc::clone(&self.logger), "Backup");
        op.phase(
            "Started",
            Some(format!(
                "scenario={} source={} share={} version={} kill={}",
                self.scenario.name,
                source.display(),
                share_root.display(),
                version,
                kill
            )),
        );

        let mirrored = MirroredProgress {
            inner: progress,
            log: self.debug_mode.then_some(&op),
        };
        let result = self.run_backup(source, share_root, version, kill, &op, &mirrored, cancel);

        match &result {
            Ok(outcome) => self.finish_success(
                &op,
                &mirrored,
                "Backup completed",
                outcome.archive_path.display().to_string(),
            ),
            Err(e) => self.finish_failure(&op, &mirrored, "Backup", e),
        }
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn run_backup(
        &mut self,
        source: &Path,
        share_root: &Path,
        version: &str,
        kill: bool,
        op: &OperationLog,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> ProfileResult<BackupOutcome> {
        progress.report(ProgressEvent::indeterminate(
            "Validating...",
            source.display().to_string(),
        ));
        if !source.is_dir() {
            return Err(ProfileError::SourceNotFound(source.to_path_buf()));
        }
        let version = validate_version(version)?;
        if !share_root.is_dir() {
            return Err(ProfileError::Validation(format!(
                "Share not reachable: {}",
                share_root.display()
            )));
        }

        let termination = if kill {
            let report = self.stop_processes(op, progress, cancel)?;
            progress.report(ProgressEvent::indeterminate(
                "Waiting for files to be released...",
                format!("{} ms", self.timings.backup_kill_delay.as_millis()),
            ));
            cancel.sleep(self.timings.backup_kill_delay)?;
            Some(report)
        } else {
            None
        };

        let name = build_archive_name(&self.scenario.zip_postfix, version, Local::now().naive_local());
        let user_dir = self.user_dir(share_root);
        let destination = user_dir.join(&name);
        op.info("Archive name", Some(destination.display().to_string()));

        let temp_archive = self
            .temp_dir
            .join(format!("ProfileCopy_{}_{}", op.operation_id().simple(), name));
        let _temp_cleanup = FileCleanup::new(temp_archive.clone());

        cancel.sleep(self.timings.phase_pause)?;
        let archive = create_archive(source, &temp_archive, progress, cancel)?;
        if let Some(warning) = archive.warning() {
            op.warn(warning.clone(), None);
            for (path, reason) in &archive.failures {
                op.warn("File skipped", Some(format!("{} | {}", path.display(), reason)));
            }
            progress.report(ProgressEvent::indeterminate("Compression warning", warning));
        }
        op.phase(
            "Compressed",
            Some(format!("{} file(s), {} bytes", archive.files_added, archive.archive_size)),
        );

        progress.report(ProgressEvent::indeterminate(
            "Verifying archive...",
            temp_archive.display().to_string(),
        ));
        verify_archive(&temp_archive)?;
        cancel.sleep(self.timings.phase_pause)?;

        fs::create_dir_all(&user_dir).map_err(|e| {
            ProfileError::Io(format!("Failed to create {}: {}", user_dir.display(), e))
        })?;
        let mut destination_cleanup = FileCleanup::new(destination.clone());
        copy_with_progress(&temp_archive, &destination, "Copying to share...", progress, cancel)?;

        progress.report(ProgressEvent::indeterminate(
            "Verifying copy...",
            destination.display().to_string(),
        ));
        verify_archive(&destination)?;
        destination_cleanup.disarm();
        op.phase("Copied", Some(destination.display().to_string()));

        Ok(BackupOutcome {
            archive_path: destination,
            archive,
            termination,
        })
    }

    /// Restore `archive` into `target`
    ///
    /// With `snapshot`, an existing target is first copied to a sibling
    /// directory; if that copy fails the restore is aborted before anything
    /// is deleted. There is no automatic rollback after deletion.
    pub fn restore_backup(
        &mut self,
        archive: &Path,
        target: &Path,
        kill: bool,
        snapshot: bool,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> ProfileResult<RestoreOutcome> {
        let op = OperationLog::start(Arc::clone(&self.logger), "Restore");
        op.phase(
            "Started",
            Some(format!(
                "scenario={} archive={} target={} kill={} snapshot={}",
                self.scenario.name,
                archive.display(),
                target.display(),
                kill,
                snapshot
            )),
        );

        let mirrored = MirroredProgress {
            inner: progress,
            log: self.debug_mode.then_some(&op),
        };
        let result = self.run_restore(archive, target, kill, snapshot, &op, &mirrored, cancel);

        match &result {
            Ok(outcome) => self.finish_success(
                &op,
                &mirrored,
                "Restore completed",
                outcome.target.display().to_string(),
            ),
            Err(e) => self.finish_failure(&op, &mirrored, "Restore", e),
        }
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn run_restore(
        &mut self,
        archive: &Path,
        target: &Path,
        kill: bool,
        snapshot: bool,
        op: &OperationLog,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> ProfileResult<RestoreOutcome> {
        progress.report(ProgressEvent::indeterminate(
            "Validating...",
            archive.display().to_string(),
        ));
        if !archive.is_file() {
            return Err(ProfileError::backup_not_found(archive.display().to_string()));
        }
        if target.to_string_lossy().trim().is_empty() {
            return Err(ProfileError::Validation("Target path must not be empty".into()));
        }

        let termination = if kill {
            let report = self.stop_processes(op, progress, cancel)?;
            progress.report(ProgressEvent::indeterminate(
                "Waiting for files to be released...",
                format!("{} ms", self.timings.restore_kill_delay.as_millis()),
            ));
            cancel.sleep(self.timings.restore_kill_delay)?;
            Some(report)
        } else {
            None
        };

        let existed = target.exists();
        let snapshot_dir = if snapshot && existed {
            Some(self.take_snapshot(target, op, progress, cancel)?)
        } else {
            None
        };

        let deleted = if existed {
            cancel.sleep(self.timings.phase_pause)?;
            let report = delete_tree(target, progress, cancel)?;
            for (path, reason) in &report.failures {
                op.warn("File not deleted", Some(format!("{} | {}", path.display(), reason)));
            }
            op.phase(
                "Deleted",
                Some(format!("{} of {} file(s)", report.files_deleted, report.files_total)),
            );
            Some(report)
        } else {
            None
        };

        fs::create_dir_all(target).map_err(|e| {
            ProfileError::Io(format!("Failed to create {}: {}", target.display(), e))
        })?;

        cancel.sleep(self.timings.phase_pause)?;
        let extract = extract_archive(archive, target, progress, cancel)?;
        for name in &extract.skipped {
            op.warn("Entry skipped: path escapes target", Some(name.clone()));
        }
        op.phase(
            "Extracted",
            Some(format!("{} file(s) written", extract.files_written)),
        );

        Ok(RestoreOutcome {
            target: target.to_path_buf(),
            snapshot: snapshot_dir,
            deleted,
            extract,
            termination,
        })
    }

    /// Copy `target` into a fresh snapshot directory
    ///
    /// A partial snapshot is removed before the error is returned.
    fn take_snapshot(
        &self,
        target: &Path,
        op: &OperationLog,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> ProfileResult<PathBuf> {
        let snapshot_dir = snapshot_path(target);
        progress.report(ProgressEvent::indeterminate(
            "Saving current profile...",
            snapshot_dir.display().to_string(),
        ));

        match copy_tree(target, &snapshot_dir, progress, cancel) {
            Ok(report) => {
                op.phase(
                    "Snapshot",
                    Some(format!(
                        "{} file(s) to {}",
                        report.files_copied,
                        snapshot_dir.display()
                    )),
                );
                Ok(snapshot_dir)
            }
            Err(e) => {
                let _ = fs::remove_dir_all(&snapshot_dir);
                if e.is_cancelled() {
                    Err(e)
                } else {
                    Err(ProfileError::Snapshot(e.to_string()))
                }
            }
        }
    }

    fn stop_processes(
        &mut self,
        op: &OperationLog,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> ProfileResult<TerminationReport> {
        let report = self
            .terminator
            .terminate(&self.scenario.process_names, progress, cancel)?;

        op.phase("Processes", Some(report.summary()));
        for (name, reason) in &report.search_failures {
            op.warn(format!("Process search failed: {}", name), Some(reason.clone()));
        }
        for survivor in &report.survivors {
            op.warn("Process could not be stopped", Some(survivor.to_string()));
        }
        Ok(report)
    }

    fn finish_success(
        &self,
        op: &OperationLog,
        progress: &dyn ProgressSink,
        status: &str,
        detail: String,
    ) {
        op.phase("Completed", Some(detail.clone()));
        progress.report(ProgressEvent::indeterminate(status, detail));
        std::thread::sleep(self.timings.final_hold);
    }

    fn finish_failure(
        &self,
        op: &OperationLog,
        progress: &dyn ProgressSink,
        operation: &str,
        error: &ProfileError,
    ) {
        if error.is_cancelled() {
            op.info(format!("{} cancelled by user", operation), None);
            progress.report(ProgressEvent::indeterminate(
                "Cancelled",
                format!("{} cancelled by user", operation),
            ));
        } else {
            op.error(
                format!("{} failed", operation),
                Some(format!("{}: {}", error.kind(), error)),
            );
            progress.report(ProgressEvent::indeterminate(
                format!("{} failed", operation),
                error.to_string(),
            ));
        }
    }
}
