//! Backup CLI commands
//!
//! Implements `create`, `restore` and `list`.

use clap::{Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use crate::backup::{list_backups, parse_archive_name};
use crate::cancel::CancellationToken;
use crate::display::{format_backup_details, format_backup_list, format_size};
use crate::error::{ProfileError, ProfileResult};
use crate::process::TerminationReport;
use crate::progress::NoProgress;

use super::runner::run_with_progress;
use super::AppContext;

/// Output format for `list`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Yaml,
}

/// Backup subcommands
#[derive(Subcommand)]
pub enum BackupCommands {
    /// Back up the profile directory to the share
    Create {
        /// Version label embedded in the archive name (e.g. "3.34")
        #[arg(long)]
        version: String,

        /// Profile directory to back up (defaults to SOURCE_PATH)
        #[arg(long)]
        source: Option<PathBuf>,

        /// Share root (defaults to TARGET_SHARE)
        #[arg(long)]
        share: Option<PathBuf>,

        /// Stop the scenario's processes before reading the profile
        #[arg(short, long)]
        kill: bool,

        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Restore a backup over the profile directory
    Restore {
        /// Backup file name, full path, or 'latest'
        backup: String,

        /// Profile directory to restore into (defaults to SOURCE_PATH)
        #[arg(long)]
        target: Option<PathBuf>,

        /// Stop the scenario's processes before deleting the profile
        #[arg(short, long)]
        kill: bool,

        /// Do not keep a copy of the current profile
        #[arg(long)]
        no_snapshot: bool,

        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// List the backups on the share
    List {
        /// Include archives of other scenarios and unrecognized files
        #[arg(short, long)]
        all: bool,

        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
}

/// Handle a backup command
pub fn handle_backup_command(ctx: &AppContext, cmd: BackupCommands) -> ProfileResult<()> {
    match cmd {
        BackupCommands::Create {
            version,
            source,
            share,
            kill,
            force,
        } => {
            let source = source.unwrap_or_else(|| ctx.scenario.source_path.clone());
            let share = share.unwrap_or_else(|| ctx.scenario.target_share.clone());
            if share.as_os_str().is_empty() {
                return Err(ProfileError::Config(
                    "No target share configured (set TARGET_SHARE or pass --share)".into(),
                ));
            }

            let command_line = format!("profilecopy create --version {} --kill", version);
            if kill && !kill_confirmed(ctx, force, &command_line) {
                return Ok(());
            }

            println!("Backing up {}", source.display());
            println!("Press Esc to cancel.");
            let mut service = ctx.service();
            let outcome = run_with_progress("backup", move |progress, cancel| {
                service.create_backup(&source, &share, &version, kill, progress, cancel)
            })?;

            if let Some(report) = &outcome.termination {
                print_termination(report);
            }
            let filename = outcome
                .archive_path
                .file_name()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| outcome.archive_path.display().to_string());
            println!("Backup created: {}", filename);
            println!("Location: {}", outcome.archive_path.display());
            println!(
                "Files: {}, size: {}",
                outcome.archive.files_added,
                format_size(outcome.archive.archive_size)
            );
            if let Some(warning) = outcome.archive.warning() {
                println!();
                println!("WARNING: {}", warning);
                for (path, reason) in &outcome.archive.failures {
                    println!("  {} ({})", path.display(), reason);
                }
            }
        }

        BackupCommands::Restore {
            backup,
            target,
            kill,
            no_snapshot,
            force,
        } => {
            let backup_path = resolve_backup_path(ctx, &backup)?;
            let target = target.unwrap_or_else(|| ctx.scenario.source_path.clone());

            print_backup_information(ctx, &backup_path)?;

            if !force {
                println!("WARNING: This will replace the profile at {}", target.display());
                if kill {
                    println!(
                        "These processes will be stopped: {}",
                        ctx.scenario.process_names.join(", ")
                    );
                }
                println!("To proceed, run again with --force flag:");
                println!("  profilecopy restore {} --force", backup);
                return Ok(());
            }

            println!("Restoring into {}", target.display());
            println!("Press Esc to cancel.");
            let mut service = ctx.service();
            let snapshot = !no_snapshot;
            let outcome = run_with_progress("restore", move |progress, cancel| {
                service.restore_backup(&backup_path, &target, kill, snapshot, progress, cancel)
            })?;

            if let Some(report) = &outcome.termination {
                print_termination(report);
            }
            println!("Restore complete!");
            println!("Files restored: {}", outcome.extract.files_written);
            if let Some(snapshot) = &outcome.snapshot {
                println!("Previous profile saved to: {}", snapshot.display());
            }
            if let Some(deleted) = &outcome.deleted {
                if !deleted.failures.is_empty() {
                    println!();
                    println!(
                        "WARNING: {} old file(s) could not be deleted:",
                        deleted.failures.len()
                    );
                    for (path, reason) in &deleted.failures {
                        println!("  {} ({})", path.display(), reason);
                    }
                }
            }
            if !outcome.extract.skipped.is_empty() {
                println!();
                println!(
                    "WARNING: {} archive entr(ies) skipped (unsafe path):",
                    outcome.extract.skipped.len()
                );
                for name in &outcome.extract.skipped {
                    println!("  {}", name);
                }
            }
        }

        BackupCommands::List { all, format } => {
            let show_all = all || ctx.settings.show_all_backups;
            let share = ctx.scenario.target_share.clone();
            let user = ctx.user.clone();
            let postfix = ctx.scenario.zip_postfix.clone();

            let mut catalog = run_with_progress("catalog", move |progress, cancel| {
                list_backups(&share, &user, &postfix, show_all, progress, cancel)
            })?;
            catalog.sort_newest_first();

            match format {
                OutputFormat::Table => {
                    if catalog.records.is_empty() {
                        println!("No backups found.");
                        println!("Create one with: profilecopy create --version <VERSION>");
                        return Ok(());
                    }
                    println!("Available Backups ({})", ctx.scenario.title);
                    println!("=================");
                    println!();
                    let records: Vec<_> = catalog.records.iter().collect();
                    print!("{}", format_backup_list(&records, &catalog.summary));
                }
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&catalog)?);
                }
                OutputFormat::Yaml => {
                    print!("{}", serde_yaml::to_string(&catalog)?);
                }
            }
        }
    }

    Ok(())
}

/// Ask for `--force` before stopping processes, if configured to warn
fn kill_confirmed(ctx: &AppContext, force: bool, command_line: &str) -> bool {
    if force || !ctx.settings.show_kill_warning {
        return true;
    }

    println!("WARNING: These processes will be stopped and unsaved work will be lost:");
    println!("  {}", ctx.scenario.process_names.join(", "));
    println!("To proceed, run again with --force flag:");
    println!("  {} --force", command_line);
    false
}

fn print_termination(report: &TerminationReport) {
    if report.found == 0 {
        println!("No running processes found.");
        return;
    }
    println!("Processes: {}", report.summary());
    for survivor in &report.survivors {
        println!("  WARNING: {} is still running", survivor);
    }
}

fn print_backup_information(ctx: &AppContext, backup_path: &Path) -> ProfileResult<()> {
    println!("Backup Information");
    println!("==================");

    // Archives in the user's folder get the full catalog view
    let catalog = list_backups(
        &ctx.scenario.target_share,
        &ctx.user,
        &ctx.scenario.zip_postfix,
        true,
        &NoProgress,
        &CancellationToken::new(),
    )?;
    match catalog.records.iter().find(|r| r.path == backup_path) {
        Some(record) => print!("{}", format_backup_details(record)),
        None => {
            let metadata = std::fs::metadata(backup_path)?;
            println!("File:     {}", backup_path.display());
            println!("Size:     {}", format_size(metadata.len()));
            if let Some(parsed) = backup_path
                .file_name()
                .and_then(|n| parse_archive_name(&n.to_string_lossy()))
            {
                println!("Version:  {}", parsed.version);
                println!("Scenario: {}", parsed.scenario);
            }
        }
    }
    println!();
    Ok(())
}

/// Resolve a backup identifier to a full path
///
/// Accepts `latest` (newest archive of the active scenario), an existing path, or a file
/// name inside the user's share folder, with or without `.zip`.
fn resolve_backup_path(ctx: &AppContext, backup: &str) -> ProfileResult<PathBuf> {
    let share = &ctx.scenario.target_share;

    if backup.eq_ignore_ascii_case("latest") {
        let catalog = list_backups(
            share,
            &ctx.user,
            &ctx.scenario.zip_postfix,
            false,
            &NoProgress,
            &CancellationToken::new(),
        )?;
        return catalog
            .latest()
            .map(|record| record.path.clone())
            .ok_or_else(|| ProfileError::backup_not_found("latest"));
    }

    let path = PathBuf::from(backup);
    if path.is_file() {
        return Ok(path);
    }

    let user_dir = share.join(&ctx.user);
    let in_share = user_dir.join(backup);
    if in_share.is_file() {
        return Ok(in_share);
    }

    let with_ext = user_dir.join(format!("{}.zip", backup));
    if with_ext.is_file() {
        return Ok(with_ext);
    }

    Err(ProfileError::backup_not_found(backup))
}
