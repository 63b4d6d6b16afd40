//! Backup display formatting
//!
//! Formats catalog records for terminal output.

use chrono::{Local, NaiveDateTime};

use crate::backup::{BackupRecord, CatalogSummary};

/// Format a list of backups as a table
///
/// Rows are printed in the order given; incompatible and unparsed archives
/// are marked in the status column.
pub fn format_backup_list(records: &[&BackupRecord], summary: &CatalogSummary) -> String {
    if records.is_empty() {
        return "No backups found.".to_string();
    }

    let version_width = records
        .iter()
        .map(|r| r.version.len())
        .max()
        .unwrap_or(7)
        .max(7);

    let scenario_width = records
        .iter()
        .map(|r| r.scenario.len())
        .max()
        .unwrap_or(8)
        .max(8);

    let mut output = String::new();
    output.push_str(&format!(
        "{:>3}  {:<16}  {:<version_width$}  {:<scenario_width$}  {:>10}  {}\n",
        "#",
        "Created",
        "Version",
        "Scenario",
        "Size",
        "Status",
        version_width = version_width,
        scenario_width = scenario_width,
    ));

    output.push_str(&format!(
        "{:->3}  {:-<16}  {:-<version_width$}  {:-<scenario_width$}  {:->10}  {:-<12}\n",
        "",
        "",
        "",
        "",
        "",
        "",
        version_width = version_width,
        scenario_width = scenario_width,
    ));

    for (i, record) in records.iter().enumerate() {
        let status = if !record.is_parsed() {
            "Unknown"
        } else if !record.compatible {
            "Other scenario"
        } else {
            ""
        };

        output.push_str(&format!(
            "{:>3}  {:<16}  {:<version_width$}  {:<scenario_width$}  {:>10}  {}\n",
            i + 1,
            record.timestamp.format("%Y-%m-%d %H:%M"),
            record.version,
            record.scenario,
            format_size(record.size_bytes),
            status,
            version_width = version_width,
            scenario_width = scenario_width,
        ));
    }

    output.push('\n');
    output.push_str(&summary.to_string());
    output.push('\n');

    output
}

/// Format details about a single backup
pub fn format_backup_details(record: &BackupRecord) -> String {
    let mut output = String::new();

    output.push_str(&format!("File:     {}\n", record.file_name));
    output.push_str(&format!("Location: {}\n", record.path.display()));
    output.push_str(&format!("Version:  {}\n", record.version));
    if !record.scenario.is_empty() {
        output.push_str(&format!("Scenario: {}\n", record.scenario));
    }
    output.push_str(&format!(
        "Created:  {} ({} ago)\n",
        record.timestamp.format("%Y-%m-%d %H:%M"),
        format_age(record.timestamp)
    ));
    output.push_str(&format!("Size:     {}\n", format_size(record.size_bytes)));
    if let Some(warning) = &record.warning {
        output.push_str(&format!("Warning:  {}\n", warning));
    }

    output
}

/// Time elapsed since `timestamp` in a compact form
pub fn format_age(timestamp: NaiveDateTime) -> String {
    let total_seconds = Local::now()
        .naive_local()
        .signed_duration_since(timestamp)
        .num_seconds()
        .max(0);

    if total_seconds < 60 {
        return format!("{}s", total_seconds);
    }

    let minutes = total_seconds / 60;
    if minutes < 60 {
        return format!("{}m", minutes);
    }

    let hours = minutes / 60;
    if hours < 24 {
        return format!("{}h", hours);
    }

    let days = hours / 24;
    if days < 30 {
        return format!("{}d", days);
    }

    format!("{}mo", days / 30)
}

/// Format a file size in human-readable form
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
