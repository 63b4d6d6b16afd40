//! Scenario and log display formatting

use crate::config::ScenarioConfig;
use crate::journal::LogEntry;

/// Format the configured scenarios as a table, marking the active one
pub fn format_scenario_list(scenarios: &[ScenarioConfig], active: &str) -> String {
    if scenarios.is_empty() {
        return "No scenarios configured.".to_string();
    }

    let name_width = scenarios
        .iter()
        .map(|s| s.name.len())
        .max()
        .unwrap_or(4)
        .max(4);

    let postfix_width = scenarios
        .iter()
        .map(|s| s.zip_postfix.len())
        .max()
        .unwrap_or(7)
        .max(8);

    let mut output = String::new();
    output.push_str(&format!(
        "  {:<name_width$}  {:<postfix_width$}  {}\n",
        "Name",
        "Postfix",
        "Title",
        name_width = name_width,
        postfix_width = postfix_width,
    ));
    output.push_str(&format!(
        "  {:-<name_width$}  {:-<postfix_width$}  {:-<20}\n",
        "",
        "",
        "",
        name_width = name_width,
        postfix_width = postfix_width,
    ));

    for scenario in scenarios {
        let marker = if scenario.name.eq_ignore_ascii_case(active) {
            "*"
        } else {
            " "
        };
        let postfix = if scenario.uses_legacy_names() {
            "(legacy)"
        } else {
            scenario.zip_postfix.as_str()
        };

        output.push_str(&format!(
            "{} {:<name_width$}  {:<postfix_width$}  {}\n",
            marker,
            scenario.name,
            postfix,
            scenario.title,
            name_width = name_width,
            postfix_width = postfix_width,
        ));
    }

    output
}

/// Format scenario paths for the `config` command
pub fn format_scenario_details(scenario: &ScenarioConfig) -> String {
    let mut output = String::new();

    output.push_str(&format!("  Scenario:       {} ({})\n", scenario.name, scenario.title));
    output.push_str(&format!("  Source path:    {}\n", scenario.source_path.display()));
    output.push_str(&format!("  Target share:   {}\n", scenario.target_share.display()));
    output.push_str(&format!("  Processes:      {}\n", scenario.process_names.join(", ")));
    output.push_str(&format!(
        "  Archive naming: {}\n",
        if scenario.uses_legacy_names() {
            "legacy (no scenario segment)".to_string()
        } else {
            format!("postfix '{}'", scenario.zip_postfix)
        }
    ));

    output
}

/// Format log entries one per line
pub fn format_log_entries(entries: &[LogEntry]) -> String {
    if entries.is_empty() {
        return "Log is empty.".to_string();
    }

    entries
        .iter()
        .map(LogEntry::format_human_readable)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::Level;
    use std::path::PathBuf;

    fn scenario(name: &str, postfix: &str) -> ScenarioConfig {
        ScenarioConfig {
            name: name.into(),
            source_path: PathBuf::from("/home/u/profiles"),
            target_share: PathBuf::from("/mnt/share"),
            process_names: vec!["qgis".into(), "qgis-bin".into()],
            zip_postfix: postfix.into(),
            title: format!("{} title", name),
        }
    }

    #[test]
    fn test_active_marker_and_legacy() {
        let output = format_scenario_list(
            &[scenario("Alpha", "Alpha"), scenario("Old", "")],
            "alpha",
        );
        let lines: Vec<&str> = output.lines().collect();

        assert!(lines[2].starts_with("* Alpha"));
        assert!(lines[3].starts_with("  Old"));
        assert!(lines[3].contains("(legacy)"));
    }

    #[test]
    fn test_details() {
        let output = format_scenario_details(&scenario("Alpha", "Alpha"));
        assert!(output.contains("Processes:      qgis, qgis-bin"));
        assert!(output.contains("postfix 'Alpha'"));
    }

    #[test]
    fn test_log_entries() {
        assert_eq!(format_log_entries(&[]), "Log is empty.");

        let entries = vec![LogEntry::new(Level::Info, "Backup -> Started", None)];
        assert!(format_log_entries(&entries).contains("Backup -> Started"));
    }
}
