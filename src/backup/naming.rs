//! Archive file names
//!
//! Two grammars exist on shares:
//!
//! - `QGISProfiles_<scenario>_<version>_<YYYYMMDD-HHMM>.zip`
//! - `QGISProfiles_<version>_<YYYYMMDD-HHMM>.zip` (legacy, no scenario)
//!
//! They are matched as two separate patterns, new form first. Scenario names
//! containing digit groups can make a name valid under both, and the order
//! decides which reading wins.

use std::sync::OnceLock;

use chrono::NaiveDateTime;
use regex::Regex;

use crate::config::settings::DEFAULT_SCENARIO;

/// Fixed prefix of every archive name
pub const ARCHIVE_PREFIX: &str = "QGISProfiles";

/// Version shown for files whose name matches neither grammar
pub const UNKNOWN_VERSION: &str = "(unknown)";

const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M";

fn new_form() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^QGISProfiles_(?P<scenario>.+?)_(?P<version>.+?)_(?P<stamp>\d{8}-\d{4})(?i:\.zip)$")
            .unwrap()
    })
}

fn legacy_form() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^QGISProfiles_(?P<version>.+?)_(?P<stamp>\d{8}-\d{4})(?i:\.zip)$").unwrap()
    })
}

/// Structured reading of an archive file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    /// Declared scenario; `QGIS_Default` for legacy names
    pub scenario: String,
    pub version: String,
    /// `None` when the digits do not form a valid date and time
    pub timestamp: Option<NaiveDateTime>,
    /// Name uses the legacy grammar
    pub legacy: bool,
}

/// Build the archive file name for a backup taken at `timestamp`
///
/// An empty `postfix` produces the legacy form.
pub fn build_archive_name(postfix: &str, version: &str, timestamp: NaiveDateTime) -> String {
    let stamp = timestamp.format(TIMESTAMP_FORMAT);
    if postfix.is_empty() {
        format!("{}_{}_{}.zip", ARCHIVE_PREFIX, version, stamp)
    } else {
        format!("{}_{}_{}_{}.zip", ARCHIVE_PREFIX, postfix, version, stamp)
    }
}

/// Parse an archive file name, new grammar first, then legacy
///
/// Returns `None` if neither grammar matches.
pub fn parse_archive_name(file_name: &str) -> Option<ParsedName> {
    if let Some(caps) = new_form().captures(file_name) {
        return Some(ParsedName {
            scenario: caps["scenario"].to_string(),
            version: caps["version"].to_string(),
            timestamp: parse_timestamp(&caps["stamp"]),
            legacy: false,
        });
    }

    legacy_form().captures(file_name).map(|caps| ParsedName {
        scenario: DEFAULT_SCENARIO.to_string(),
        version: caps["version"].to_string(),
        timestamp: parse_timestamp(&caps["stamp"]),
        legacy: true,
    })
}

fn parse_timestamp(stamp: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_build_new_form() {
        let name = build_archive_name("Alpha", "3.34", at(2024, 1, 1, 9, 30));
        assert_eq!(name, "QGISProfiles_Alpha_3.34_20240101-0930.zip");
    }

    #[test]
    fn test_build_legacy_form_for_empty_postfix() {
        let name = build_archive_name("", "3.34", at(2024, 1, 1, 9, 30));
        assert_eq!(name, "QGISProfiles_3.34_20240101-0930.zip");
    }

    #[test]
    fn test_parse_new_form() {
        let parsed = parse_archive_name("QGISProfiles_Alpha_1.2_20240101-0930.zip").unwrap();
        assert_eq!(parsed.scenario, "Alpha");
        assert_eq!(parsed.version, "1.2");
        assert_eq!(parsed.timestamp, Some(at(2024, 1, 1, 9, 30)));
        assert!(!parsed.legacy);
    }

    #[test]
    fn test_parse_legacy_form() {
        let parsed = parse_archive_name("QGISProfiles_1.2_20240101-0930.zip").unwrap();
        assert_eq!(parsed.scenario, DEFAULT_SCENARIO);
        assert_eq!(parsed.version, "1.2");
        assert_eq!(parsed.timestamp, Some(at(2024, 1, 1, 9, 30)));
        assert!(parsed.legacy);
    }

    #[test]
    fn test_scenario_is_non_greedy() {
        // The first underscore after the prefix ends the scenario
        let parsed = parse_archive_name("QGISProfiles_Team_GIS_3.28_LTR_20231231-2359.zip").unwrap();
        assert_eq!(parsed.scenario, "Team");
        assert_eq!(parsed.version, "GIS_3.28_LTR");
        assert_eq!(parsed.timestamp, Some(at(2023, 12, 31, 23, 59)));
    }

    #[test]
    fn test_round_trip_of_built_name() {
        let stamp = at(2025, 6, 15, 14, 5);
        let parsed = parse_archive_name(&build_archive_name("Beta", "3.40.1", stamp)).unwrap();
        assert_eq!(parsed.scenario, "Beta");
        assert_eq!(parsed.version, "3.40.1");
        assert_eq!(parsed.timestamp, Some(stamp));
    }

    #[test]
    fn test_extension_case_insensitive() {
        assert!(parse_archive_name("QGISProfiles_Alpha_1.2_20240101-0930.ZIP").is_some());
    }

    #[test]
    fn test_unparseable_names() {
        assert!(parse_archive_name("holiday-photos.zip").is_none());
        assert!(parse_archive_name("QGISProfiles_1.2.zip").is_none());
        assert!(parse_archive_name("QGISProfiles_Alpha_1.2_2024-01-01.zip").is_none());
    }

    #[test]
    fn test_invalid_date_still_parses_name() {
        let parsed = parse_archive_name("QGISProfiles_Alpha_1.2_20241399-2500.zip").unwrap();
        assert_eq!(parsed.version, "1.2");
        assert!(parsed.timestamp.is_none());
    }
}
