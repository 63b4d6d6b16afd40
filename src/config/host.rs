//! Parser for the `host.local` configuration file
//!
//! The format is a flat list of `KEY=VALUE` lines followed by optional
//! `[Scenario]` sections with their own `KEY=VALUE` lines:
//!
//! ```text
//! # global settings
//! ACTIVE_SCENARIO=QGIS_LTR
//! PROCESS_KILL_DELAY_MS=2000
//!
//! [QGIS_LTR]
//! SOURCE_PATH=%APPDATA%\QGIS\QGIS3\profiles
//! TARGET_SHARE=\\server\profiles
//! PROCESS_NAMES=qgis-ltr-bin,qgis
//! ```
//!
//! Keys are matched case-insensitively. Values are trimmed and environment
//! variables written as `%NAME%` or `${NAME}` are expanded; unknown variables
//! are left as written.

use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::error::{ProfileError, ProfileResult};

/// Key/value pairs of one section
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Section {
    values: HashMap<String, String>,
}

impl Section {
    /// Raw value for `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(&key.to_ascii_uppercase()).map(String::as_str)
    }

    /// Value for `key` if present and not blank
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.trim().is_empty())
    }

    /// Boolean value; unparseable values fall back to `default`
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.get(key).map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if v == "true" || v == "1" || v == "yes" => true,
            Some(v) if v == "false" || v == "0" || v == "no" => false,
            _ => default,
        }
    }

    /// Integer value; unparseable values fall back to `default`
    pub fn get_u64(&self, key: &str, default: u64) -> u64 {
        self.get(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn insert(&mut self, key: &str, value: String) {
        self.values.insert(key.to_ascii_uppercase(), value);
    }
}

/// Parsed configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostFile {
    /// Settings before the first section header
    pub global: Section,
    /// Sections in file order
    pub sections: Vec<(String, Section)>,
}

impl HostFile {
    /// Read and parse a configuration file
    pub fn load(path: &Path) -> ProfileResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ProfileError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Ok(Self::parse(&contents))
    }

    /// Parse configuration text
    ///
    /// Lines that are neither comments, section headers nor `KEY=VALUE`
    /// pairs are ignored.
    pub fn parse(contents: &str) -> Self {
        let mut file = HostFile::default();
        let mut current: Option<(String, Section)> = None;

        for raw in contents.lines() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                if let Some(done) = current.take() {
                    file.sections.push(done);
                }
                current = Some((name.trim().to_string(), Section::default()));
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            let value = expand_env(value.trim());

            match current.as_mut() {
                Some((_, section)) => section.insert(key, value),
                None => file.global.insert(key, value),
            }
        }

        if let Some(done) = current.take() {
            file.sections.push(done);
        }

        file
    }

    /// Look up a section by name, case-insensitively
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, s)| s)
    }
}

fn env_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"%([A-Za-z_][A-Za-z0-9_()]*)%|\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
            .expect("environment variable pattern is valid")
    })
}

/// Replace `%NAME%` and `${NAME}` with the variable's value
pub fn expand_env(value: &str) -> String {
    env_pattern()
        .replace_all(value, |caps: &Captures| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            std::env::var(name).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}
