//! Display formatting for terminal output
//!
//! Provides utilities for formatting catalog records, scenarios and log
//! entries for terminal display.

pub mod backup;
pub mod scenario;

pub use backup::{format_age, format_backup_details, format_backup_list, format_size};
pub use scenario::{format_log_entries, format_scenario_details, format_scenario_list};
