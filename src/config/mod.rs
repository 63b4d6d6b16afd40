//! Configuration module for profilecopy
//!
//! This module provides configuration management including:
//! - Parsing of the sectioned `host.local` file
//! - Typed global settings and scenario records
//! - Config file, log directory and user name resolution

pub mod host;
pub mod paths;
pub mod settings;

pub use host::HostFile;
pub use paths::ToolPaths;
pub use settings::{ScenarioConfig, Settings};
