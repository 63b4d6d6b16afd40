//! profilecopy - QGIS profile backup and restore
//!
//! This library packs a profile directory tree into timestamped zip archives
//! in a per-user folder on a network share and restores it from there,
//! optionally stopping the processes that hold the profile open first.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Configuration file, scenarios and path management
//! - `error`: Custom error types
//! - `progress` / `cancel`: Progress events and cooperative cancellation
//! - `process`: Stopping interfering processes
//! - `archive`: Zip creation and extraction
//! - `transfer`: Chunked copy and tolerant delete helpers
//! - `backup`: Archive naming, share catalog, backup/restore service
//! - `worker`: Running an operation off the calling thread
//! - `journal`: Operation log
//! - `cli` / `display`: Command handlers and terminal formatting
//!
//! # Example
//!
//! ```rust,ignore
//! use profilecopy::config::{Settings, ToolPaths};
//!
//! let paths = ToolPaths::new(None);
//! let settings = Settings::load_or_default(paths.config_file())?;
//! let scenario = settings.active()?;
//! ```

pub mod archive;
pub mod backup;
pub mod cancel;
pub mod cli;
pub mod config;
pub mod display;
pub mod error;
pub mod journal;
pub mod process;
pub mod progress;
pub mod transfer;
pub mod worker;

pub use error::ProfileError;
