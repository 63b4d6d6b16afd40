//! Profile backups on the network share
//!
//! # Architecture
//!
//! - `naming`: builds and parses archive file names
//! - `catalog`: lists the archives in a user's share folder
//! - `service`: `BackupService`, which runs backups and restores
//!
//! # Share layout
//!
//! ```text
//! <share_root>/<user>/QGISProfiles_<postfix>_<version>_<YYYYMMDD-HHMM>.zip
//! ```
//!
//! Archives written with an empty postfix use the legacy form without the
//! scenario segment; both forms are read.
//!
//! # Example
//!
//! ```rust,ignore
//! use profilecopy::backup::BackupService;
//!
//! let mut service = BackupService::new(&settings, scenario.clone(), logger);
//! let outcome = service.create_backup(
//!     &scenario.source_path,
//!     &scenario.target_share,
//!     "3.34",
//!     false,
//!     &NoProgress,
//!     &CancellationToken::new(),
//! )?;
//! ```

pub mod catalog;
pub mod naming;
pub mod service;

pub use catalog::{list_backups, BackupRecord, Catalog, CatalogSummary};
pub use naming::{build_archive_name, parse_archive_name, ParsedName};
pub use service::{BackupOutcome, BackupService, RestoreOutcome, ServiceTimings};
