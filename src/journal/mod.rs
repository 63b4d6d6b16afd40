//! Operation log for profilecopy
//!
//! Records what every backup, restore and catalog run did in an append-only
//! daily log file.
//!
//! # Architecture
//!
//! - `LogEntry`: one line of the log (timestamp, level, thread, optional
//!   operation id, message, details).
//! - `FileLogger`: writes entries as JSON lines, serialized by a mutex, and
//!   prunes old daily files.
//! - `OperationLog`: a cheap handle that tags entries with the id of one
//!   top-level operation.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use profilecopy::journal::{FileLogger, Level, OperationLog};
//!
//! let logger = Arc::new(FileLogger::new(paths.log_dir(), Level::Info));
//! logger.session("ProfileCopy", "started");
//!
//! let op = OperationLog::start(Arc::clone(&logger), "Backup");
//! op.phase("Started", Some(source.display().to_string()));
//! ```

mod entry;
mod logger;

pub use entry::{Level, LogEntry};
pub use logger::{FileLogger, OperationLog};
