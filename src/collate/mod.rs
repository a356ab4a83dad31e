//! Collation of snoopy logs into per-command history files.
//!
//! - [`scanner`] - Walks the log directory in date order, resumable
//! - [`writer`] - Appends events to per-host, per-class files

pub mod scanner;
pub mod writer;

pub use scanner::{CollationStats, LogFile, LogScanner};
pub use writer::{CollationWriter, RecordOutcome};
