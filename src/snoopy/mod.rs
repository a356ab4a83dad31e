//! Snoopy log records.
//!
//! - [`types`] - Command events and tagged fields
//! - [`parser`] - Syslog line parsing with year inference
//! - [`users`] - Cached uid to user name resolution

pub mod parser;
pub mod types;
pub mod users;

pub use parser::{LogLineParser, MalformedLine};
pub use types::{CommandEvent, LogRecord, TaggedFields};
pub use users::UserDirectory;
