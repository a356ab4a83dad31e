//! # Snoopy Log Collator
//!
//! Turns the command-execution logs written by snoopy on each host into one
//! chronologically ordered history file per executed command.
//!
//! ## Overview
//!
//! Collection runs in two phases:
//!
//! 1. **Collate** (on every host) - new daily snoopy logs are parsed and each
//!    event is appended to `<collation-dir>/<class>/<host>/<command path>`,
//!    once per class whose policy does not exclude the command.
//! 2. **Consolidate** (on one host) - for every command, the per-host files
//!    and any earlier consolidated file are k-way merged by timestamp into
//!    `<consolidation-dir>/<class>/ALL/<command path>`. The merged sources are
//!    then moved into per-host archives.
//!
//! Each class carries a policy over file paths, owning packages and package
//! repositories. The policy decides which commands the class records.
//!
//! ## Architecture
//!
//! - [`config`] - TOML configuration, classes and path layout
//! - [`snoopy`] - Log line parsing and user lookup
//! - [`policy`] - Package ownership and class exclusion rules
//! - [`collate`] - Scanning new logs and writing per-host command files
//! - [`merge`] - Timestamp-keyed k-way merge tree
//! - [`consolidate`] - Crash-safe merge, replace and archive
//! - [`commands`] - Command-line entry points
//! - [`utils`] - Shared utilities (compressed readers, progress, time, filesystem)
//!
//! ## Example Usage
//!
//! ```bash
//! # On every host, from cron
//! snoopy-log-collator collate
//!
//! # On the collecting host
//! snoopy-log-collator consolidate
//! snoopy-log-collator list-files security
//! snoopy-log-collator list-packages --output packages.csv
//! snoopy-log-collator purge-excluded
//! ```

pub mod collate;
pub mod commands;
pub mod config;
pub mod consolidate;
pub mod merge;
pub mod policy;
pub mod snoopy;
pub mod utils;
