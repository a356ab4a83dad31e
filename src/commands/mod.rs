//! Command implementations.
//!
//! ### Collection
//!
//! - [`collate`] - Collate this host's snoopy logs into per-command files
//! - [`consolidate`] - Merge every host's files into one timeline per command
//!
//! ### Reporting and policy
//!
//! - [`list_files`] - Commands with recorded history
//! - [`list_packages`] - Commands owned by a package, with repositories
//! - [`list_excluded`] - Commands excluded by class policy, optionally purged

pub mod collate;
pub mod consolidate;
pub mod list_excluded;
pub mod list_files;
pub mod list_packages;
