//! Collate this host's snoopy logs.
//!
//! # Usage
//!
//! ```bash
//! snoopy-log-collator collate
//! snoopy-log-collator -c site.toml -v collate
//! ```
//!
//! Log files are read oldest first; those at or before the host's
//! last-processed marker are skipped, so the command can run from cron.

use crate::collate::{CollationStats, CollationWriter, LogScanner};
use crate::config::Config;
use crate::policy::{PackageDatabase, PolicyClassifier, RpmDatabase};
use crate::snoopy::UserDirectory;
use anyhow::Result;

pub fn run(config: &Config) -> Result<()> {
    let mut classifier = PolicyClassifier::new(RpmDatabase::default());
    let stats = collate(config, &mut classifier, UserDirectory::default())?;
    stats.report();
    Ok(())
}

/// Collates with an explicit package database and user directory.
pub fn collate<D: PackageDatabase>(
    config: &Config,
    classifier: &mut PolicyClassifier<D>,
    users: UserDirectory,
) -> Result<CollationStats> {
    let writer = CollationWriter::new(config, classifier);
    let mut scanner = LogScanner::new(config, writer, users);
    scanner.scan()
}
