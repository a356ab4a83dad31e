//! Consolidate collated files across hosts.
//!
//! # Usage
//!
//! ```bash
//! # every class
//! snoopy-log-collator consolidate
//!
//! # selected classes
//! snoopy-log-collator consolidate local site
//! ```
//!
//! Classes are independent: a failure in one is reported and the others
//! still run. The command fails if any class or path failed.

use crate::config::Config;
use crate::consolidate::{ConsolidationEngine, ConsolidationStats};
use anyhow::{bail, Result};

pub fn run(config: &Config, classes: &[String]) -> Result<()> {
    let classes = config.select_classes(classes)?;
    let engine = ConsolidationEngine::new(config);

    let mut total = ConsolidationStats::default();
    let mut failed_classes = Vec::new();
    for class in &classes {
        tracing::info!("consolidating class {class}");
        match engine.consolidate_class(class) {
            Ok(stats) => total.absorb(&stats),
            Err(e) => {
                tracing::error!("class {class}: {e:#}");
                failed_classes.push(class.as_str());
            }
        }
    }

    total.report();
    if !failed_classes.is_empty() {
        bail!("Consolidation failed for class(es): {}", failed_classes.join(", "));
    }
    if total.failures > 0 {
        bail!("Consolidation failed for {} path(s)", total.failures);
    }
    Ok(())
}
