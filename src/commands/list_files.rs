//! List commands with recorded history.

use crate::config::Config;
use crate::consolidate::ConsolidationEngine;
use crate::utils::fs::{absolute_command_path, relative_files};
use anyhow::Result;
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Relative paths of a class with any history: consolidated, or still live on a host.
pub fn history_paths(config: &Config, class: &str) -> Result<BTreeSet<PathBuf>> {
    let mut paths: BTreeSet<PathBuf> = relative_files(&config.consolidated_dir(class))?
        .into_iter()
        .collect();
    paths.extend(ConsolidationEngine::new(config).pending_paths(class)?.into_keys());
    Ok(paths)
}

/// Prefix output with the class when more than one is listed.
pub(crate) fn display_line(show_class: bool, class: &str, rest: &str) -> String {
    if show_class {
        format!("{class}:{rest}")
    } else {
        rest.to_string()
    }
}

pub fn run(config: &Config, classes: &[String]) -> Result<()> {
    let classes = config.select_classes(classes)?;
    let show_class = classes.len() > 1;
    for class in &classes {
        for relative in history_paths(config, class)? {
            let path = absolute_command_path(&relative);
            println!("{}", display_line(show_class, class, &path.to_string_lossy()));
        }
    }
    Ok(())
}
