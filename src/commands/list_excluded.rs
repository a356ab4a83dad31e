//! List, or purge, history excluded by class policy.
//!
//! Policy can change after commands were collated, e.g. a repository is
//! added to `exclude-repos`. This finds the paths now excluded; purging
//! removes their consolidated file, archived host files and live host files.

use super::list_files::{display_line, history_paths};
use crate::config::Config;
use crate::policy::{PackageDatabase, PolicyClassifier, RpmDatabase, Verdict};
use crate::utils::format::counted;
use crate::utils::fs::{absolute_command_path, remove_empty_dirs, subdirectories};
use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcludedPath {
    pub class: String,
    /// Path relative to the class trees
    pub relative: PathBuf,
    pub verdict: Verdict,
}

pub fn excluded_paths<D: PackageDatabase>(
    config: &Config,
    classes: &[String],
    classifier: &mut PolicyClassifier<D>,
) -> Result<Vec<ExcludedPath>> {
    let mut excluded = Vec::new();
    for class in classes {
        let rules = config.rules(class);
        for relative in history_paths(config, class)? {
            let verdict = classifier.classify(&absolute_command_path(&relative), class, rules);
            if verdict.is_excluded() {
                excluded.push(ExcludedPath {
                    class: class.clone(),
                    relative,
                    verdict,
                });
            }
        }
    }
    Ok(excluded)
}

/// Removes every file holding history of an excluded path; returns how many.
pub fn purge(config: &Config, excluded: &ExcludedPath) -> Result<usize> {
    let class = excluded.class.as_str();
    let mut removed = 0;

    // ALL plus the per-host archives, then the live host trees
    for root in [
        config.consolidation_class_dir(class),
        config.collation_class_dir(class),
    ] {
        for dir in subdirectories(&root)? {
            if dir.starts_with('.') {
                continue;
            }
            if remove_if_present(&root.join(&dir), &excluded.relative)? {
                removed += 1;
            }
        }
    }
    Ok(removed)
}

fn remove_if_present(root: &Path, relative: &Path) -> Result<bool> {
    let path = root.join(relative);
    match fs::remove_file(&path) {
        Ok(()) => {
            tracing::debug!("removed {}", path.display());
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
    }
}

pub fn run(config: &Config, classes: &[String], purge_files: bool) -> Result<()> {
    let classes = config.select_classes(classes)?;
    let mut classifier = PolicyClassifier::new(RpmDatabase::default());
    let excluded = excluded_paths(config, &classes, &mut classifier)?;

    let show_class = classes.len() > 1;
    let mut removed = 0;
    for entry in &excluded {
        let path = absolute_command_path(&entry.relative);
        let rest = format!("{} ({})", path.display(), entry.verdict);
        println!("{}", display_line(show_class, &entry.class, &rest));
        if purge_files {
            removed += purge(config, entry)?;
        }
    }

    if purge_files {
        for class in &classes {
            for root in [config.consolidation_class_dir(class), config.collation_class_dir(class)] {
                for dir in subdirectories(&root)? {
                    if !dir.starts_with('.') {
                        remove_empty_dirs(&root.join(dir))?;
                    }
                }
            }
        }
        eprintln!(
            "Purged {} for {}",
            counted(removed, "file"),
            counted(excluded.len(), "excluded path")
        );
    }
    Ok(())
}
