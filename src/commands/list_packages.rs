//! List commands owned by a package, with the package's repositories.
//!
//! Output lines are `repos:package:path`, repositories comma-separated or
//! `-` when unknown. `--output` additionally writes a CSV report.

use super::list_files::{display_line, history_paths};
use crate::config::Config;
use crate::policy::{PackageDatabase, PolicyClassifier, RpmDatabase};
use crate::utils::format::counted;
use crate::utils::fs::absolute_command_path;
use anyhow::{Context, Result};
use std::fs::File;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagedPath {
    pub class: String,
    pub path: PathBuf,
    pub package: String,
    pub repositories: Vec<String>,
}

impl PackagedPath {
    fn repositories_display(&self) -> String {
        if self.repositories.is_empty() {
            "-".to_string()
        } else {
            self.repositories.join(",")
        }
    }
}

/// Every history path of the given classes that a package owns.
pub fn packaged_paths<D: PackageDatabase>(
    config: &Config,
    classes: &[String],
    classifier: &mut PolicyClassifier<D>,
) -> Result<Vec<PackagedPath>> {
    let mut found = Vec::new();
    for class in classes {
        for relative in history_paths(config, class)? {
            let path = absolute_command_path(&relative);
            let Some(package) = classifier.owning_package(&path) else {
                continue;
            };
            let repositories = classifier
                .source_repositories(&package)
                .into_iter()
                .collect();
            found.push(PackagedPath {
                class: class.clone(),
                path,
                package,
                repositories,
            });
        }
    }
    Ok(found)
}

pub fn run(config: &Config, classes: &[String], output: Option<&str>) -> Result<()> {
    let classes = config.select_classes(classes)?;
    let mut classifier = PolicyClassifier::new(RpmDatabase::default());
    let found = packaged_paths(config, &classes, &mut classifier)?;

    let show_class = classes.len() > 1;
    for entry in &found {
        let rest = format!(
            "{}:{}:{}",
            entry.repositories_display(),
            entry.package,
            entry.path.display()
        );
        println!("{}", display_line(show_class, &entry.class, &rest));
    }

    if let Some(output) = output {
        write_csv(output, &found)?;
        eprintln!("Wrote {} to {output}", counted(found.len(), "row"));
    }
    Ok(())
}

fn write_csv(output: &str, found: &[PackagedPath]) -> Result<()> {
    let file =
        File::create(output).with_context(|| format!("Failed to create output file: {output}"))?;
    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(["class", "path", "package", "repositories"])?;
    for entry in found {
        let path = entry.path.to_string_lossy().into_owned();
        let repositories = entry.repositories.join(" ");
        writer.write_record([
            entry.class.as_str(),
            path.as_str(),
            entry.package.as_str(),
            repositories.as_str(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
