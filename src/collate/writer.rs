use crate::config::{Config, CONSOLIDATED_DIR};
use crate::policy::{PackageDatabase, PolicyClassifier};
use crate::snoopy::LogRecord;
use crate::utils::fs::tree_path;
use crate::utils::time::{file_time, format_collation_timestamp};
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// What happened to one recorded command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// The command path is not a regular file (anymore), or unusable.
    Dropped,
    /// Appended to this many class trees.
    Written(usize),
}

/// Appends command events to per-host, per-class, per-command files.
///
/// Files live at `<collation-dir>/<class>/<host>/<command path>`; each line
/// is the event's sortable timestamp followed by host (optionally), user
/// and command line. After each append the file's modification time is set
/// to the event time.
pub struct CollationWriter<'a, D: PackageDatabase> {
    config: &'a Config,
    classifier: &'a mut PolicyClassifier<D>,
    classes: Vec<String>,
    known_dirs: HashSet<PathBuf>,
}

impl<'a, D: PackageDatabase> CollationWriter<'a, D> {
    pub fn new(config: &'a Config, classifier: &'a mut PolicyClassifier<D>) -> Self {
        Self {
            config,
            classifier,
            classes: config.class_names(),
            known_dirs: HashSet::new(),
        }
    }

    pub fn record_command(&mut self, record: &LogRecord) -> Result<RecordOutcome> {
        let event = &record.event;
        let Some(path) = record.fields.command_path() else {
            return Ok(RecordOutcome::Dropped);
        };
        if !is_valid_host(&event.host) {
            tracing::warn!("ignoring command from unusable host name '{}'", event.host);
            return Ok(RecordOutcome::Dropped);
        }
        if !self.classifier.is_regular_file(&path) {
            return Ok(RecordOutcome::Dropped);
        }

        let line = self.format_line(record);
        let mtime = file_time(&event.timestamp);
        let mut written = 0;

        for class in &self.classes {
            if self
                .classifier
                .is_excluded(&path, class, self.config.rules(class))
            {
                continue;
            }

            let output = tree_path(&self.config.collation_host_dir(class, &event.host), &path);
            if let Some(dir) = output.parent() {
                if !self.known_dirs.contains(dir) {
                    fs::create_dir_all(dir).with_context(|| {
                        format!("Failed to create directory: {}", dir.display())
                    })?;
                    self.known_dirs.insert(dir.to_path_buf());
                }
            }

            append_line(&output, &line)?;
            filetime::set_file_times(&output, mtime, mtime).with_context(|| {
                format!("Failed to set modification time: {}", output.display())
            })?;
            written += 1;
        }

        Ok(RecordOutcome::Written(written))
    }

    fn format_line(&self, record: &LogRecord) -> String {
        let event = &record.event;
        let stamp = format_collation_timestamp(&event.timestamp);
        if self.config.host_in_output {
            format!(
                "{stamp} {} {} {}\n",
                event.host, event.user, event.command_line
            )
        } else {
            format!("{stamp} {} {}\n", event.user, event.command_line)
        }
    }
}

fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open collated file: {}", path.display()))?;
    file.write_all(line.as_bytes())
        .with_context(|| format!("Failed to append to: {}", path.display()))
}

/// Host names become directory names next to the consolidated tree.
fn is_valid_host(host: &str) -> bool {
    !host.is_empty() && !host.contains('/') && !host.starts_with('.') && host != CONSOLIDATED_DIR
}
