use super::archive::archive_merged;
use super::journal::{MergedSource, PendingFinalize, JOURNAL_FILE};
use crate::config::Config;
use crate::merge::{KeyedReader, MergeTree};
use crate::utils::format::format_number;
use crate::utils::fs::{relative_files, remove_empty_dirs, subdirectories};
use crate::utils::time::key_file_time;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Statistics collected during consolidation
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConsolidationStats {
    pub classes: usize,
    pub paths_merged: usize,
    pub lines_written: usize,
    pub sources_archived: usize,
    /// Paths whose merge failed and were left untouched
    pub failures: usize,
    /// Interrupted runs completed from a journal
    pub resumed: usize,
}

impl ConsolidationStats {
    pub fn absorb(&mut self, other: &Self) {
        self.classes += other.classes;
        self.paths_merged += other.paths_merged;
        self.lines_written += other.lines_written;
        self.sources_archived += other.sources_archived;
        self.failures += other.failures;
        self.resumed += other.resumed;
    }

    /// Print a summary of consolidation statistics
    pub fn report(&self) {
        eprintln!("\nConsolidation Summary:");
        eprintln!("  Classes: {}", self.classes);
        eprintln!("  Paths merged: {}", format_number(self.paths_merged));
        eprintln!("  Lines written: {}", format_number(self.lines_written));
        eprintln!("  Host files archived: {}", format_number(self.sources_archived));
        if self.resumed > 0 {
            eprintln!("  Interrupted runs completed: {}", self.resumed);
        }
        if self.failures > 0 {
            eprintln!("  Failed paths: {}", self.failures);
        }
    }
}

/// A consolidated file published but not yet finalized.
#[derive(Debug)]
pub struct Merged {
    pub pending: PendingFinalize,
    /// Lines in the new consolidated file
    pub lines: usize,
}

/// Merges every host's collated files of a class into one timeline per command.
///
/// For each command path the host files and the existing consolidated file
/// are merged into a temporary file in the class's `.tmp` directory, which
/// is renamed into place once complete. Only then are the merged bytes of
/// the host files moved into the per-host archive, so nothing is ever
/// merged twice and nothing appended meanwhile is archived unmerged.
pub struct ConsolidationEngine<'a> {
    config: &'a Config,
}

impl<'a> ConsolidationEngine<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    pub fn journal_path(&self, class: &str) -> PathBuf {
        self.config.consolidation_class_dir(class).join(JOURNAL_FILE)
    }

    /// Live collated files of a class: relative path to contributing hosts.
    pub fn pending_paths(&self, class: &str) -> Result<BTreeMap<PathBuf, Vec<String>>> {
        let mut paths: BTreeMap<PathBuf, Vec<String>> = BTreeMap::new();
        for host in self.hosts(class)? {
            for relative in relative_files(&self.config.collation_host_dir(class, &host))? {
                paths.entry(relative).or_default().push(host.clone());
            }
        }
        Ok(paths)
    }

    fn hosts(&self, class: &str) -> Result<Vec<String>> {
        Ok(subdirectories(&self.config.collation_class_dir(class))?
            .into_iter()
            .filter(|host| !host.starts_with('.'))
            .collect())
    }

    pub fn consolidate_class(&self, class: &str) -> Result<ConsolidationStats> {
        let mut stats = ConsolidationStats {
            classes: 1,
            ..Default::default()
        };
        self.resume(class, &mut stats)?;
        self.remove_stale_temp_files(class)?;

        let journal = self.journal_path(class);
        for (relative, hosts) in self.pending_paths(class)? {
            let merged = match self.merge_and_replace(class, &relative, hosts) {
                Ok(merged) => merged,
                Err(e) => {
                    if journal.exists() {
                        return Err(e.context(format!(
                            "Consolidation of class {class} stopped with a journal pending"
                        )));
                    }
                    tracing::error!("{class}: failed to consolidate {}: {e:#}", relative.display());
                    stats.failures += 1;
                    continue;
                }
            };
            stats.paths_merged += 1;
            stats.lines_written += merged.lines;
            stats.sources_archived += self.finalize(class, &merged.pending).with_context(|| {
                format!("Failed to archive sources of {}", relative.display())
            })?;
        }

        for host in self.hosts(class)? {
            let dir = self.config.collation_host_dir(class, &host);
            if let Err(e) = remove_empty_dirs(&dir) {
                tracing::warn!("{e:#}");
            }
        }
        Ok(stats)
    }

    /// `<consolidation-dir>/<class>/ALL/<relative>`
    pub fn consolidated_path(&self, class: &str, relative: &Path) -> PathBuf {
        self.config.consolidated_dir(class).join(relative)
    }

    /// Merges the hosts' files for `relative` with the existing consolidated
    /// file and renames the result into place.
    ///
    /// Leaves the host files live; the returned journal entry names them for
    /// [`finalize`](Self::finalize).
    pub fn merge_and_replace(
        &self,
        class: &str,
        relative: &Path,
        hosts: Vec<String>,
    ) -> Result<Merged> {
        let target = self.consolidated_path(class, relative);
        let dir = target
            .parent()
            .with_context(|| format!("No parent directory for {}", target.display()))?;
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

        let mut tree = MergeTree::new();
        // prior history first, so it wins ties against new lines
        if target.exists() {
            let (prior, _) = KeyedReader::open(&target)
                .with_context(|| format!("Failed to open {}", target.display()))?;
            tree.insert(prior);
        }
        let mut sources = Vec::with_capacity(hosts.len());
        for host in hosts {
            let source = self.config.collation_host_dir(class, &host).join(relative);
            let (reader, bytes) = KeyedReader::open(&source)
                .with_context(|| format!("Failed to open {}", source.display()))?;
            tree.insert(reader);
            sources.push(MergedSource { host, bytes });
        }

        let temp_dir = self.config.consolidation_temp_dir(class);
        fs::create_dir_all(&temp_dir)
            .with_context(|| format!("Failed to create directory: {}", temp_dir.display()))?;
        let mut temp = tempfile::Builder::new()
            .prefix("merge-")
            .tempfile_in(&temp_dir)
            .with_context(|| format!("Failed to create temporary file in {}", temp_dir.display()))?;
        let mut lines = 0;
        {
            let mut out = BufWriter::new(temp.as_file_mut());
            for line in tree.by_ref() {
                let line = line
                    .with_context(|| format!("Failed reading input for {}", relative.display()))?;
                out.write_all(line.as_bytes())?;
                out.write_all(b"\n")?;
                lines += 1;
            }
            out.flush()?;
        }
        temp.as_file().sync_all()?;

        if let Some(key) = tree.last_key() {
            match key_file_time(key) {
                Ok(mtime) => filetime::set_file_times(temp.path(), mtime, mtime)?,
                Err(e) => tracing::warn!("{}: {e:#}", relative.display()),
            }
        }

        let temp_path = temp
            .into_temp_path()
            .keep()
            .context("Failed to keep temporary file")?;
        let pending = PendingFinalize {
            relative_path: relative.to_path_buf(),
            temp_file: temp_path.clone(),
            sources,
        };
        let journal = self.journal_path(class);
        if let Err(e) = pending.write(&journal, &temp_dir) {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }

        if let Err(e) = fs::rename(&temp_path, &target) {
            // consistent either way: a journal with its temp file present is discarded on resume
            if fs::remove_file(&temp_path).is_ok() {
                let _ = PendingFinalize::clear(&journal);
            }
            return Err(e).with_context(|| format!("Failed to replace {}", target.display()));
        }

        tracing::debug!("{class}: consolidated {} ({lines} lines)", relative.display());
        Ok(Merged { pending, lines })
    }

    /// Archives the merged part of each host file named in `pending` and
    /// clears the journal.
    ///
    /// Host files already archived are skipped, so this can be repeated.
    /// Lines appended after the merge stay live for the next pass.
    pub fn finalize(&self, class: &str, pending: &PendingFinalize) -> Result<usize> {
        let journal = self.journal_path(class);
        let temp_dir = self.config.collation_temp_dir(class);
        let mut remaining = pending.clone();
        let mut archived = 0;
        for merged in &pending.sources {
            let source = self
                .config
                .collation_host_dir(class, &merged.host)
                .join(&pending.relative_path);
            let Ok(metadata) = fs::metadata(&source) else {
                continue;
            };
            if metadata.len() > merged.bytes {
                // from here a crash re-merges this file instead of losing its new lines
                remaining.sources.retain(|s| s.host != merged.host);
                remaining.write(&journal, &self.config.consolidation_temp_dir(class))?;
                tracing::info!(
                    "{class}: {} on {} grew since it was merged, keeping the new lines",
                    pending.relative_path.display(),
                    merged.host
                );
            }
            let archive = self
                .config
                .archive_dir(class, &merged.host)
                .join(&pending.relative_path);
            archive_merged(&source, &archive, merged.bytes, &temp_dir)?;
            archived += 1;
        }
        PendingFinalize::clear(&journal)?;
        Ok(archived)
    }

    fn resume(&self, class: &str, stats: &mut ConsolidationStats) -> Result<()> {
        let journal = self.journal_path(class);
        let Some(pending) = PendingFinalize::read(&journal)? else {
            return Ok(());
        };

        if pending.temp_file.exists() {
            tracing::warn!(
                "{class}: discarding unfinished consolidation of {}",
                pending.relative_path.display()
            );
            fs::remove_file(&pending.temp_file).with_context(|| {
                format!("Failed to remove {}", pending.temp_file.display())
            })?;
            PendingFinalize::clear(&journal)?;
        } else {
            tracing::warn!(
                "{class}: completing interrupted consolidation of {}",
                pending.relative_path.display()
            );
            stats.sources_archived += self.finalize(class, &pending)?;
            stats.resumed += 1;
        }
        Ok(())
    }

    /// Empties the staging directories; anything left there was abandoned
    /// by an interrupted run whose journal, if any, is already resolved.
    fn remove_stale_temp_files(&self, class: &str) -> Result<()> {
        for dir in [
            self.config.consolidation_temp_dir(class),
            self.config.collation_temp_dir(class),
        ] {
            for relative in relative_files(&dir)? {
                let path = dir.join(&relative);
                tracing::warn!("removing abandoned {}", path.display());
                fs::remove_file(&path)
                    .with_context(|| format!("Failed to remove {}", path.display()))?;
            }
        }
        Ok(())
    }
}
