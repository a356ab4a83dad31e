use super::writer::{CollationWriter, RecordOutcome};
use crate::config::Config;
use crate::policy::PackageDatabase;
use crate::snoopy::{LogLineParser, UserDirectory};
use crate::utils::format::format_number;
use crate::utils::progress::LogProgress;
use crate::utils::reader::open_log;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::fs;
use std::io::BufRead;
use std::path::{Path, PathBuf};

/// Statistics collected during collation
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CollationStats {
    pub files_collated: usize,
    /// Log files at or before the last-processed marker
    pub files_skipped: usize,
    pub total_lines: usize,
    pub records: usize,
    /// Malformed or non-UTF-8 lines
    pub skipped_lines: usize,
    /// Records whose command is not a regular file
    pub dropped_records: usize,
    pub lines_written: usize,
}

impl CollationStats {
    /// Print a summary of collation statistics
    pub fn report(&self) {
        eprintln!("\nCollation Summary:");
        eprintln!("  Log files collated: {}", self.files_collated);
        eprintln!("  Log files skipped: {}", self.files_skipped);
        eprintln!("  Total lines: {}", format_number(self.total_lines));
        eprintln!("  Commands recorded: {}", format_number(self.records));
        eprintln!("  Lines written: {}", format_number(self.lines_written));
        if self.dropped_records > 0 {
            eprintln!(
                "  Dropped (not a regular file): {}",
                format_number(self.dropped_records)
            );
        }
        if self.skipped_lines > 0 {
            eprintln!("  Malformed lines: {}", format_number(self.skipped_lines));
        }
    }
}

/// A log file selected for collation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFile {
    pub path: PathBuf,
    pub date: NaiveDate,
}

/// Reads snoopy log files in date order and feeds them to a [`CollationWriter`].
///
/// Progress is recorded per host in a marker holding the date of the last
/// fully collated log file, so a rerun resumes strictly after it.
pub struct LogScanner<'a, D: PackageDatabase> {
    config: &'a Config,
    writer: CollationWriter<'a, D>,
    users: UserDirectory,
}

impl<'a, D: PackageDatabase> LogScanner<'a, D> {
    pub fn new(config: &'a Config, writer: CollationWriter<'a, D>, users: UserDirectory) -> Self {
        Self {
            config,
            writer,
            users,
        }
    }

    /// Log files in `log-dir` matching the configured pattern, oldest first.
    pub fn log_files(&self) -> Result<Vec<LogFile>> {
        let dir = &self.config.log_dir;
        let mut files = Vec::new();
        for entry in fs::read_dir(dir)
            .with_context(|| format!("Failed to list log directory: {}", dir.display()))?
        {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(caps) = self.config.log_file_pattern.captures(&name) else {
                continue;
            };
            let date = match (caps.get(1), caps.get(2), caps.get(3)) {
                (Some(y), Some(m), Some(d)) => NaiveDate::from_ymd_opt(
                    y.as_str().parse().unwrap_or(0),
                    m.as_str().parse().unwrap_or(0),
                    d.as_str().parse().unwrap_or(0),
                ),
                _ => None,
            };
            match date {
                Some(date) => files.push(LogFile {
                    path: entry.path(),
                    date,
                }),
                None => tracing::warn!("cannot read a date from log file name {name}"),
            }
        }
        // chronological order keeps every collated file sorted
        files.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.path.cmp(&b.path)));
        Ok(files)
    }

    pub fn scan(&mut self) -> Result<CollationStats> {
        let marker = self.config.last_processed_path(&self.config.hostname);
        let mut last_processed = read_marker(&marker);
        let mut stats = CollationStats::default();

        let files = self.log_files()?;
        for (idx, log) in files.iter().enumerate() {
            if last_processed.is_some_and(|last| log.date <= last) {
                tracing::debug!("skipping {}", log.path.display());
                stats.files_skipped += 1;
                continue;
            }

            tracing::info!(
                "[{}/{}] collating {}",
                idx + 1,
                files.len(),
                log.path.display()
            );
            self.collate_file(log, &mut stats)?;
            stats.files_collated += 1;
            last_processed = Some(log.date);
            write_marker(&marker, log.date)?;
        }

        Ok(stats)
    }

    fn collate_file(&mut self, log: &LogFile, stats: &mut CollationStats) -> Result<()> {
        let progress = LogProgress::for_log(&log.path);
        let parser = LogLineParser::new(log.date);
        let reader = open_log(&log.path)?;
        let mut bytes_read = 0u64;

        for (line_number, line) in reader.split(b'\n').enumerate() {
            let line = line.with_context(|| {
                format!(
                    "Failed to read line {} from {}",
                    line_number + 1,
                    log.path.display()
                )
            })?;
            stats.total_lines += 1;
            bytes_read += line.len() as u64 + 1;

            if line_number % 10_000 == 0 {
                progress.tick(bytes_read, line_number as u64);
            }

            let Ok(text) = std::str::from_utf8(&line) else {
                tracing::warn!(
                    "{}:{}: invalid UTF-8, skipped",
                    log.path.display(),
                    line_number + 1
                );
                stats.skipped_lines += 1;
                continue;
            };
            let text = text.trim_end_matches('\r');
            if text.is_empty() {
                continue;
            }

            let record = match parser.parse(text, &mut self.users) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!("{}:{}: {e}: {text}", log.path.display(), line_number + 1);
                    stats.skipped_lines += 1;
                    continue;
                }
            };

            stats.records += 1;
            match self.writer.record_command(&record)? {
                RecordOutcome::Dropped => stats.dropped_records += 1,
                RecordOutcome::Written(n) => stats.lines_written += n,
            }
        }

        progress.finish();
        Ok(())
    }
}

/// Date in a last-processed marker, if one exists and is readable.
pub fn read_marker(path: &Path) -> Option<NaiveDate> {
    let contents = fs::read_to_string(path).ok()?;
    NaiveDate::parse_from_str(contents.trim(), "%Y%m%d").ok()
}

pub fn write_marker(path: &Path, date: NaiveDate) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    }
    fs::write(path, format!("{}\n", date.format("%Y%m%d")))
        .with_context(|| format!("Failed to write marker: {}", path.display()))
}
