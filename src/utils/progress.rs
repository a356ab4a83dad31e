//! Per-file progress display while collating.
//!
//! Plain log files get a byte-based bar. Compressed ones have no useful
//! size up front, so they get a spinner counting lines instead.

use super::reader::Compression;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::Path;

pub struct LogProgress {
    bar: ProgressBar,
    total_bytes: Option<u64>,
}

impl LogProgress {
    pub fn for_log(path: &Path) -> Self {
        let label = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        let total_bytes = match Compression::from_path(path) {
            Compression::Plain => fs::metadata(path).ok().map(|m| m.len()),
            Compression::Gzip | Compression::Zstd => None,
        };

        let bar = match total_bytes {
            Some(total) => ProgressBar::new(total).with_style(bytes_style()),
            None => ProgressBar::new_spinner().with_style(lines_style()),
        };
        bar.set_message(label);
        Self { bar, total_bytes }
    }

    /// Reports how far into the file the scan is.
    pub fn tick(&self, bytes_read: u64, lines_read: u64) {
        match self.total_bytes {
            Some(total) => self.bar.set_position(bytes_read.min(total)),
            None => self.bar.set_position(lines_read),
        }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

fn bytes_style() -> ProgressStyle {
    ProgressStyle::with_template("{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

fn lines_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner} {msg}: {human_pos} lines")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}
