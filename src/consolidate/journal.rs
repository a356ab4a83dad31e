//! Finalize journal.
//!
//! Between replacing a consolidated file and archiving the host files that
//! went into it, a crash would leave those host files live, and a rerun
//! would merge them a second time. The journal records what a
//! consolidation step is about to publish, so the next run can tell the
//! two crash windows apart:
//!
//! - temporary output still present: the rename never happened, discard it
//! - temporary output gone: the rename happened, only archiving is left
//!
//! Each source records how many bytes were merged, so lines a host appended
//! after the merge stay live instead of being archived unmerged.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// File name of the journal inside `<consolidation-dir>/<class>`.
pub const JOURNAL_FILE: &str = ".pending-finalize";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingFinalize {
    /// Command path relative to the class tree
    pub relative_path: PathBuf,
    /// Merged output waiting to be renamed into place
    pub temp_file: PathBuf,
    /// Host files that went into the merge
    pub sources: Vec<MergedSource>,
}

/// One host's collated file as merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedSource {
    pub host: String,
    /// Length of the file when the merge read it
    pub bytes: u64,
}

impl PendingFinalize {
    /// Write the journal atomically, staging it in `temp_dir`.
    ///
    /// `temp_dir` must be on the same filesystem as `path`.
    pub fn write(&self, path: &Path, temp_dir: &Path) -> Result<()> {
        for dir in path.parent().into_iter().chain([temp_dir]) {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }

        let mut temp = tempfile::Builder::new()
            .prefix("journal-")
            .tempfile_in(temp_dir)
            .with_context(|| format!("Failed to create journal in {}", temp_dir.display()))?;
        serde_json::to_writer(&mut temp, self)?;
        temp.flush()?;
        temp.as_file().sync_all()?;
        temp.persist(path)
            .with_context(|| format!("Failed to write journal: {}", path.display()))?;
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Option<Self>> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read journal: {}", path.display()))
            }
        };
        let pending = serde_json::from_str(&contents)
            .with_context(|| format!("Corrupt journal: {}", path.display()))?;
        Ok(Some(pending))
    }

    pub fn clear(path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to remove journal: {}", path.display()))
            }
        }
    }
}
