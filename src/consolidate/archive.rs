use anyhow::{Context, Result};
use filetime::FileTime;
use std::fs::{self, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

/// Archives the first `merged` bytes of `source`.
///
/// Anything the host appended past `merged` has not been consolidated yet;
/// it is staged in `temp_dir` and renamed back over `source` so it stays
/// live for the next merge. Returns whether such a tail was left.
pub fn archive_merged(source: &Path, archive: &Path, merged: u64, temp_dir: &Path) -> Result<bool> {
    let metadata =
        fs::metadata(source).with_context(|| format!("Failed to stat {}", source.display()))?;
    if metadata.len() <= merged {
        archive_source(source, archive)?;
        return Ok(false);
    }
    let mtime = FileTime::from_last_modification_time(&metadata);

    for dir in archive.parent().into_iter().chain([temp_dir]) {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    }

    let mut input =
        fs::File::open(source).with_context(|| format!("Failed to open {}", source.display()))?;
    let mut tail = tempfile::Builder::new()
        .prefix("tail-")
        .tempfile_in(temp_dir)
        .with_context(|| format!("Failed to create temporary file in {}", temp_dir.display()))?;
    input.seek(SeekFrom::Start(merged))?;
    io::copy(&mut input, tail.as_file_mut())
        .with_context(|| format!("Failed to copy unmerged lines of {}", source.display()))?;
    tail.as_file().sync_all()?;

    input.seek(SeekFrom::Start(0))?;
    let mut output = OpenOptions::new()
        .create(true)
        .append(true)
        .open(archive)
        .with_context(|| format!("Failed to open archive {}", archive.display()))?;
    io::copy(&mut input.take(merged), &mut output)
        .with_context(|| format!("Failed to append {} to {}", source.display(), archive.display()))?;
    drop(output);
    filetime::set_file_times(archive, mtime, mtime)
        .with_context(|| format!("Failed to set modification time: {}", archive.display()))?;

    tail.persist(source)
        .with_context(|| format!("Failed to replace {}", source.display()))?;
    filetime::set_file_times(source, mtime, mtime)
        .with_context(|| format!("Failed to set modification time: {}", source.display()))?;
    Ok(true)
}

/// Moves a merged host file into the per-host archive.
///
/// Normally a rename. When the archive entry already exists (a path
/// consolidated again after reprocessing) the source bytes are appended to
/// it and the source's modification time is carried over. The source is
/// gone afterwards either way.
pub fn archive_source(source: &Path, archive: &Path) -> Result<()> {
    if let Some(dir) = archive.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    }

    if archive.exists() {
        return append_and_remove(source, archive);
    }

    match fs::rename(source, archive) {
        Ok(()) => Ok(()),
        Err(e) => {
            // collation and consolidation trees may sit on different filesystems
            tracing::debug!(
                "rename {} -> {} failed ({e}), copying",
                source.display(),
                archive.display()
            );
            fs::copy(source, archive).with_context(|| {
                format!(
                    "Failed to copy {} to {}",
                    source.display(),
                    archive.display()
                )
            })?;
            copy_mtime(source, archive)?;
            remove_source(source)
        }
    }
}

fn append_and_remove(source: &Path, archive: &Path) -> Result<()> {
    let mut input = fs::File::open(source)
        .with_context(|| format!("Failed to open {}", source.display()))?;
    let mut output = OpenOptions::new()
        .append(true)
        .open(archive)
        .with_context(|| format!("Failed to open archive {}", archive.display()))?;
    io::copy(&mut input, &mut output)
        .with_context(|| format!("Failed to append {} to {}", source.display(), archive.display()))?;
    drop(output);

    copy_mtime(source, archive)?;
    remove_source(source)
}

fn copy_mtime(source: &Path, target: &Path) -> Result<()> {
    let metadata =
        fs::metadata(source).with_context(|| format!("Failed to stat {}", source.display()))?;
    let mtime = FileTime::from_last_modification_time(&metadata);
    filetime::set_file_times(target, mtime, mtime)
        .with_context(|| format!("Failed to set modification time: {}", target.display()))
}

fn remove_source(source: &Path) -> Result<()> {
    fs::remove_file(source).with_context(|| format!("Failed to remove {}", source.display()))
}
