//! Filesystem helpers shared by collation and consolidation.

use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Names of the immediate subdirectories of `dir`, sorted.
///
/// A missing directory has no subdirectories.
pub fn subdirectories(dir: &Path) -> Result<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to list directory: {}", dir.display()))
        }
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to list directory: {}", dir.display()))?;
        if entry.file_type()?.is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

/// Every regular file below `root`, as paths relative to `root`, sorted.
pub fn relative_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if root.is_dir() {
        walk(root, Path::new(""), &mut files)?;
    }
    files.sort();
    Ok(files)
}

fn walk(root: &Path, relative: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    let dir = root.join(relative);
    for entry in
        fs::read_dir(&dir).with_context(|| format!("Failed to list directory: {}", dir.display()))?
    {
        let entry = entry?;
        let child = relative.join(entry.file_name());
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            walk(root, &child, files)?;
        } else if file_type.is_file() {
            files.push(child);
        }
    }
    Ok(())
}

/// Removes empty directories below and including `root`, bottom-up.
///
/// Returns whether `root` itself was removed.
pub fn remove_empty_dirs(root: &Path) -> Result<bool> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to list directory: {}", root.display()))
        }
    };

    let mut empty = true;
    for entry in entries {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            if !remove_empty_dirs(&entry.path())? {
                empty = false;
            }
        } else {
            empty = false;
        }
    }

    if empty {
        fs::remove_dir(root)
            .with_context(|| format!("Failed to remove empty directory: {}", root.display()))?;
    }
    Ok(empty)
}

/// Absolute command path for a path relative to a collation tree.
pub fn absolute_command_path(relative: &Path) -> PathBuf {
    Path::new("/").join(relative)
}

/// Path of a command below a collation tree root.
///
/// The leading `/` of an absolute command path is stripped so the command
/// lands inside `root`.
pub fn tree_path(root: &Path, command: &Path) -> PathBuf {
    root.join(command.strip_prefix("/").unwrap_or(command))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_relative_files_sorted_and_recursive() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("usr/bin")).unwrap();
        fs::write(dir.path().join("usr/bin/ls"), "").unwrap();
        fs::write(dir.path().join("usr/bin/cat"), "").unwrap();
        fs::create_dir_all(dir.path().join("opt")).unwrap();

        let files = relative_files(dir.path()).unwrap();
        assert_eq!(
            files,
            vec![PathBuf::from("usr/bin/cat"), PathBuf::from("usr/bin/ls")]
        );
    }

    #[test]
    fn test_relative_files_missing_root() {
        assert!(relative_files(Path::new("/nonexistent/collation"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_remove_empty_dirs_keeps_files() {
        let dir = TempDir::new().unwrap();
        let host = dir.path().join("host");
        fs::create_dir_all(host.join("usr/bin")).unwrap();
        fs::create_dir_all(host.join("opt/tool/bin")).unwrap();
        fs::write(host.join("usr/bin/ls"), "x").unwrap();

        assert!(!remove_empty_dirs(&host).unwrap());
        assert!(host.join("usr/bin/ls").exists());
        assert!(!host.join("opt").exists());

        fs::remove_file(host.join("usr/bin/ls")).unwrap();
        assert!(remove_empty_dirs(&host).unwrap());
        assert!(!host.exists());
    }

    #[test]
    fn test_tree_path_strips_root() {
        assert_eq!(
            tree_path(Path::new("/c/all/alpha"), Path::new("/usr/bin/ls")),
            PathBuf::from("/c/all/alpha/usr/bin/ls")
        );
        assert_eq!(
            absolute_command_path(Path::new("usr/bin/ls")),
            PathBuf::from("/usr/bin/ls")
        );
    }
}
