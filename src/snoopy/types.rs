//! Data structures for snoopy log records.

use chrono::{DateTime, FixedOffset};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

/// One command invocation as recorded by snoopy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandEvent {
    pub timestamp: DateTime<FixedOffset>,
    /// Bare hostname of the host that ran the command
    pub host: String,
    pub user: String,
    /// Full command line as logged
    pub command_line: String,
}

/// The `[tag:value ...]` block snoopy prefixes each command with.
///
/// Snoopy does not quote values, so a value runs until the next
/// whitespace-preceded `word:` tag and may itself contain spaces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaggedFields {
    fields: HashMap<String, String>,
}

impl TaggedFields {
    pub fn get(&self, tag: &str) -> Option<&str> {
        self.fields.get(tag).map(String::as_str)
    }

    pub fn insert(&mut self, tag: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(tag.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Absolute path of the executed file.
    ///
    /// Relative `filename` values are resolved against `cwd` and normalized.
    /// Returns `None` when `filename` is missing, or relative without a `cwd`.
    pub fn command_path(&self) -> Option<PathBuf> {
        let filename = Path::new(self.get("filename")?);
        if filename.is_absolute() {
            return Some(normalize(filename));
        }
        let cwd = Path::new(self.get("cwd")?);
        if !cwd.is_absolute() {
            return None;
        }
        Some(normalize(&cwd.join(filename)))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TaggedFields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Lexically normalizes `.` and `..` components without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// A parsed log line: the event plus the raw tagged fields it came with.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub event: CommandEvent,
    pub fields: TaggedFields,
}
