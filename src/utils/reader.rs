//! Log file reader with transparent decompression.
//!
//! Snoopy logs are usually rotated and compressed by logrotate, so the
//! collator reads `.gz` and `.zst` files directly. Anything else is read
//! as plain text.
//!
//! # Examples
//!
//! ```no_run
//! use snoopy_log_collator::utils::reader::open_log;
//! use std::io::BufRead;
//!
//! let reader = open_log("/var/log/snoopy-20230101.gz").unwrap();
//! for line in reader.split(b'\n') {
//!     let bytes = line.unwrap();
//!     // lines may contain invalid UTF-8, decode per line
//! }
//! ```

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Compression applied to a log file, detected from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Plain,
    Gzip,
    Zstd,
}

impl Compression {
    /// Detects compression by extension: `.gz`, `.zst`, otherwise plain.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()).unwrap_or("") {
            "gz" => Self::Gzip,
            "zst" => Self::Zstd,
            _ => Self::Plain,
        }
    }
}

/// Opens a log file for buffered reading, decompressing as needed.
///
/// # Arguments
///
/// * `path` - Path to the log file (compressed or uncompressed)
///
/// # Returns
///
/// A buffered reader yielding the decompressed bytes
pub fn open_log(path: impl AsRef<Path>) -> Result<Box<dyn BufRead + Send>> {
    let path = path.as_ref();
    let file =
        File::open(path).with_context(|| format!("Failed to open log file: {}", path.display()))?;

    match Compression::from_path(path) {
        Compression::Gzip => Ok(Box::new(BufReader::new(GzDecoder::new(file)))),
        Compression::Zstd => {
            let decoder = zstd::Decoder::new(file).with_context(|| {
                format!("Failed to create zstd decoder for: {}", path.display())
            })?;
            Ok(Box::new(BufReader::new(decoder)))
        }
        Compression::Plain => Ok(Box::new(BufReader::new(file))),
    }
}
