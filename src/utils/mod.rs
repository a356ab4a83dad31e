//! Utility functions and helpers.
//!
//! - [`reader`] - Log file reader with automatic decompression
//! - [`progress`] - Progress bars for long-running scans
//! - [`time`] - Collation timestamp keys and file times
//! - [`fs`] - Directory walking and removal helpers
//! - [`format`] - Number formatting for summaries

pub mod format;
pub mod fs;
pub mod progress;
pub mod reader;
pub mod time;
