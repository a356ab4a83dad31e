//! Timestamp helpers for collated lines.
//!
//! Every collated line starts with a fixed-width `YYYYMMDD-HH:MM:SS` stamp in
//! local time. The fixed width makes the stamp sort lexicographically, which
//! is what the merge relies on; the helpers here convert it back to an
//! instant when a file's modification time has to be stamped.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use filetime::FileTime;

/// strftime format of the sortable line key.
pub const COLLATION_TIMESTAMP_FORMAT: &str = "%Y%m%d-%H:%M:%S";

/// Formats a timestamp as a collated line key.
pub fn format_collation_timestamp<Tz: TimeZone>(dt: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    dt.format(COLLATION_TIMESTAMP_FORMAT).to_string()
}

/// Parse a line key back into a local wall-clock time
pub fn parse_collation_key(key: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(key, COLLATION_TIMESTAMP_FORMAT)
        .with_context(|| format!("Invalid collation timestamp: {key}"))
}

/// Interpret a local wall-clock time in the local time zone.
///
/// Ambiguous times (DST fold) resolve to the earlier instant; times that do
/// not exist locally (DST gap) are an error.
pub fn local_instant(naive: &NaiveDateTime) -> Result<DateTime<Local>> {
    Local
        .from_local_datetime(naive)
        .earliest()
        .ok_or_else(|| anyhow!("{naive} does not exist in the local time zone"))
}

/// File time for an instant, used to stamp collated and consolidated files.
pub fn file_time<Tz: TimeZone>(dt: &DateTime<Tz>) -> FileTime {
    FileTime::from_unix_time(dt.timestamp(), 0)
}

/// File time corresponding to a collated line key.
pub fn key_file_time(key: &str) -> Result<FileTime> {
    let naive = parse_collation_key(key)?;
    Ok(file_time(&local_instant(&naive)?))
}
