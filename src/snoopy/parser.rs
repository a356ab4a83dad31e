//! Parser for snoopy syslog lines.
//!
//! A snoopy line looks like
//!
//! ```text
//! Jan  5 10:00:01 alpha snoopy[4242]: [uid:0 sid:11 tty:/dev/pts/0 cwd:/root filename:/usr/bin/ls]: ls -l
//! ```
//!
//! Syslog omits the year, so it is inferred from the date of the log file
//! being read.

use super::types::{CommandEvent, LogRecord, TaggedFields};
use super::users::UserDirectory;
use crate::config::bare_hostname;
use crate::utils::time::local_instant;
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MalformedLine {
    #[error("line does not match the snoopy log format")]
    Shape,
    #[error("invalid timestamp '{0}'")]
    Timestamp(String),
    #[error("missing '{0}' field")]
    MissingField(&'static str),
}

/// Parses the lines of one log file.
pub struct LogLineParser {
    logfile_date: NaiveDate,
    line_re: Regex,
    tag_re: Regex,
}

impl LogLineParser {
    /// Create a parser for a log file rotated on `logfile_date`
    pub fn new(logfile_date: NaiveDate) -> Self {
        Self {
            logfile_date,
            line_re: Regex::new(
                r"^(\w+\s+\d+\s+\d+:\d+:\d+)\s+(\S+)\s+[^\s\[]+\[(\d+)\]:\s+\[([^\]]*)\]:\s+(.*)$",
            )
            .expect("static regex"),
            tag_re: Regex::new(r"(?:^|\s+)(\w+):").expect("static regex"),
        }
    }

    pub fn parse(&self, line: &str, users: &mut UserDirectory) -> Result<LogRecord, MalformedLine> {
        let caps = self.line_re.captures(line).ok_or(MalformedLine::Shape)?;
        let timestamp = self.timestamp(&caps[1])?;
        let fields = self.tagged_fields(&caps[4]);
        let uid = fields.get("uid").ok_or(MalformedLine::MissingField("uid"))?;

        let event = CommandEvent {
            timestamp,
            host: bare_hostname(&caps[2]).to_string(),
            user: users.username(uid),
            command_line: caps[5].trim_end().to_string(),
        };
        Ok(LogRecord { event, fields })
    }

    fn timestamp(
        &self,
        syslog_stamp: &str,
    ) -> Result<chrono::DateTime<chrono::FixedOffset>, MalformedLine> {
        // a January log file still holds the tail of December
        let year = if syslog_stamp.starts_with("Dec") && self.logfile_date.month() == 1 {
            self.logfile_date.year() - 1
        } else {
            self.logfile_date.year()
        };

        let normalized = syslog_stamp.split_whitespace().collect::<Vec<_>>().join(" ");
        let naive =
            NaiveDateTime::parse_from_str(&format!("{year} {normalized}"), "%Y %b %d %H:%M:%S")
                .map_err(|_| MalformedLine::Timestamp(syslog_stamp.to_string()))?;
        local_instant(&naive)
            .map(|dt| dt.fixed_offset())
            .map_err(|_| MalformedLine::Timestamp(syslog_stamp.to_string()))
    }

    /// Splits `uid:0 cwd:/home/a b filename:/bin/x` into tag/value pairs.
    pub fn tagged_fields(&self, block: &str) -> TaggedFields {
        let tags: Vec<_> = self
            .tag_re
            .captures_iter(block)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                Some((caps.get(1)?.as_str(), whole.start(), whole.end()))
            })
            .collect();

        let mut fields = TaggedFields::default();
        for (i, (tag, _, value_start)) in tags.iter().enumerate() {
            let value_end = tags.get(i + 1).map_or(block.len(), |next| next.1);
            fields.insert(*tag, &block[*value_start..value_end]);
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn parser(y: i32, m: u32, d: u32) -> LogLineParser {
        LogLineParser::new(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    #[test]
    fn test_parse_line() {
        let mut users = UserDirectory::new("/nonexistent/passwd");
        let record = parser(2023, 3, 2)
            .parse(
                "Mar  1 10:00:01 alpha.example.com snoopy[4242]: [uid:0 sid:11 tty:/dev/pts/0 cwd:/root filename:/usr/bin/ls]: ls -l  ",
                &mut users,
            )
            .unwrap();

        assert_eq!(record.event.host, "alpha");
        assert_eq!(record.event.user, "0");
        assert_eq!(record.event.command_line, "ls -l");
        assert_eq!(record.event.timestamp.year(), 2023);
        assert_eq!(record.event.timestamp.hour(), 10);
        assert_eq!(record.fields.get("filename"), Some("/usr/bin/ls"));
        assert_eq!(record.fields.get("tty"), Some("/dev/pts/0"));
    }

    #[test]
    fn test_december_line_in_january_log() {
        let mut users = UserDirectory::new("/nonexistent/passwd");
        let record = parser(2024, 1, 1)
            .parse(
                "Dec 31 23:59:59 alpha snoopy[1]: [uid:0 filename:/bin/true]: true",
                &mut users,
            )
            .unwrap();
        assert_eq!(record.event.timestamp.year(), 2023);
        assert_eq!(record.event.timestamp.month(), 12);
    }

    #[test]
    fn test_values_with_spaces() {
        let fields = parser(2023, 1, 1).tagged_fields("uid:1000 cwd:/home/a b filename:run.sh");
        assert_eq!(fields.get("uid"), Some("1000"));
        assert_eq!(fields.get("cwd"), Some("/home/a b"));
        assert_eq!(fields.get("filename"), Some("run.sh"));
        assert_eq!(fields.len(), 3);
    }

    #[test]
    fn test_malformed_lines() {
        let mut users = UserDirectory::new("/nonexistent/passwd");
        let p = parser(2023, 1, 1);
        assert_eq!(
            p.parse("kernel: something else entirely", &mut users).unwrap_err(),
            MalformedLine::Shape
        );
        assert_eq!(
            p.parse("Foo 99 10:00:00 alpha snoopy[1]: [uid:0]: ls", &mut users)
                .unwrap_err(),
            MalformedLine::Timestamp("Foo 99 10:00:00".to_string())
        );
        assert_eq!(
            p.parse("Jan  1 10:00:00 alpha snoopy[1]: [sid:1]: ls", &mut users)
                .unwrap_err(),
            MalformedLine::MissingField("uid")
        );
    }
}
