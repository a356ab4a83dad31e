use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Take};
use std::path::Path;

/// A line stream positioned on its current line.
///
/// The key of a line is its first whitespace-delimited token, the
/// fixed-width timestamp every collated line starts with. Keys compare as
/// plain strings. Once the underlying reader is exhausted the stream has
/// no key and is dropped from every comparison.
pub struct KeyedReader<R> {
    label: String,
    reader: Option<R>,
    current: Option<String>,
    buf: Vec<u8>,
}

impl KeyedReader<BufReader<Take<File>>> {
    /// Opens a collated file and positions on its first line.
    ///
    /// Only the bytes present at open time are read, so lines appended
    /// meanwhile are left for a later merge. Returns that length too.
    pub fn open(path: &Path) -> io::Result<(Self, u64)> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        let reader = Self::new(path.display().to_string(), BufReader::new(file.take(len)))?;
        Ok((reader, len))
    }
}

impl<R: BufRead> KeyedReader<R> {
    pub fn new(label: impl Into<String>, reader: R) -> io::Result<Self> {
        let mut keyed = Self {
            label: label.into(),
            reader: Some(reader),
            current: None,
            buf: Vec::new(),
        };
        keyed.advance()?;
        Ok(keyed)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// The current line, without its line terminator.
    pub fn line(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn key(&self) -> Option<&str> {
        self.current.as_deref().map(line_key)
    }

    pub fn is_exhausted(&self) -> bool {
        self.current.is_none()
    }

    /// Moves to the next line, taking ownership of the current one.
    pub fn take_and_advance(&mut self) -> io::Result<Option<String>> {
        let line = self.current.take();
        self.advance()?;
        Ok(line)
    }

    fn advance(&mut self) -> io::Result<()> {
        let Some(reader) = self.reader.as_mut() else {
            self.current = None;
            return Ok(());
        };

        self.buf.clear();
        if reader.read_until(b'\n', &mut self.buf)? == 0 {
            self.reader = None;
            self.current = None;
            return Ok(());
        }
        while matches!(self.buf.last(), Some(b'\n' | b'\r')) {
            self.buf.pop();
        }
        self.current = Some(String::from_utf8_lossy(&self.buf).into_owned());
        Ok(())
    }
}

/// Sort key of a collated line.
pub fn line_key(line: &str) -> &str {
    line.split_whitespace().next().unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_reader_walks_lines() {
        let mut reader = KeyedReader::new(
            "t",
            Cursor::new("20230101-00:00:01 alpha root ls\n20230101-00:00:02 alpha root id\n"),
        )
        .unwrap();

        assert_eq!(reader.key(), Some("20230101-00:00:01"));
        assert_eq!(
            reader.take_and_advance().unwrap().as_deref(),
            Some("20230101-00:00:01 alpha root ls")
        );
        assert_eq!(reader.key(), Some("20230101-00:00:02"));
        reader.take_and_advance().unwrap();
        assert!(reader.is_exhausted());
        assert_eq!(reader.key(), None);
        assert_eq!(reader.take_and_advance().unwrap(), None);
    }

    #[test]
    fn test_last_line_without_newline() {
        let reader = KeyedReader::new("t", Cursor::new("20230101-00:00:01 x")).unwrap();
        assert_eq!(reader.line(), Some("20230101-00:00:01 x"));
    }

    #[test]
    fn test_empty_stream_is_exhausted() {
        let reader = KeyedReader::new("t", Cursor::new("")).unwrap();
        assert!(reader.is_exhausted());
        assert_eq!(reader.label(), "t");
    }

    #[test]
    fn test_open_ignores_lines_appended_later() {
        use std::io::Write;

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("foo");
        std::fs::write(&path, "20230101-00:00:01 a\n").unwrap();

        let (mut reader, len) = KeyedReader::open(&path).unwrap();
        assert_eq!(len, 20);
        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "20230101-00:00:02 a").unwrap();

        assert_eq!(
            reader.take_and_advance().unwrap().as_deref(),
            Some("20230101-00:00:01 a")
        );
        assert!(reader.is_exhausted());
    }
}
