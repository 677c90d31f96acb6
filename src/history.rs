//! Append-only history of averaged readings.
//!
//! The [`HistoryLog`] trait is the pipeline's view of durable storage: it can
//! append a record and read back everything since a cutoff. [`CsvHistory`]
//! is the file-backed implementation, one `timestamp,value` row per record.
//!
//! Records are never edited or removed. Retention is unbounded; callers
//! restrict reads to a trailing window (see [`DEFAULT_HISTORY_HOURS`]).

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Lines, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use tdswatch_types::{LogRecord, Timestamp};

use crate::error::PersistenceError;

/// Trailing window used for charts, in hours.
pub const DEFAULT_HISTORY_HOURS: u32 = 48;

/// Lazy sequence of records returned by [`HistoryLog::query_since`].
pub type LogRange<'a> = Box<dyn Iterator<Item = LogRecord> + Send + 'a>;

/// Durable, append-only record storage.
pub trait HistoryLog: Send + Sync {
    /// Durably append one record after all previous ones.
    fn append(&mut self, record: &LogRecord) -> Result<(), PersistenceError>;

    /// All records with `timestamp >= cutoff`, in append order.
    ///
    /// Each call starts a fresh pass over the log.
    fn query_since(&self, cutoff: Timestamp) -> Result<LogRange<'_>, PersistenceError>;
}

/// History stored as a CSV file.
#[derive(Debug, Clone)]
pub struct CsvHistory {
    path: PathBuf,
}

impl CsvHistory {
    /// Use the log file at `path`. Nothing is touched until the first write.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_for_append(&self) -> io::Result<File> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;

        // A torn last row must not swallow the next one
        if file.metadata()?.len() > 0 {
            file.seek(SeekFrom::End(-1))?;
            let mut last = [0u8; 1];
            file.read_exact(&mut last)?;
            if last[0] != b'\n' {
                warn!(
                    path = %self.path.display(),
                    "History log did not end with a newline, terminating last row"
                );
                file.write_all(b"\n")?;
            }
        }
        Ok(file)
    }
}

impl HistoryLog for CsvHistory {
    fn append(&mut self, record: &LogRecord) -> Result<(), PersistenceError> {
        let write = || -> io::Result<()> {
            let mut file = self.open_for_append()?;
            file.write_all(record.to_row().as_bytes())?;
            file.sync_data()
        };
        write().map_err(|e| PersistenceError::new(&self.path, e))?;

        debug!(
            path = %self.path.display(),
            timestamp = %record.timestamp,
            value = record.value,
            "Appended history record"
        );
        Ok(())
    }

    fn query_since(&self, cutoff: Timestamp) -> Result<LogRange<'_>, PersistenceError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            // Nothing written yet
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(Box::new(std::iter::empty()))
            }
            Err(e) => return Err(PersistenceError::new(&self.path, e)),
        };

        Ok(Box::new(CsvRows {
            lines: BufReader::new(file).lines(),
            cutoff,
            path: &self.path,
            line_no: 0,
            done: false,
        }))
    }
}

/// Iterator over the rows of a history file.
struct CsvRows<'a> {
    lines: Lines<BufReader<File>>,
    cutoff: Timestamp,
    path: &'a Path,
    line_no: usize,
    done: bool,
}

impl Iterator for CsvRows<'_> {
    type Item = LogRecord;

    fn next(&mut self) -> Option<LogRecord> {
        while !self.done {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                    self.line_no += 1;
                    warn!(
                        path = %self.path.display(),
                        line = self.line_no,
                        "Skipping history row that is not UTF-8"
                    );
                    continue;
                }
                Err(e) => {
                    warn!(path = %self.path.display(), "Stopped reading history: {}", e);
                    self.done = true;
                    return None;
                }
            };
            self.line_no += 1;

            if line.trim().is_empty() {
                continue;
            }

            match LogRecord::parse_row(&line) {
                Ok(record) if record.timestamp >= self.cutoff => return Some(record),
                Ok(_) => {}
                Err(e) => warn!(
                    path = %self.path.display(),
                    line = self.line_no,
                    "Skipping malformed history row: {}",
                    e
                ),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(ts: f64, value: f64) -> LogRecord {
        LogRecord::new(Timestamp::from_secs(ts), value)
    }

    #[test]
    fn test_append_then_query_returns_record() {
        let dir = TempDir::new().unwrap();
        let mut log = CsvHistory::new(dir.path().join("tds.csv"));

        let written = record(1_700_000_000.25, 123.456);
        log.append(&written).unwrap();

        let read: Vec<_> = log.query_since(written.timestamp).unwrap().collect();
        assert_eq!(read, vec![written]);
    }

    #[test]
    fn test_rows_are_appended_in_order() {
        let dir = TempDir::new().unwrap();
        let mut log = CsvHistory::new(dir.path().join("tds.csv"));

        log.append(&record(10.0, 1.0)).unwrap();
        log.append(&record(20.0, 2.0)).unwrap();

        let content = fs::read_to_string(log.path()).unwrap();
        assert_eq!(content, "10,1\n20,2\n");
    }

    #[test]
    fn test_query_filters_by_cutoff() {
        let dir = TempDir::new().unwrap();
        let mut log = CsvHistory::new(dir.path().join("tds.csv"));
        for (ts, v) in [(100.0, 1.0), (200.0, 2.0), (300.0, 3.0), (400.0, 4.0)] {
            log.append(&record(ts, v)).unwrap();
        }

        let cutoff = Timestamp::from_secs(250.0);
        let read: Vec<_> = log.query_since(cutoff).unwrap().collect();
        assert_eq!(read, vec![record(300.0, 3.0), record(400.0, 4.0)]);
        assert!(read.iter().all(|r| r.timestamp >= cutoff));

        // Boundary is inclusive
        let read: Vec<_> = log.query_since(Timestamp::from_secs(200.0)).unwrap().collect();
        assert_eq!(read.len(), 3);
    }

    #[test]
    fn test_query_is_restartable() {
        let dir = TempDir::new().unwrap();
        let mut log = CsvHistory::new(dir.path().join("tds.csv"));
        log.append(&record(1.0, 1.0)).unwrap();

        let first: Vec<_> = log.query_since(Timestamp::from_secs(0.0)).unwrap().collect();
        log.append(&record(2.0, 2.0)).unwrap();
        let second: Vec<_> = log.query_since(Timestamp::from_secs(0.0)).unwrap().collect();

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 2);
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let log = CsvHistory::new(dir.path().join("never-written.csv"));
        assert_eq!(log.query_since(Timestamp::from_secs(0.0)).unwrap().count(), 0);
    }

    #[test]
    fn test_malformed_rows_are_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tds.csv");
        fs::write(&path, "10,1\ngarbage\n\n20,oops\n30,3\n").unwrap();

        let log = CsvHistory::new(&path);
        let read: Vec<_> = log.query_since(Timestamp::from_secs(0.0)).unwrap().collect();
        assert_eq!(read, vec![record(10.0, 1.0), record(30.0, 3.0)]);
    }

    #[test]
    fn test_non_utf8_row_does_not_hide_later_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tds.csv");
        let mut content = b"10,1\n".to_vec();
        content.extend_from_slice(&[0xff, 0xfe, b'\n']);
        content.extend_from_slice(b"20,2\n30,3\n");
        fs::write(&path, content).unwrap();

        let log = CsvHistory::new(&path);
        let values: Vec<f64> = log
            .query_since(Timestamp::from_secs(0.0))
            .unwrap()
            .map(|r| r.value)
            .collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_append_after_torn_row_starts_new_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tds.csv");
        fs::write(&path, "10,1\n20,2").unwrap();

        let mut log = CsvHistory::new(&path);
        log.append(&record(30.0, 3.0)).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "10,1\n20,2\n30,3\n");
        let read: Vec<_> = log.query_since(Timestamp::from_secs(0.0)).unwrap().collect();
        assert_eq!(
            read,
            vec![record(10.0, 1.0), record(20.0, 2.0), record(30.0, 3.0)]
        );
    }

    #[test]
    fn test_creates_parent_directory() {
        let dir = TempDir::new().unwrap();
        let mut log = CsvHistory::new(dir.path().join("nested/data/tds.csv"));
        log.append(&record(1.0, 1.0)).unwrap();
        assert!(log.path().exists());
    }

    #[test]
    fn test_append_failure_is_reported() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "").unwrap();

        let mut log = CsvHistory::new(blocker.join("tds.csv"));
        let err = log.append(&record(1.0, 1.0)).unwrap_err();
        assert_eq!(err.path, blocker.join("tds.csv"));
    }
}
