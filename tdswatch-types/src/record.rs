//! Averaged history records and their CSV row encoding.
//!
//! One row per record, two comma separated fields:
//!
//! ```text
//! <epoch seconds>,<value>\n
//! ```

use core::fmt;

use crate::Timestamp;

/// An averaged window, as persisted in the history log.
///
/// Written once and never modified.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LogRecord {
    /// Time the window was reduced.
    pub timestamp: Timestamp,
    /// Mean of the window's readings.
    pub value: f64,
}

impl LogRecord {
    /// Create a record.
    pub const fn new(timestamp: Timestamp, value: f64) -> Self {
        Self { timestamp, value }
    }

    /// Encode as a newline-terminated CSV row.
    pub fn to_row(&self) -> String {
        format!("{},{}\n", self.timestamp.as_secs(), self.value)
    }

    /// Decode a single CSV row. A trailing newline is allowed.
    pub fn parse_row(row: &str) -> Result<Self, RowError> {
        let row = row.trim_end_matches(['\n', '\r']);
        let mut fields = row.split(',');

        let (Some(ts), Some(value), None) = (fields.next(), fields.next(), fields.next()) else {
            return Err(RowError::FieldCount(row.to_string()));
        };

        let ts: f64 = ts
            .trim()
            .parse()
            .map_err(|_| RowError::BadTimestamp(ts.to_string()))?;
        let value: f64 = value
            .trim()
            .parse()
            .map_err(|_| RowError::BadValue(value.to_string()))?;

        Ok(Self::new(Timestamp::from_secs(ts), value))
    }
}

/// Errors decoding a history row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowError {
    /// Row does not have exactly two fields.
    FieldCount(String),
    /// First field is not a float.
    BadTimestamp(String),
    /// Second field is not a float.
    BadValue(String),
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowError::FieldCount(row) => write!(f, "expected 2 fields in row '{}'", row),
            RowError::BadTimestamp(field) => write!(f, "invalid timestamp '{}'", field),
            RowError::BadValue(field) => write!(f, "invalid value '{}'", field),
        }
    }
}

impl std::error::Error for RowError {}
