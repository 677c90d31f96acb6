//! Wall-clock instants as fractional Unix seconds.

use core::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::SECS_PER_HOUR;

/// Seconds since the Unix epoch.
///
/// Stored as `f64` because that is the representation written to the
/// history file, so a value read back compares equal to the one written.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Timestamp(f64);

impl Timestamp {
    /// Create from fractional seconds since the epoch.
    pub const fn from_secs(secs: f64) -> Self {
        Self(secs)
    }

    /// The current system time.
    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        Self(secs)
    }

    /// Seconds since the epoch.
    pub const fn as_secs(&self) -> f64 {
        self.0
    }

    /// This instant moved back by `hours`.
    pub fn hours_before(&self, hours: f64) -> Self {
        Self(self.0 - hours * SECS_PER_HOUR)
    }

    /// Offset of this instant relative to `now`, in hours.
    ///
    /// Instants in the past give negative values.
    pub fn offset_hours(&self, now: Timestamp) -> f64 {
        (self.0 - now.0) / SECS_PER_HOUR
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
