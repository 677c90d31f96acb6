//! # tdswatch-types
//!
//! Core types shared by the tdswatch crates. A sensor publishes raw
//! readings over MQTT, the server reduces them into averaged
//! [`LogRecord`]s and appends those to a CSV history.
//!
//! ## Features
//!
//! - `serde`: derive `Serialize`/`Deserialize` for the public types
//!
//! ## Example
//!
//! ```rust
//! use tdswatch_types::{InboundMessage, LogRecord, Reading, Timestamp};
//!
//! let message = InboundMessage::new("aerogarden/tds", "412.5");
//! let reading = Reading::parse_at(&message.payload, Timestamp::from_secs(1_700_000_000.0)).unwrap();
//! assert_eq!(reading.value, 412.5);
//!
//! let record = LogRecord::new(reading.timestamp, reading.value);
//! assert_eq!(record.to_row(), "1700000000,412.5\n");
//! ```

mod reading;
mod record;
mod timestamp;

pub use reading::*;
pub use record::*;
pub use timestamp::*;

/// Seconds in one hour, used for chart offsets and history windows.
pub const SECS_PER_HOUR: f64 = 3600.0;
