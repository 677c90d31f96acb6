//! Raw sensor readings and the broker messages that carry them.

use core::fmt;

use crate::Timestamp;

/// A single timestamped measurement from the sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Reading {
    /// When the reading was received.
    pub timestamp: Timestamp,
    /// Measured value (ppm for a TDS probe).
    pub value: f64,
}

impl Reading {
    /// Create a reading.
    pub const fn new(timestamp: Timestamp, value: f64) -> Self {
        Self { timestamp, value }
    }

    /// Parse a payload received now.
    pub fn parse(payload: &[u8]) -> Result<Self, ParseError> {
        Self::parse_at(payload, Timestamp::now())
    }

    /// Parse a payload, stamping it with `timestamp`.
    ///
    /// The payload must be UTF-8 text holding a single finite float;
    /// surrounding whitespace is ignored.
    pub fn parse_at(payload: &[u8], timestamp: Timestamp) -> Result<Self, ParseError> {
        let text = core::str::from_utf8(payload).map_err(|_| ParseError::NotUtf8)?;
        let text = text.trim();
        if text.is_empty() {
            return Err(ParseError::Empty);
        }

        let value: f64 = text
            .parse()
            .map_err(|_| ParseError::NotANumber(text.to_string()))?;
        if !value.is_finite() {
            return Err(ParseError::NotFinite(text.to_string()));
        }

        Ok(Self { timestamp, value })
    }
}

/// Reasons an inbound payload could not be turned into a [`Reading`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Payload bytes are not valid UTF-8.
    NotUtf8,
    /// Payload is empty or whitespace only.
    Empty,
    /// Payload text is not a float.
    NotANumber(String),
    /// Payload parsed to NaN or infinity.
    NotFinite(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::NotUtf8 => write!(f, "payload is not valid UTF-8"),
            ParseError::Empty => write!(f, "payload is empty"),
            ParseError::NotANumber(text) => write!(f, "payload '{}' is not a number", text),
            ParseError::NotFinite(text) => write!(f, "payload '{}' is not a finite number", text),
        }
    }
}

impl std::error::Error for ParseError {}

/// A message as delivered by the broker, before parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Topic the message arrived on.
    pub topic: String,
    /// Raw payload bytes.
    pub payload: Vec<u8>,
}

impl InboundMessage {
    /// Create a message from a topic and payload.
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// Payload as text, with invalid UTF-8 replaced. Intended for logs.
    pub fn payload_lossy(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}
