//! Error taxonomy for the ingestion pipeline.
//!
//! | error               | handling                                              |
//! |---------------------|-------------------------------------------------------|
//! | [`ParseError`]      | skip the message, keep the loop running               |
//! | [`EmptyWindowError`]| invariant violation, fatal                            |
//! | [`PersistenceError`]| fatal for the window, no alert on unwritten data      |
//! | [`DeliveryError`]   | logged, guard stays armed, the next window retries    |
//! | [`ConfigError`]     | startup failure                                       |
//!
//! Connection errors live in [`crate::supervisor`].

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use tdswatch_adapters::AdapterError;
pub use tdswatch_types::ParseError;

/// `reduce_and_clear` was called on an empty window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot reduce an empty reading window")]
pub struct EmptyWindowError;

/// Writing to or reading from the history log failed.
#[derive(Debug, Error)]
#[error("history log {path}: {source}")]
pub struct PersistenceError {
    /// Log file involved.
    pub path: PathBuf,
    /// Underlying I/O failure.
    #[source]
    pub source: io::Error,
}

impl PersistenceError {
    /// Wrap an I/O error for `path`.
    pub fn new(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self {
            path: path.into(),
            source,
        }
    }
}

/// An alert could not be delivered.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The delivery endpoint answered with a non-2xx status.
    #[error("delivery rejected with status {status}: {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// The request never got a response.
    #[error("delivery failed: {0}")]
    Transport(String),

    /// The chart attachment could not be produced.
    #[error("could not prepare chart: {0}")]
    Chart(String),
}

impl From<AdapterError> for DeliveryError {
    fn from(err: AdapterError) -> Self {
        match err {
            AdapterError::Status { status, body } => DeliveryError::Rejected { status, body },
            other => DeliveryError::Transport(other.to_string()),
        }
    }
}

/// Invalid or missing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A setting has a value outside its allowed range.
    #[error("invalid setting {key}: {reason}")]
    Invalid {
        /// Setting name.
        key: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// The configuration sources could not be loaded or deserialized.
    #[error(transparent)]
    Load(#[from] config::ConfigError),
}

impl ConfigError {
    /// Shorthand for [`ConfigError::Invalid`].
    pub fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Errors raised while handling one inbound message.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The payload was not a reading.
    #[error("bad payload on {topic}: {source}")]
    Parse {
        /// Topic the payload arrived on.
        topic: String,
        /// Parse failure.
        #[source]
        source: ParseError,
    },

    /// Window reduction invariant was violated.
    #[error(transparent)]
    EmptyWindow(#[from] EmptyWindowError),

    /// The aggregate could not be persisted.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl PipelineError {
    /// Whether the error should stop the process.
    pub fn is_fatal(&self) -> bool {
        match self {
            PipelineError::Parse { .. } => false,
            PipelineError::EmptyWindow(_) | PipelineError::Persistence(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatality() {
        let parse = PipelineError::Parse {
            topic: "t".to_string(),
            source: ParseError::Empty,
        };
        assert!(!parse.is_fatal());
        assert!(PipelineError::from(EmptyWindowError).is_fatal());

        let io = PersistenceError::new("/tmp/x.csv", io::Error::other("disk full"));
        let err = PipelineError::from(io);
        assert!(err.is_fatal());
        assert_eq!(err.to_string(), "history log /tmp/x.csv: disk full");
    }

    #[test]
    fn test_delivery_from_adapter_error() {
        let err = DeliveryError::from(AdapterError::Status {
            status: 429,
            body: "slow down".to_string(),
        });
        assert!(matches!(err, DeliveryError::Rejected { status: 429, .. }));

        let err = DeliveryError::from(AdapterError::Timeout);
        assert!(matches!(err, DeliveryError::Transport(_)));
    }
}
