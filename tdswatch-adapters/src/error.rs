//! Error types for adapters.

use thiserror::Error;

/// Errors that can occur when talking to the broker or the notification API.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The server answered with a non-success status.
    #[error("HTTP status {status}: {body}")]
    Status {
        /// Response status code.
        status: u16,
        /// Response body, as returned by the server.
        body: String,
    },

    /// HTTP request could not be built or sent.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Connection failed.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The broker rejected or dropped a request.
    #[error("Broker request failed: {0}")]
    Broker(String),

    /// Timeout waiting for response.
    #[error("Request timed out")]
    Timeout,

    /// Required setting was not provided.
    #[error("Missing setting: {0}")]
    Config(&'static str),
}

#[cfg(feature = "pushover")]
impl From<reqwest::Error> for AdapterError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AdapterError::Timeout
        } else if err.is_connect() {
            AdapterError::Connection(err.to_string())
        } else {
            AdapterError::Http(err.to_string())
        }
    }
}

#[cfg(feature = "mqtt")]
impl From<rumqttc::ConnectionError> for AdapterError {
    fn from(err: rumqttc::ConnectionError) -> Self {
        AdapterError::Connection(err.to_string())
    }
}

#[cfg(feature = "mqtt")]
impl From<rumqttc::ClientError> for AdapterError {
    fn from(err: rumqttc::ClientError) -> Self {
        AdapterError::Broker(err.to_string())
    }
}
