//! Sensor-side publishing.
//!
//! Reads newline-delimited readings (typically piped from the sensor driver
//! on stdin) and publishes each one to the broker topic.

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};

use tdswatch_adapters::mqtt::MqttSession;
use tdswatch_adapters::AdapterError;
use tdswatch_types::Reading;

/// Something readings can be published to.
#[async_trait]
pub trait ReadingPublisher: Send {
    async fn publish(&mut self, payload: &str) -> Result<(), AdapterError>;
}

/// Publishes to a fixed topic over an MQTT session.
#[derive(Debug)]
pub struct MqttPublisher {
    session: MqttSession,
    topic: String,
}

impl MqttPublisher {
    pub fn new(session: MqttSession, topic: impl Into<String>) -> Self {
        Self {
            session,
            topic: topic.into(),
        }
    }

    pub fn session_mut(&mut self) -> &mut MqttSession {
        &mut self.session
    }

    pub fn into_session(self) -> MqttSession {
        self.session
    }
}

#[async_trait]
impl ReadingPublisher for MqttPublisher {
    async fn publish(&mut self, payload: &str) -> Result<(), AdapterError> {
        self.session
            .publish(&self.topic, payload.as_bytes().to_vec())
            .await
    }
}

/// Publish every valid line from `reader`. Returns how many were published.
///
/// Blank lines are skipped. Lines that are not readings are logged and
/// skipped. A failed publish is logged and the next line is tried.
pub async fn publish_lines<R, P>(reader: R, publisher: &mut P) -> std::io::Result<usize>
where
    R: AsyncBufRead + Unpin,
    P: ReadingPublisher + ?Sized,
{
    let mut lines = reader.lines();
    let mut published = 0;

    while let Some(line) = lines.next_line().await? {
        let payload = line.trim();
        if payload.is_empty() {
            continue;
        }

        if let Err(e) = Reading::parse(payload.as_bytes()) {
            warn!(payload, "Not publishing invalid reading: {}", e);
            continue;
        }

        match publisher.publish(payload).await {
            Ok(()) => {
                debug!(payload, "Published reading");
                published += 1;
            }
            Err(e) => warn!(payload, "Publish failed: {}", e),
        }
    }

    Ok(published)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tokio::io::BufReader;

    #[derive(Default)]
    struct Collect {
        published: Vec<String>,
        fail_on: Option<&'static str>,
    }

    #[async_trait]
    impl ReadingPublisher for Collect {
        async fn publish(&mut self, payload: &str) -> Result<(), AdapterError> {
            if self.fail_on == Some(payload) {
                return Err(AdapterError::Broker("queue full".to_string()));
            }
            self.published.push(payload.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_publishes_valid_lines() {
        let input = BufReader::new(Cursor::new(b"412.5\n\n  398 \nbogus\n401.25".to_vec()));
        let mut sink = Collect::default();

        let count = publish_lines(input, &mut sink).await.unwrap();
        assert_eq!(count, 3);
        assert_eq!(sink.published, vec!["412.5", "398", "401.25"]);
    }

    #[tokio::test]
    async fn test_publish_failure_continues() {
        let input = BufReader::new(Cursor::new(b"1\n2\n3\n".to_vec()));
        let mut sink = Collect {
            fail_on: Some("2"),
            ..Default::default()
        };

        let count = publish_lines(input, &mut sink).await.unwrap();
        assert_eq!(count, 2);
        assert_eq!(sink.published, vec!["1", "3"]);
    }
}
