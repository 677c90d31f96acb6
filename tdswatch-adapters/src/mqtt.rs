//! MQTT broker session built on `rumqttc`.
//!
//! A [`MqttSession`] owns the client handle and its event loop. Nothing
//! happens on the network until the event loop is polled, so every method
//! here drives [`rumqttc::EventLoop::poll`] itself: `connect` polls until the
//! broker acknowledges the session, `poll` returns the next interesting
//! event, and `publish` polls until the broker acknowledges the message.
//!
//! After a connection error the next poll transparently starts a fresh
//! connection attempt, which is what lets a supervisor retry by simply
//! calling [`MqttSession::connect`] again.
//!
//! ## Example
//!
//! ```rust,no_run
//! use tdswatch_adapters::mqtt::{MqttEvent, MqttSession};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut session = MqttSession::builder()
//!         .host("192.168.1.40")
//!         .subscribe_to("aerogarden/tds")
//!         .build();
//!
//!     session.connect().await?;
//!     loop {
//!         if let MqttEvent::Publish(message) = session.poll().await? {
//!             println!("{}: {}", message.topic, message.payload_lossy());
//!         }
//!     }
//! }
//! ```

use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, Incoming, MqttOptions, QoS};
use tracing::debug;

use tdswatch_types::InboundMessage;

use crate::AdapterError;

/// Capacity of the request channel between client handle and event loop.
const REQUEST_CHANNEL_CAPACITY: usize = 16;

/// Events surfaced by [`MqttSession::poll`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MqttEvent {
    /// The broker accepted a (re)connection.
    ConnAck,
    /// A message arrived on a subscribed topic.
    Publish(InboundMessage),
    /// Any other protocol traffic (pings, acks, outgoing packets).
    Other,
}

/// A broker connection with an optional standing subscription.
pub struct MqttSession {
    client: AsyncClient,
    eventloop: EventLoop,
    subscription: Option<String>,
    broker: String,
}

impl MqttSession {
    /// Create a new builder for configuring the session.
    pub fn builder() -> MqttSessionBuilder {
        MqttSessionBuilder::default()
    }

    /// `host:port` of the broker, for logs.
    pub fn broker(&self) -> &str {
        &self.broker
    }

    /// The topic subscribed to after every connect, if any.
    pub fn subscription(&self) -> Option<&str> {
        self.subscription.as_deref()
    }

    /// Make one connection attempt.
    ///
    /// Polls the event loop until the broker sends CONNACK, then queues the
    /// subscription (if configured). Any connection error ends the attempt.
    pub async fn connect(&mut self) -> Result<(), AdapterError> {
        loop {
            match self.eventloop.poll().await? {
                Event::Incoming(Incoming::ConnAck(ack)) => {
                    debug!("Connected to MQTT broker {} ({:?})", self.broker, ack.code);
                    self.resubscribe().await?;
                    return Ok(());
                }
                other => debug!("Waiting for CONNACK, got {:?}", other),
            }
        }
    }

    /// Queue the standing subscription again.
    ///
    /// Needed after every new session since clean sessions forget
    /// subscriptions on disconnect.
    pub async fn resubscribe(&mut self) -> Result<(), AdapterError> {
        if let Some(topic) = &self.subscription {
            self.client.subscribe(topic.as_str(), QoS::AtLeastOnce).await?;
        }
        Ok(())
    }

    /// Wait for the next event from the broker.
    pub async fn poll(&mut self) -> Result<MqttEvent, AdapterError> {
        let event = match self.eventloop.poll().await? {
            Event::Incoming(Incoming::ConnAck(_)) => MqttEvent::ConnAck,
            Event::Incoming(Incoming::Publish(publish)) => MqttEvent::Publish(InboundMessage::new(
                publish.topic,
                publish.payload.to_vec(),
            )),
            _ => MqttEvent::Other,
        };
        Ok(event)
    }

    /// Publish a payload and wait until the broker acknowledges it.
    ///
    /// Messages that arrive on the subscription while waiting are dropped;
    /// publishing sessions are not expected to subscribe.
    pub async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), AdapterError> {
        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await?;

        loop {
            match self.eventloop.poll().await? {
                Event::Incoming(Incoming::PubAck(_)) => return Ok(()),
                other => debug!("Waiting for PUBACK, got {:?}", other),
            }
        }
    }

    /// Send DISCONNECT to the broker.
    pub async fn disconnect(&mut self) -> Result<(), AdapterError> {
        self.client.disconnect().await?;
        Ok(())
    }
}

impl std::fmt::Debug for MqttSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttSession")
            .field("broker", &self.broker)
            .field("subscription", &self.subscription)
            .finish()
    }
}

/// Builder for MqttSession.
#[derive(Debug, Default)]
pub struct MqttSessionBuilder {
    host: Option<String>,
    port: Option<u16>,
    client_id: Option<String>,
    subscription: Option<String>,
    keep_alive: Option<Duration>,
}

impl MqttSessionBuilder {
    /// Set the broker host (default: "localhost").
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set the broker port (default: 1883).
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the MQTT client id (default: "tdswatch").
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Subscribe to `topic` after every successful connect.
    pub fn subscribe_to(mut self, topic: impl Into<String>) -> Self {
        self.subscription = Some(topic.into());
        self
    }

    /// Set the keep-alive interval (default: 30 seconds).
    pub fn keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = Some(keep_alive);
        self
    }

    /// Build the session. No network traffic happens until it is polled.
    pub fn build(self) -> MqttSession {
        let host = self.host.unwrap_or_else(|| "localhost".to_string());
        let port = self.port.unwrap_or(1883);
        let client_id = self.client_id.unwrap_or_else(|| "tdswatch".to_string());

        let mut options = MqttOptions::new(client_id, host.clone(), port);
        options.set_keep_alive(self.keep_alive.unwrap_or(Duration::from_secs(30)));
        options.set_clean_session(true);

        let (client, eventloop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);

        MqttSession {
            client,
            eventloop,
            subscription: self.subscription,
            broker: format!("{}:{}", host, port),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_builder_defaults() {
        let session = MqttSession::builder().build();
        assert_eq!(session.broker(), "localhost:1883");
        assert_eq!(session.subscription(), None);
    }

    #[tokio::test]
    async fn test_builder_custom() {
        let session = MqttSession::builder()
            .host("192.168.1.40")
            .port(8883)
            .client_id("garden")
            .subscribe_to("aerogarden/tds")
            .build();

        assert_eq!(session.broker(), "192.168.1.40:8883");
        assert_eq!(session.subscription(), Some("aerogarden/tds"));
    }

    #[tokio::test]
    async fn test_connect_fails_without_broker() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut session = MqttSession::builder().host("127.0.0.1").port(port).build();
        let err = session.connect().await.unwrap_err();
        assert!(matches!(err, AdapterError::Connection(_)));
    }
}
