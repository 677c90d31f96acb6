//! MQTT broker session.

use async_trait::async_trait;
use tracing::{debug, warn};

use tdswatch_adapters::mqtt::{MqttEvent, MqttSession};

use crate::supervisor::{BrokerSession, SessionEvent, TransportError};

#[async_trait]
impl BrokerSession for MqttSession {
    async fn connect(&mut self) -> Result<(), TransportError> {
        MqttSession::connect(self).await.map_err(TransportError::from)
    }

    async fn next_event(&mut self) -> SessionEvent {
        loop {
            match self.poll().await {
                Ok(MqttEvent::Publish(message)) => return SessionEvent::MessageReceived(message),
                Ok(MqttEvent::ConnAck) => {
                    // Clean sessions drop subscriptions on reconnect
                    if let Err(e) = self.resubscribe().await {
                        warn!(broker = self.broker(), "Resubscribe failed: {}", e);
                        return SessionEvent::Disconnected(e.to_string());
                    }
                    return SessionEvent::Connected;
                }
                Ok(MqttEvent::Other) => continue,
                Err(e) => {
                    debug!(broker = self.broker(), "Event loop error: {}", e);
                    return SessionEvent::Disconnected(e.to_string());
                }
            }
        }
    }

    fn description(&self) -> &str {
        self.broker()
    }
}
