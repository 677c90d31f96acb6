//! Channel-backed broker session.
//!
//! Events are pushed through a tokio mpsc channel instead of arriving from a
//! network. When every sender is dropped the session reports
//! [`SessionEvent::Closed`].

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::supervisor::{BrokerSession, SessionEvent, TransportError};

/// A [`BrokerSession`] fed from an in-process channel.
///
/// # Example
///
/// ```
/// use tdswatch::source::ChannelSession;
/// use tdswatch::supervisor::SessionEvent;
/// use tdswatch::InboundMessage;
///
/// # tokio_test::block_on(async {
/// let (tx, session) = ChannelSession::create("in-process", 16);
/// tx.send(SessionEvent::MessageReceived(InboundMessage::new("aerogarden/tds", "412.5")))
///     .await
///     .unwrap();
/// # });
/// ```
#[derive(Debug)]
pub struct ChannelSession {
    receiver: mpsc::Receiver<SessionEvent>,
    connect_results: VecDeque<Result<(), TransportError>>,
    attempts: u32,
    description: String,
}

impl ChannelSession {
    /// Wrap the receiving end of an event channel.
    pub fn new(receiver: mpsc::Receiver<SessionEvent>, source_description: &str) -> Self {
        Self {
            receiver,
            connect_results: VecDeque::new(),
            attempts: 0,
            description: format!("channel: {}", source_description),
        }
    }

    /// Create a channel pair with room for `capacity` pending events.
    pub fn create(source_description: &str, capacity: usize) -> (mpsc::Sender<SessionEvent>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self::new(rx, source_description))
    }

    /// Script the outcome of upcoming connection attempts, in order.
    ///
    /// Once the script runs out every attempt succeeds.
    pub fn with_connect_results<I>(mut self, results: I) -> Self
    where
        I: IntoIterator<Item = Result<(), TransportError>>,
    {
        self.connect_results.extend(results);
        self
    }

    /// Number of connection attempts made so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

#[async_trait]
impl BrokerSession for ChannelSession {
    async fn connect(&mut self) -> Result<(), TransportError> {
        self.attempts += 1;
        self.connect_results.pop_front().unwrap_or(Ok(()))
    }

    async fn next_event(&mut self) -> SessionEvent {
        self.receiver.recv().await.unwrap_or(SessionEvent::Closed)
    }

    fn description(&self) -> &str {
        &self.description
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tdswatch_types::InboundMessage;

    #[tokio::test]
    async fn test_events_then_closed() {
        let (tx, mut session) = ChannelSession::create("test", 4);
        let event = SessionEvent::MessageReceived(InboundMessage::new("t", "1"));
        tx.send(event.clone()).await.unwrap();
        drop(tx);

        assert_eq!(session.next_event().await, event);
        assert_eq!(session.next_event().await, SessionEvent::Closed);
        assert_eq!(session.next_event().await, SessionEvent::Closed);
    }

    #[tokio::test]
    async fn test_scripted_connects() {
        let (_tx, session) = ChannelSession::create("test", 4);
        let mut session = session.with_connect_results(vec![Err(TransportError::new("refused"))]);

        assert_eq!(session.connect().await, Err(TransportError::new("refused")));
        assert_eq!(session.connect().await, Ok(()));
        assert_eq!(session.attempts(), 2);
        assert_eq!(session.description(), "channel: test");
    }
}
