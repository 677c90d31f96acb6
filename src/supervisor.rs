//! Broker connection supervision.
//!
//! A [`Supervisor`] owns one [`BrokerSession`] and drives it through
//! [`SessionState`]s:
//!
//! ```text
//!               establish()
//! Disconnected ────────────▶ Connecting ──ok──▶ Connected
//!      ▲                        │  ▲                │
//!      │                 fail,  │  │ sleep(interval) │ Disconnected event
//!      │            attempts<N  └──┘                 │
//!      │                        │                    │
//!      │            attempts==N ▼                    │
//!      │                      Failed                 │
//!      └─────────────────────────────────────────────┘
//! ```
//!
//! Every establishment cycle is bounded by the [`RetryPolicy`]. The number
//! of disconnect/reconnect cycles over the life of a session is not.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use tdswatch_adapters::AdapterError;
use tdswatch_types::InboundMessage;

use crate::error::PipelineError;

/// Attempts per establishment cycle used when nothing is configured.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
/// Pause between failed attempts used when nothing is configured.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Fixed-interval retry schedule for establishing a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per cycle, at least one.
    pub max_attempts: u32,
    /// Sleep between a failed attempt and the next one.
    pub interval: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_INTERVAL)
    }
}

/// Connection state of a supervised session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    /// Retries were exhausted. Terminal.
    Failed,
}

/// Events produced by a connected session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The session (re)connected on its own.
    Connected,
    /// A message arrived on the subscribed topic.
    MessageReceived(InboundMessage),
    /// The connection dropped.
    Disconnected(String),
    /// The event source ended for good.
    Closed,
}

/// A single connection attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

impl TransportError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

impl From<AdapterError> for TransportError {
    fn from(err: AdapterError) -> Self {
        Self(err.to_string())
    }
}

/// Errors that end [`Supervisor::run`].
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// Every attempt in a cycle failed.
    #[error("gave up after {attempts} connection attempts: {last_error}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last_error: TransportError,
    },

    /// The supervisor already failed and will not retry.
    #[error("connection supervisor has failed permanently")]
    Failed,

    /// The handler reported a fatal error.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// A connection to a message broker.
#[async_trait]
pub trait BrokerSession: Send {
    /// Make one attempt to connect and subscribe.
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Wait for the next event.
    async fn next_event(&mut self) -> SessionEvent;

    /// Where this session connects to, for logs.
    fn description(&self) -> &str;
}

/// Receives the events dispatched by [`Supervisor::run`].
#[async_trait]
pub trait EventHandler: Send {
    fn on_connected(&mut self) {}

    async fn on_message(&mut self, message: InboundMessage) -> Result<(), PipelineError>;

    fn on_disconnected(&mut self, _reason: &str) {}
}

/// Owns a session, keeps it connected and dispatches its events.
#[derive(Debug)]
pub struct Supervisor<S> {
    session: S,
    policy: RetryPolicy,
    state: SessionState,
}

impl<S: BrokerSession> Supervisor<S> {
    pub fn new(session: S, policy: RetryPolicy) -> Self {
        Self {
            session,
            policy,
            state: SessionState::Disconnected,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    pub fn into_session(self) -> S {
        self.session
    }

    /// Run one establishment cycle.
    ///
    /// Makes up to `max_attempts` attempts, sleeping `interval` after each
    /// failure except the last. On exhaustion the supervisor becomes
    /// [`SessionState::Failed`] and every later call returns
    /// [`SupervisorError::Failed`].
    pub async fn establish(&mut self) -> Result<(), SupervisorError> {
        if self.state == SessionState::Failed {
            return Err(SupervisorError::Failed);
        }

        let max_attempts = self.policy.max_attempts.max(1);
        self.state = SessionState::Connecting;

        let mut attempt = 0;
        loop {
            attempt += 1;
            debug!(
                broker = self.session.description(),
                attempt, max_attempts, "Connecting"
            );

            match self.session.connect().await {
                Ok(()) => {
                    info!(
                        broker = self.session.description(),
                        attempt, "Connected to broker"
                    );
                    self.state = SessionState::Connected;
                    return Ok(());
                }
                Err(e) if attempt >= max_attempts => {
                    error!(
                        broker = self.session.description(),
                        attempts = attempt,
                        "Giving up on broker connection: {}",
                        e
                    );
                    self.state = SessionState::Failed;
                    return Err(SupervisorError::RetriesExhausted {
                        attempts: attempt,
                        last_error: e,
                    });
                }
                Err(e) => {
                    warn!(
                        broker = self.session.description(),
                        attempt,
                        max_attempts,
                        "Connection attempt failed, retrying in {:?}: {}",
                        self.policy.interval,
                        e
                    );
                    tokio::time::sleep(self.policy.interval).await;
                }
            }
        }
    }

    /// Connect, then dispatch events to `handler` one at a time.
    ///
    /// Returns `Ok(())` when the session closes. Returns an error when a
    /// reconnect cycle is exhausted or the handler fails fatally. Non-fatal
    /// handler errors are logged and skipped.
    pub async fn run<H>(&mut self, handler: &mut H) -> Result<(), SupervisorError>
    where
        H: EventHandler + ?Sized,
    {
        self.establish().await?;
        handler.on_connected();

        loop {
            match self.session.next_event().await {
                SessionEvent::Connected => {
                    self.state = SessionState::Connected;
                    handler.on_connected();
                }
                SessionEvent::MessageReceived(message) => {
                    let topic = message.topic.clone();
                    if let Err(e) = handler.on_message(message).await {
                        if e.is_fatal() {
                            error!(topic = %topic, "Stopping on fatal pipeline error: {}", e);
                            self.state = SessionState::Disconnected;
                            return Err(e.into());
                        }
                        warn!(topic = %topic, "Message handling failed: {}", e);
                    }
                }
                SessionEvent::Disconnected(reason) => {
                    warn!(
                        broker = self.session.description(),
                        "Disconnected from broker: {}", reason
                    );
                    self.state = SessionState::Disconnected;
                    handler.on_disconnected(&reason);
                    self.establish().await?;
                    handler.on_connected();
                }
                SessionEvent::Closed => {
                    info!(broker = self.session.description(), "Session closed");
                    self.state = SessionState::Disconnected;
                    return Ok(());
                }
            }
        }
    }
}
