//! Ingestion coordinator.
//!
//! The [`Coordinator`] owns every piece of mutable pipeline state and turns
//! inbound messages into history records and alerts:
//!
//! ```text
//! message ──parse──▶ buffer ──full?──▶ reduce ──▶ history.append
//!                                                      │
//!                                     guard.observe ◀──┘
//!                                          │
//!                                 should_notify? ──▶ notifier ──ok──▶ mark_notified
//! ```
//!
//! Messages are handled strictly one at a time. Persistence and delivery run
//! inline, so a slow notifier delays the next message.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use tdswatch_types::{InboundMessage, LogRecord, Reading, Timestamp};

use crate::alert::AlertGuard;
use crate::buffer::ReadingBuffer;
use crate::error::PipelineError;
use crate::history::HistoryLog;
use crate::notify::Notifier;
use crate::supervisor::EventHandler;

/// Where the coordinator is in the per-window cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestState {
    /// Collecting readings into the window.
    Accumulating,
    /// Reducing, persisting and possibly alerting.
    Flushing,
}

/// What happened to the alert for a flushed window.
#[derive(Debug, Clone, PartialEq)]
pub enum AlertOutcome {
    /// Above threshold, or already alerted in this episode.
    NotRequired,
    Delivered,
    /// Delivery failed; the guard stays armed.
    Failed(String),
}

/// Result of a window flush.
#[derive(Debug, Clone, PartialEq)]
pub struct FlushOutcome {
    pub record: LogRecord,
    pub alert: AlertOutcome,
}

/// Owns buffer, guard, history and notifier for the life of the process.
pub struct Coordinator {
    buffer: ReadingBuffer,
    guard: AlertGuard,
    history: Box<dyn HistoryLog>,
    notifier: Notifier,
    threshold: f64,
    state: IngestState,
    clock: fn() -> Timestamp,
}

impl Coordinator {
    pub fn new(
        buffer: ReadingBuffer,
        guard: AlertGuard,
        history: Box<dyn HistoryLog>,
        notifier: Notifier,
        threshold: f64,
    ) -> Self {
        Self {
            buffer,
            guard,
            history,
            notifier,
            threshold,
            state: IngestState::Accumulating,
            clock: Timestamp::now,
        }
    }

    /// Use `clock` for aggregate timestamps instead of the system clock.
    pub fn with_clock(mut self, clock: fn() -> Timestamp) -> Self {
        self.clock = clock;
        self
    }

    pub fn state(&self) -> IngestState {
        self.state
    }

    pub fn buffer(&self) -> &ReadingBuffer {
        &self.buffer
    }

    pub fn guard(&self) -> &AlertGuard {
        &self.guard
    }

    pub fn history(&self) -> &dyn HistoryLog {
        self.history.as_ref()
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Parse and ingest one broker message.
    ///
    /// Unparsable payloads are logged and skipped.
    pub async fn handle_message(
        &mut self,
        message: InboundMessage,
    ) -> Result<Option<FlushOutcome>, PipelineError> {
        match Reading::parse_at(&message.payload, (self.clock)()) {
            Ok(reading) => self.handle_reading(reading).await,
            Err(e) => {
                warn!(
                    topic = %message.topic,
                    payload = %message.payload_lossy(),
                    "Ignoring unparsable reading: {}",
                    e
                );
                Ok(None)
            }
        }
    }

    /// Add a reading to the window, flushing it once full.
    ///
    /// Returns `Some` when this reading completed a window.
    pub async fn handle_reading(
        &mut self,
        reading: Reading,
    ) -> Result<Option<FlushOutcome>, PipelineError> {
        self.buffer.append(reading.value);
        debug!(
            value = reading.value,
            len = self.buffer.len(),
            capacity = self.buffer.capacity(),
            "Buffered reading"
        );

        if !self.buffer.is_full() {
            return Ok(None);
        }

        self.state = IngestState::Flushing;
        let outcome = self.flush().await;
        self.state = IngestState::Accumulating;
        outcome.map(Some)
    }

    async fn flush(&mut self) -> Result<FlushOutcome, PipelineError> {
        let mean = self.buffer.reduce_and_clear()?;
        let now = (self.clock)();
        let record = LogRecord::new(now, mean);

        // No alert for an aggregate that was not persisted
        self.history.append(&record)?;
        info!(timestamp = %now, value = mean, "Recorded aggregate");

        self.guard.observe(mean, self.threshold);
        if !self.guard.should_notify(mean, self.threshold) {
            return Ok(FlushOutcome {
                record,
                alert: AlertOutcome::NotRequired,
            });
        }

        info!(value = mean, threshold = self.threshold, "Aggregate at or below threshold, alerting");
        let alert = match self.notifier.notify(mean, self.history.as_ref(), now).await {
            Ok(_) => {
                self.guard.mark_notified();
                AlertOutcome::Delivered
            }
            Err(e) => {
                warn!(value = mean, timestamp = %now, "Alert delivery failed, will retry on next window: {}", e);
                AlertOutcome::Failed(e.to_string())
            }
        };

        Ok(FlushOutcome { record, alert })
    }
}

#[async_trait]
impl EventHandler for Coordinator {
    fn on_connected(&mut self) {
        debug!(buffered = self.buffer.len(), "Ingestion resumed");
    }

    async fn on_message(&mut self, message: InboundMessage) -> Result<(), PipelineError> {
        self.handle_message(message).await.map(|_| ())
    }

    fn on_disconnected(&mut self, reason: &str) {
        debug!(buffered = self.buffer.len(), reason, "Ingestion paused");
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("buffer", &self.buffer)
            .field("guard", &self.guard)
            .field("notifier", &self.notifier)
            .field("threshold", &self.threshold)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
