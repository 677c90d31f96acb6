//! Alert delivery.
//!
//! [`Notifier::notify`] renders the recent history into a chart, saves it
//! next to the log, and hands value and chart to an [`AlertSink`]. The
//! production sink is [`PushoverNotifier`].

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use tdswatch_adapters::pushover::{Attachment, PushoverClient};
use tdswatch_types::Timestamp;

use crate::chart::{render_chart, ChartArtifact, ChartLabels};
use crate::error::DeliveryError;
use crate::history::{HistoryLog, DEFAULT_HISTORY_HOURS};

/// Text of the alert for an aggregate `value`.
pub fn alert_message(value: f64) -> String {
    format!(
        "The TDS of your AeroGarden is currently {:.1}ppm. Please add nutrients.",
        value
    )
}

/// Somewhere alerts can be sent.
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Deliver one alert. `Ok` only on confirmed delivery.
    async fn send(&self, value: f64, artifact: &ChartArtifact) -> Result<(), DeliveryError>;
}

/// Sends alerts as Pushover messages with the chart attached.
#[derive(Debug, Clone)]
pub struct PushoverNotifier {
    client: PushoverClient,
}

impl PushoverNotifier {
    pub fn new(client: PushoverClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AlertSink for PushoverNotifier {
    async fn send(&self, value: f64, artifact: &ChartArtifact) -> Result<(), DeliveryError> {
        let attachment = Attachment::png(artifact.name(), artifact.bytes.clone());
        let receipt = self.client.send(&alert_message(value), Some(attachment)).await?;
        debug!(status = receipt.status, request = ?receipt.request, "Pushover accepted alert");
        Ok(())
    }
}

/// Chart rendering plus an [`AlertSink`].
pub struct Notifier {
    sink: Box<dyn AlertSink>,
    chart_dir: PathBuf,
    history_hours: u32,
}

impl Notifier {
    /// Charts go to `chart_dir` and cover the last 48 hours.
    pub fn new(sink: Box<dyn AlertSink>, chart_dir: impl Into<PathBuf>) -> Self {
        Self {
            sink,
            chart_dir: chart_dir.into(),
            history_hours: DEFAULT_HISTORY_HOURS,
        }
    }

    /// Change the charted window.
    pub fn with_history_hours(mut self, hours: u32) -> Self {
        self.history_hours = hours;
        self
    }

    pub fn chart_dir(&self) -> &Path {
        &self.chart_dir
    }

    pub fn history_hours(&self) -> u32 {
        self.history_hours
    }

    /// Render the chart for `now` and write it to the chart directory.
    pub fn prepare_chart(
        &self,
        history: &dyn HistoryLog,
        now: Timestamp,
    ) -> Result<ChartArtifact, DeliveryError> {
        let cutoff = now.hours_before(self.history_hours as f64);
        let records = history
            .query_since(cutoff)
            .map_err(|e| DeliveryError::Chart(e.to_string()))?;
        let labels = ChartLabels::tds(self.history_hours);
        let bytes = render_chart(records, now, self.history_hours, &labels)
            .map_err(|e| DeliveryError::Chart(e.to_string()))?;
        ChartArtifact::write(&self.chart_dir, now, bytes).map_err(|e| DeliveryError::Chart(e.to_string()))
    }

    /// Send an alert for `value` with a chart of the recent history.
    pub async fn notify(
        &self,
        value: f64,
        history: &dyn HistoryLog,
        now: Timestamp,
    ) -> Result<ChartArtifact, DeliveryError> {
        let artifact = self.prepare_chart(history, now)?;
        self.sink.send(value, &artifact).await?;
        info!(value, chart = %artifact.path.display(), "Alert delivered");
        Ok(artifact)
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("chart_dir", &self.chart_dir)
            .field("history_hours", &self.history_hours)
            .finish_non_exhaustive()
    }
}
