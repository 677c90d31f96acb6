//! # tdswatch
//!
//! Watches the total dissolved solids (TDS) of a hydroponic garden.
//!
//! A sensor publishes raw ppm readings to an MQTT topic. This crate
//! subscribes, averages bursts of readings into one record, appends the
//! record to a CSV history and, when the average falls to or below a
//! threshold, sends a Pushover alert with a chart of the recent history.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                           Supervisor                             │
//! │  ┌───────────────┐  SessionEvent  ┌──────────────────────────┐   │
//! │  │ BrokerSession │───────────────▶│       Coordinator        │   │
//! │  │ MqttSession / │                │  ┌────────┐  ┌────────┐  │   │
//! │  │ ChannelSession│                │  │ buffer │─▶│history │  │   │
//! │  └───────────────┘                │  └────────┘  └───┬────┘  │   │
//! │                                   │  ┌────────┐  ┌───▼────┐  │   │
//! │                                   │  │ guard  │◀─│notifier│──┼──▶ Pushover
//! │                                   │  └────────┘  └────────┘  │   │
//! │                                   └──────────────────────────┘   │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`supervisor`]**: connection state machine with a fixed-interval
//!   [`RetryPolicy`], dispatching [`SessionEvent`]s to an [`EventHandler`]
//! - **[`source`]**: [`BrokerSession`] implementations (MQTT, in-process channel)
//! - **[`pipeline`]**: the [`Coordinator`], owner of all mutable pipeline state
//! - **[`buffer`]**, **[`history`]**, **[`alert`]**: windowing, the CSV log,
//!   and alert de-duplication
//! - **[`chart`]**, **[`notify`]**: PNG chart rendering and alert delivery
//! - **[`publisher`]**: sensor-side publishing of readings
//! - **[`config`]**: settings from TOML and the environment
//!
//! ## Usage
//!
//! ### Running the pipeline over an in-process channel
//!
//! ```
//! use std::time::Duration;
//! use tdswatch::{
//!     AlertGuard, ChannelSession, Coordinator, CsvHistory, Notifier, PushoverNotifier,
//!     ReadingBuffer, RetryPolicy, SessionEvent, Supervisor, InboundMessage,
//! };
//! use tdswatch_adapters::pushover::PushoverClient;
//!
//! # tokio_test::block_on(async {
//! let dir = std::env::temp_dir().join("tdswatch-doc");
//! let client = PushoverClient::builder().token("t").user("u").build().unwrap();
//!
//! let mut coordinator = Coordinator::new(
//!     ReadingBuffer::new(3).unwrap(),
//!     AlertGuard::default(),
//!     Box::new(CsvHistory::new(dir.join("tds.csv"))),
//!     Notifier::new(Box::new(PushoverNotifier::new(client)), &dir),
//!     400.0,
//! );
//!
//! let (tx, session) = ChannelSession::create("doc", 8);
//! tx.send(SessionEvent::MessageReceived(InboundMessage::new("aerogarden/tds", "812.0")))
//!     .await
//!     .unwrap();
//! drop(tx);
//!
//! let mut supervisor = Supervisor::new(session, RetryPolicy::new(1, Duration::ZERO));
//! supervisor.run(&mut coordinator).await.unwrap();
//! assert_eq!(coordinator.buffer().len(), 1);
//! # });
//! ```

pub mod alert;
pub mod buffer;
pub mod chart;
pub mod config;
pub mod error;
pub mod history;
pub mod notify;
pub mod pipeline;
pub mod publisher;
pub mod source;
pub mod supervisor;

pub use alert::{AlertGuard, ResetPolicy};
pub use buffer::ReadingBuffer;
pub use chart::{render_chart, ChartArtifact, ChartError, ChartLabels};
pub use config::Settings;
pub use error::{
    ConfigError, DeliveryError, EmptyWindowError, ParseError, PersistenceError, PipelineError,
};
pub use history::{CsvHistory, HistoryLog, DEFAULT_HISTORY_HOURS};
pub use notify::{AlertSink, Notifier, PushoverNotifier};
pub use pipeline::{AlertOutcome, Coordinator, FlushOutcome, IngestState};
pub use publisher::{publish_lines, MqttPublisher, ReadingPublisher};
pub use source::ChannelSession;
pub use supervisor::{
    BrokerSession, EventHandler, RetryPolicy, SessionEvent, SessionState, Supervisor,
    SupervisorError, TransportError,
};
pub use tdswatch_types::{InboundMessage, LogRecord, Reading, Timestamp};
