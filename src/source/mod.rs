//! Event sources for the connection supervisor.
//!
//! Each source implements [`BrokerSession`](crate::supervisor::BrokerSession):
//!
//! - [`ChannelSession`]: events pushed through an in-process channel, with
//!   scripted connection results. Used by tests and for embedding the
//!   pipeline behind another transport.
//! - `MqttSession` (from `tdswatch-adapters`): a live MQTT broker
//!   connection, adapted in the `mqtt` submodule.

mod channel;
mod mqtt;

pub use channel::ChannelSession;
