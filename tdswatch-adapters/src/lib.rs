//! # tdswatch-adapters
//!
//! Adapters between the tdswatch pipeline and the outside world.
//!
//! ## Supported Systems
//!
//! - **MQTT** (`mqtt` feature) - A broker session that subscribes to the
//!   reading topic and can publish readings, built on `rumqttc`
//! - **Pushover** (`pushover` feature) - Sends alert messages with an image
//!   attachment through the Pushover HTTPS API
//!
//! ## Quick Start (Pushover)
//!
//! ```rust,no_run
//! use tdswatch_adapters::pushover::{Attachment, PushoverClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = PushoverClient::builder()
//!         .token("app-token")
//!         .user("user-key")
//!         .title("AeroGarden")
//!         .build()?;
//!
//!     let chart = std::fs::read("20240101120000.png")?;
//!     let receipt = client
//!         .send("TDS is low", Some(Attachment::png("20240101120000.png", chart)))
//!         .await?;
//!
//!     println!("Delivered, request id {:?}", receipt.request);
//!     Ok(())
//! }
//! ```

pub mod error;

#[cfg(feature = "pushover")]
pub mod pushover;

#[cfg(feature = "mqtt")]
pub mod mqtt;

pub use error::AdapterError;

// Re-export types for convenience
pub use tdswatch_types::{InboundMessage, Reading, Timestamp};
