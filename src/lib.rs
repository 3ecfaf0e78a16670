//! # event-relay
//!
//! Relays inbound messaging events to downstream webhooks.
//!
//! ## Features
//!
//! - **Content filtering**: per-subject message-kind, text and audio-duration rules that fail closed
//! - **Admission control**: a shared token bucket gating queued deliveries
//! - **Durable queueing**: at-least-once delivery with dead-lettering over Redis Streams
//! - **Reliable delivery**: main and monitoring webhook channels, with bounded exponential-backoff retries
//! - **Metrics and health**: per-minute windows, daily counters and a health verdict
//! - **Processing feedback**: progress indicators on a message while an external operation runs
//!
//! ## Usage
//!
//! ```rust,no_run
//! use event_relay::{Config, InboundEvent, Relay};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_file("config/relay.yaml").await?;
//!     let relay = Relay::new(config)?;
//!     relay.start().await?;
//!
//!     let event = json!({
//!         "key": {"remoteJid": "5511999999999@s.whatsapp.net", "id": "ABC"},
//!         "message": {"conversation": "hello"}
//!     });
//!     let outcome = relay.ingest(InboundEvent::new("instance-1", event)).await;
//!     println!("{:?}", outcome);
//!
//!     relay.shutdown().await;
//!     Ok(())
//! }
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod config;
pub mod core;
pub mod monitoring;
mod relay;
pub mod utils;

pub use config::Config;
pub use relay::{InboundEvent, IngestOutcome, Relay};
pub use utils::error::{RelayError, Result};

/// Current version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Name of the crate
pub const NAME: &str = env!("CARGO_PKG_NAME");
