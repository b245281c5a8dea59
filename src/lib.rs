//! Per-channel HTTP byte-stream relay
//!
//! One upstream encoder POSTs a continuous transport stream to a channel's
//! `/stream` endpoint and any number of viewers GET the same path to receive a
//! live copy of every byte ingested from the moment they connect.
//!
//! ```text
//!                        RelayRegistry
//!                 ┌────────────────────────────┐
//!                 │ channel id → RelayInstance │
//!                 └────────────┬───────────────┘
//!                              │
//!            ┌─────────────────┼─────────────────┐
//!            ▼                 ▼                 ▼
//!     RelayInstance     RelayInstance     RelayInstance
//!     :9001             :9002             :9003
//!        │
//!   POST /stream ──► fan_out(chunk) ──► ConsumerSet ──► GET /stream (× N)
//! ```
//!
//! Chunks are opaque `bytes::Bytes`; every consumer shares the same allocation.
//! There is no history buffer: consumers that join late see only what arrives
//! after them.
//!
//! # Example
//!
//! ```no_run
//! use stream_relay::{ChannelId, RelayConfig, RelayRegistry};
//!
//! # async fn example() -> stream_relay::Result<()> {
//! let registry = RelayRegistry::new(RelayConfig::default());
//! let started = registry.start_relay(ChannelId::from("1"), 9001).await?;
//! println!("push to {}", started.stream_url);
//!
//! registry.stop_all_relays().await;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod registry;
pub mod relay;
pub mod stats;

pub use error::{Error, Result};
pub use registry::{RelayRegistry, StartedRelay};
pub use relay::{
    ChannelId, ChannelStatus, RelayConfig, RelayEvent, RelayInstance, RelayStatus,
};
pub use stats::StatsSnapshot;
