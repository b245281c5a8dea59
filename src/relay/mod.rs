//! Per-channel relay instance
//!
//! A relay instance owns one listener. Requests are classified by path and
//! method into the producer role (POST `/stream`) or the consumer role
//! (GET `/stream`), and every producer chunk is fanned out to the attached
//! consumers as soon as it arrives.
//!
//! # Architecture
//!
//! ```text
//!                          Arc<ChannelState>
//!                     ┌─────────────────────────┐
//!                     │ Mutex<{ receiving,      │
//!                     │   consumers: {          │
//!                     │     id → mpsc::Sender } │
//!                     │ }>                      │
//!                     └───────────┬─────────────┘
//!                                 │
//!         ┌───────────────────────┼───────────────────────┐
//!         │                       │                       │
//!         ▼                       ▼                       ▼
//!    [Producer]              [Consumer]              [Consumer]
//!    POST /stream            ConsumerStream          ConsumerStream
//!         │                       ▲                       ▲
//!         └──► fan_out(chunk) ─── try_send ───────────────┘
//! ```
//!
//! Fan-out never awaits: a consumer whose queue is full or closed is removed
//! on the spot, so one slow or broken viewer cannot hold up the producer or
//! the other viewers.

pub mod channel;
pub mod config;
pub mod consumers;
pub mod event;
pub mod instance;
pub mod routes;
pub mod session;
pub mod state;
pub mod status;

pub use channel::ChannelId;
pub use config::RelayConfig;
pub use consumers::{ConsumerId, ConsumerSet};
pub use event::{EventBus, RelayEvent};
pub use instance::RelayInstance;
pub use session::{ConsumerStream, IngestOutcome, IngestSession};
pub use state::ChannelState;
pub use status::{ChannelStatus, RelayStatus};
