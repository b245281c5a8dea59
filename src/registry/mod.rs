//! Relay registry
//!
//! Maps channel ids to their running [`RelayInstance`](crate::RelayInstance).
//! The registry is an owned value handed to whatever handles start/stop
//! requests; there is no process-global state.
//!
//! ```text
//!                      RelayRegistry
//!               ┌────────────────────────────┐
//!               │ relays: RwLock<HashMap<    │
//!               │   ChannelId, RelayInstance │
//!               │ >>                         │
//!               │ events: EventBus ──────────┼──► subscribe()
//!               └────────────────────────────┘
//! ```
//!
//! All instances share the registry's event bus, so one subscriber sees the
//! lifecycle of every channel; each event carries its channel id.

pub mod store;

pub use store::{RelayRegistry, StartedRelay};
