//! Lifecycle notifications
//!
//! Every relay instance reports producer and consumer transitions as typed
//! [`RelayEvent`]s over a `tokio::sync::broadcast` channel. Subscribers that
//! fall behind miss events (`RecvError::Lagged`) rather than slowing the relay.

use tokio::sync::broadcast;

use super::channel::ChannelId;

/// Lifecycle event for a relay channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    /// A producer attached and started streaming
    StreamStarted { channel_id: ChannelId },

    /// The producer finished or disconnected
    StreamEnded { channel_id: ChannelId },

    /// The producer connection failed
    StreamError { channel_id: ChannelId, error: String },

    /// A consumer attached
    ClientConnected {
        channel_id: ChannelId,
        consumer_count: usize,
    },

    /// A consumer went away
    ///
    /// Not emitted for consumers closed by a relay stop; the last count a
    /// subscriber sees before `StreamEnded` may therefore be non-zero.
    ClientDisconnected {
        channel_id: ChannelId,
        consumer_count: usize,
    },
}

impl RelayEvent {
    /// Channel the event belongs to
    pub fn channel_id(&self) -> &ChannelId {
        match self {
            RelayEvent::StreamStarted { channel_id }
            | RelayEvent::StreamEnded { channel_id }
            | RelayEvent::StreamError { channel_id, .. }
            | RelayEvent::ClientConnected { channel_id, .. }
            | RelayEvent::ClientDisconnected { channel_id, .. } => channel_id,
        }
    }
}

/// Sending half of the event channel
///
/// Cheap to clone; emitting never fails, even with no subscribers.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<RelayEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event to all current subscribers
    pub fn emit(&self, event: RelayEvent) {
        // send() only errors when nobody is listening
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.tx.subscribe()
    }
}
