//! Shared per-channel state
//!
//! `ChannelState` is what the HTTP handlers of one relay instance share. The
//! producer flag and the consumer set sit behind a single mutex so a status
//! snapshot always sees a consistent pair. The lock is never held across an
//! `.await`, and events are emitted after it is released.

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use super::channel::ChannelId;
use super::consumers::{ConsumerId, ConsumerSet, DropReason};
use super::event::{EventBus, RelayEvent};
use super::session::{ConsumerStream, IngestOutcome, IngestSession};
use super::status::RelayStatus;
use crate::stats::{ChannelStats, StatsSnapshot};

#[derive(Debug, Default)]
struct Inner {
    receiving: bool,
    consumers: ConsumerSet,
}

/// State shared by the listener and handlers of one channel
#[derive(Debug)]
pub struct ChannelState {
    channel_id: ChannelId,
    port: u16,
    consumer_queue_capacity: usize,
    inner: Mutex<Inner>,
    events: EventBus,
    stats: ChannelStats,
}

impl ChannelState {
    pub fn new(
        channel_id: ChannelId,
        port: u16,
        consumer_queue_capacity: usize,
        events: EventBus,
    ) -> Self {
        Self {
            channel_id,
            port,
            consumer_queue_capacity,
            inner: Mutex::new(Inner::default()),
            events,
            stats: ChannelStats::new(),
        }
    }

    pub fn channel_id(&self) -> &ChannelId {
        &self.channel_id
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Claim the producer role
    ///
    /// Returns `None` while another producer is attached.
    pub fn begin_ingest(self: &Arc<Self>) -> Option<IngestSession> {
        let consumers = {
            let mut inner = self.inner.lock();
            if inner.receiving {
                return None;
            }
            inner.receiving = true;
            inner.consumers.len()
        };

        self.stats.record_producer();
        tracing::info!(
            channel = %self.channel_id,
            consumers = consumers,
            "Producer attached"
        );
        self.events.emit(RelayEvent::StreamStarted {
            channel_id: self.channel_id.clone(),
        });

        Some(IngestSession::new(Arc::clone(self)))
    }

    /// Release the producer role and report how the session ended
    pub(super) fn end_ingest(&self, outcome: IngestOutcome) {
        self.inner.lock().receiving = false;

        let stats = self.stats.snapshot();
        let event = match outcome {
            IngestOutcome::Failed(error) => {
                tracing::warn!(channel = %self.channel_id, error = %error, "Producer failed");
                RelayEvent::StreamError {
                    channel_id: self.channel_id.clone(),
                    error,
                }
            }
            outcome => {
                tracing::info!(
                    channel = %self.channel_id,
                    outcome = ?outcome,
                    bytes_received = stats.bytes_received,
                    chunks_received = stats.chunks_received,
                    "Producer detached"
                );
                RelayEvent::StreamEnded {
                    channel_id: self.channel_id.clone(),
                }
            }
        };
        self.events.emit(event);
    }

    /// Forward one producer chunk to every consumer
    ///
    /// Returns the number of consumers the chunk was queued for.
    pub fn fan_out(&self, chunk: Bytes) -> usize {
        if chunk.is_empty() {
            return 0;
        }

        let (result, remaining) = {
            let mut inner = self.inner.lock();
            let result = inner.consumers.fan_out(&chunk);
            (result, inner.consumers.len())
        };

        self.stats.record_chunk(chunk.len(), result.delivered);

        if !result.dropped.is_empty() {
            self.stats.record_dropped(result.dropped.len());
            for (id, reason) in &result.dropped {
                match reason {
                    DropReason::Lagging => tracing::warn!(
                        channel = %self.channel_id,
                        consumer = %id,
                        "Dropping consumer that cannot keep up"
                    ),
                    DropReason::Closed => tracing::debug!(
                        channel = %self.channel_id,
                        consumer = %id,
                        "Pruned closed consumer"
                    ),
                }
            }
            // Report the count after the whole pass so each event is accurate
            for _ in &result.dropped {
                self.events.emit(RelayEvent::ClientDisconnected {
                    channel_id: self.channel_id.clone(),
                    consumer_count: remaining,
                });
            }
        }

        result.delivered
    }

    /// Attach a new consumer and return the stream feeding its response body
    pub fn attach_consumer(self: &Arc<Self>) -> ConsumerStream {
        let (id, rx, count) = {
            let mut inner = self.inner.lock();
            let (id, rx) = inner.consumers.attach(self.consumer_queue_capacity);
            (id, rx, inner.consumers.len())
        };

        self.stats.record_consumer();
        tracing::info!(
            channel = %self.channel_id,
            consumer = %id,
            consumers = count,
            "Consumer attached"
        );
        self.events.emit(RelayEvent::ClientConnected {
            channel_id: self.channel_id.clone(),
            consumer_count: count,
        });

        ConsumerStream::new(id, rx, Arc::clone(self))
    }

    /// Remove a consumer; emits a disconnect event only on first removal
    pub fn detach_consumer(&self, id: ConsumerId) -> bool {
        let (removed, count) = {
            let mut inner = self.inner.lock();
            let removed = inner.consumers.remove(id);
            (removed, inner.consumers.len())
        };

        if removed {
            tracing::info!(
                channel = %self.channel_id,
                consumer = %id,
                consumers = count,
                "Consumer detached"
            );
            self.events.emit(RelayEvent::ClientDisconnected {
                channel_id: self.channel_id.clone(),
                consumer_count: count,
            });
        }

        removed
    }

    /// Drop every consumer without emitting per-consumer events
    pub fn close_consumers(&self) -> usize {
        self.inner.lock().consumers.clear()
    }

    pub fn is_receiving(&self) -> bool {
        self.inner.lock().receiving
    }

    pub fn consumer_count(&self) -> usize {
        self.inner.lock().consumers.len()
    }

    pub fn status(&self) -> RelayStatus {
        let inner = self.inner.lock();
        RelayStatus {
            channel_id: self.channel_id.clone(),
            port: self.port,
            receiving: inner.receiving,
            consumer_count: inner.consumers.len(),
        }
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.events.subscribe()
    }
}
