//! Producer and consumer sessions
//!
//! Both are RAII handles over [`ChannelState`]: dropping an [`IngestSession`]
//! releases the producer role and dropping a [`ConsumerStream`] detaches the
//! consumer, so a connection torn down at any point leaves the channel
//! consistent.

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::Stream;
use tokio::sync::mpsc;

use super::consumers::ConsumerId;
use super::state::ChannelState;

/// How a producer session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Request body ended cleanly
    Completed,
    /// Peer reset or vanished mid-stream
    Disconnected,
    /// Transport failure other than a disconnect
    Failed(String),
    /// Torn down before the body finished (relay stopping)
    Aborted,
}

/// Active producer session; holds the channel's producer role
#[derive(Debug)]
pub struct IngestSession {
    state: Arc<ChannelState>,
    finished: bool,
}

impl IngestSession {
    pub(super) fn new(state: Arc<ChannelState>) -> Self {
        Self {
            state,
            finished: false,
        }
    }

    /// Fan one chunk out to the channel's consumers
    pub fn forward(&self, chunk: Bytes) -> usize {
        self.state.fan_out(chunk)
    }

    /// End the session, releasing the producer role
    pub fn finish(mut self, outcome: IngestOutcome) {
        self.finished = true;
        self.state.end_ingest(outcome);
    }
}

impl Drop for IngestSession {
    fn drop(&mut self) {
        if !self.finished {
            self.state.end_ingest(IngestOutcome::Aborted);
        }
    }
}

/// Response body stream of one consumer
pub struct ConsumerStream {
    id: ConsumerId,
    rx: mpsc::Receiver<Bytes>,
    state: Arc<ChannelState>,
}

impl ConsumerStream {
    pub(super) fn new(id: ConsumerId, rx: mpsc::Receiver<Bytes>, state: Arc<ChannelState>) -> Self {
        Self { id, rx, state }
    }

    pub fn id(&self) -> ConsumerId {
        self.id
    }
}

impl Stream for ConsumerStream {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx).map(|chunk| chunk.map(Ok))
    }
}

impl Drop for ConsumerStream {
    fn drop(&mut self) {
        self.state.detach_consumer(self.id);
    }
}
