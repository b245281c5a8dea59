//! Consumer set for a relay channel
//!
//! Each attached consumer is represented by the sending half of a bounded
//! queue; the receiving half feeds that consumer's HTTP response body. Fan-out
//! never waits: a chunk is offered to every queue with `try_send`, and any
//! consumer whose queue is full or closed is removed in the same pass.

use std::collections::HashMap;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Identifier of one attached consumer, unique within its set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConsumerId(u64);

impl std::fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why fan-out removed a consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Queue full, the consumer is not keeping up
    Lagging,
    /// Response body already gone
    Closed,
}

/// Result of offering one chunk to the set
#[derive(Debug, Default)]
pub struct FanOut {
    /// Consumers the chunk was queued for
    pub delivered: usize,
    /// Consumers removed during this pass
    pub dropped: Vec<(ConsumerId, DropReason)>,
}

/// Live consumers of one channel
#[derive(Debug, Default)]
pub struct ConsumerSet {
    next_id: u64,
    members: HashMap<ConsumerId, mpsc::Sender<Bytes>>,
}

impl ConsumerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a consumer with a queue of `capacity` chunks
    pub fn attach(&mut self, capacity: usize) -> (ConsumerId, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let id = ConsumerId(self.next_id);
        self.next_id += 1;
        self.members.insert(id, tx);
        (id, rx)
    }

    /// Remove a consumer; returns false if it was already gone
    pub fn remove(&mut self, id: ConsumerId) -> bool {
        self.members.remove(&id).is_some()
    }

    pub fn contains(&self, id: ConsumerId) -> bool {
        self.members.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Queue `chunk` for every consumer, pruning the ones that cannot take it
    pub fn fan_out(&mut self, chunk: &Bytes) -> FanOut {
        let mut result = FanOut::default();

        self.members.retain(|id, tx| match tx.try_send(chunk.clone()) {
            Ok(()) => {
                result.delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                result.dropped.push((*id, DropReason::Lagging));
                false
            }
            Err(TrySendError::Closed(_)) => {
                result.dropped.push((*id, DropReason::Closed));
                false
            }
        });

        result
    }

    /// Drop every consumer, ending their response bodies
    pub fn clear(&mut self) -> usize {
        let count = self.members.len();
        self.members.clear();
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attach_assigns_unique_ids() {
        let mut set = ConsumerSet::new();
        let (a, _rx_a) = set.attach(4);
        let (b, _rx_b) = set.attach(4);

        assert_ne!(a, b);
        assert_eq!(set.len(), 2);
        assert!(set.contains(a));
        assert!(set.contains(b));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut set = ConsumerSet::new();
        let (id, _rx) = set.attach(4);

        assert!(set.remove(id));
        assert!(!set.remove(id));
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn test_fan_out_preserves_order() {
        let mut set = ConsumerSet::new();
        let (_a, mut rx_a) = set.attach(8);
        let (_b, mut rx_b) = set.attach(8);

        for chunk in [&b"A"[..], b"B", b"C"] {
            let result = set.fan_out(&Bytes::copy_from_slice(chunk));
            assert_eq!(result.delivered, 2);
            assert!(result.dropped.is_empty());
        }

        for rx in [&mut rx_a, &mut rx_b] {
            assert_eq!(rx.recv().await.unwrap(), Bytes::from_static(b"A"));
            assert_eq!(rx.recv().await.unwrap(), Bytes::from_static(b"B"));
            assert_eq!(rx.recv().await.unwrap(), Bytes::from_static(b"C"));
        }
    }

    #[tokio::test]
    async fn test_closed_consumer_pruned_without_affecting_others() {
        let mut set = ConsumerSet::new();
        let (gone, rx_gone) = set.attach(8);
        let (_live, mut rx_live) = set.attach(8);
        drop(rx_gone);

        let result = set.fan_out(&Bytes::from_static(b"chunk"));

        assert_eq!(result.delivered, 1);
        assert_eq!(result.dropped, vec![(gone, DropReason::Closed)]);
        assert!(!set.contains(gone));
        assert_eq!(rx_live.recv().await.unwrap(), Bytes::from_static(b"chunk"));
    }

    #[test]
    fn test_lagging_consumer_dropped() {
        let mut set = ConsumerSet::new();
        let (slow, _rx_slow) = set.attach(1);

        let first = set.fan_out(&Bytes::from_static(b"1"));
        assert_eq!(first.delivered, 1);

        let second = set.fan_out(&Bytes::from_static(b"2"));
        assert_eq!(second.delivered, 0);
        assert_eq!(second.dropped, vec![(slow, DropReason::Lagging)]);
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn test_clear_ends_receivers() {
        let mut set = ConsumerSet::new();
        let (_id, mut rx) = set.attach(4);

        assert_eq!(set.clear(), 1);
        assert!(set.is_empty());
        assert!(rx.recv().await.is_none());
    }
}
