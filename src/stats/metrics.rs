//! Statistics and metrics for relay channels

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Live counters for one channel
///
/// Updated from the ingest and egress paths without locking.
#[derive(Debug)]
pub struct ChannelStats {
    started_at: Instant,
    bytes_received: AtomicU64,
    chunks_received: AtomicU64,
    chunks_delivered: AtomicU64,
    producer_sessions: AtomicU64,
    consumers_served: AtomicU64,
    consumers_dropped: AtomicU64,
}

impl ChannelStats {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            bytes_received: AtomicU64::new(0),
            chunks_received: AtomicU64::new(0),
            chunks_delivered: AtomicU64::new(0),
            producer_sessions: AtomicU64::new(0),
            consumers_served: AtomicU64::new(0),
            consumers_dropped: AtomicU64::new(0),
        }
    }

    /// Record one ingested chunk and how many consumers it was queued for
    pub fn record_chunk(&self, len: usize, delivered: usize) {
        self.chunks_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(len as u64, Ordering::Relaxed);
        self.chunks_delivered
            .fetch_add(delivered as u64, Ordering::Relaxed);
    }

    pub fn record_producer(&self) {
        self.producer_sessions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_consumer(&self) {
        self.consumers_served.fetch_add(1, Ordering::Relaxed);
    }

    /// Record consumers removed by fan-out because their queue was full or closed
    pub fn record_dropped(&self, count: usize) {
        self.consumers_dropped
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Take a point-in-time copy of the counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            uptime: self.started_at.elapsed(),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            chunks_received: self.chunks_received.load(Ordering::Relaxed),
            chunks_delivered: self.chunks_delivered.load(Ordering::Relaxed),
            producer_sessions: self.producer_sessions.load(Ordering::Relaxed),
            consumers_served: self.consumers_served.load(Ordering::Relaxed),
            consumers_dropped: self.consumers_dropped.load(Ordering::Relaxed),
        }
    }
}

impl Default for ChannelStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time channel statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Time since the relay instance started
    pub uptime: Duration,
    /// Total bytes received from producers
    pub bytes_received: u64,
    /// Total chunks received from producers
    pub chunks_received: u64,
    /// Chunk copies queued to consumers
    pub chunks_delivered: u64,
    /// Number of producer sessions accepted
    pub producer_sessions: u64,
    /// Number of consumers ever attached
    pub consumers_served: u64,
    /// Consumers dropped by fan-out
    pub consumers_dropped: u64,
}

impl StatsSnapshot {
    /// Average ingest bitrate in bits per second since start
    pub fn bitrate(&self) -> u64 {
        let secs = self.uptime.as_secs();
        if secs > 0 {
            (self.bytes_received * 8) / secs
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_stats_new() {
        let stats = ChannelStats::new().snapshot();
        assert_eq!(stats.bytes_received, 0);
        assert_eq!(stats.chunks_received, 0);
        assert_eq!(stats.chunks_delivered, 0);
        assert_eq!(stats.producer_sessions, 0);
        assert_eq!(stats.consumers_served, 0);
        assert_eq!(stats.consumers_dropped, 0);
    }

    #[test]
    fn test_record_chunk() {
        let stats = ChannelStats::new();
        stats.record_chunk(188, 3);
        stats.record_chunk(376, 2);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.chunks_received, 2);
        assert_eq!(snapshot.bytes_received, 564);
        assert_eq!(snapshot.chunks_delivered, 5);
    }

    #[test]
    fn test_session_counters() {
        let stats = ChannelStats::new();
        stats.record_producer();
        stats.record_consumer();
        stats.record_consumer();
        stats.record_dropped(1);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.producer_sessions, 1);
        assert_eq!(snapshot.consumers_served, 2);
        assert_eq!(snapshot.consumers_dropped, 1);
    }

    #[test]
    fn test_bitrate() {
        let snapshot = StatsSnapshot {
            uptime: Duration::from_secs(10),
            bytes_received: 1_000_000,
            ..Default::default()
        };

        // 1,000,000 bytes * 8 bits / 10 seconds = 800,000 bps
        assert_eq!(snapshot.bitrate(), 800_000);
    }

    #[test]
    fn test_bitrate_zero_duration() {
        let snapshot = StatsSnapshot {
            bytes_received: 1_000_000,
            ..Default::default()
        };

        assert_eq!(snapshot.bitrate(), 0);
    }
}
