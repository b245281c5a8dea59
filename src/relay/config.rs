//! Relay configuration

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

/// Relay configuration options
///
/// Shared by every instance a [`RelayRegistry`](crate::RelayRegistry) starts.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Address each channel listener binds to
    pub bind_ip: IpAddr,

    /// Host name placed in the ingest URLs handed back to callers
    pub public_host: String,

    /// Upper bound on how long `stop()` waits for the listener to wind down
    pub stop_grace_period: Duration,

    /// Chunks queued per consumer before it is dropped as too slow
    pub consumer_queue_capacity: usize,

    /// Capacity of the lifecycle event channel
    pub event_capacity: usize,

    /// Enable TCP_NODELAY on accepted connections
    pub tcp_nodelay: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            public_host: "localhost".to_string(),
            stop_grace_period: Duration::from_secs(2),
            consumer_queue_capacity: 256,
            event_capacity: 256,
            tcp_nodelay: true, // Keep latency low for live viewers
        }
    }
}

impl RelayConfig {
    /// Set the bind address
    pub fn bind_ip(mut self, ip: IpAddr) -> Self {
        self.bind_ip = ip;
        self
    }

    /// Set the host used in returned stream URLs
    pub fn public_host(mut self, host: impl Into<String>) -> Self {
        self.public_host = host.into();
        self
    }

    /// Set the stop grace period
    pub fn stop_grace_period(mut self, period: Duration) -> Self {
        self.stop_grace_period = period;
        self
    }

    /// Set the per-consumer queue capacity (minimum 1)
    pub fn consumer_queue_capacity(mut self, capacity: usize) -> Self {
        self.consumer_queue_capacity = capacity.max(1);
        self
    }

    /// Set the event channel capacity (minimum 1)
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    /// Enable or disable TCP_NODELAY
    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }

    /// Ingest/playback URL for a channel listening on `port`
    pub fn stream_url(&self, port: u16) -> String {
        format!("http://{}:{}/stream", self.public_host, port)
    }
}
