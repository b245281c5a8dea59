//! Relay registry implementation

use std::collections::HashMap;

use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::{broadcast, RwLock};

use crate::error::Result;
use crate::relay::{
    ChannelId, ChannelStatus, EventBus, RelayConfig, RelayEvent, RelayInstance,
};
use crate::stats::StatsSnapshot;

/// Returned by a successful [`RelayRegistry::start_relay`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedRelay {
    pub channel_id: ChannelId,
    /// Port the listener is bound to
    pub port: u16,
    /// URL producers push to and consumers pull from
    pub stream_url: String,
}

/// Registry of running relays, at most one per channel
///
/// Start and stop hold the write lock for their whole duration, so a
/// replacement can never race the instance it replaces for the port.
pub struct RelayRegistry {
    relays: RwLock<HashMap<ChannelId, RelayInstance>>,
    config: RelayConfig,
    events: EventBus,
}

impl RelayRegistry {
    /// Create an empty registry
    pub fn new(config: RelayConfig) -> Self {
        let events = EventBus::new(config.event_capacity);
        Self {
            relays: RwLock::new(HashMap::new()),
            config,
            events,
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Subscribe to lifecycle events of every channel
    pub fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.events.subscribe()
    }

    /// Start a relay for `channel_id` on `port`
    ///
    /// An existing relay for the channel is fully stopped first. On a bind
    /// failure the error is returned and nothing is registered.
    pub async fn start_relay(
        &self,
        channel_id: impl Into<ChannelId>,
        port: u16,
    ) -> Result<StartedRelay> {
        let channel_id = channel_id.into();
        let mut relays = self.relays.write().await;

        if let Some(mut existing) = relays.remove(&channel_id) {
            tracing::info!(
                channel = %channel_id,
                old_port = existing.port(),
                new_port = port,
                "Replacing running relay"
            );
            existing.stop().await;
        }

        let instance =
            RelayInstance::start(channel_id.clone(), port, &self.config, self.events.clone())
                .await
                .inspect_err(|e| {
                    tracing::error!(channel = %channel_id, error = %e, "Relay failed to start");
                })?;

        let port = instance.port();
        relays.insert(channel_id.clone(), instance);

        Ok(StartedRelay {
            channel_id,
            port,
            stream_url: self.config.stream_url(port),
        })
    }

    /// Stop and remove the relay for `channel_id`; does nothing if absent
    pub async fn stop_relay(&self, channel_id: impl Into<ChannelId>) {
        let channel_id = channel_id.into();
        let mut relays = self.relays.write().await;

        match relays.remove(&channel_id) {
            Some(mut instance) => instance.stop().await,
            None => {
                tracing::debug!(channel = %channel_id, "Stop requested for channel with no relay");
            }
        }
    }

    /// Stop and remove every relay
    pub async fn stop_all_relays(&self) {
        let mut relays = self.relays.write().await;
        let mut instances: Vec<RelayInstance> = relays.drain().map(|(_, r)| r).collect();

        if instances.is_empty() {
            return;
        }

        tracing::info!(relays = instances.len(), "Stopping all relays");
        join_all(instances.iter_mut().map(RelayInstance::stop)).await;
    }

    /// Status of the relay for `channel_id`
    pub async fn relay_status(&self, channel_id: impl Into<ChannelId>) -> ChannelStatus {
        self.relays
            .read()
            .await
            .get(&channel_id.into())
            .map_or(ChannelStatus::NotRunning, |r| ChannelStatus::Running(r.status()))
    }

    /// Counters of the relay for `channel_id`
    pub async fn relay_stats(&self, channel_id: impl Into<ChannelId>) -> Option<StatsSnapshot> {
        self.relays
            .read()
            .await
            .get(&channel_id.into())
            .map(RelayInstance::stats)
    }

    /// Ids of all registered channels
    pub async fn channel_ids(&self) -> Vec<ChannelId> {
        self.relays.read().await.keys().cloned().collect()
    }

    /// Number of registered relays
    pub async fn relay_count(&self) -> usize {
        self.relays.read().await.len()
    }
}
