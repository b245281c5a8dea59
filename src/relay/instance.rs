//! Relay instance: one listener, one channel
//!
//! Handles the TCP accept loop and serves each connection with hyper's HTTP/1
//! server. Header-read timeouts are disabled: a producer holds its request
//! open indefinitely and long gaps between chunks are normal.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use hyper_util::service::TowerToHyperService;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use super::channel::ChannelId;
use super::config::RelayConfig;
use super::event::{EventBus, RelayEvent};
use super::routes::router;
use super::state::ChannelState;
use super::status::RelayStatus;
use crate::error::{is_disconnect, Error, Result};
use crate::stats::StatsSnapshot;

/// A running relay for one channel
///
/// Created by [`RelayInstance::start`]; torn down by [`RelayInstance::stop`].
/// Dropping a running instance cancels its listener without waiting.
pub struct RelayInstance {
    state: Arc<ChannelState>,
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    accept_task: Option<JoinHandle<()>>,
    grace_period: Duration,
}

impl RelayInstance {
    /// Bind the channel's port and start accepting connections
    ///
    /// Port 0 binds an ephemeral port; [`port`](Self::port) reports the
    /// actual one.
    pub async fn start(
        channel_id: ChannelId,
        port: u16,
        config: &RelayConfig,
        events: EventBus,
    ) -> Result<Self> {
        let listener = TcpListener::bind((config.bind_ip, port))
            .await
            .map_err(|source| Error::Bind { port, source })?;
        let local_addr = listener.local_addr()?;

        let state = Arc::new(ChannelState::new(
            channel_id,
            local_addr.port(),
            config.consumer_queue_capacity,
            events,
        ));
        let shutdown = CancellationToken::new();

        tracing::info!(
            channel = %state.channel_id(),
            addr = %local_addr,
            "Relay listening"
        );

        let accept_task = tokio::spawn(accept_loop(
            listener,
            router(Arc::clone(&state)),
            shutdown.clone(),
            config.tcp_nodelay,
            state.channel_id().clone(),
        ));

        Ok(Self {
            state,
            local_addr,
            shutdown,
            accept_task: Some(accept_task),
            grace_period: config.stop_grace_period,
        })
    }

    /// Close every consumer, then the listener
    ///
    /// Waits at most the configured grace period for the listener and its
    /// connections to wind down, then aborts them. Calling `stop` on a stopped
    /// instance does nothing.
    pub async fn stop(&mut self) {
        let Some(mut accept_task) = self.accept_task.take() else {
            return;
        };

        let consumers = self.state.close_consumers();
        self.shutdown.cancel();

        match tokio::time::timeout(self.grace_period, &mut accept_task).await {
            Ok(_) => {
                tracing::info!(
                    channel = %self.state.channel_id(),
                    consumers_closed = consumers,
                    "Relay stopped"
                );
            }
            Err(_) => {
                tracing::warn!(
                    channel = %self.state.channel_id(),
                    grace_period_ms = self.grace_period.as_millis() as u64,
                    "Relay did not stop in time, aborting listener"
                );
                accept_task.abort();
                // Resolves once the task is gone, and with it the listener
                let _ = accept_task.await;
            }
        }
    }

    /// Whether the listener is still owned by this instance
    pub fn is_running(&self) -> bool {
        self.accept_task.is_some()
    }

    pub fn channel_id(&self) -> &ChannelId {
        self.state.channel_id()
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Side-effect-free status snapshot
    pub fn status(&self) -> RelayStatus {
        self.state.status()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.state.stats()
    }

    /// Subscribe to this instance's lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.state.subscribe()
    }
}

impl Drop for RelayInstance {
    fn drop(&mut self) {
        if let Some(accept_task) = self.accept_task.take() {
            self.state.close_consumers();
            self.shutdown.cancel();
            accept_task.abort();
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    app: Router,
    shutdown: CancellationToken,
    tcp_nodelay: bool,
    channel_id: ChannelId,
) {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((socket, peer_addr)) => {
                    if tcp_nodelay {
                        if let Err(e) = socket.set_nodelay(true) {
                            tracing::debug!(peer = %peer_addr, error = %e, "Failed to set TCP_NODELAY");
                        }
                    }
                    connections.spawn(serve_connection(
                        socket,
                        peer_addr,
                        app.clone(),
                        channel_id.clone(),
                    ));
                }
                Err(e) => {
                    tracing::error!(channel = %channel_id, error = %e, "Failed to accept connection");
                }
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }

    drop(listener);

    // Force-close producer and consumer connections still open
    let open = connections.len();
    connections.shutdown().await;
    tracing::debug!(channel = %channel_id, connections = open, "Listener closed");
}

async fn serve_connection(socket: TcpStream, peer_addr: SocketAddr, app: Router, channel_id: ChannelId) {
    tracing::debug!(channel = %channel_id, peer = %peer_addr, "New connection");

    let mut builder = http1::Builder::new();
    builder.keep_alive(true).header_read_timeout(None::<Duration>);

    let service = TowerToHyperService::new(app);
    if let Err(e) = builder
        .serve_connection(TokioIo::new(socket), service)
        .await
    {
        if is_disconnect(&e) {
            tracing::debug!(channel = %channel_id, peer = %peer_addr, error = %e, "Connection reset");
        } else {
            tracing::warn!(channel = %channel_id, peer = %peer_addr, error = %e, "Connection error");
        }
    }

    tracing::debug!(channel = %channel_id, peer = %peer_addr, "Connection closed");
}
