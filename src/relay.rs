//! Forward published snapshots to another machine over UDP.
//!
//! Pairs a local shared-memory feed on the simulator PC with a
//! [`NetworkTransport`](crate::source::NetworkTransport) elsewhere on the LAN.

use crate::config::RelayConfig;
use crate::observer::Subscription;
use crate::source::Feed;
use crate::{Result, TelemetryError};
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

/// Sends the raw bytes of every published snapshot to one UDP target.
///
/// Sending happens inline on the feed task with a non-blocking send; a full
/// socket buffer drops the frame.
pub struct Relay {
    target: SocketAddr,
    local_addr: SocketAddr,
    counters: Arc<RelayCounters>,
    subscription: Subscription,
}

#[derive(Default)]
struct RelayCounters {
    sent: AtomicU64,
    dropped: AtomicU64,
}

impl Relay {
    /// Bind an ephemeral socket and start forwarding `feed` to `target`.
    pub async fn start(feed: &Feed, target: SocketAddr) -> Result<Self> {
        let any: SocketAddr = match target {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(any)
            .await
            .map_err(|source| TelemetryError::Bind { addr: any, source })?;
        let local_addr = socket.local_addr().map_err(|source| TelemetryError::Bind { addr: any, source })?;

        let counters = Arc::new(RelayCounters::default());
        let task_counters = Arc::clone(&counters);
        let subscription = feed.subscribe(move |packet| {
            match socket.try_send_to(&packet.raw, target) {
                Ok(_) => {
                    task_counters.sent.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    task_counters.dropped.fetch_add(1, Ordering::Relaxed);
                    debug!(sequence = packet.sequence, "Relay socket busy, frame dropped");
                }
                Err(e) => {
                    task_counters.dropped.fetch_add(1, Ordering::Relaxed);
                    warn!(%target, "Relay send failed: {}", e);
                }
            }
        });

        info!(source = feed.source(), %target, "Relaying snapshots");
        Ok(Self { target, local_addr, counters, subscription })
    }

    /// Start forwarding `feed` to the configured target.
    pub async fn from_config(feed: &Feed, config: &RelayConfig) -> Result<Self> {
        Self::start(feed, config.target).await
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// Address the relay sends from.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Datagrams handed to the OS.
    pub fn sent(&self) -> u64 {
        self.counters.sent.load(Ordering::Relaxed)
    }

    /// Frames lost to a busy socket or a send error.
    pub fn dropped(&self) -> u64 {
        self.counters.dropped.load(Ordering::Relaxed)
    }

    /// Stop forwarding. Dropping the relay does the same.
    pub fn stop(mut self) {
        self.subscription.unsubscribe();
        debug!(target = %self.target, sent = self.sent(), "Relay stopped");
    }
}

impl std::fmt::Debug for Relay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relay")
            .field("target", &self.target)
            .field("sent", &self.sent())
            .field("dropped", &self.dropped())
            .finish()
    }
}
