//! UDP transport.

use super::Transport;
use crate::config::NetworkConfig;
use crate::snapshot::SNAPSHOT_SIZE;
use crate::{Result, TelemetryError};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::{info, trace, warn};

/// Receives whole snapshots as UDP datagrams, typically from a relay running on
/// the simulator machine.
pub struct NetworkTransport {
    socket: UdpSocket,
    local_addr: SocketAddr,
    error_backoff: Duration,
    buffer: Vec<u8>,
}

impl NetworkTransport {
    /// Bind the receiving socket.
    ///
    /// Failure to bind is fatal and reported as [`TelemetryError::Bind`].
    pub async fn bind(config: &NetworkConfig) -> Result<Self> {
        let addr = config.socket_addr();
        let socket =
            UdpSocket::bind(addr).await.map_err(|source| TelemetryError::Bind { addr, source })?;
        let local_addr = socket.local_addr().map_err(|source| TelemetryError::Bind { addr, source })?;

        info!(%local_addr, "Listening for snapshot datagrams");

        Ok(Self {
            socket,
            local_addr,
            error_backoff: config.error_backoff(),
            // One spare byte so oversized datagrams show up as the wrong size
            buffer: vec![0u8; SNAPSHOT_SIZE + 1],
        })
    }

    /// Address actually bound (resolves port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

#[async_trait::async_trait]
impl Transport for NetworkTransport {
    async fn next_buffer(&mut self) -> Result<Option<Vec<u8>>> {
        loop {
            match self.socket.recv_from(&mut self.buffer).await {
                Ok((len, peer)) => {
                    trace!(%peer, len, "Datagram received");
                    return Ok(Some(self.buffer[..len].to_vec()));
                }
                Err(e) => {
                    warn!("UDP receive failed, retrying in {:?}: {}", self.error_backoff, e);
                    tokio::time::sleep(self.error_backoff).await;
                }
            }
        }
    }

    fn describe(&self) -> String {
        format!("udp {}", self.local_addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn loopback(port: u16) -> NetworkConfig {
        NetworkConfig { bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST), port, error_backoff_ms: 10 }
    }

    #[tokio::test]
    async fn receives_datagrams_verbatim() {
        let mut transport = NetworkTransport::bind(&loopback(0)).await.unwrap();
        let target = transport.local_addr();
        assert_ne!(target.port(), 0);

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.send_to(b"hello", target).await.unwrap();

        let buffer = transport.next_buffer().await.unwrap().unwrap();
        assert_eq!(buffer, b"hello");
    }

    #[tokio::test]
    async fn binding_a_taken_port_fails() {
        let first = NetworkTransport::bind(&loopback(0)).await.unwrap();
        let err = NetworkTransport::bind(&loopback(first.local_addr().port())).await.err();
        match err {
            Some(TelemetryError::Bind { addr, .. }) => assert_eq!(addr.port(), first.local_addr().port()),
            other => panic!("expected bind error, got {other:?}"),
        }
    }
}
