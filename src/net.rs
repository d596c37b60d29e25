//! ==============================================================================
//! net.rs - udp shell and wire vocabulary
//! ==============================================================================
//!
//! purpose:
//!     the socket-facing edge of the hub. owns the broadcast-capable udp
//!     socket, speaks the fixed three-message vocabulary to the nodes and
//!     hands inbound datagrams to the ingest task.
//!
//! wire vocabulary (utf-8 text):
//!     out, broadcast: "Start"        begin session
//!     out, broadcast: "Reset"        end session
//!     out, broadcast: "Query_<id>"   re-query one silent peer by its id
//!     in,  any:       decimal int    a reading; peer identity = source ip
//!
//! relationships:
//!     - used by: tasks.rs (toggle, sweeper, ingest loop)
//!     - created in: main.rs (bind failure there is the one fatal startup path)
//!
//! ==============================================================================

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tokio::net::UdpSocket;

pub const MSG_START: &str = "Start";
pub const MSG_RESET: &str = "Reset";
pub const QUERY_PREFIX: &str = "Query_";

/// broadcast-capable udp socket bound to the configured port
pub struct HubSocket {
    socket: UdpSocket,
    broadcast_target: SocketAddr,
}

impl HubSocket {
    /// bind on all interfaces at `port` and enable broadcast.
    /// outbound messages all go to `broadcast_addr:port`.
    pub async fn bind(broadcast_addr: &str, port: u16) -> Result<Self> {
        let broadcast_target: SocketAddr = format!("{broadcast_addr}:{port}")
            .parse()
            .with_context(|| format!("invalid broadcast address {broadcast_addr}"))?;
        Self::bind_with_target(port, broadcast_target).await
    }

    /// like `bind`, but with listen port and outbound target decoupled
    pub async fn bind_with_target(listen_port: u16, target: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", listen_port))
            .await
            .with_context(|| format!("failed to bind udp port {listen_port}"))?;
        socket
            .set_broadcast(true)
            .context("failed to enable SO_BROADCAST")?;
        Ok(Self {
            socket,
            broadcast_target: target,
        })
    }

    pub async fn send_start(&self) -> Result<()> {
        self.send(MSG_START).await
    }

    pub async fn send_reset(&self) -> Result<()> {
        self.send(MSG_RESET).await
    }

    /// directed re-query: broadcast a message naming the silent peer.
    /// the nodes themselves filter on the id.
    pub async fn send_query(&self, peer: &str) -> Result<()> {
        self.send(&format!("{QUERY_PREFIX}{peer}")).await
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    async fn send(&self, msg: &str) -> Result<()> {
        self.socket
            .send_to(msg.as_bytes(), self.broadcast_target)
            .await
            .with_context(|| format!("failed to send {msg:?}"))?;
        tracing::debug!(%msg, target = %self.broadcast_target, "sent");
        Ok(())
    }

    /// blocking receive of one datagram; no deadline - the ingest task simply
    /// parks here between messages.
    pub async fn recv(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)> {
        let (len, addr) = self
            .socket
            .recv_from(buf)
            .await
            .context("udp receive failed")?;
        Ok((len, addr))
    }
}

/// datagram source the ingest loop drains. trait seam so tests can inject
/// receive failures that a healthy udp socket will not produce.
pub trait Datagrams: Send + Sync {
    fn recv_dgram(
        &self,
        buf: &mut [u8],
    ) -> impl std::future::Future<Output = Result<(usize, SocketAddr)>> + Send;
}

impl Datagrams for HubSocket {
    fn recv_dgram(
        &self,
        buf: &mut [u8],
    ) -> impl std::future::Future<Output = Result<(usize, SocketAddr)>> + Send {
        self.recv(buf)
    }
}

/// parse one inbound payload as a decimal integer reading.
/// anything else (bad utf-8, stray whitespace-only frames, text) is rejected;
/// the caller discards it without touching the peer table.
pub fn parse_reading(payload: &[u8]) -> Option<i64> {
    let text = std::str::from_utf8(payload).ok()?;
    text.trim().parse::<i64>().ok()
}

// ==============================================================================
// tests
// ==============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_integers() {
        assert_eq!(parse_reading(b"500"), Some(500));
        assert_eq!(parse_reading(b"-17"), Some(-17));
        assert_eq!(parse_reading(b" 42\n"), Some(42));
    }

    #[test]
    fn rejects_malformed_payloads() {
        assert_eq!(parse_reading(b"abc"), None);
        assert_eq!(parse_reading(b""), None);
        assert_eq!(parse_reading(b"12.5"), None);
        assert_eq!(parse_reading(&[0xff, 0xfe]), None);
    }

    #[tokio::test]
    async fn wire_vocabulary_round_trip() {
        // loopback pair: receiver on an os-assigned port, hub targets it
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let target = receiver.local_addr().unwrap();
        let hub = HubSocket::bind_with_target(0, target).await.unwrap();

        hub.send_start().await.unwrap();
        hub.send_query("10.0.0.3").await.unwrap();
        hub.send_reset().await.unwrap();

        let mut buf = [0u8; 64];
        let (len, _) = receiver.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], b"Start");
        let (len, _) = receiver.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], b"Query_10.0.0.3");
        let (len, _) = receiver.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], b"Reset");
    }
}
