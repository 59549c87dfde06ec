//! UDP discovery of the module address
//!
//! The module periodically broadcasts an announcement datagram on a
//! well-known port. A valid announcement begins with a fixed ASCII
//! magic identifying the module model and embeds the TCP session port
//! as a big-endian 16-bit integer at a fixed offset; the sender's
//! source address is the module's host.

use log::{debug, info};
use rinnai_core::{RinnaiError, RinnaiResult};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::Instant;

/// Well-known port the module announces itself on.
pub const DISCOVERY_PORT: u16 = 50000;

/// Magic prefix of a valid announcement datagram.
pub const ANNOUNCEMENT_MAGIC: &[u8] = b"Rinnai_NBW2_Module";

/// Byte offset of the big-endian TCP port within the announcement.
const TCP_PORT_OFFSET: usize = 32;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Network address of the module's TCP session endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleAddress {
    pub host: IpAddr,
    pub port: u16,
}

impl ModuleAddress {
    pub fn new(host: IpAddr, port: u16) -> Self {
        Self { host, port }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl fmt::Display for ModuleAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Extract the module address from an announcement datagram.
///
/// Datagrams that do not carry the magic prefix, are too short to hold
/// the embedded port, or announce port 0 yield `None`.
pub fn parse_announcement(payload: &[u8], source: IpAddr) -> Option<ModuleAddress> {
    if !payload.starts_with(ANNOUNCEMENT_MAGIC) {
        return None;
    }
    if payload.len() < TCP_PORT_OFFSET + 2 {
        return None;
    }
    let port = u16::from_be_bytes([payload[TCP_PORT_OFFSET], payload[TCP_PORT_OFFSET + 1]]);
    if port == 0 {
        return None;
    }
    Some(ModuleAddress::new(source, port))
}

/// One-shot UDP discovery operation.
///
/// Instances are short-lived: one `resolve` call per discovery.
#[derive(Debug, Clone)]
pub struct UdpDiscovery {
    port: u16,
    timeout: Duration,
}

impl UdpDiscovery {
    pub fn new() -> Self {
        Self {
            port: DISCOVERY_PORT,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the listening port (tests bind a free high port).
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Wait for the first valid announcement and return the module's
    /// TCP address.
    ///
    /// Malformed or unrelated datagrams are ignored. If no valid
    /// announcement arrives within the discovery window the operation
    /// fails with [`RinnaiError::DiscoveryTimeout`].
    pub async fn resolve(&self) -> RinnaiResult<ModuleAddress> {
        debug!("discovery: listening on UDP port {}", self.port);

        let socket = UdpSocket::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), self.port))
            .await
            .map_err(RinnaiError::Connection)?;

        let deadline = Instant::now() + self.timeout;
        let mut buf = [0u8; 512];

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(RinnaiError::DiscoveryTimeout);
            }

            let (len, remote) = match tokio::time::timeout(remaining, socket.recv_from(&mut buf)).await
            {
                Err(_) => return Err(RinnaiError::DiscoveryTimeout),
                Ok(result) => result.map_err(RinnaiError::Connection)?,
            };

            match parse_announcement(&buf[..len], remote.ip()) {
                Some(address) => {
                    info!("Found: Rinnai Touch module [{address}]");
                    return Ok(address);
                }
                None => {
                    debug!("discovery: ignoring unrelated datagram from {remote}");
                }
            }
        }
    }
}

impl Default for UdpDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn announcement(port: u16) -> Vec<u8> {
        let mut payload = ANNOUNCEMENT_MAGIC.to_vec();
        payload.resize(TCP_PORT_OFFSET, 0);
        payload.extend_from_slice(&port.to_be_bytes());
        payload
    }

    #[test]
    fn test_parse_announcement() {
        let source: IpAddr = "192.168.1.20".parse().unwrap();
        let mut payload = ANNOUNCEMENT_MAGIC.to_vec();
        payload.resize(TCP_PORT_OFFSET, 0);
        payload.push(0x6C);
        payload.push(0xD7);

        let address = parse_announcement(&payload, source).unwrap();
        assert_eq!(address.host, source);
        assert_eq!(address.port, 27863);
    }

    #[test]
    fn test_parse_rejects_foreign_and_short_datagrams() {
        let source: IpAddr = "192.168.1.20".parse().unwrap();
        assert!(parse_announcement(b"SSDP discover", source).is_none());
        assert!(parse_announcement(ANNOUNCEMENT_MAGIC, source).is_none());
        assert!(parse_announcement(&announcement(0), source).is_none());
    }

    #[tokio::test]
    async fn test_resolve_receives_announcement() {
        let discovery = UdpDiscovery::new()
            .with_port(40050)
            .with_timeout(Duration::from_secs(2));

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let resolve = tokio::spawn(async move { discovery.resolve().await });

        // Give the listener a moment to bind, then announce.
        tokio::time::sleep(Duration::from_millis(50)).await;
        sender
            .send_to(&announcement(27863), "127.0.0.1:40050")
            .await
            .unwrap();

        let address = resolve.await.unwrap().unwrap();
        assert_eq!(address.port, 27863);
    }

    #[tokio::test]
    async fn test_resolve_times_out_without_announcement() {
        let discovery = UdpDiscovery::new()
            .with_port(40051)
            .with_timeout(Duration::from_millis(100));

        match discovery.resolve().await {
            Err(RinnaiError::DiscoveryTimeout) => {}
            other => panic!("expected discovery timeout, got {other:?}"),
        }
    }
}
