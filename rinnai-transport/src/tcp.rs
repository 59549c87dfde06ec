//! TCP transport implementation

use crate::discovery::ModuleAddress;
use crate::stream::{StreamAccessor, TransportLayer};
use async_trait::async_trait;
use log::info;
use rinnai_core::{RinnaiError, RinnaiResult};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// TCP transport to the module's session endpoint.
///
/// Supports reopening after `close`, which the session layer relies on
/// for reconnects: the transport object persists, the socket does not.
#[derive(Debug)]
pub struct TcpTransport {
    stream: Option<TcpStream>,
    timeout: Duration,
    closed: bool,
}

impl TcpTransport {
    /// Create a closed transport with the default 5 second
    /// connect/read timeout.
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            stream: None,
            timeout,
            closed: true,
        }
    }

    fn stream_mut(&mut self) -> RinnaiResult<&mut TcpStream> {
        self.stream.as_mut().ok_or_else(|| {
            RinnaiError::Connection(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "TCP stream not connected",
            ))
        })
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransportLayer for TcpTransport {
    async fn open(&mut self, address: &ModuleAddress) -> RinnaiResult<()> {
        if !self.closed {
            return Err(RinnaiError::Connection(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Connection has already been opened",
            )));
        }

        let stream = tokio::time::timeout(self.timeout, TcpStream::connect(address.socket_addr()))
            .await
            .map_err(|_| {
                RinnaiError::Connection(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "TCP connection timed out",
                ))
            })?
            .map_err(RinnaiError::Connection)?;

        info!("TCP Connection: Open [{address}]");
        self.stream = Some(stream);
        self.closed = false;
        Ok(())
    }
}

#[async_trait]
impl StreamAccessor for TcpTransport {
    async fn read(&mut self, buf: &mut [u8]) -> RinnaiResult<usize> {
        let stream = self.stream_mut()?;

        match stream.read(buf).await {
            Ok(0) => {
                self.closed = true;
                Ok(0)
            }
            Ok(n) => Ok(n),
            Err(e) => {
                self.closed = true;
                Err(RinnaiError::Connection(e))
            }
        }
    }

    async fn write(&mut self, buf: &[u8]) -> RinnaiResult<usize> {
        let timeout = self.timeout;
        let stream = self.stream_mut()?;

        tokio::time::timeout(timeout, stream.write(buf))
            .await
            .map_err(|_| {
                RinnaiError::Connection(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "TCP write timed out",
                ))
            })?
            .map_err(RinnaiError::Connection)
    }

    async fn flush(&mut self) -> RinnaiResult<()> {
        let stream = self.stream_mut()?;
        stream.flush().await.map_err(RinnaiError::Connection)
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    async fn close(&mut self) -> RinnaiResult<()> {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
            info!("TCP Connection: Closed");
        }
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_open_write_and_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let address = ModuleAddress::new("127.0.0.1".parse().unwrap(), port);

        let mut transport = TcpTransport::new();
        transport.open(&address).await.unwrap();
        assert!(!transport.is_closed());

        let (mut peer, _) = listener.accept().await.unwrap();
        transport.write_all(b"N000001").await.unwrap();

        let mut buf = [0u8; 16];
        let n = peer.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"N000001");

        transport.close().await.unwrap();
        assert!(transport.is_closed());
        // close is idempotent
        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_read_of_zero_marks_closed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let address = ModuleAddress::new("127.0.0.1".parse().unwrap(), port);

        let mut transport = TcpTransport::new();
        transport.open(&address).await.unwrap();

        let (peer, _) = listener.accept().await.unwrap();
        drop(peer);

        let mut buf = [0u8; 16];
        assert_eq!(transport.read(&mut buf).await.unwrap(), 0);
        assert!(transport.is_closed());
    }

    #[tokio::test]
    async fn test_write_without_socket_is_rejected() {
        let mut transport = TcpTransport::new();
        assert!(transport.write(b"N000001").await.is_err());
    }

    #[tokio::test]
    async fn test_reopen_after_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let address = ModuleAddress::new("127.0.0.1".parse().unwrap(), port);

        let mut transport = TcpTransport::new();
        transport.open(&address).await.unwrap();
        transport.close().await.unwrap();
        transport.open(&address).await.unwrap();
        assert!(!transport.is_closed());
    }
}
