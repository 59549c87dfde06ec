//! Stream accessor trait for the transport layer

use crate::discovery::ModuleAddress;
use rinnai_core::{RinnaiError, RinnaiResult};
use async_trait::async_trait;

/// Stream accessor interface to access a physical stream to the module
#[async_trait]
pub trait StreamAccessor: Send + Sync {
    /// Read data from the stream
    ///
    /// # Returns
    ///
    /// Number of bytes read, or 0 if the peer closed the connection
    async fn read(&mut self, buf: &mut [u8]) -> RinnaiResult<usize>;

    /// Write data to the stream
    ///
    /// # Returns
    ///
    /// Number of bytes written
    async fn write(&mut self, buf: &[u8]) -> RinnaiResult<usize>;

    /// Write all data to the stream
    async fn write_all(&mut self, mut buf: &[u8]) -> RinnaiResult<()> {
        while !buf.is_empty() {
            let n = self.write(buf).await?;
            if n == 0 {
                return Err(RinnaiError::Connection(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "Failed to write all data",
                )));
            }
            buf = &buf[n..];
        }
        Ok(())
    }

    /// Flush any buffered data
    async fn flush(&mut self) -> RinnaiResult<()>;

    /// Check if the stream is closed
    fn is_closed(&self) -> bool;

    /// Close the stream
    async fn close(&mut self) -> RinnaiResult<()>;
}

/// Transport layer trait that extends StreamAccessor
///
/// `open` takes the target address because the module's address is
/// resolved at runtime (UDP discovery) rather than fixed at
/// construction.
#[async_trait]
pub trait TransportLayer: StreamAccessor {
    /// Open the physical layer connection to the given address
    async fn open(&mut self, address: &ModuleAddress) -> RinnaiResult<()>;
}
