//! In-memory transport for exercising the session layer in tests
//!
//! The mock plays the module's side of the wire: tests inject inbound
//! frames and inspect captured writes through a [`MockTransportHandle`],
//! or install a [`MockModule`] that scripts the module's responses to
//! opens and writes (e.g. echo a status frame confirming a command).

use crate::discovery::ModuleAddress;
use crate::stream::{StreamAccessor, TransportLayer};
use async_trait::async_trait;
use rinnai_core::{RinnaiError, RinnaiResult};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Scripted module behavior driving a [`MockTransport`].
pub trait MockModule: Send + Sync {
    /// Frames the module emits right after a connection opens.
    fn on_open(&self) -> Vec<Vec<u8>> {
        Vec::new()
    }

    /// Frames the module emits in response to an outbound payload.
    fn on_write(&self, _payload: &[u8]) -> Vec<Vec<u8>> {
        Vec::new()
    }
}

/// Event injected into the mock's inbound stream.
enum MockEvent {
    Data(Vec<u8>),
    Eof,
    Error,
}

/// Test-side handle for injecting inbound data and inspecting writes.
#[derive(Clone)]
pub struct MockTransportHandle {
    inbound: mpsc::UnboundedSender<MockEvent>,
    writes: Arc<Mutex<Vec<Vec<u8>>>>,
    opens: Arc<AtomicUsize>,
    failing_opens: Arc<AtomicUsize>,
}

impl MockTransportHandle {
    /// Inject an inbound frame, delivered by the next `read`.
    pub fn push_frame(&self, frame: impl Into<Vec<u8>>) {
        let _ = self.inbound.send(MockEvent::Data(frame.into()));
    }

    /// Make the next `read` observe an orderly peer close.
    pub fn push_eof(&self) {
        let _ = self.inbound.send(MockEvent::Eof);
    }

    /// Make the next `read` fail with a socket error.
    pub fn push_error(&self) {
        let _ = self.inbound.send(MockEvent::Error);
    }

    /// All payloads written so far, as strings, in write order.
    pub fn writes(&self) -> Vec<String> {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .map(|w| String::from_utf8_lossy(w).into_owned())
            .collect()
    }

    /// How many times the transport has been opened.
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Fail the next `n` open attempts with a connection error.
    pub fn fail_next_opens(&self, n: usize) {
        self.failing_opens.store(n, Ordering::SeqCst);
    }
}

/// In-memory [`TransportLayer`] implementation.
pub struct MockTransport {
    inbound: mpsc::UnboundedReceiver<MockEvent>,
    pending: VecDeque<u8>,
    responses: VecDeque<Vec<u8>>,
    module: Option<Arc<dyn MockModule>>,
    writes: Arc<Mutex<Vec<Vec<u8>>>>,
    opens: Arc<AtomicUsize>,
    failing_opens: Arc<AtomicUsize>,
    closed: bool,
}

impl MockTransport {
    pub fn new() -> (Self, MockTransportHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let writes = Arc::new(Mutex::new(Vec::new()));
        let opens = Arc::new(AtomicUsize::new(0));
        let failing_opens = Arc::new(AtomicUsize::new(0));

        let handle = MockTransportHandle {
            inbound: tx,
            writes: Arc::clone(&writes),
            opens: Arc::clone(&opens),
            failing_opens: Arc::clone(&failing_opens),
        };

        let transport = Self {
            inbound: rx,
            pending: VecDeque::new(),
            responses: VecDeque::new(),
            module: None,
            writes,
            opens,
            failing_opens,
            closed: true,
        };

        (transport, handle)
    }

    /// Attach a scripted module driving responses to opens and writes.
    pub fn with_module(module: Arc<dyn MockModule>) -> (Self, MockTransportHandle) {
        let (mut transport, handle) = Self::new();
        transport.module = Some(module);
        (transport, handle)
    }

    fn drain_pending(&mut self, buf: &mut [u8]) -> usize {
        let n = self.pending.len().min(buf.len());
        for slot in buf.iter_mut().take(n) {
            *slot = self.pending.pop_front().unwrap();
        }
        n
    }
}

#[async_trait]
impl TransportLayer for MockTransport {
    async fn open(&mut self, _address: &ModuleAddress) -> RinnaiResult<()> {
        if self
            .failing_opens
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(RinnaiError::Connection(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "mock open failure",
            )));
        }

        self.opens.fetch_add(1, Ordering::SeqCst);
        self.closed = false;
        self.pending.clear();
        if let Some(module) = &self.module {
            self.responses.extend(module.on_open());
        }
        Ok(())
    }
}

#[async_trait]
impl StreamAccessor for MockTransport {
    async fn read(&mut self, buf: &mut [u8]) -> RinnaiResult<usize> {
        loop {
            if !self.pending.is_empty() {
                return Ok(self.drain_pending(buf));
            }
            if let Some(frame) = self.responses.pop_front() {
                self.pending.extend(frame);
                continue;
            }

            match self.inbound.recv().await {
                None | Some(MockEvent::Eof) => {
                    self.closed = true;
                    return Ok(0);
                }
                Some(MockEvent::Error) => {
                    self.closed = true;
                    return Err(RinnaiError::Connection(std::io::Error::new(
                        std::io::ErrorKind::ConnectionReset,
                        "mock socket error",
                    )));
                }
                Some(MockEvent::Data(data)) => {
                    self.pending.extend(data);
                }
            }
        }
    }

    async fn write(&mut self, buf: &[u8]) -> RinnaiResult<usize> {
        if self.closed {
            return Err(RinnaiError::Connection(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "mock transport is closed",
            )));
        }
        self.writes.lock().unwrap().push(buf.to_vec());
        if let Some(module) = &self.module {
            self.responses.extend(module.on_write(buf));
        }
        Ok(buf.len())
    }

    async fn flush(&mut self) -> RinnaiResult<()> {
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    async fn close(&mut self) -> RinnaiResult<()> {
        self.closed = true;
        self.pending.clear();
        self.responses.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn test_address() -> ModuleAddress {
        ModuleAddress::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 27847)
    }

    #[tokio::test]
    async fn test_injected_frames_are_readable() {
        let (mut transport, handle) = MockTransport::new();
        transport.open(&test_address()).await.unwrap();

        handle.push_frame(b"N000001[]".to_vec());
        let mut buf = [0u8; 32];
        let n = transport.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"N000001[]");
    }

    #[tokio::test]
    async fn test_writes_are_captured_in_order() {
        let (mut transport, handle) = MockTransport::new();
        transport.open(&test_address()).await.unwrap();

        transport.write_all(b"first").await.unwrap();
        transport.write_all(b"second").await.unwrap();
        assert_eq!(handle.writes(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_failing_opens() {
        let (mut transport, handle) = MockTransport::new();
        handle.fail_next_opens(2);

        assert!(transport.open(&test_address()).await.is_err());
        assert!(transport.open(&test_address()).await.is_err());
        assert!(transport.open(&test_address()).await.is_ok());
        assert_eq!(handle.open_count(), 1);
    }

    #[tokio::test]
    async fn test_error_injection_closes_stream() {
        let (mut transport, handle) = MockTransport::new();
        transport.open(&test_address()).await.unwrap();

        handle.push_error();
        let mut buf = [0u8; 8];
        assert!(transport.read(&mut buf).await.is_err());
        assert!(transport.is_closed());
    }
}
