//! Connection lifecycle management
//!
//! A [`Connection`] owns one transport and drives its lifecycle:
//! resolving the module address (static configuration or UDP
//! discovery), connecting with bounded retries, decoding the inbound
//! byte stream into messages, and tearing everything down before any
//! rebuild. A dynamically discovered address is invalidated whenever
//! the connection fails, forcing re-discovery on the next attempt; a
//! statically configured address is always reused.

use crate::frame::{FrameDecoder, Message};
use crate::state::ConnectionState;
use log::{debug, warn};
use rinnai_core::{RinnaiError, RinnaiResult};
use rinnai_transport::{ModuleAddress, TransportLayer, UdpDiscovery};
use std::time::Duration;
use tokio::time::Instant;

const CONNECT_RETRIES: u32 = 3;
const RETRY_PAUSE: Duration = Duration::from_millis(500);
const FIRST_STATUS_TIMEOUT: Duration = Duration::from_secs(5);

const READ_CHUNK: usize = 4096;

/// One TCP session to the module.
///
/// The `Connection` object persists across reconnects; only the
/// underlying socket is torn down and rebuilt.
pub struct Connection<T: TransportLayer> {
    transport: T,
    discovery: UdpDiscovery,
    static_address: Option<ModuleAddress>,
    address: Option<ModuleAddress>,
    state: ConnectionState,
    decoder: FrameDecoder,
    retry_pause: Duration,
}

impl<T: TransportLayer> Connection<T> {
    /// Create a connection over the given transport.
    ///
    /// With a `static_address` the module is never discovered; without
    /// one, `discovery` resolves the address on demand.
    pub fn new(transport: T, static_address: Option<ModuleAddress>, discovery: UdpDiscovery) -> Self {
        Self {
            transport,
            discovery,
            static_address,
            address: None,
            state: ConnectionState::default(),
            decoder: FrameDecoder::new(),
            retry_pause: RETRY_PAUSE,
        }
    }

    /// Shorten the pause between connect attempts (tests).
    pub fn with_retry_pause(mut self, pause: Duration) -> Self {
        self.retry_pause = pause;
        self
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// The currently cached module address, if any.
    pub fn address(&self) -> Option<&ModuleAddress> {
        self.address.as_ref()
    }

    /// Run one connect cycle: up to 3 attempts, 500 ms apart.
    ///
    /// The module announces a full status snapshot as soon as a client
    /// connects; the session is not usable until it arrives, so a
    /// successful connect returns that first message. After the final
    /// failed attempt the connection is left in `Error` and the caller
    /// decides how long to back off before the next cycle.
    pub async fn connect(&mut self) -> RinnaiResult<Message> {
        debug!("connection: connect");
        self.transition(ConnectionState::Connecting)?;

        let mut last_error = RinnaiError::Connection(std::io::Error::new(
            std::io::ErrorKind::NotConnected,
            "no connect attempt was made",
        ));

        for attempt in 1..=CONNECT_RETRIES {
            match self.connect_once().await {
                Ok(message) => {
                    self.transition(ConnectionState::Connected)?;
                    return Ok(message);
                }
                Err(error) => {
                    warn!("TCP Connection failed. Attempt {attempt} of {CONNECT_RETRIES} [{error}]");
                    last_error = error;
                    if attempt < CONNECT_RETRIES {
                        tokio::time::sleep(self.retry_pause).await;
                    }
                }
            }
        }

        self.transition(ConnectionState::Error)?;
        Err(last_error)
    }

    async fn connect_once(&mut self) -> RinnaiResult<Message> {
        let address = self.resolve_address().await?;

        if !self.transport.is_closed() {
            let _ = self.transport.close().await;
        }

        if let Err(error) = self.transport.open(&address).await {
            self.invalidate_address();
            return Err(error);
        }
        self.decoder.clear();

        match self.read_message_inner(FIRST_STATUS_TIMEOUT).await {
            Ok(Some(message)) => Ok(message),
            Ok(None) => {
                let _ = self.transport.close().await;
                self.invalidate_address();
                Err(RinnaiError::Connection(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "No status received from module after connect",
                )))
            }
            Err(error) => {
                let _ = self.transport.close().await;
                self.invalidate_address();
                Err(error)
            }
        }
    }

    async fn resolve_address(&mut self) -> RinnaiResult<ModuleAddress> {
        if let Some(address) = &self.address {
            return Ok(address.clone());
        }

        let address = match &self.static_address {
            Some(address) => address.clone(),
            None => self.discovery.resolve().await?,
        };
        self.address = Some(address.clone());
        Ok(address)
    }

    fn invalidate_address(&mut self) {
        if self.static_address.is_none() {
            self.address = None;
        }
    }

    /// Wait up to `wait` for the next valid inbound message.
    ///
    /// Returns `Ok(None)` when the window elapses with no complete
    /// frame. Malformed frames are discarded silently by the decoder.
    /// A socket error or peer close tears the connection down, marks
    /// the state `Error` and invalidates a discovered address.
    pub async fn read_message(&mut self, wait: Duration) -> RinnaiResult<Option<Message>> {
        if !self.state.is_connected() {
            return Err(RinnaiError::Connection(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "Connection is not established",
            )));
        }

        match self.read_message_inner(wait).await {
            Err(error) => {
                self.fail().await;
                Err(error)
            }
            ok => ok,
        }
    }

    async fn read_message_inner(&mut self, wait: Duration) -> RinnaiResult<Option<Message>> {
        let deadline = Instant::now() + wait;
        let mut buf = [0u8; READ_CHUNK];

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }

            let n = match tokio::time::timeout(remaining, self.transport.read(&mut buf)).await {
                Err(_) => return Ok(None),
                Ok(Ok(0)) => {
                    return Err(RinnaiError::Connection(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "Connection closed by module",
                    )));
                }
                Ok(Ok(n)) => n,
                Ok(Err(error)) => return Err(error),
            };

            if let Some(message) = self.decoder.push(&buf[..n]) {
                return Ok(Some(message));
            }
        }
    }

    /// Write a payload to the live socket; rejected when no socket is
    /// open. A write failure tears the connection down.
    pub async fn write(&mut self, payload: &str) -> RinnaiResult<()> {
        if !self.state.can_write() {
            return Err(RinnaiError::Connection(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "Cannot write: connection is not established",
            )));
        }

        debug!("connection: write {payload}");
        let result = async {
            self.transport.write_all(payload.as_bytes()).await?;
            self.transport.flush().await
        }
        .await;

        match result {
            Ok(()) => Ok(()),
            Err(error) => {
                self.fail().await;
                Err(error)
            }
        }
    }

    async fn fail(&mut self) {
        let _ = self.transport.close().await;
        self.invalidate_address();
        self.decoder.clear();
        if let Err(error) = self.state.validate_transition(ConnectionState::Error) {
            debug!("connection: {error}");
        } else {
            self.state = ConnectionState::Error;
        }
    }

    /// Deliberate shutdown; idempotent. Keeps a discovered address.
    pub async fn close(&mut self) -> RinnaiResult<()> {
        if self.state == ConnectionState::Disconnected {
            return Ok(());
        }

        if self.state == ConnectionState::Connected {
            self.transition(ConnectionState::Closing)?;
        }
        self.transport.close().await?;
        self.decoder.clear();
        self.transition(ConnectionState::Disconnected)?;
        Ok(())
    }

    fn transition(&mut self, new_state: ConnectionState) -> RinnaiResult<()> {
        self.state.validate_transition(new_state)?;
        self.state = new_state;
        Ok(())
    }
}
