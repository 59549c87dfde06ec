//! Session builder
//!
//! Collects the static address override, the per-operation timeouts
//! and the optional boot schedule before starting a [`Session`].

use crate::session::{BootSchedule, Session};
use rinnai_core::{RinnaiError, RinnaiResult};
use rinnai_session::{boot_payload, Connection};
use rinnai_transport::{ModuleAddress, TcpTransport, TransportLayer, UdpDiscovery, DISCOVERY_PORT};
use std::net::IpAddr;
use std::time::Duration;

/// TCP port the module listens on when none is configured.
pub const DEFAULT_SESSION_PORT: u16 = 27847;

/// Per-operation timeouts of the session engine.
#[derive(Debug, Clone)]
pub struct SessionTimeouts {
    /// Window for one command-confirmation attempt.
    pub confirmation: Duration,
    /// Silence threshold after which the module counts as unresponsive.
    pub idle_threshold: Duration,
    /// Pause before reconnecting after a connection error.
    pub reconnect_pause: Duration,
    /// Backoff between failed connect cycles.
    pub reconnect_backoff: Duration,
    /// Bound on waiting for a closing connection to finish closing.
    pub close_wait: Duration,
    /// Keep-alive ping interval.
    pub keep_alive: Duration,
    /// Idle poll window for draining the inbound status stream.
    pub poll: Duration,
}

impl Default for SessionTimeouts {
    fn default() -> Self {
        Self {
            confirmation: Duration::from_secs(10),
            idle_threshold: Duration::from_secs(2),
            reconnect_pause: Duration::from_secs(2),
            reconnect_backoff: Duration::from_secs(60),
            close_wait: Duration::from_secs(5),
            keep_alive: Duration::from_secs(60),
            poll: Duration::from_secs(1),
        }
    }
}

/// Builder for [`Session`]
#[derive(Debug, Clone)]
pub struct SessionBuilder {
    address: Option<IpAddr>,
    port: Option<u16>,
    discovery_port: u16,
    discovery_timeout: Duration,
    connect_timeout: Duration,
    timeouts: SessionTimeouts,
    boot: Option<BootSchedule>,
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self {
            address: None,
            port: None,
            discovery_port: DISCOVERY_PORT,
            discovery_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(5),
            timeouts: SessionTimeouts::default(),
            boot: None,
        }
    }

    /// Pin the module to a static address, skipping UDP discovery.
    /// A statically configured address is never invalidated.
    pub fn address(mut self, host: IpAddr) -> Self {
        self.address = Some(host);
        self
    }

    /// Override the TCP session port (default 27847).
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Override the UDP discovery port (tests).
    pub fn discovery_port(mut self, port: u16) -> Self {
        self.discovery_port = port;
        self
    }

    pub fn discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn timeouts(mut self, timeouts: SessionTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Schedule the vendor boot command daily at `time` (`"HH:MM"`,
    /// local clock), authenticated with `password`.
    pub fn boot_schedule(mut self, time: &str, password: &str) -> RinnaiResult<Self> {
        let (hour, minute) = parse_boot_time(time)?;
        self.boot = Some(BootSchedule {
            hour,
            minute,
            payload: boot_payload(password),
        });
        Ok(self)
    }

    /// Start the session over a TCP transport.
    pub fn start(self) -> Session {
        let transport = TcpTransport::with_timeout(self.connect_timeout);
        self.start_with_transport(transport)
    }

    /// Start the session over an arbitrary transport (tests use the
    /// in-memory mock).
    pub fn start_with_transport<T: TransportLayer + 'static>(self, transport: T) -> Session {
        let static_address = self
            .address
            .map(|host| ModuleAddress::new(host, self.port.unwrap_or(DEFAULT_SESSION_PORT)));
        let discovery = UdpDiscovery::new()
            .with_port(self.discovery_port)
            .with_timeout(self.discovery_timeout);
        let connection = Connection::new(transport, static_address, discovery);
        Session::spawn(connection, self.timeouts, self.boot)
    }
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_boot_time(time: &str) -> RinnaiResult<(u32, u32)> {
    let invalid = || RinnaiError::InvalidData(format!("Invalid boot time, expected HH:MM: {time}"));

    let (hour, minute) = time.split_once(':').ok_or_else(invalid)?;
    let hour: u32 = hour.parse().map_err(|_| invalid())?;
    let minute: u32 = minute.parse().map_err(|_| invalid())?;
    if hour > 23 || minute > 59 {
        return Err(invalid());
    }
    Ok((hour, minute))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_boot_time() {
        assert_eq!(parse_boot_time("03:30").unwrap(), (3, 30));
        assert_eq!(parse_boot_time("23:59").unwrap(), (23, 59));
    }

    #[test]
    fn test_parse_boot_time_rejects_garbage() {
        assert!(parse_boot_time("24:00").is_err());
        assert!(parse_boot_time("12:60").is_err());
        assert!(parse_boot_time("noon").is_err());
        assert!(parse_boot_time("1230").is_err());
    }

    #[test]
    fn test_default_timeouts_match_protocol_figures() {
        let timeouts = SessionTimeouts::default();
        assert_eq!(timeouts.confirmation, Duration::from_secs(10));
        assert_eq!(timeouts.idle_threshold, Duration::from_secs(2));
        assert_eq!(timeouts.reconnect_backoff, Duration::from_secs(60));
        assert_eq!(timeouts.keep_alive, Duration::from_secs(60));
    }
}
