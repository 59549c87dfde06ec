//! Transport layer for the Rinnai Touch module
//!
//! This crate provides the TCP session transport and the UDP broadcast
//! discovery used to locate the module on the local network, plus an
//! in-memory mock transport for exercising the session layer in tests.

pub mod discovery;
pub mod mock;
pub mod stream;
pub mod tcp;

pub use discovery::{ModuleAddress, UdpDiscovery, DISCOVERY_PORT};
pub use mock::{MockTransport, MockTransportHandle};
pub use rinnai_core::{RinnaiError, RinnaiResult};
pub use stream::{StreamAccessor, TransportLayer};
pub use tcp::TcpTransport;
