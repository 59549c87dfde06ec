//! rinnai_rs - Rust client for the Rinnai Touch HVAC WiFi module
//!
//! This library implements the module's proprietary, stateful,
//! sequence-numbered text protocol: UDP discovery of the module on the
//! local network, a long-lived TCP session with automatic recovery,
//! and a strictly serialized command queue that confirms every state
//! write against the module's status stream.
//!
//! # Architecture
//!
//! This library is organized as a workspace with multiple crates:
//!
//! - `rinnai-core`: Core types, error handling, paths and status trees
//! - `rinnai-transport`: Transport layer (TCP session, UDP discovery)
//! - `rinnai-session`: Session layer (wire codec, connection lifecycle)
//! - `rinnai-client`: Client implementation (command queue, service)
//!
//! # Usage
//!
//! ```no_run
//! use rinnai::client::{SessionBuilder, SessionEvent};
//!
//! async fn watch_module() {
//!     // Discover the module via UDP broadcast and connect.
//!     let session = SessionBuilder::new().start();
//!
//!     let mut events = session.subscribe();
//!     while let Ok(event) = events.recv().await {
//!         match event {
//!             SessionEvent::Status(status) => {
//!                 println!("mode: {:?}", status.mode());
//!             }
//!             SessionEvent::Connection(state) => {
//!                 println!("connection: {}", state.as_str());
//!             }
//!         }
//!     }
//! }
//! ```

// Re-export core types
pub use rinnai_core::{
    Command, CommandPath, OperatingMode, OperatingState, RinnaiError, RinnaiResult,
    SequenceNumber, StatePath, StatusTree,
};

// Re-export the session wire layer
pub mod session {
    pub use rinnai_session::*;
}

// Re-export the transport layer
pub mod transport {
    pub use rinnai_transport::*;
}

// Re-export the client API
pub mod client {
    pub use rinnai_client::*;
}
