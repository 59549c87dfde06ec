//! Session layer for the Rinnai Touch module
//!
//! This crate provides the wire codec and the connection lifecycle:
//!
//! - [x] Frame encoding (`N` + zero-padded sequence + body)
//! - [x] Frame decoding with the bracket-anchored sequence rule
//! - [x] Incremental stream decoder over the raw TCP byte stream
//! - [x] Connection state machine with validated transitions
//! - [x] Address resolution (static or UDP discovery) with
//!   invalidation on connection error
//! - [x] Bounded connect retries; full teardown before rebuild

pub mod connection;
pub mod frame;
pub mod state;

pub use connection::Connection;
pub use frame::{boot_payload, encode, FrameDecoder, Message};
pub use rinnai_core::{RinnaiError, RinnaiResult};
pub use state::ConnectionState;
