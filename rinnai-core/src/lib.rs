//! Core types for the Rinnai Touch module protocol
//!
//! This crate provides the data model shared by every layer:
//! the error taxonomy, the rolling command sequence number, command
//! paths, the typed state-path registry and the status tree snapshot
//! broadcast by the controller.

pub mod command;
pub mod error;
pub mod path;
pub mod sequence;
pub mod states;
pub mod status;

pub use command::Command;
pub use error::{RinnaiError, RinnaiResult};
pub use path::CommandPath;
pub use sequence::SequenceNumber;
pub use states::{OperatingMode, OperatingState, StatePath, ZONES};
pub use status::StatusTree;
