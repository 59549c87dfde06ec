//! Client session and command queue for the Rinnai Touch module
//!
//! This crate provides the top-level orchestrator:
//!
//! - [x] Session builder (static address, timeouts, boot schedule)
//! - [x] Strictly-ordered single-concurrency command queue
//! - [x] Sequence stamping and confirmation against the status stream
//! - [x] Command retry with bounded attempts, then abandonment
//! - [x] Connection supervision and unbounded reconnect with backoff
//! - [x] Keep-alive pings through the command queue
//! - [x] Status-changed / connection-state broadcast to subscribers
//! - [x] Typed controller service layer over the raw path registry

pub mod builder;
pub mod service;
pub mod session;

pub use builder::{SessionBuilder, SessionTimeouts, DEFAULT_SESSION_PORT};
pub use service::{ControlMode, ControllerService, ScheduleOverrideMode};
pub use session::{Session, SessionEvent};

pub use rinnai_core::{RinnaiError, RinnaiResult};
