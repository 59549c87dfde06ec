use crate::path::CommandPath;
use serde_json::json;
use std::fmt;

/// One outbound request to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Zero-payload keep-alive. Written without waiting for any
    /// confirmation and never retried.
    Ping,
    /// Pass-through payload written to the wire verbatim, e.g. the
    /// vendor's authenticated boot request. Carries its own framing.
    Raw(String),
    /// Single-path state write, confirmed against the status stream.
    Write { path: CommandPath, state: String },
}

impl Command {
    /// Create a state-write command.
    pub fn write(path: CommandPath, state: impl Into<String>) -> Self {
        Command::Write {
            path,
            state: state.into(),
        }
    }

    pub fn is_ping(&self) -> bool {
        matches!(self, Command::Ping)
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, Command::Raw(_))
    }

    /// The frame body: empty for a ping, the payload itself for a
    /// pass-through, a single-path JSON object for a state write.
    pub fn body(&self) -> String {
        match self {
            Command::Ping => String::new(),
            Command::Raw(payload) => payload.clone(),
            Command::Write { path, state } => {
                json!({ (path.group1()): { (path.group2()): { (path.command()): state } } })
                    .to_string()
            }
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Ping => write!(f, "ping"),
            Command::Raw(payload) => write!(f, "raw:{payload}"),
            Command::Write { path, state } => write!(f, "{path}={state}"),
        }
    }
}
