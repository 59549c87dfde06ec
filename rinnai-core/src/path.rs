use crate::error::{RinnaiError, RinnaiResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of the system group in a status payload.
pub const SYSTEM_GROUP_INDEX: usize = 0;
/// Index of the active operating-mode group in a status payload.
pub const MODE_GROUP_INDEX: usize = 1;

/// Group-1 key of the device-wide system group.
pub const SYSTEM_GROUP: &str = "SYST";

/// Three-level path identifying a single command/state slot in the
/// controller's status tree.
///
/// Paths are written in dotted form, e.g. `"HGOM.OOP.ST"`. Group 1
/// selects the status group: `SYST` addresses the system group at
/// index 0, anything else addresses the operating-mode group at
/// index 1. Segments may be empty; the wire format tolerates it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommandPath {
    group1: String,
    group2: String,
    command: String,
}

impl CommandPath {
    /// Create a path from its three components.
    pub fn new(
        group1: impl Into<String>,
        group2: impl Into<String>,
        command: impl Into<String>,
    ) -> Self {
        Self {
            group1: group1.into(),
            group2: group2.into(),
            command: command.into(),
        }
    }

    /// Parse a path from dotted format, e.g. `"SYST.OSS.ST"`.
    ///
    /// Exactly three dot-separated segments are required.
    pub fn from_string(s: &str) -> RinnaiResult<Self> {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 3 {
            return Err(RinnaiError::InvalidData(format!(
                "Expected 3 dot-separated path segments, got {}: {}",
                parts.len(),
                s
            )));
        }
        Ok(Self::new(parts[0], parts[1], parts[2]))
    }

    pub fn group1(&self) -> &str {
        &self.group1
    }

    pub fn group2(&self) -> &str {
        &self.group2
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Which status-payload index this path addresses.
    pub fn status_index(&self) -> usize {
        if self.group1 == SYSTEM_GROUP {
            SYSTEM_GROUP_INDEX
        } else {
            MODE_GROUP_INDEX
        }
    }
}

impl fmt::Display for CommandPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.group1, self.group2, self.command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_string() {
        let path = CommandPath::from_string("HGOM.OOP.ST").unwrap();
        assert_eq!(path.group1(), "HGOM");
        assert_eq!(path.group2(), "OOP");
        assert_eq!(path.command(), "ST");
        assert_eq!(path.to_string(), "HGOM.OOP.ST");
    }

    #[test]
    fn test_from_string_rejects_wrong_arity() {
        assert!(CommandPath::from_string("SYST.OSS").is_err());
        assert!(CommandPath::from_string("A.B.C.D").is_err());
    }

    #[test]
    fn test_empty_segments_are_allowed() {
        let path = CommandPath::from_string("Z1O..UE").unwrap();
        assert_eq!(path.group2(), "");
    }

    #[test]
    fn test_status_index() {
        assert_eq!(CommandPath::from_string("SYST.CFG.MTSP").unwrap().status_index(), 0);
        assert_eq!(CommandPath::from_string("HGOM.OOP.ST").unwrap().status_index(), 1);
    }
}
