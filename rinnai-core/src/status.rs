//! Status tree snapshots
//!
//! The controller broadcasts its full state after every change as a
//! JSON array of one or two group objects. Index 0 is always the
//! device-wide system group (`SYST`); index 1, when present, is the
//! currently active operating-mode group. A snapshot is replaced
//! wholesale on each distinct inbound message and never mutated.

use crate::path::{CommandPath, MODE_GROUP_INDEX, SYSTEM_GROUP};
use std::collections::HashMap;

type StatusGroup = HashMap<String, HashMap<String, HashMap<String, String>>>;

const MULTI_SET_POINT: (&str, &str, &str) = (SYSTEM_GROUP, "CFG", "MTSP");

/// One full state snapshot received from the controller.
#[derive(Debug, Clone)]
pub struct StatusTree {
    raw: String,
    groups: Vec<StatusGroup>,
}

impl StatusTree {
    /// Parse a snapshot from a status payload.
    ///
    /// The payload must be a JSON array of one or two group objects
    /// with the system group at index 0. Anything else yields `None`;
    /// parse failures are never surfaced to callers.
    pub fn parse(payload: &str) -> Option<StatusTree> {
        let groups: Vec<StatusGroup> = serde_json::from_str(payload).ok()?;
        if groups.is_empty() || groups.len() > 2 {
            return None;
        }
        if !groups[0].contains_key(SYSTEM_GROUP) {
            return None;
        }
        Some(StatusTree {
            raw: payload.to_string(),
            groups,
        })
    }

    /// Key of the active operating-mode group, if the controller is
    /// exposing live operating data.
    pub fn mode(&self) -> Option<&str> {
        self.groups
            .get(MODE_GROUP_INDEX)?
            .keys()
            .next()
            .map(String::as_str)
    }

    /// Whether each zone carries its own target temperature.
    pub fn has_multi_set_point(&self) -> bool {
        let (group1, group2, command) = MULTI_SET_POINT;
        self.lookup(0, group1, group2, command) == Some("Y")
    }

    /// Defensive point lookup; missing keys yield `None`, never a panic.
    pub fn get_state(&self, path: &CommandPath) -> Option<&str> {
        self.lookup(path.status_index(), path.group1(), path.group2(), path.command())
    }

    /// Whether the slot at `path` currently holds `state`.
    pub fn has_state(&self, path: &CommandPath, state: &str) -> bool {
        self.get_state(path) == Some(state)
    }

    /// The raw payload this snapshot was parsed from.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    fn lookup(&self, index: usize, group1: &str, group2: &str, command: &str) -> Option<&str> {
        self.groups
            .get(index)?
            .get(group1)?
            .get(group2)?
            .get(command)
            .map(String::as_str)
    }
}

/// Snapshot equality is full-payload string equality; it is used to
/// suppress redundant status-changed notifications.
impl PartialEq for StatusTree {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for StatusTree {}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = r#"[{"SYST":{"CFG":{"MTSP":"Y"}}},{"HGOM":{"OOP":{"ST":"N"}}}]"#;

    #[test]
    fn test_mode_and_multi_set_point() {
        let status = StatusTree::parse(PAYLOAD).unwrap();
        assert_eq!(status.mode(), Some("HGOM"));
        assert!(status.has_multi_set_point());
    }

    #[test]
    fn test_get_state() {
        let status = StatusTree::parse(PAYLOAD).unwrap();
        let path = CommandPath::from_string("HGOM.OOP.ST").unwrap();
        assert_eq!(status.get_state(&path), Some("N"));
        assert!(status.has_state(&path, "N"));
        assert!(!status.has_state(&path, "F"));
    }

    #[test]
    fn test_missing_keys_yield_none() {
        let status = StatusTree::parse(PAYLOAD).unwrap();
        let wrong_mode = CommandPath::from_string("ECOM.GSO.SW").unwrap();
        assert_eq!(status.get_state(&wrong_mode), None);
    }

    #[test]
    fn test_system_only_payload_is_valid() {
        let status = StatusTree::parse(r#"[{"SYST":{"OSS":{"ST":"C"}}}]"#).unwrap();
        assert_eq!(status.mode(), None);
        assert!(!status.has_multi_set_point());
    }

    #[test]
    fn test_invalid_payloads_are_rejected() {
        assert!(StatusTree::parse("[]").is_none());
        assert!(StatusTree::parse("not json").is_none());
        assert!(StatusTree::parse(r#"[{"HGOM":{}}]"#).is_none());
        assert!(StatusTree::parse(r#"[{"SYST":{}},{"HGOM":{}},{"CGOM":{}}]"#).is_none());
    }

    #[test]
    fn test_equality_is_payload_equality() {
        let a = StatusTree::parse(PAYLOAD).unwrap();
        let b = StatusTree::parse(PAYLOAD).unwrap();
        let c = StatusTree::parse(r#"[{"SYST":{"CFG":{"MTSP":"N"}}}]"#).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
