//! Rolling command sequence numbers
//!
//! The module correlates outbound commands with its inbound status
//! stream through a single rolling counter. Valid values cycle through
//! `1..=254`; `0` marks an uninitialised stream and is never emitted.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sequence number stamped on outbound commands and echoed by the
/// module on every status frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SequenceNumber(u8);

impl SequenceNumber {
    /// Create a sequence number from its raw wire value.
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    /// The raw wire value.
    pub const fn value(&self) -> u8 {
        self.0
    }

    /// The value that follows this one on the wire.
    ///
    /// Strictly cycles through `1..=254`: the successor of `254` is `1`
    /// and `0` is never produced.
    pub fn next(&self) -> SequenceNumber {
        let mut next = (u16::from(self.0) + 1) % 255;
        if next == 0 {
            next = 1;
        }
        SequenceNumber(next as u8)
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_increments_within_range() {
        for s in 1..=253u8 {
            assert_eq!(SequenceNumber::new(s).next().value(), s + 1);
        }
    }

    #[test]
    fn test_next_wraps_to_one() {
        assert_eq!(SequenceNumber::new(254).next().value(), 1);
    }

    #[test]
    fn test_next_never_produces_zero() {
        let mut seq = SequenceNumber::default();
        for _ in 0..600 {
            seq = seq.next();
            assert_ne!(seq.value(), 0);
        }
    }

    #[test]
    fn test_display_is_zero_padded() {
        assert_eq!(SequenceNumber::new(7).to_string(), "000007");
    }
}
