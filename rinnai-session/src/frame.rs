//! Wire framing for the module protocol
//!
//! Outbound frames are `N` + a 6-digit zero-padded sequence number +
//! the command body. Inbound status frames carry the same prefix; the
//! sequence number occupies the 6 characters immediately preceding the
//! last `[` in the frame; the anchor is needed because the payload
//! length varies. Anything not matching that shape is invalid and is
//! discarded without surfacing an error.

use bytes::BytesMut;
use log::debug;
use rinnai_core::{Command, SequenceNumber, StatusTree};

/// First byte of every framed message.
pub const FRAME_PREFIX: u8 = b'N';

const SEQUENCE_DIGITS: usize = 6;

/// Inbound frames larger than this cannot be valid status snapshots;
/// the decoder resets rather than buffer without bound.
const MAX_FRAME_LEN: usize = 16 * 1024;

/// Serialize an outbound command.
///
/// Pings produce an empty body; state writes produce the single-path
/// JSON body. Pass-through payloads carry their own vendor framing and
/// are returned verbatim, without prefix or sequence number.
pub fn encode(command: &Command, sequence: SequenceNumber) -> String {
    match command {
        Command::Raw(payload) => payload.clone(),
        _ => format!("N{}{}", sequence, command.body()),
    }
}

/// Build the vendor's authenticated boot request from the configured
/// password. Distinct from normal framing; never sequence-stamped.
pub fn boot_payload(password: &str) -> String {
    format!("*BOOT*{password}*")
}

/// One decoded inbound status message.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    sequence: SequenceNumber,
    status: StatusTree,
}

impl Message {
    /// Decode a raw inbound frame.
    ///
    /// Returns `None` for anything that is not a well-formed status
    /// frame: wrong prefix, no `[` anchor, non-numeric or out-of-range
    /// sequence (`0` is reserved), or an unparseable payload. Parse
    /// failures are never propagated.
    pub fn parse(raw: &[u8]) -> Option<Message> {
        let text = std::str::from_utf8(raw).ok()?;
        if !text.starts_with(char::from(FRAME_PREFIX)) {
            return None;
        }

        let anchor = text.rfind('[')?;
        let start = anchor.checked_sub(SEQUENCE_DIGITS)?;
        let digits = text.get(start..anchor)?;
        let sequence: u8 = digits.parse().ok()?;
        if !(1..=254).contains(&sequence) {
            return None;
        }

        let status = StatusTree::parse(&text[anchor..])?;
        Some(Message {
            sequence: SequenceNumber::new(sequence),
            status,
        })
    }

    pub fn sequence(&self) -> SequenceNumber {
        self.sequence
    }

    pub fn status(&self) -> &StatusTree {
        &self.status
    }

    pub fn into_status(self) -> StatusTree {
        self.status
    }
}

/// Incremental decoder over the inbound TCP byte stream.
///
/// Frames may arrive split across reads; chunks are buffered until a
/// complete frame decodes. A chunk beginning with the frame prefix
/// starts a new frame and discards any buffered partial one.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a raw chunk; returns a message once one decodes completely.
    pub fn push(&mut self, chunk: &[u8]) -> Option<Message> {
        if chunk.first() == Some(&FRAME_PREFIX) && !self.buf.is_empty() {
            debug!("frame: discarding {} buffered bytes at new frame start", self.buf.len());
            self.buf.clear();
        }
        self.buf.extend_from_slice(chunk);

        if self.buf.len() > MAX_FRAME_LEN {
            debug!("frame: dropping oversized inbound buffer ({} bytes)", self.buf.len());
            self.buf.clear();
            return None;
        }

        match Message::parse(&self.buf) {
            Some(message) => {
                self.buf.clear();
                Some(message)
            }
            None => None,
        }
    }

    /// Drop any buffered partial frame (used across reconnects).
    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rinnai_core::CommandPath;

    const STATUS_FRAME: &str =
        r#"N000014[{"SYST":{"CFG":{"MTSP":"N"}}},{"HGOM":{"OOP":{"ST":"F"}}}]"#;

    #[test]
    fn test_encode_write() {
        let command = Command::write(CommandPath::new("GSO", "Z1O", "UE"), "Y");
        assert_eq!(
            encode(&command, SequenceNumber::new(1)),
            r#"N000001{"GSO":{"Z1O":{"UE":"Y"}}}"#
        );
    }

    #[test]
    fn test_encode_ping_has_empty_body() {
        assert_eq!(encode(&Command::Ping, SequenceNumber::new(42)), "N000042");
    }

    #[test]
    fn test_encode_raw_is_verbatim() {
        let command = Command::Raw(boot_payload("1234"));
        assert_eq!(encode(&command, SequenceNumber::new(9)), "*BOOT*1234*");
    }

    #[test]
    fn test_parse_recovers_sequence_and_payload() {
        let frame = r#"N000001[{"SYST":{"CFG":{"MTSP":"Y"}}},{"HGOM":{"OOP":{"ST":"N"}}}]"#;
        let message = Message::parse(frame.as_bytes()).unwrap();
        assert_eq!(message.sequence().value(), 1);
        assert_eq!(message.status().mode(), Some("HGOM"));
        assert!(message.status().has_multi_set_point());
    }

    #[test]
    fn test_parse_rejects_malformed_frames() {
        // wrong prefix
        assert!(Message::parse(b"X000001[]").is_none());
        // no bracket anchor
        assert!(Message::parse(b"N000001").is_none());
        // sequence 0 is reserved
        assert!(Message::parse(br#"N000000[{"SYST":{}}]"#).is_none());
        // non-numeric sequence
        assert!(Message::parse(br#"NABCDEF[{"SYST":{}}]"#).is_none());
        // payload is not a status array
        assert!(Message::parse(b"N000001[1,2,3]").is_none());
        // not UTF-8
        assert!(Message::parse(&[b'N', 0xFF, 0xFE]).is_none());
    }

    #[test]
    fn test_decoder_handles_split_frames() {
        let mut decoder = FrameDecoder::new();
        let (head, tail) = STATUS_FRAME.as_bytes().split_at(10);

        assert!(decoder.push(head).is_none());
        let message = decoder.push(tail).unwrap();
        assert_eq!(message.sequence().value(), 14);
    }

    #[test]
    fn test_decoder_discards_partial_frame_on_new_start() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(b"N000009[{\"SYST\"").is_none());

        let message = decoder.push(STATUS_FRAME.as_bytes()).unwrap();
        assert_eq!(message.sequence().value(), 14);
    }

    #[test]
    fn test_decoder_ignores_garbage() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(b"hello world").is_none());
        assert!(decoder.push(STATUS_FRAME.as_bytes()).is_some());
    }
}
