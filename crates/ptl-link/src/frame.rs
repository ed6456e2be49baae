//! # Link Framing
//!
//! Byte framing between the station and the light controller, the same in
//! both directions.
//!
//! ## Frame Layout
//! ```text
//! ┌─────┬──────────────┬──────────────────────┬─────────┬─────┐
//! │ STX │ LLLLLL       │ body                 │ CR  LF  │ ETX │
//! │0x02 │ 6-digit len  │ (len bytes)          │0x0D 0x0A│0x03 │
//! └─────┴──────────────┴──────────────────────┴─────────┴─────┘
//! ```
//!
//! ## Inbound Bodies
//! ```text
//! OK              acknowledgement
//! NG, NAK...      negative acknowledgement
//! CE              controller saw a checksum error
//! DP              controller saw a duplicate packet
//! EVnnnn          button pressed on module nnnn
//! anything else   unknown, logged and ignored
//! ```

use ptl_core::ModuleAddress;
use tracing::debug;

use crate::error::LinkError;

// =============================================================================
// Constants
// =============================================================================

pub const STX: u8 = 0x02;
pub const ETX: u8 = 0x03;
pub const NAK: char = '\u{15}';
const TRAILER: &[u8] = b"\r\n";
const LENGTH_DIGITS: usize = 6;

/// Largest body the length field can describe.
pub const MAX_BODY_LEN: usize = 999_999;

/// Unframed bytes kept while waiting for ETX before the buffer is dropped.
const MAX_PENDING: usize = 64 * 1024;

// =============================================================================
// Encoding
// =============================================================================

/// Wraps a command body in a frame.
pub fn encode_frame(body: &str) -> Result<Vec<u8>, LinkError> {
    let bytes = body.as_bytes();
    if bytes.len() > MAX_BODY_LEN {
        return Err(LinkError::Controller(format!(
            "command of {} bytes does not fit in a frame",
            bytes.len()
        )));
    }

    let mut frame = Vec::with_capacity(1 + LENGTH_DIGITS + bytes.len() + TRAILER.len() + 1);
    frame.push(STX);
    frame.extend_from_slice(format!("{:06}", bytes.len()).as_bytes());
    frame.extend_from_slice(bytes);
    frame.extend_from_slice(TRAILER);
    frame.push(ETX);
    Ok(frame)
}

// =============================================================================
// Decoding
// =============================================================================

/// Incremental frame decoder for a byte stream.
///
/// ## Usage
/// ```rust
/// use ptl_link::frame::{encode_frame, FrameDecoder};
///
/// let mut decoder = FrameDecoder::new();
/// decoder.extend(&encode_frame("OK").unwrap());
/// assert_eq!(decoder.next_frame(), Some(Ok("OK".to_string())));
/// assert_eq!(decoder.next_frame(), None);
/// ```
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends bytes read from the socket.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
        if self.buffer.len() > MAX_PENDING && !self.buffer.contains(&ETX) {
            debug!(dropped = self.buffer.len(), "Dropping unframed input");
            self.buffer.clear();
        }
    }

    /// Next complete frame body, if one is buffered.
    ///
    /// A frame whose length field disagrees with its body, or that lacks
    /// the trailer, yields [`LinkError::ChecksumMismatch`].
    pub fn next_frame(&mut self) -> Option<Result<String, LinkError>> {
        let start = match self.buffer.iter().position(|&b| b == STX) {
            Some(start) => start,
            None => {
                if !self.buffer.is_empty() {
                    debug!(skipped = self.buffer.len(), "Skipping bytes outside a frame");
                    self.buffer.clear();
                }
                return None;
            }
        };

        if start > 0 {
            debug!(skipped = start, "Skipping bytes outside a frame");
            self.buffer.drain(..start);
        }

        let end = self.buffer.iter().position(|&b| b == ETX)?;
        let frame: Vec<u8> = self.buffer.drain(..=end).collect();

        // frame = STX .. ETX inclusive
        Some(parse_frame(&frame[1..frame.len() - 1]))
    }
}

fn parse_frame(inner: &[u8]) -> Result<String, LinkError> {
    if inner.len() < LENGTH_DIGITS + TRAILER.len() {
        return Err(LinkError::ChecksumMismatch(format!(
            "frame of {} bytes is too short",
            inner.len()
        )));
    }

    let (digits, rest) = inner.split_at(LENGTH_DIGITS);
    let declared: usize = std::str::from_utf8(digits)
        .ok()
        .filter(|s| s.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| LinkError::ChecksumMismatch("length field is not numeric".to_string()))?;

    let Some(body) = rest.strip_suffix(TRAILER) else {
        return Err(LinkError::ChecksumMismatch("missing CR LF trailer".to_string()));
    };

    if body.len() != declared {
        return Err(LinkError::ChecksumMismatch(format!(
            "declared {} bytes, received {}",
            declared,
            body.len()
        )));
    }

    Ok(String::from_utf8_lossy(body).into_owned())
}

// =============================================================================
// Replies
// =============================================================================

/// Meaning of one inbound frame body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Ack,
    Nak(String),
    ChecksumError,
    DuplicatePacket,
    Button(ModuleAddress),
    Unknown(String),
}

impl Reply {
    /// Classifies a frame body.
    pub fn parse(body: &str) -> Reply {
        match body {
            "OK" => Reply::Ack,
            "NG" => Reply::Nak(body.to_string()),
            "CE" => Reply::ChecksumError,
            "DP" => Reply::DuplicatePacket,
            _ if body.starts_with(NAK) => Reply::Nak(body.trim_start_matches(NAK).to_string()),
            _ => match body.strip_prefix("EV") {
                Some(digits) if digits.len() == 4 => match digits.parse::<ModuleAddress>() {
                    Ok(address) => Reply::Button(address),
                    Err(_) => Reply::Unknown(body.to_string()),
                },
                _ => Reply::Unknown(body.to_string()),
            },
        }
    }

    /// Outcome of a pending command, for replies that answer one.
    pub fn into_ack(self) -> Option<Result<(), LinkError>> {
        match self {
            Reply::Ack => Some(Ok(())),
            Reply::Nak(detail) => Some(Err(LinkError::Nak(detail))),
            Reply::ChecksumError => Some(Err(LinkError::ChecksumMismatch(
                "reported by controller".to_string(),
            ))),
            Reply::DuplicatePacket => Some(Err(LinkError::DuplicatePacket)),
            Reply::Button(_) | Reply::Unknown(_) => None,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_frame_layout() {
        let frame = encode_frame("OK").unwrap();
        assert_eq!(frame, b"\x02000002OK\r\n\x03".to_vec());
    }

    #[test]
    fn test_decode_command_body() {
        let body = "PP5050000m1210\u{11}m2200\u{12}0001  1/3";
        let mut decoder = FrameDecoder::new();
        decoder.extend(&encode_frame(body).unwrap());

        assert_eq!(decoder.next_frame(), Some(Ok(body.to_string())));
        assert_eq!(decoder.next_frame(), None);
    }

    #[test]
    fn test_decode_partial_and_multiple_frames() {
        let mut bytes = encode_frame("OK").unwrap();
        bytes.extend(encode_frame("EV0002").unwrap());
        let (first, second) = bytes.split_at(5);

        let mut decoder = FrameDecoder::new();
        decoder.extend(first);
        assert_eq!(decoder.next_frame(), None);

        decoder.extend(second);
        assert_eq!(decoder.next_frame(), Some(Ok("OK".to_string())));
        assert_eq!(decoder.next_frame(), Some(Ok("EV0002".to_string())));
        assert_eq!(decoder.next_frame(), None);
    }

    #[test]
    fn test_bytes_outside_frames_are_skipped() {
        let mut bytes = b"noise".to_vec();
        bytes.extend(encode_frame("OK").unwrap());

        let mut decoder = FrameDecoder::new();
        decoder.extend(&bytes);
        assert_eq!(decoder.next_frame(), Some(Ok("OK".to_string())));
    }

    #[test]
    fn test_length_mismatch_is_checksum_error() {
        let mut decoder = FrameDecoder::new();
        decoder.extend(b"\x02000005OK\r\n\x03");
        assert!(matches!(
            decoder.next_frame(),
            Some(Err(LinkError::ChecksumMismatch(_)))
        ));
    }

    #[test]
    fn test_missing_trailer_is_checksum_error() {
        let mut decoder = FrameDecoder::new();
        decoder.extend(b"\x02000002OK\x03");
        assert!(matches!(
            decoder.next_frame(),
            Some(Err(LinkError::ChecksumMismatch(_)))
        ));

        // The decoder resynchronizes on the next frame
        decoder.extend(&encode_frame("OK").unwrap());
        assert_eq!(decoder.next_frame(), Some(Ok("OK".to_string())));
    }

    #[test]
    fn test_reply_parsing() {
        assert_eq!(Reply::parse("OK"), Reply::Ack);
        assert_eq!(Reply::parse("NG"), Reply::Nak("NG".to_string()));
        assert_eq!(Reply::parse("\u{15}42"), Reply::Nak("42".to_string()));
        assert_eq!(Reply::parse("CE"), Reply::ChecksumError);
        assert_eq!(Reply::parse("DP"), Reply::DuplicatePacket);
        assert_eq!(
            Reply::parse("EV0007"),
            Reply::Button(ModuleAddress::new(7).unwrap())
        );
        assert!(matches!(Reply::parse("EV7"), Reply::Unknown(_)));
        assert!(matches!(Reply::parse("HELLO"), Reply::Unknown(_)));
    }

    #[test]
    fn test_reply_to_ack_mapping() {
        assert_eq!(Reply::Ack.into_ack(), Some(Ok(())));
        assert!(matches!(
            Reply::parse("NG").into_ack(),
            Some(Err(LinkError::Nak(_)))
        ));
        assert!(matches!(
            Reply::ChecksumError.into_ack(),
            Some(Err(LinkError::ChecksumMismatch(_)))
        ));
        assert_eq!(
            Reply::DuplicatePacket.into_ack(),
            Some(Err(LinkError::DuplicatePacket))
        );
        assert_eq!(Reply::parse("EV0001").into_ack(), None);
    }
}
