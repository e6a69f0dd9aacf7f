use std::fmt;

use crate::frame::FrameType;

/// A frame that could not be turned into a typed value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// The payload length does not fit the frame kind.
    BadLength {
        kind: FrameType,
        length: usize,
        expected: &'static str,
    },
    /// PADDED is set but the payload cannot hold the pad length octet.
    MissingPadLength { kind: FrameType },
    /// The pad length exceeds what is left of the payload.
    PaddingTooLong {
        kind: FrameType,
        pad_len: usize,
        available: usize,
    },
    /// The header block could not be decompressed.
    Hpack(String),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::BadLength {
                kind,
                length,
                expected,
            } => write!(
                f,
                "{kind} frame has invalid length {length} (expected {expected})"
            ),
            FrameError::MissingPadLength { kind } => {
                write!(f, "{kind} frame is PADDED but carries no pad length")
            }
            FrameError::PaddingTooLong {
                kind,
                pad_len,
                available,
            } => write!(
                f,
                "{kind} frame pad length {pad_len} exceeds remaining payload of {available} octets"
            ),
            FrameError::Hpack(msg) => write!(f, "header block decode failed: {msg}"),
        }
    }
}

impl std::error::Error for FrameError {}
