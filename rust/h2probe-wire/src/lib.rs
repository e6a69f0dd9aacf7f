//! HTTP/2 wire types for the h2probe conformance engine.
//!
//! This crate holds everything the engine needs to put frames on the wire
//! and read them back: the 9-octet frame header, one struct per frame kind,
//! the closed [`Frame`] sum type, error-code and settings newtypes, and a
//! connection-scoped HPACK encoder/decoder pair.
//!
//! Parsing is lenient about stream identifiers and flags: the
//! engine has to observe whatever the peer sends, legal or not. Only
//! structural problems (a PING that is not 8 octets, padding longer than
//! the payload) are reported as [`FrameError`].

#![deny(unsafe_code)]

mod code;
mod error;
mod frame;
mod hpack;

pub use code::{ErrorCode, Setting, SettingId};
pub use error::FrameError;
pub use frame::{
    ContinuationFrame, DataFrame, Frame, FrameHeader, FrameType, GoAwayFrame, HeadersFrame,
    PingFrame, PriorityFrame, PriorityParam, PushPromiseFrame, RstStreamFrame, SettingsFrame,
    UnknownFrame, WindowUpdateFrame, flags,
};
pub use hpack::{DEFAULT_HEADER_TABLE_SIZE, HeaderDecoder, HeaderEncoder, HeaderField};

// =============================================================================
// Connection-level constants
// =============================================================================

/// The client connection preface that opens every HTTP/2 connection.
pub const CLIENT_PREFACE: &[u8] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";

/// Size of the fixed frame header.
pub const FRAME_HEADER_LEN: usize = 9;

/// Initial value of SETTINGS_MAX_FRAME_SIZE.
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 16_384;

/// Initial flow-control window for the connection and every stream.
pub const DEFAULT_WINDOW_SIZE: u32 = 65_535;

/// Largest length the 24-bit length field can carry.
pub const MAX_FRAME_LEN: u32 = (1 << 24) - 1;

/// Mask that strips the reserved bit from a stream identifier.
pub const STREAM_ID_MASK: u32 = 0x7fff_ffff;
