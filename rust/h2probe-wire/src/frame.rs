//! Frame header, per-kind frame structs and the [`Frame`] sum type.

use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::code::{ErrorCode, Setting, SettingId};
use crate::error::FrameError;
use crate::{FRAME_HEADER_LEN, STREAM_ID_MASK};

// =============================================================================
// Frame types and flags
// =============================================================================

/// Frame type octet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameType(pub u8);

impl FrameType {
    pub const DATA: FrameType = FrameType(0x0);
    pub const HEADERS: FrameType = FrameType(0x1);
    pub const PRIORITY: FrameType = FrameType(0x2);
    pub const RST_STREAM: FrameType = FrameType(0x3);
    pub const SETTINGS: FrameType = FrameType(0x4);
    pub const PUSH_PROMISE: FrameType = FrameType(0x5);
    pub const PING: FrameType = FrameType(0x6);
    pub const GOAWAY: FrameType = FrameType(0x7);
    pub const WINDOW_UPDATE: FrameType = FrameType(0x8);
    pub const CONTINUATION: FrameType = FrameType(0x9);

    pub fn name(self) -> Option<&'static str> {
        Some(match self.0 {
            0x0 => "DATA",
            0x1 => "HEADERS",
            0x2 => "PRIORITY",
            0x3 => "RST_STREAM",
            0x4 => "SETTINGS",
            0x5 => "PUSH_PROMISE",
            0x6 => "PING",
            0x7 => "GOAWAY",
            0x8 => "WINDOW_UPDATE",
            0x9 => "CONTINUATION",
            _ => return None,
        })
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "UNKNOWN_FRAME_TYPE_{}", self.0),
        }
    }
}

/// Flag bits. Their meaning depends on the frame type.
pub mod flags {
    /// DATA, HEADERS: last frame the sender will send on this stream.
    pub const END_STREAM: u8 = 0x1;
    /// SETTINGS, PING: the frame acknowledges a previous one.
    pub const ACK: u8 = 0x1;
    /// HEADERS, PUSH_PROMISE, CONTINUATION: the header block is complete.
    pub const END_HEADERS: u8 = 0x4;
    /// DATA, HEADERS, PUSH_PROMISE: a pad length octet and padding follow.
    pub const PADDED: u8 = 0x8;
    /// HEADERS: exclusive flag, stream dependency and weight are present.
    pub const PRIORITY: u8 = 0x20;
}

// =============================================================================
// Frame header
// =============================================================================

/// The fixed 9-octet header that precedes every frame payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Payload length (24 bits on the wire).
    pub length: u32,
    pub kind: FrameType,
    pub flags: u8,
    /// Stream identifier with the reserved bit cleared.
    pub stream_id: u32,
}

impl FrameHeader {
    pub fn new(kind: FrameType, flags: u8, stream_id: u32) -> Self {
        Self {
            length: 0,
            kind,
            flags,
            stream_id,
        }
    }

    pub fn parse(buf: &[u8; FRAME_HEADER_LEN]) -> Self {
        Self {
            length: u32::from_be_bytes([0, buf[0], buf[1], buf[2]]),
            kind: FrameType(buf[3]),
            flags: buf[4],
            stream_id: u32::from_be_bytes([buf[5], buf[6], buf[7], buf[8]]) & STREAM_ID_MASK,
        }
    }

    /// Write the header as-is. The stream identifier is not masked so that
    /// callers can set the reserved bit on purpose.
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.put_uint(u64::from(self.length), 3);
        dst.put_u8(self.kind.0);
        dst.put_u8(self.flags);
        dst.put_u32(self.stream_id);
    }

    pub fn has_flag(&self, flag: u8) -> bool {
        self.flags & flag == flag
    }

    fn fmt_fields(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Frame (length:{}, flags:0x{:02x}, stream_id:{}",
            self.kind, self.length, self.flags, self.stream_id
        )
    }
}

impl fmt::Display for FrameHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_fields(f)?;
        f.write_str(")")
    }
}

// =============================================================================
// Per-kind frames
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFrame {
    pub header: FrameHeader,
    pub data: Bytes,
    pub pad_len: Option<u8>,
}

impl DataFrame {
    pub fn new(stream_id: u32, end_stream: bool, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let bits = if end_stream { flags::END_STREAM } else { 0 };
        let mut header = FrameHeader::new(FrameType::DATA, bits, stream_id);
        header.length = data.len() as u32;
        Self {
            header,
            data,
            pad_len: None,
        }
    }

    /// Add `pad_len` octets of zero padding.
    pub fn with_padding(mut self, pad_len: u8) -> Self {
        self.header.flags |= flags::PADDED;
        self.header.length = padded_len(self.data.len(), pad_len);
        self.pad_len = Some(pad_len);
        self
    }

    pub fn stream_ended(&self) -> bool {
        self.header.has_flag(flags::END_STREAM)
    }
}

/// Stream dependency, exclusive bit and weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PriorityParam {
    pub stream_dependency: u32,
    pub exclusive: bool,
    /// Wire weight; the effective weight is this value plus one.
    pub weight: u8,
}

impl PriorityParam {
    const LEN: usize = 5;

    fn parse(buf: &[u8]) -> Self {
        let raw = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
        Self {
            stream_dependency: raw & STREAM_ID_MASK,
            exclusive: raw & !STREAM_ID_MASK != 0,
            weight: buf[4],
        }
    }

    fn encode(&self, dst: &mut BytesMut) {
        let mut raw = self.stream_dependency;
        if self.exclusive {
            raw |= !STREAM_ID_MASK;
        }
        dst.put_u32(raw);
        dst.put_u8(self.weight);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadersFrame {
    pub header: FrameHeader,
    pub priority: Option<PriorityParam>,
    pub block_fragment: Bytes,
    pub pad_len: Option<u8>,
}

impl HeadersFrame {
    pub fn new(
        stream_id: u32,
        block_fragment: impl Into<Bytes>,
        end_stream: bool,
        end_headers: bool,
    ) -> Self {
        let block_fragment = block_fragment.into();
        let mut bits = 0;
        if end_stream {
            bits |= flags::END_STREAM;
        }
        if end_headers {
            bits |= flags::END_HEADERS;
        }
        let mut header = FrameHeader::new(FrameType::HEADERS, bits, stream_id);
        header.length = block_fragment.len() as u32;
        Self {
            header,
            priority: None,
            block_fragment,
            pad_len: None,
        }
    }

    pub fn with_priority(mut self, priority: PriorityParam) -> Self {
        self.header.flags |= flags::PRIORITY;
        self.priority = Some(priority);
        self.resize();
        self
    }

    pub fn with_padding(mut self, pad_len: u8) -> Self {
        self.header.flags |= flags::PADDED;
        self.pad_len = Some(pad_len);
        self.resize();
        self
    }

    fn resize(&mut self) {
        let mut body = self.block_fragment.len();
        if self.priority.is_some() {
            body += PriorityParam::LEN;
        }
        self.header.length = match self.pad_len {
            Some(pad_len) => padded_len(body, pad_len),
            None => body as u32,
        };
    }

    pub fn stream_ended(&self) -> bool {
        self.header.has_flag(flags::END_STREAM)
    }

    pub fn headers_ended(&self) -> bool {
        self.header.has_flag(flags::END_HEADERS)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorityFrame {
    pub header: FrameHeader,
    pub priority: PriorityParam,
}

impl PriorityFrame {
    pub fn new(stream_id: u32, priority: PriorityParam) -> Self {
        let mut header = FrameHeader::new(FrameType::PRIORITY, 0, stream_id);
        header.length = PriorityParam::LEN as u32;
        Self { header, priority }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RstStreamFrame {
    pub header: FrameHeader,
    pub error_code: ErrorCode,
}

impl RstStreamFrame {
    pub fn new(stream_id: u32, error_code: ErrorCode) -> Self {
        let mut header = FrameHeader::new(FrameType::RST_STREAM, 0, stream_id);
        header.length = 4;
        Self { header, error_code }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsFrame {
    pub header: FrameHeader,
    pub settings: Vec<Setting>,
}

impl SettingsFrame {
    const ENTRY_LEN: usize = 6;

    pub fn new(settings: Vec<Setting>) -> Self {
        let mut header = FrameHeader::new(FrameType::SETTINGS, 0, 0);
        header.length = (settings.len() * Self::ENTRY_LEN) as u32;
        Self { header, settings }
    }

    /// An empty SETTINGS frame with the ACK flag.
    pub fn ack() -> Self {
        Self {
            header: FrameHeader::new(FrameType::SETTINGS, flags::ACK, 0),
            settings: Vec::new(),
        }
    }

    pub fn is_ack(&self) -> bool {
        self.header.has_flag(flags::ACK)
    }

    /// Last value carried for `id`, if the frame mentions it.
    pub fn value(&self, id: SettingId) -> Option<u32> {
        self.settings
            .iter()
            .rev()
            .find(|s| s.id == id)
            .map(|s| s.value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushPromiseFrame {
    pub header: FrameHeader,
    pub promised_stream_id: u32,
    pub block_fragment: Bytes,
    pub pad_len: Option<u8>,
}

impl PushPromiseFrame {
    pub fn new(
        stream_id: u32,
        promised_stream_id: u32,
        block_fragment: impl Into<Bytes>,
        end_headers: bool,
    ) -> Self {
        let block_fragment = block_fragment.into();
        let bits = if end_headers { flags::END_HEADERS } else { 0 };
        let mut header = FrameHeader::new(FrameType::PUSH_PROMISE, bits, stream_id);
        header.length = (4 + block_fragment.len()) as u32;
        Self {
            header,
            promised_stream_id,
            block_fragment,
            pad_len: None,
        }
    }

    pub fn with_padding(mut self, pad_len: u8) -> Self {
        self.header.flags |= flags::PADDED;
        self.header.length = padded_len(4 + self.block_fragment.len(), pad_len);
        self.pad_len = Some(pad_len);
        self
    }

    pub fn headers_ended(&self) -> bool {
        self.header.has_flag(flags::END_HEADERS)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingFrame {
    pub header: FrameHeader,
    pub data: [u8; 8],
}

impl PingFrame {
    pub fn new(ack: bool, data: [u8; 8]) -> Self {
        let bits = if ack { flags::ACK } else { 0 };
        let mut header = FrameHeader::new(FrameType::PING, bits, 0);
        header.length = 8;
        Self { header, data }
    }

    pub fn is_ack(&self) -> bool {
        self.header.has_flag(flags::ACK)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoAwayFrame {
    pub header: FrameHeader,
    pub last_stream_id: u32,
    pub error_code: ErrorCode,
    pub debug_data: Bytes,
}

impl GoAwayFrame {
    pub fn new(last_stream_id: u32, error_code: ErrorCode, debug_data: impl Into<Bytes>) -> Self {
        let debug_data = debug_data.into();
        let mut header = FrameHeader::new(FrameType::GOAWAY, 0, 0);
        header.length = (8 + debug_data.len()) as u32;
        Self {
            header,
            last_stream_id,
            error_code,
            debug_data,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowUpdateFrame {
    pub header: FrameHeader,
    pub increment: u32,
}

impl WindowUpdateFrame {
    pub fn new(stream_id: u32, increment: u32) -> Self {
        let mut header = FrameHeader::new(FrameType::WINDOW_UPDATE, 0, stream_id);
        header.length = 4;
        Self { header, increment }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinuationFrame {
    pub header: FrameHeader,
    pub block_fragment: Bytes,
}

impl ContinuationFrame {
    pub fn new(stream_id: u32, end_headers: bool, block_fragment: impl Into<Bytes>) -> Self {
        let block_fragment = block_fragment.into();
        let bits = if end_headers { flags::END_HEADERS } else { 0 };
        let mut header = FrameHeader::new(FrameType::CONTINUATION, bits, stream_id);
        header.length = block_fragment.len() as u32;
        Self {
            header,
            block_fragment,
        }
    }

    pub fn headers_ended(&self) -> bool {
        self.header.has_flag(flags::END_HEADERS)
    }
}

/// A frame of a type this crate does not model. Kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownFrame {
    pub header: FrameHeader,
    pub payload: Bytes,
}

// =============================================================================
// Frame
// =============================================================================

/// Any frame, as parsed off the wire or built for sending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Data(DataFrame),
    Headers(HeadersFrame),
    Priority(PriorityFrame),
    RstStream(RstStreamFrame),
    Settings(SettingsFrame),
    PushPromise(PushPromiseFrame),
    Ping(PingFrame),
    GoAway(GoAwayFrame),
    WindowUpdate(WindowUpdateFrame),
    Continuation(ContinuationFrame),
    Unknown(UnknownFrame),
}

impl Frame {
    pub fn header(&self) -> &FrameHeader {
        match self {
            Frame::Data(f) => &f.header,
            Frame::Headers(f) => &f.header,
            Frame::Priority(f) => &f.header,
            Frame::RstStream(f) => &f.header,
            Frame::Settings(f) => &f.header,
            Frame::PushPromise(f) => &f.header,
            Frame::Ping(f) => &f.header,
            Frame::GoAway(f) => &f.header,
            Frame::WindowUpdate(f) => &f.header,
            Frame::Continuation(f) => &f.header,
            Frame::Unknown(f) => &f.header,
        }
    }

    pub fn kind(&self) -> FrameType {
        self.header().kind
    }

    pub fn stream_id(&self) -> u32 {
        self.header().stream_id
    }

    /// Build a typed frame from a header and exactly `header.length` octets
    /// of payload.
    pub fn parse(header: FrameHeader, mut payload: Bytes) -> Result<Frame, FrameError> {
        let kind = header.kind;
        let frame = match kind {
            FrameType::DATA => {
                let pad_len = strip_padding(&header, &mut payload)?;
                Frame::Data(DataFrame {
                    header,
                    data: payload,
                    pad_len,
                })
            }
            FrameType::HEADERS => {
                let pad_len = strip_padding(&header, &mut payload)?;
                let priority = if header.has_flag(flags::PRIORITY) {
                    if payload.len() < PriorityParam::LEN {
                        return Err(bad_length(kind, payload.len(), "at least 5 with PRIORITY"));
                    }
                    Some(PriorityParam::parse(&payload.split_to(PriorityParam::LEN)))
                } else {
                    None
                };
                Frame::Headers(HeadersFrame {
                    header,
                    priority,
                    block_fragment: payload,
                    pad_len,
                })
            }
            FrameType::PRIORITY => {
                if payload.len() != PriorityParam::LEN {
                    return Err(bad_length(kind, payload.len(), "5"));
                }
                Frame::Priority(PriorityFrame {
                    header,
                    priority: PriorityParam::parse(&payload),
                })
            }
            FrameType::RST_STREAM => {
                if payload.len() != 4 {
                    return Err(bad_length(kind, payload.len(), "4"));
                }
                Frame::RstStream(RstStreamFrame {
                    header,
                    error_code: ErrorCode(payload.get_u32()),
                })
            }
            FrameType::SETTINGS => {
                if header.has_flag(flags::ACK) && !payload.is_empty() {
                    return Err(bad_length(kind, payload.len(), "0 with ACK"));
                }
                if payload.len() % SettingsFrame::ENTRY_LEN != 0 {
                    return Err(bad_length(kind, payload.len(), "a multiple of 6"));
                }
                let mut settings = Vec::with_capacity(payload.len() / SettingsFrame::ENTRY_LEN);
                while payload.has_remaining() {
                    let id = SettingId(payload.get_u16());
                    let value = payload.get_u32();
                    settings.push(Setting::new(id, value));
                }
                Frame::Settings(SettingsFrame { header, settings })
            }
            FrameType::PUSH_PROMISE => {
                let pad_len = strip_padding(&header, &mut payload)?;
                if payload.len() < 4 {
                    return Err(bad_length(kind, payload.len(), "at least 4"));
                }
                let promised_stream_id = payload.get_u32() & STREAM_ID_MASK;
                Frame::PushPromise(PushPromiseFrame {
                    header,
                    promised_stream_id,
                    block_fragment: payload,
                    pad_len,
                })
            }
            FrameType::PING => {
                let data: [u8; 8] = payload
                    .as_ref()
                    .try_into()
                    .map_err(|_| bad_length(kind, payload.len(), "8"))?;
                Frame::Ping(PingFrame { header, data })
            }
            FrameType::GOAWAY => {
                if payload.len() < 8 {
                    return Err(bad_length(kind, payload.len(), "at least 8"));
                }
                let last_stream_id = payload.get_u32() & STREAM_ID_MASK;
                let error_code = ErrorCode(payload.get_u32());
                Frame::GoAway(GoAwayFrame {
                    header,
                    last_stream_id,
                    error_code,
                    debug_data: payload,
                })
            }
            FrameType::WINDOW_UPDATE => {
                if payload.len() != 4 {
                    return Err(bad_length(kind, payload.len(), "4"));
                }
                Frame::WindowUpdate(WindowUpdateFrame {
                    header,
                    increment: payload.get_u32() & STREAM_ID_MASK,
                })
            }
            FrameType::CONTINUATION => Frame::Continuation(ContinuationFrame {
                header,
                block_fragment: payload,
            }),
            _ => Frame::Unknown(UnknownFrame { header, payload }),
        };
        Ok(frame)
    }

    /// Serialize header and payload. The length field is taken from the
    /// encoded payload, not from the stored header.
    pub fn encode(&self, dst: &mut BytesMut) {
        let mut payload = BytesMut::new();
        self.encode_payload(&mut payload);
        let header = FrameHeader {
            length: payload.len() as u32,
            ..*self.header()
        };
        dst.reserve(FRAME_HEADER_LEN + payload.len());
        header.encode(dst);
        dst.extend_from_slice(&payload);
    }

    fn encode_payload(&self, dst: &mut BytesMut) {
        match self {
            Frame::Data(f) => put_padded(dst, f.pad_len, |dst| dst.extend_from_slice(&f.data)),
            Frame::Headers(f) => put_padded(dst, f.pad_len, |dst| {
                if let Some(priority) = &f.priority {
                    priority.encode(dst);
                }
                dst.extend_from_slice(&f.block_fragment);
            }),
            Frame::Priority(f) => f.priority.encode(dst),
            Frame::RstStream(f) => dst.put_u32(f.error_code.0),
            Frame::Settings(f) => {
                for setting in &f.settings {
                    dst.put_u16(setting.id.0);
                    dst.put_u32(setting.value);
                }
            }
            Frame::PushPromise(f) => put_padded(dst, f.pad_len, |dst| {
                dst.put_u32(f.promised_stream_id);
                dst.extend_from_slice(&f.block_fragment);
            }),
            Frame::Ping(f) => dst.extend_from_slice(&f.data),
            Frame::GoAway(f) => {
                dst.put_u32(f.last_stream_id);
                dst.put_u32(f.error_code.0);
                dst.extend_from_slice(&f.debug_data);
            }
            Frame::WindowUpdate(f) => dst.put_u32(f.increment),
            Frame::Continuation(f) => dst.extend_from_slice(&f.block_fragment),
            Frame::Unknown(f) => dst.extend_from_slice(&f.payload),
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.header().fmt_fields(f)?;
        match self {
            Frame::RstStream(rst) => write!(f, ", error_code:{}", rst.error_code)?,
            Frame::GoAway(goaway) => write!(
                f,
                ", last_stream_id:{}, error_code:{}",
                goaway.last_stream_id, goaway.error_code
            )?,
            Frame::WindowUpdate(wu) => write!(f, ", increment:{}", wu.increment)?,
            Frame::Ping(ping) => write!(f, ", opaque_data:{}", ping.data.escape_ascii())?,
            _ => {}
        }
        f.write_str(")")
    }
}

macro_rules! impl_from_frame {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Frame {
                fn from(frame: $ty) -> Self {
                    Frame::$variant(frame)
                }
            }
        )*
    };
}

impl_from_frame! {
    Data => DataFrame,
    Headers => HeadersFrame,
    Priority => PriorityFrame,
    RstStream => RstStreamFrame,
    Settings => SettingsFrame,
    PushPromise => PushPromiseFrame,
    Ping => PingFrame,
    GoAway => GoAwayFrame,
    WindowUpdate => WindowUpdateFrame,
    Continuation => ContinuationFrame,
    Unknown => UnknownFrame,
}

// =============================================================================
// Helpers
// =============================================================================

fn bad_length(kind: FrameType, length: usize, expected: &'static str) -> FrameError {
    FrameError::BadLength {
        kind,
        length,
        expected,
    }
}

fn padded_len(body: usize, pad_len: u8) -> u32 {
    (1 + body + usize::from(pad_len)) as u32
}

/// Remove the pad length octet and trailing padding, if PADDED is set.
fn strip_padding(header: &FrameHeader, payload: &mut Bytes) -> Result<Option<u8>, FrameError> {
    if !header.has_flag(flags::PADDED) {
        return Ok(None);
    }
    if payload.is_empty() {
        return Err(FrameError::MissingPadLength { kind: header.kind });
    }
    let pad_len = payload.get_u8();
    let available = payload.len();
    if usize::from(pad_len) > available {
        return Err(FrameError::PaddingTooLong {
            kind: header.kind,
            pad_len: usize::from(pad_len),
            available,
        });
    }
    payload.truncate(available - usize::from(pad_len));
    Ok(Some(pad_len))
}

fn put_padded(dst: &mut BytesMut, pad_len: Option<u8>, body: impl FnOnce(&mut BytesMut)) {
    if let Some(pad_len) = pad_len {
        dst.put_u8(pad_len);
    }
    body(dst);
    if let Some(pad_len) = pad_len {
        dst.put_bytes(0, usize::from(pad_len));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(frame: &Frame) -> (FrameHeader, Bytes) {
        let mut buf = BytesMut::new();
        frame.encode(&mut buf);
        let head: [u8; FRAME_HEADER_LEN] = buf[..FRAME_HEADER_LEN].try_into().unwrap();
        let header = FrameHeader::parse(&head);
        (header, buf.freeze().slice(FRAME_HEADER_LEN..))
    }

    #[test]
    fn header_layout_matches_wire() {
        let mut buf = BytesMut::new();
        FrameHeader {
            length: 8,
            kind: FrameType::PING,
            flags: 0,
            stream_id: 1,
        }
        .encode(&mut buf);
        assert_eq!(&buf[..], b"\x00\x00\x08\x06\x00\x00\x00\x00\x01");
    }

    #[test]
    fn reserved_bit_is_masked_on_parse() {
        let header = FrameHeader::parse(b"\x00\x00\x00\x00\x00\x80\x00\x00\x03");
        assert_eq!(header.stream_id, 3);
    }

    #[test]
    fn constructed_length_matches_encoded_payload() {
        let frame: Frame = HeadersFrame::new(3, &b"abc"[..], true, true)
            .with_priority(PriorityParam {
                stream_dependency: 1,
                exclusive: true,
                weight: 15,
            })
            .with_padding(4)
            .into();
        let (header, payload) = split(&frame);
        assert_eq!(header.length, frame.header().length);
        assert_eq!(payload.len(), 1 + 5 + 3 + 4);
        assert_eq!(Frame::parse(header, payload).unwrap(), frame);
    }

    #[test]
    fn padded_data_parses_back_to_its_body() {
        let frame: Frame = DataFrame::new(1, true, &b"test"[..]).with_padding(3).into();
        let (header, payload) = split(&frame);
        let Frame::Data(data) = Frame::parse(header, payload).unwrap() else {
            panic!("expected DATA");
        };
        assert_eq!(&data.data[..], b"test");
        assert_eq!(data.pad_len, Some(3));
        assert!(data.stream_ended());
    }

    #[test]
    fn padding_longer_than_payload_is_rejected() {
        let header = FrameHeader {
            length: 3,
            kind: FrameType::DATA,
            flags: flags::PADDED,
            stream_id: 1,
        };
        let err = Frame::parse(header, Bytes::from_static(b"\x05ab")).unwrap_err();
        assert_eq!(
            err,
            FrameError::PaddingTooLong {
                kind: FrameType::DATA,
                pad_len: 5,
                available: 2
            }
        );
    }

    #[test]
    fn ping_must_be_eight_octets() {
        let header = FrameHeader {
            length: 6,
            kind: FrameType::PING,
            flags: 0,
            stream_id: 0,
        };
        assert!(matches!(
            Frame::parse(header, Bytes::from_static(b"123456")),
            Err(FrameError::BadLength { length: 6, .. })
        ));
    }

    #[test]
    fn settings_ack_with_payload_is_rejected() {
        let header = FrameHeader {
            length: 1,
            kind: FrameType::SETTINGS,
            flags: flags::ACK,
            stream_id: 0,
        };
        assert!(Frame::parse(header, Bytes::from_static(b"\x00")).is_err());
    }

    #[test]
    fn settings_values_are_read_in_order() {
        let frame: Frame = SettingsFrame::new(vec![
            Setting::new(SettingId::MAX_FRAME_SIZE, 20_000),
            Setting::new(SettingId::INITIAL_WINDOW_SIZE, 10),
        ])
        .into();
        let (header, payload) = split(&frame);
        let Frame::Settings(settings) = Frame::parse(header, payload).unwrap() else {
            panic!("expected SETTINGS");
        };
        assert_eq!(settings.value(SettingId::MAX_FRAME_SIZE), Some(20_000));
        assert_eq!(settings.value(SettingId::HEADER_TABLE_SIZE), None);
        assert!(!settings.is_ack());
    }

    #[test]
    fn goaway_display_names_the_error_code() {
        let frame: Frame = GoAwayFrame::new(0, ErrorCode::PROTOCOL_ERROR, Bytes::new()).into();
        assert_eq!(
            frame.to_string(),
            "GOAWAY Frame (length:8, flags:0x00, stream_id:0, last_stream_id:0, error_code:PROTOCOL_ERROR)"
        );
    }

    #[test]
    fn unknown_types_are_kept_verbatim() {
        let header = FrameHeader {
            length: 2,
            kind: FrameType(0xff),
            flags: 0x10,
            stream_id: 0,
        };
        let frame = Frame::parse(header, Bytes::from_static(b"hi")).unwrap();
        assert!(matches!(&frame, Frame::Unknown(u) if &u.payload[..] == b"hi"));
        assert_eq!(
            frame.to_string(),
            "UNKNOWN_FRAME_TYPE_255 Frame (length:2, flags:0x10, stream_id:0)"
        );
    }
}
