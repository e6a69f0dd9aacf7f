//! One HTTP/2 connection to the implementation under test.
//!
//! A [`Conn`] wraps an already established byte stream, turns what the peer
//! sends into [`Event`]s and offers a write surface that ranges from typed
//! frames down to arbitrary bytes. It lives for exactly one scenario;
//! dropping it releases the transport.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use h2probe_wire::{
    CLIENT_PREFACE, ContinuationFrame, DEFAULT_MAX_FRAME_SIZE, DEFAULT_WINDOW_SIZE, DataFrame,
    ErrorCode, FRAME_HEADER_LEN, Frame, FrameError, FrameHeader, FrameType, GoAwayFrame,
    HeaderDecoder, HeaderEncoder, HeaderField, HeadersFrame, PingFrame, PriorityFrame,
    PriorityParam, PushPromiseFrame, RstStreamFrame, Setting, SettingId, SettingsFrame,
    WindowUpdateFrame,
};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::config::Config;
use crate::error::TestError;
use crate::event::{Event, EventKind};
use crate::helpers;
use crate::transport;

/// Which side of the connection the engine plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The engine dialed a server and speaks first.
    Client,
    /// The engine accepted a connection from the client under test.
    Server,
}

/// A request read from the client under test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub stream_id: u32,
    pub headers: Vec<HeaderField>,
}

impl Request {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|field| field.name == name)
            .map(|field| field.value.as_str())
    }
}

enum ReadError {
    Io(io::Error),
    Frame(FrameError),
}

pub struct Conn {
    reader: Box<dyn AsyncRead + Unpin + Send>,
    writer: Box<dyn AsyncWrite + Unpin + Send>,
    role: Role,
    /// Parameters the peer announced during the handshake.
    settings: HashMap<SettingId, u32>,
    timeout: Duration,
    verbose: bool,
    closed: bool,
    /// Replenish receive windows automatically as DATA arrives.
    window_update: bool,
    windows: HashMap<u32, i64>,
    encoder: HeaderEncoder,
    decoder: HeaderDecoder,
    local_addr: Option<SocketAddr>,
}

impl fmt::Debug for Conn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Conn")
            .field("role", &self.role)
            .field("closed", &self.closed)
            .field("settings", &self.settings)
            .field("local_addr", &self.local_addr)
            .finish_non_exhaustive()
    }
}

impl Conn {
    /// Wrap an established stream.
    pub fn new<S>(stream: S, role: Role, config: &Config) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        Self {
            reader: Box::new(reader),
            writer: Box::new(writer),
            role,
            settings: HashMap::new(),
            timeout: config.timeout,
            verbose: config.verbose,
            closed: false,
            window_update: true,
            windows: HashMap::new(),
            encoder: HeaderEncoder::new(),
            decoder: HeaderDecoder::new(),
            local_addr: None,
        }
    }

    /// Dial the configured target and wrap the result as a client connection.
    pub async fn dial(config: &Config) -> io::Result<Self> {
        let (stream, local_addr) = transport::connect(config).await?;
        let mut conn = Self::new(stream, Role::Client, config);
        conn.local_addr = Some(local_addr);
        Ok(conn)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn set_local_addr(&mut self, addr: SocketAddr) {
        self.local_addr = Some(addr);
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Turn automatic WINDOW_UPDATE on received DATA on or off.
    pub fn set_window_update(&mut self, enabled: bool) {
        self.window_update = enabled;
    }

    pub fn settings(&self) -> &HashMap<SettingId, u32> {
        &self.settings
    }

    pub fn setting(&self, id: SettingId) -> Option<u32> {
        self.settings.get(&id).copied()
    }

    /// The peer's SETTINGS_MAX_FRAME_SIZE, or the protocol default.
    pub fn max_frame_size(&self) -> u32 {
        self.setting(SettingId::MAX_FRAME_SIZE)
            .unwrap_or(DEFAULT_MAX_FRAME_SIZE)
    }

    // =========================================================================
    // Handshake
    // =========================================================================

    /// Exchange the connection preface and SETTINGS with the peer.
    ///
    /// As a client this completes once the peer's SETTINGS has been received
    /// and acknowledged and the peer has acknowledged ours. As a server it
    /// completes as soon as the client's SETTINGS is answered: clients may
    /// pipeline WINDOW_UPDATE and their request ahead of the ACK, and those
    /// frames are left for [`read_request`](Self::read_request). The whole
    /// exchange shares one deadline.
    pub async fn handshake(&mut self) -> Result<(), TestError> {
        let timeout = self.timeout;
        let exchange = async {
            match self.role {
                Role::Client => self.client_handshake().await,
                Role::Server => self.server_handshake().await,
            }
        };
        match tokio::time::timeout(timeout, exchange).await {
            Ok(result) => result,
            Err(_) => {
                self.closed = true;
                Err(TestError::Timeout)
            }
        }
    }

    async fn client_handshake(&mut self) -> Result<(), TestError> {
        self.send(CLIENT_PREFACE).await?;
        self.write_local_settings().await?;

        let (mut local_acked, mut remote_seen) = (false, false);
        while !(local_acked && remote_seen) {
            let settings = self.read_handshake_settings().await?;
            if settings.is_ack() {
                local_acked = true;
            } else {
                remote_seen = true;
                self.apply_remote_settings(&settings).await?;
            }
        }
        Ok(())
    }

    async fn server_handshake(&mut self) -> Result<(), TestError> {
        self.read_client_preface().await?;
        let settings = self.read_handshake_settings().await?;
        self.write_local_settings().await?;
        if !settings.is_ack() {
            self.apply_remote_settings(&settings).await?;
        }
        Ok(())
    }

    async fn write_local_settings(&mut self) -> io::Result<()> {
        self.write_settings(&[Setting::new(
            SettingId::INITIAL_WINDOW_SIZE,
            DEFAULT_WINDOW_SIZE,
        )])
        .await
    }

    /// Record the peer's parameters and acknowledge them.
    async fn apply_remote_settings(&mut self, settings: &SettingsFrame) -> io::Result<()> {
        for setting in &settings.settings {
            self.settings.insert(setting.id, setting.value);
        }
        self.write_settings_ack().await
    }

    /// Read the next frame of the handshake, which has to be SETTINGS.
    async fn read_handshake_settings(&mut self) -> Result<SettingsFrame, TestError> {
        let frame = match read_frame(&mut self.reader).await {
            Ok(frame) => frame,
            Err(ReadError::Io(e)) => {
                self.closed = true;
                return Err(TestError::Handshake(format!(
                    "connection lost during SETTINGS exchange: {e}"
                )));
            }
            Err(ReadError::Frame(e)) => return Err(TestError::Frame(e)),
        };
        self.trace("recv", &frame);
        match frame {
            Frame::Settings(settings) => Ok(settings),
            other => Err(TestError::Handshake(format!(
                "expected SETTINGS, got {other}"
            ))),
        }
    }

    /// Read and check the 24-octet client preface.
    pub async fn read_client_preface(&mut self) -> Result<(), TestError> {
        let mut preface = [0u8; 24];
        self.reader.read_exact(&mut preface).await?;
        self.trace("recv", format_args!("Connection Preface ({})", preface.escape_ascii()));
        if preface[..] != *CLIENT_PREFACE {
            return Err(TestError::Handshake(
                "invalid client connection preface".to_string(),
            ));
        }
        Ok(())
    }

    // =========================================================================
    // Writing
    // =========================================================================

    /// Write raw bytes, bypassing the frame codec entirely.
    pub async fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.trace(
            "send",
            format_args!("Raw Data ({} octets: {})", bytes.len(), bytes.escape_ascii()),
        );
        self.write_bytes(bytes).await
    }

    pub async fn write_frame(&mut self, frame: impl Into<Frame>) -> io::Result<()> {
        let frame = frame.into();
        let mut buf = BytesMut::new();
        frame.encode(&mut buf);
        self.trace("send", &frame);
        self.write_bytes(&buf).await
    }

    /// Write a frame header of any type and flags followed by `payload`.
    /// The length field is the payload length.
    pub async fn write_raw_frame(
        &mut self,
        kind: FrameType,
        flags: u8,
        stream_id: u32,
        payload: &[u8],
    ) -> io::Result<()> {
        let header = FrameHeader {
            length: payload.len() as u32,
            kind,
            flags,
            stream_id,
        };
        let mut buf = BytesMut::with_capacity(FRAME_HEADER_LEN + payload.len());
        header.encode(&mut buf);
        buf.extend_from_slice(payload);
        self.trace("send", &header);
        self.write_bytes(&buf).await
    }

    pub async fn write_data(
        &mut self,
        stream_id: u32,
        end_stream: bool,
        data: impl Into<Bytes>,
    ) -> io::Result<()> {
        self.write_frame(DataFrame::new(stream_id, end_stream, data))
            .await
    }

    pub async fn write_data_padded(
        &mut self,
        stream_id: u32,
        end_stream: bool,
        data: impl Into<Bytes>,
        pad_len: u8,
    ) -> io::Result<()> {
        self.write_frame(DataFrame::new(stream_id, end_stream, data).with_padding(pad_len))
            .await
    }

    pub async fn write_headers(&mut self, frame: HeadersFrame) -> io::Result<()> {
        self.write_frame(frame).await
    }

    pub async fn write_priority(
        &mut self,
        stream_id: u32,
        priority: PriorityParam,
    ) -> io::Result<()> {
        self.write_frame(PriorityFrame::new(stream_id, priority))
            .await
    }

    pub async fn write_rst_stream(&mut self, stream_id: u32, code: ErrorCode) -> io::Result<()> {
        self.write_frame(RstStreamFrame::new(stream_id, code)).await
    }

    pub async fn write_settings(&mut self, settings: &[Setting]) -> io::Result<()> {
        self.write_frame(SettingsFrame::new(settings.to_vec()))
            .await
    }

    pub async fn write_settings_ack(&mut self) -> io::Result<()> {
        self.write_frame(SettingsFrame::ack()).await
    }

    pub async fn write_push_promise(&mut self, frame: PushPromiseFrame) -> io::Result<()> {
        self.write_frame(frame).await
    }

    pub async fn write_ping(&mut self, ack: bool, data: [u8; 8]) -> io::Result<()> {
        self.write_frame(PingFrame::new(ack, data)).await
    }

    pub async fn write_goaway(
        &mut self,
        last_stream_id: u32,
        code: ErrorCode,
        debug_data: &[u8],
    ) -> io::Result<()> {
        self.write_frame(GoAwayFrame::new(
            last_stream_id,
            code,
            Bytes::copy_from_slice(debug_data),
        ))
        .await
    }

    pub async fn write_window_update(&mut self, stream_id: u32, increment: u32) -> io::Result<()> {
        self.write_frame(WindowUpdateFrame::new(stream_id, increment))
            .await
    }

    pub async fn write_continuation(
        &mut self,
        stream_id: u32,
        end_headers: bool,
        block_fragment: impl Into<Bytes>,
    ) -> io::Result<()> {
        self.write_frame(ContinuationFrame::new(stream_id, end_headers, block_fragment))
            .await
    }

    /// Answer `stream_id` with a 200 response and a short body.
    pub async fn write_success_response(&mut self, stream_id: u32) -> io::Result<()> {
        let block = self.encode_headers(&helpers::common_resp_headers());
        self.write_headers(HeadersFrame::new(stream_id, block, false, true))
            .await?;
        self.write_data(stream_id, true, Bytes::from_static(b"success"))
            .await
    }

    async fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        let result = async {
            self.writer.write_all(bytes).await?;
            self.writer.flush().await
        }
        .await;
        match result {
            // The peer hanging up is reported by the next read, not here.
            Err(e) if is_disconnect(&e) => {
                debug!(error = %e, "write after peer closed the connection");
                Ok(())
            }
            other => other,
        }
    }

    // =========================================================================
    // Header compression
    // =========================================================================

    /// HPACK-encode `fields` with this connection's encoder state.
    pub fn encode_headers(&mut self, fields: &[HeaderField]) -> Vec<u8> {
        self.encoder.encode(fields)
    }

    /// Shrink or grow the encoder's dynamic table. The next header block
    /// written opens with the matching size update.
    pub fn set_max_dynamic_table_size(&mut self, size: u32) {
        self.encoder.set_max_table_size(size as usize);
    }

    /// HPACK-decode one complete header block with this connection's
    /// decoder state.
    pub fn decode_headers(&mut self, block: &[u8]) -> Result<Vec<HeaderField>, FrameError> {
        self.decoder.decode(block)
    }

    // =========================================================================
    // Reading
    // =========================================================================

    /// Wait for the next event, for at most the configured timeout.
    ///
    /// End of stream, reset and timeout mark the connection closed. A frame
    /// that fails to parse does not.
    pub async fn wait_event(&mut self) -> Event {
        let read = tokio::time::timeout(self.timeout, read_frame(&mut self.reader)).await;
        let event = match read {
            Err(_) => {
                self.closed = true;
                Event::Timeout
            }
            Ok(Ok(frame)) => {
                if let Frame::Data(data) = &frame {
                    let (stream_id, length) = (data.header.stream_id, data.header.length);
                    self.consume_window(stream_id, length).await;
                }
                Event::Frame(frame)
            }
            Ok(Err(ReadError::Frame(e))) => Event::Error(e.to_string()),
            Ok(Err(ReadError::Io(e))) if is_disconnect(&e) => {
                self.closed = true;
                Event::ConnectionClosed
            }
            Ok(Err(ReadError::Io(e))) => {
                // A partial read leaves the stream out of frame sync.
                self.closed = true;
                Event::Error(e.to_string())
            }
        };
        self.trace("recv", &event);
        event
    }

    /// Keep waiting until an event of `kind` arrives.
    ///
    /// Returns the matching event, or the last event seen when the
    /// connection closes first. A trailing timeout does not replace a more
    /// specific earlier event.
    pub async fn wait_event_by_type(&mut self, kind: EventKind) -> Result<Event, Option<Event>> {
        let mut last = None;
        while !self.closed {
            let event = self.wait_event().await;
            if event.kind() == kind {
                return Ok(event);
            }
            if event == Event::Timeout && last.is_some() {
                break;
            }
            last = Some(event);
        }
        Err(last)
    }

    /// Read the first request of the client under test: one HEADERS frame
    /// plus any CONTINUATION frames, decoded.
    pub async fn read_request(&mut self) -> Result<Request, TestError> {
        let mut stream_id = None;
        let mut block = Vec::new();
        loop {
            let frame = match self.wait_event().await {
                Event::Frame(frame) => frame,
                other => {
                    return Err(TestError::Protocol(format!(
                        "no request received ({other})"
                    )));
                }
            };
            let done = match frame {
                Frame::Headers(headers) if stream_id.is_none() => {
                    stream_id = Some(headers.header.stream_id);
                    block.extend_from_slice(&headers.block_fragment);
                    headers.headers_ended()
                }
                Frame::Continuation(cont) if stream_id == Some(cont.header.stream_id) => {
                    block.extend_from_slice(&cont.block_fragment);
                    cont.headers_ended()
                }
                frame @ (Frame::Headers(_) | Frame::Continuation(_)) => {
                    return Err(TestError::Protocol(format!(
                        "unexpected {frame} while reading a header block"
                    )));
                }
                _ => false,
            };
            if done {
                break;
            }
        }

        let headers = self.decode_headers(&block)?;
        Ok(Request {
            stream_id: stream_id.unwrap_or_default(),
            headers,
        })
    }

    async fn consume_window(&mut self, stream_id: u32, length: u32) {
        if !self.window_update || length == 0 {
            return;
        }
        let default = i64::from(DEFAULT_WINDOW_SIZE);
        for id in [0, stream_id] {
            let window = self.windows.entry(id).or_insert(default);
            *window -= i64::from(length);
            if *window > 0 {
                continue;
            }
            let increment = default - *window;
            *window = default;
            if let Err(e) = self.write_window_update(id, increment as u32).await {
                debug!(error = %e, stream_id = id, "failed to replenish window");
            }
        }
    }

    /// Shut down the write half. Reads after this return whatever is left.
    pub async fn close(&mut self) {
        if let Err(e) = self.writer.shutdown().await {
            debug!(error = %e, "shutdown failed");
        }
        self.closed = true;
    }

    fn trace(&self, direction: &str, what: impl fmt::Display) {
        if self.verbose {
            debug!("[{direction}] {what}");
        }
    }
}

async fn read_frame<R>(reader: &mut R) -> Result<Frame, ReadError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut head = [0u8; FRAME_HEADER_LEN];
    reader.read_exact(&mut head).await.map_err(ReadError::Io)?;
    let header = FrameHeader::parse(&head);

    let mut payload = vec![0u8; header.length as usize];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(ReadError::Io)?;

    Frame::parse(header, Bytes::from(payload)).map_err(ReadError::Frame)
}

fn is_disconnect(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
    )
}
