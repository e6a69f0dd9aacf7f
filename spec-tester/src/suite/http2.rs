//! Scenarios that probe an HTTP/2 server (RFC 7540).

use futures::FutureExt;
use futures::future::BoxFuture;
use h2probe_wire::{
    CLIENT_PREFACE, DEFAULT_WINDOW_SIZE, ErrorCode, Frame, FrameType, HeadersFrame, Setting,
    SettingId, flags,
};

use crate::config::Config;
use crate::connection::Conn;
use crate::error::TestError;
use crate::event::{Event, EventKind};
use crate::group::{GroupBuilder, Spec};
use crate::helpers;
use crate::runner::{ServerScenario, ServerSpec};
use crate::verifier;

pub const KEY: &str = "http2";

type Group = GroupBuilder<ServerScenario>;
type Check<'a> = BoxFuture<'a, Result<(), TestError>>;

const PING_DATA: [u8; 8] = *b"h2probe\0";

pub fn spec() -> ServerSpec {
    let mut root = Group::root("Hypertext Transfer Protocol Version 2 (HTTP/2)");

    let mut starting = Group::new("3", "Starting HTTP/2");
    starting.add_test_group(connection_preface());
    root.add_test_group(starting);

    let mut frames = Group::new("4", "HTTP Frames");
    frames.add_test_group(frame_size());
    root.add_test_group(frames);

    let mut streams = Group::new("5", "Streams and Multiplexing");
    streams.add_test_group(stream_states());
    root.add_test_group(streams);

    let mut definitions = Group::new("6", "Frame Definitions");
    definitions.add_test_group(settings());
    definitions.add_test_group(ping());
    definitions.add_test_group(goaway());
    let mut window_update = Group::new("6.9", "WINDOW_UPDATE");
    window_update.add_test_group(flow_control_window());
    definitions.add_test_group(window_update);
    root.add_test_group(definitions);

    Spec::build(KEY, root)
}

/// HEADERS opening `stream_id` for a POST, so DATA may follow.
fn post_headers(config: &Config, conn: &mut Conn, stream_id: u32) -> HeadersFrame {
    let mut headers = helpers::common_headers(config);
    headers[0].value = "POST".to_string();
    HeadersFrame::new(stream_id, conn.encode_headers(&headers), false, true)
}

/// HEADERS for a complete GET on `stream_id`.
fn get_headers(config: &Config, conn: &mut Conn, stream_id: u32, end_stream: bool) -> HeadersFrame {
    let block = conn.encode_headers(&helpers::common_headers(config));
    HeadersFrame::new(stream_id, block, end_stream, true)
}

// =============================================================================
// 3.5 HTTP/2 Connection Preface
// =============================================================================

fn connection_preface() -> Group {
    let mut group = Group::new("3.5", "HTTP/2 Connection Preface");
    group.add_test_case(
        "Sends client connection preface",
        "The server connection preface MUST be the first frame the server sends in the HTTP/2 connection.",
        sends_client_preface,
    );
    group.add_test_case(
        "Sends invalid connection preface",
        "The endpoint MUST terminate the TCP connection.",
        sends_invalid_preface,
    );
    group
}

fn sends_client_preface<'a>(_config: &'a Config, conn: &'a mut Conn) -> Check<'a> {
    async move {
        conn.send(CLIENT_PREFACE).await?;
        conn.write_settings(&[Setting::new(
            SettingId::INITIAL_WINDOW_SIZE,
            DEFAULT_WINDOW_SIZE,
        )])
        .await?;
        verifier::verify_event_type(conn, EventKind::SettingsFrame).await
    }
    .boxed()
}

fn sends_invalid_preface<'a>(_config: &'a Config, conn: &'a mut Conn) -> Check<'a> {
    async move {
        conn.send(b"INVALID CONNECTION PREFACE\r\n\r\n").await?;
        // Nothing was negotiated, so only a close counts.
        verifier::verify_connection_close(conn).await
    }
    .boxed()
}

// =============================================================================
// 4.2 Frame Size
// =============================================================================

fn frame_size() -> Group {
    let mut group = Group::new("4.2", "Frame Size");
    group.add_test_case(
        "Sends a DATA frame with 2^14 octets in length",
        "The endpoint MUST be capable of receiving and minimally processing frames up to 2^14 octets in length.",
        data_at_max_frame_size,
    );
    group.add_test_case(
        "Sends a large size DATA frame that exceeds the SETTINGS_MAX_FRAME_SIZE",
        "The endpoint MUST send an error code of FRAME_SIZE_ERROR.",
        data_above_max_frame_size,
    );
    group.add_test_case(
        "Sends a large size HEADERS frame that exceeds the SETTINGS_MAX_FRAME_SIZE",
        "The endpoint MUST respond with a connection error of type FRAME_SIZE_ERROR.",
        headers_above_max_frame_size,
    );
    group
}

fn data_at_max_frame_size<'a>(config: &'a Config, conn: &'a mut Conn) -> Check<'a> {
    async move {
        conn.handshake().await?;
        let headers = post_headers(config, conn, 1);
        conn.write_headers(headers).await?;
        let data = helpers::dummy_bytes(conn.max_frame_size() as usize);
        conn.write_data(1, true, data).await?;
        verifier::verify_headers_frame(conn, 1).await
    }
    .boxed()
}

fn data_above_max_frame_size<'a>(config: &'a Config, conn: &'a mut Conn) -> Check<'a> {
    async move {
        conn.handshake().await?;
        let headers = post_headers(config, conn, 1);
        conn.write_headers(headers).await?;
        let data = helpers::dummy_bytes(conn.max_frame_size() as usize + 1);
        conn.write_data(1, true, data).await?;
        verifier::verify_stream_error(conn, &[ErrorCode::FRAME_SIZE_ERROR]).await
    }
    .boxed()
}

fn headers_above_max_frame_size<'a>(config: &'a Config, conn: &'a mut Conn) -> Check<'a> {
    async move {
        conn.handshake().await?;
        let mut headers = helpers::common_headers(config);
        headers.extend(helpers::dummy_headers(config, 5));
        let block = conn.encode_headers(&headers);
        conn.write_headers(HeadersFrame::new(1, block, true, true))
            .await?;
        verifier::verify_connection_error(conn, &[ErrorCode::FRAME_SIZE_ERROR]).await
    }
    .boxed()
}

// =============================================================================
// 5.1 Stream States
// =============================================================================

fn stream_states() -> Group {
    const IDLE: &str = "The endpoint MUST treat this as a connection error of type PROTOCOL_ERROR.";
    const HALF_CLOSED: &str =
        "The endpoint MUST respond with a stream error of type STREAM_CLOSED.";
    const CLOSED: &str = "The endpoint MUST treat this as a stream error of type STREAM_CLOSED.";

    let mut group = Group::new("5.1", "Stream States");
    group.add_test_case("idle: Sends a DATA frame", IDLE, idle_data);
    group.add_test_case("idle: Sends a RST_STREAM frame", IDLE, idle_rst_stream);
    group.add_test_case("idle: Sends a WINDOW_UPDATE frame", IDLE, idle_window_update);
    group.add_test_case("idle: Sends a CONTINUATION frame", IDLE, idle_continuation);
    group.add_test_case(
        "half closed (remote): Sends a DATA frame",
        HALF_CLOSED,
        half_closed_data,
    );
    group.add_test_case(
        "half closed (remote): Sends a HEADERS frame",
        HALF_CLOSED,
        half_closed_headers,
    );
    group.add_test_case(
        "half closed (remote): Sends a CONTINUATION frame",
        HALF_CLOSED,
        half_closed_continuation,
    );
    group.add_test_case(
        "closed: Sends a DATA frame after sending RST_STREAM frame",
        CLOSED,
        closed_data,
    );
    group
}

fn idle_data<'a>(_config: &'a Config, conn: &'a mut Conn) -> Check<'a> {
    async move {
        conn.handshake().await?;
        conn.write_data(1, true, &b"test"[..]).await?;
        verifier::verify_connection_error(conn, &[ErrorCode::PROTOCOL_ERROR]).await
    }
    .boxed()
}

fn idle_rst_stream<'a>(_config: &'a Config, conn: &'a mut Conn) -> Check<'a> {
    async move {
        conn.handshake().await?;
        conn.write_rst_stream(1, ErrorCode::CANCEL).await?;
        verifier::verify_connection_error(conn, &[ErrorCode::PROTOCOL_ERROR]).await
    }
    .boxed()
}

fn idle_window_update<'a>(_config: &'a Config, conn: &'a mut Conn) -> Check<'a> {
    async move {
        conn.handshake().await?;
        conn.write_window_update(1, 100).await?;
        verifier::verify_connection_error(conn, &[ErrorCode::PROTOCOL_ERROR]).await
    }
    .boxed()
}

fn idle_continuation<'a>(config: &'a Config, conn: &'a mut Conn) -> Check<'a> {
    async move {
        conn.handshake().await?;
        let block = conn.encode_headers(&helpers::common_headers(config));
        conn.write_continuation(1, true, block).await?;
        verifier::verify_connection_error(conn, &[ErrorCode::PROTOCOL_ERROR]).await
    }
    .boxed()
}

fn half_closed_data<'a>(config: &'a Config, conn: &'a mut Conn) -> Check<'a> {
    async move {
        conn.handshake().await?;
        let headers = get_headers(config, conn, 1, true);
        conn.write_headers(headers).await?;
        conn.write_data(1, true, &b"test"[..]).await?;
        verifier::verify_stream_error(conn, &[ErrorCode::STREAM_CLOSED]).await
    }
    .boxed()
}

fn half_closed_headers<'a>(config: &'a Config, conn: &'a mut Conn) -> Check<'a> {
    async move {
        conn.handshake().await?;
        let first = get_headers(config, conn, 1, true);
        conn.write_headers(first).await?;
        let second = get_headers(config, conn, 1, true);
        conn.write_headers(second).await?;
        verifier::verify_stream_error(conn, &[ErrorCode::STREAM_CLOSED]).await
    }
    .boxed()
}

fn half_closed_continuation<'a>(config: &'a Config, conn: &'a mut Conn) -> Check<'a> {
    async move {
        conn.handshake().await?;
        let block = conn.encode_headers(&helpers::common_headers(config));
        conn.write_headers(HeadersFrame::new(1, block.clone(), true, true))
            .await?;
        conn.write_continuation(1, true, block).await?;
        verifier::verify_stream_error(
            conn,
            &[ErrorCode::STREAM_CLOSED, ErrorCode::PROTOCOL_ERROR],
        )
        .await
    }
    .boxed()
}

fn closed_data<'a>(config: &'a Config, conn: &'a mut Conn) -> Check<'a> {
    async move {
        conn.handshake().await?;
        let headers = get_headers(config, conn, 1, false);
        conn.write_headers(headers).await?;
        conn.write_rst_stream(1, ErrorCode::CANCEL).await?;
        conn.write_data(1, true, &b"test"[..]).await?;
        verifier::verify_stream_error(conn, &[ErrorCode::STREAM_CLOSED]).await
    }
    .boxed()
}

// =============================================================================
// 6.5 SETTINGS
// =============================================================================

fn settings() -> Group {
    let mut group = Group::new("6.5", "SETTINGS");
    group.add_test_case(
        "Sends a SETTINGS frame",
        "The endpoint MUST sends a SETTINGS frame with ACK.",
        settings_acked,
    );
    group.add_test_case(
        "Sends a SETTINGS frame with ACK flag and payload",
        "The endpoint MUST respond with a connection error of type FRAME_SIZE_ERROR.",
        settings_ack_with_payload,
    );
    group.add_test_case(
        "Sends a SETTINGS frame with a stream identifier other than 0x0",
        "The endpoint MUST respond with a connection error of type PROTOCOL_ERROR.",
        settings_on_stream,
    );
    group.add_test_case(
        "Sends a SETTINGS frame with a length other than a multiple of 6 octets",
        "The endpoint MUST respond with a connection error of type FRAME_SIZE_ERROR.",
        settings_bad_length,
    );
    group
}

fn settings_acked<'a>(_config: &'a Config, conn: &'a mut Conn) -> Check<'a> {
    async move {
        conn.handshake().await?;
        conn.write_settings(&[Setting::new(SettingId::MAX_CONCURRENT_STREAMS, 100)])
            .await?;
        verifier::verify_settings_frame_with_ack(conn).await
    }
    .boxed()
}

fn settings_ack_with_payload<'a>(_config: &'a Config, conn: &'a mut Conn) -> Check<'a> {
    async move {
        conn.handshake().await?;
        conn.write_raw_frame(FrameType::SETTINGS, flags::ACK, 0, &[0x00])
            .await?;
        verifier::verify_connection_error(conn, &[ErrorCode::FRAME_SIZE_ERROR]).await
    }
    .boxed()
}

fn settings_on_stream<'a>(_config: &'a Config, conn: &'a mut Conn) -> Check<'a> {
    async move {
        conn.handshake().await?;
        // SETTINGS_MAX_CONCURRENT_STREAMS = 100 on stream 1.
        conn.write_raw_frame(FrameType::SETTINGS, 0, 1, &[0x00, 0x03, 0x00, 0x00, 0x00, 0x64])
            .await?;
        verifier::verify_connection_error(conn, &[ErrorCode::PROTOCOL_ERROR]).await
    }
    .boxed()
}

fn settings_bad_length<'a>(_config: &'a Config, conn: &'a mut Conn) -> Check<'a> {
    async move {
        conn.handshake().await?;
        conn.write_raw_frame(FrameType::SETTINGS, 0, 0, &[0x00, 0x03, 0x00])
            .await?;
        verifier::verify_connection_error(conn, &[ErrorCode::FRAME_SIZE_ERROR]).await
    }
    .boxed()
}

// =============================================================================
// 6.7 PING
// =============================================================================

fn ping() -> Group {
    let mut group = Group::new("6.7", "PING");
    group.add_test_case(
        "Sends a PING frame",
        "The endpoint MUST sends a PING frame with ACK, with an identical payload.",
        ping_acked,
    );
    group.add_test_case(
        "Sends a PING frame with ACK",
        "The endpoint MUST NOT respond to PING frames with ACK.",
        ping_ack_ignored,
    );
    group.add_test_case(
        "Sends a PING frame with a stream identifier field value other than 0x0",
        "The endpoint MUST respond with a connection error of type PROTOCOL_ERROR.",
        ping_on_stream,
    );
    group.add_test_case(
        "Sends a PING frame with a length field value other than 8",
        "The endpoint MUST treat this as a connection error of type FRAME_SIZE_ERROR.",
        ping_bad_length,
    );
    group
}

fn ping_acked<'a>(_config: &'a Config, conn: &'a mut Conn) -> Check<'a> {
    async move {
        conn.handshake().await?;
        conn.write_ping(false, PING_DATA).await?;
        verifier::verify_ping_frame_with_ack(conn, PING_DATA).await
    }
    .boxed()
}

fn ping_ack_ignored<'a>(_config: &'a Config, conn: &'a mut Conn) -> Check<'a> {
    async move {
        conn.handshake().await?;
        conn.write_ping(true, *b"invalid\0").await?;
        conn.write_ping(false, PING_DATA).await?;
        verifier::verify_ping_frame_with_ack(conn, PING_DATA).await
    }
    .boxed()
}

fn ping_on_stream<'a>(_config: &'a Config, conn: &'a mut Conn) -> Check<'a> {
    async move {
        conn.handshake().await?;
        conn.write_raw_frame(FrameType::PING, 0, 1, &[0; 8]).await?;
        verifier::verify_connection_error(conn, &[ErrorCode::PROTOCOL_ERROR]).await
    }
    .boxed()
}

fn ping_bad_length<'a>(_config: &'a Config, conn: &'a mut Conn) -> Check<'a> {
    async move {
        conn.handshake().await?;
        conn.write_raw_frame(FrameType::PING, 0, 0, &[0; 6]).await?;
        verifier::verify_connection_error(conn, &[ErrorCode::FRAME_SIZE_ERROR]).await
    }
    .boxed()
}

// =============================================================================
// 6.8 GOAWAY
// =============================================================================

fn goaway() -> Group {
    let mut group = Group::new("6.8", "GOAWAY");
    group.add_test_case(
        "Sends a GOAWAY frame with a stream identifier other than 0x0",
        "The endpoint MUST treat this as a connection error of type PROTOCOL_ERROR.",
        goaway_on_stream,
    );
    group.add_strict_test_case(
        "Sends an invalid PING frame to receive GOAWAY frame",
        "An endpoint that encounters a connection error SHOULD first send a GOAWAY frame.",
        goaway_before_close,
    );
    group
}

fn goaway_on_stream<'a>(_config: &'a Config, conn: &'a mut Conn) -> Check<'a> {
    async move {
        conn.handshake().await?;
        conn.write_raw_frame(FrameType::GOAWAY, 0, 1, &[0; 8]).await?;
        verifier::verify_connection_error(conn, &[ErrorCode::PROTOCOL_ERROR]).await
    }
    .boxed()
}

fn goaway_before_close<'a>(_config: &'a Config, conn: &'a mut Conn) -> Check<'a> {
    async move {
        conn.handshake().await?;
        conn.write_raw_frame(FrameType::PING, 0, 0, &[0; 6]).await?;
        verifier::verify_event_type(conn, EventKind::GoAwayFrame).await
    }
    .boxed()
}

// =============================================================================
// 6.9.1 The Flow-Control Window
// =============================================================================

fn flow_control_window() -> Group {
    let mut group = Group::new("6.9.1", "The Flow-Control Window");
    group.add_test_case(
        "Sends SETTINGS frame to set the initial window size to 1 and sends HEADERS frame",
        "The endpoint MUST NOT send a flow-controlled frame with a length that exceeds the space available.",
        initial_window_of_one,
    );
    group.add_test_case(
        "Sends multiple WINDOW_UPDATE frames increasing the flow control window to above 2^31-1",
        "The endpoint MUST sends a GOAWAY frame with a FLOW_CONTROL_ERROR code.",
        connection_window_overflow,
    );
    group.add_test_case(
        "Sends multiple WINDOW_UPDATE frames increasing the flow control window to above 2^31-1 on a stream",
        "The endpoint MUST sends a RST_STREAM frame with a FLOW_CONTROL_ERROR code.",
        stream_window_overflow,
    );
    group
}

const MAX_WINDOW_INCREMENT: u32 = 0x7fff_ffff;

fn initial_window_of_one<'a>(config: &'a Config, conn: &'a mut Conn) -> Check<'a> {
    async move {
        // Only meaningful when the response has a body.
        if helpers::server_data_length(config).await? < 1 {
            return Err(TestError::Skipped);
        }

        conn.handshake().await?;
        conn.write_settings(&[Setting::new(SettingId::INITIAL_WINDOW_SIZE, 1)])
            .await?;
        verifier::verify_settings_frame_with_ack(conn).await?;

        let headers = get_headers(config, conn, 1, true);
        conn.write_headers(headers).await?;

        let actual = match conn.wait_event_by_type(EventKind::DataFrame).await {
            Ok(Event::Frame(Frame::Data(data))) if data.header.length == 1 => return Ok(()),
            Ok(event) => Some(event),
            Err(last) => last,
        };
        Err(verifier::mismatch(
            vec!["DATA Frame (length:1, flags:0x00, stream_id:1)".to_string()],
            actual,
        ))
    }
    .boxed()
}

fn connection_window_overflow<'a>(_config: &'a Config, conn: &'a mut Conn) -> Check<'a> {
    async move {
        conn.handshake().await?;
        conn.write_window_update(0, MAX_WINDOW_INCREMENT).await?;
        conn.write_window_update(0, MAX_WINDOW_INCREMENT).await?;

        let actual = match conn.wait_event_by_type(EventKind::GoAwayFrame).await {
            Ok(Event::Frame(Frame::GoAway(goaway)))
                if goaway.error_code == ErrorCode::FLOW_CONTROL_ERROR =>
            {
                return Ok(());
            }
            Ok(event) => Some(event),
            Err(last) => last,
        };
        Err(verifier::mismatch(
            vec![format!(
                "GOAWAY Frame (Error Code: {})",
                ErrorCode::FLOW_CONTROL_ERROR
            )],
            actual,
        ))
    }
    .boxed()
}

fn stream_window_overflow<'a>(config: &'a Config, conn: &'a mut Conn) -> Check<'a> {
    async move {
        conn.handshake().await?;
        let headers = get_headers(config, conn, 1, false);
        conn.write_headers(headers).await?;
        conn.write_window_update(1, MAX_WINDOW_INCREMENT).await?;
        conn.write_window_update(1, MAX_WINDOW_INCREMENT).await?;

        let actual = match conn.wait_event_by_type(EventKind::RstStreamFrame).await {
            Ok(Event::Frame(Frame::RstStream(rst)))
                if rst.header.stream_id == 1
                    && rst.error_code == ErrorCode::FLOW_CONTROL_ERROR =>
            {
                return Ok(());
            }
            Ok(event) => Some(event),
            Err(last) => last,
        };
        Err(verifier::mismatch(
            vec![format!(
                "RST_STREAM Frame (Error Code: {})",
                ErrorCode::FLOW_CONTROL_ERROR
            )],
            actual,
        ))
    }
    .boxed()
}
