//! Assertions over the live event stream.
//!
//! Every verifier reads events until it sees one it accepts, or until the
//! connection is marked closed. On failure it reports every condition it
//! would have accepted plus the most telling event it saw instead: the
//! latest non-accepted event, where a timeout only counts if nothing else
//! was seen.

use h2probe_wire::{ErrorCode, Frame};

use crate::connection::Conn;
use crate::error::{Mismatch, TestError};
use crate::event::{Event, EventKind};

pub const EXPECTED_CONNECTION_CLOSED: &str = "Connection closed";
pub const EXPECTED_STREAM_CLOSED: &str = "Stream closed";

fn expected_goaway(code: ErrorCode) -> String {
    format!("GOAWAY Frame (Error Code: {code})")
}

fn expected_rst_stream(code: ErrorCode) -> String {
    format!("RST_STREAM Frame (Error Code: {code})")
}

fn expected_ping_ack(data: &[u8; 8]) -> String {
    format!(
        "PING Frame (length:8, flags:0x01, stream_id:0, opaque_data:{})",
        data.escape_ascii()
    )
}

/// Build the failure for a condition that was not met. `None` means no event
/// was seen at all.
pub fn mismatch(expected: Vec<String>, actual: Option<Event>) -> TestError {
    TestError::Mismatch(Mismatch {
        expected,
        actual: match actual {
            Some(event) => event.to_string(),
            None => "No event".to_string(),
        },
    })
}

/// Read events until `accept` returns true or the connection closes.
async fn await_event<F>(conn: &mut Conn, mut accept: F) -> Result<(), Option<Event>>
where
    F: FnMut(&Event) -> bool,
{
    let mut actual = None;
    while !conn.is_closed() {
        let event = conn.wait_event().await;
        if accept(&event) {
            return Ok(());
        }
        if event == Event::Timeout && actual.is_some() {
            continue;
        }
        actual = Some(event);
    }
    Err(actual)
}

/// The peer closes the connection.
pub async fn verify_connection_close(conn: &mut Conn) -> Result<(), TestError> {
    await_event(conn, |event| *event == Event::ConnectionClosed)
        .await
        .map_err(|actual| mismatch(vec![EXPECTED_CONNECTION_CLOSED.to_string()], actual))
}

/// The peer sends GOAWAY with one of `codes`, or just closes.
pub async fn verify_connection_error(
    conn: &mut Conn,
    codes: &[ErrorCode],
) -> Result<(), TestError> {
    await_event(conn, |event| match event {
        Event::Frame(Frame::GoAway(goaway)) => codes.contains(&goaway.error_code),
        Event::ConnectionClosed => true,
        _ => false,
    })
    .await
    .map_err(|actual| {
        let mut expected: Vec<_> = codes.iter().map(|c| expected_goaway(*c)).collect();
        expected.push(EXPECTED_CONNECTION_CLOSED.to_string());
        mismatch(expected, actual)
    })
}

/// The peer resets the stream or the connection with one of `codes`, or
/// just closes.
pub async fn verify_stream_error(conn: &mut Conn, codes: &[ErrorCode]) -> Result<(), TestError> {
    await_event(conn, |event| match event {
        Event::Frame(Frame::GoAway(goaway)) => codes.contains(&goaway.error_code),
        Event::Frame(Frame::RstStream(rst)) => codes.contains(&rst.error_code),
        Event::ConnectionClosed => true,
        _ => false,
    })
    .await
    .map_err(|actual| {
        let mut expected = Vec::with_capacity(codes.len() * 2 + 1);
        for code in codes {
            expected.push(expected_goaway(*code));
            expected.push(expected_rst_stream(*code));
        }
        expected.push(EXPECTED_CONNECTION_CLOSED.to_string());
        mismatch(expected, actual)
    })
}

/// The peer ends its side of a stream: DATA or HEADERS with END_STREAM, or
/// RST_STREAM with NO_ERROR.
pub async fn verify_stream_close(conn: &mut Conn) -> Result<(), TestError> {
    await_event(conn, |event| match event {
        Event::Frame(Frame::Data(data)) => data.stream_ended(),
        Event::Frame(Frame::Headers(headers)) => headers.stream_ended(),
        Event::Frame(Frame::RstStream(rst)) => rst.error_code == ErrorCode::NO_ERROR,
        _ => false,
    })
    .await
    .map_err(|actual| mismatch(vec![EXPECTED_STREAM_CLOSED.to_string()], actual))
}

/// The next HEADERS frame is on `stream_id`.
pub async fn verify_headers_frame(conn: &mut Conn, stream_id: u32) -> Result<(), TestError> {
    let actual = match conn.wait_event_by_type(EventKind::HeadersFrame).await {
        Ok(Event::Frame(Frame::Headers(headers))) if headers.header.stream_id == stream_id => {
            return Ok(());
        }
        Ok(event) => Some(event),
        Err(last) => last,
    };
    Err(mismatch(
        vec![format!("HEADERS Frame (stream_id:{stream_id})")],
        actual,
    ))
}

/// The next SETTINGS frame is an acknowledgement.
pub async fn verify_settings_frame_with_ack(conn: &mut Conn) -> Result<(), TestError> {
    let actual = match conn.wait_event_by_type(EventKind::SettingsFrame).await {
        Ok(Event::Frame(Frame::Settings(settings))) if settings.is_ack() => return Ok(()),
        Ok(event) => Some(event),
        Err(last) => last,
    };
    Err(mismatch(
        vec!["SETTINGS Frame (length:0, flags:0x01, stream_id:0)".to_string()],
        actual,
    ))
}

/// The next PING frame acknowledges `data`.
pub async fn verify_ping_frame_with_ack(conn: &mut Conn, data: [u8; 8]) -> Result<(), TestError> {
    let actual = match conn.wait_event_by_type(EventKind::PingFrame).await {
        Ok(Event::Frame(Frame::Ping(ping))) if ping.is_ack() && ping.data == data => {
            return Ok(());
        }
        Ok(event) => Some(event),
        Err(last) => last,
    };
    Err(mismatch(vec![expected_ping_ack(&data)], actual))
}

/// The peer acknowledges a PING carrying `data`, or closes the connection.
pub async fn verify_ping_frame_or_connection_close(
    conn: &mut Conn,
    data: [u8; 8],
) -> Result<(), TestError> {
    await_event(conn, |event| match event {
        Event::Frame(Frame::Ping(ping)) => ping.is_ack() && ping.data == data,
        Event::ConnectionClosed => true,
        _ => false,
    })
    .await
    .map_err(|actual| {
        mismatch(
            vec![
                EXPECTED_CONNECTION_CLOSED.to_string(),
                expected_ping_ack(&data),
            ],
            actual,
        )
    })
}

/// An event of `kind` arrives before the connection closes.
pub async fn verify_event_type(conn: &mut Conn, kind: EventKind) -> Result<(), TestError> {
    match conn.wait_event_by_type(kind).await {
        Ok(_) => Ok(()),
        Err(last) => Err(mismatch(vec![kind.to_string()], last)),
    }
}
