//! Scenarios that probe an HTTP/2 client.
//!
//! By the time one of these runs, the harness has completed the handshake
//! with the client and read its first request.

use futures::FutureExt;
use futures::future::BoxFuture;
use h2probe_wire::{ErrorCode, FrameType, flags};

use crate::config::Config;
use crate::connection::{Conn, Request};
use crate::error::TestError;
use crate::group::{GroupBuilder, Spec};
use crate::server::{ClientScenario, ClientSpec};
use crate::verifier;

pub const KEY: &str = "client";

type Group = GroupBuilder<ClientScenario>;
type Check<'a> = BoxFuture<'a, Result<(), TestError>>;

const PING_DATA: [u8; 8] = *b"h2probe\0";

pub fn spec() -> ClientSpec {
    let mut root = Group::root("Generic tests for HTTP/2 client");
    let mut definitions = Group::new("6", "Frame Definitions");
    definitions.add_test_group(settings());
    definitions.add_test_group(ping());
    root.add_test_group(definitions);
    Spec::build(KEY, root)
}

// =============================================================================
// 6.5 SETTINGS
// =============================================================================

fn settings() -> Group {
    let mut group = Group::new("6.5", "SETTINGS");
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

fn settings_ack_with_payload<'a>(
    _config: &'a Config,
    conn: &'a mut Conn,
    _request: &'a Request,
) -> Check<'a> {
    async move {
        conn.write_raw_frame(FrameType::SETTINGS, flags::ACK, 0, &[0x00])
            .await?;
        verifier::verify_connection_error(conn, &[ErrorCode::FRAME_SIZE_ERROR]).await
    }
    .boxed()
}

fn settings_on_stream<'a>(
    _config: &'a Config,
    conn: &'a mut Conn,
    _request: &'a Request,
) -> Check<'a> {
    async move {
        conn.write_raw_frame(FrameType::SETTINGS, 0, 1, &[0x00, 0x03, 0x00, 0x00, 0x00, 0x64])
            .await?;
        verifier::verify_connection_error(conn, &[ErrorCode::PROTOCOL_ERROR]).await
    }
    .boxed()
}

fn settings_bad_length<'a>(
    _config: &'a Config,
    conn: &'a mut Conn,
    _request: &'a Request,
) -> Check<'a> {
    async move {
        conn.write_raw_frame(FrameType::SETTINGS, 0, 0, &[0x00, 0x03, 0x00])
            .await?;
        // Some clients report the malformed payload rather than its size.
        verifier::verify_connection_error(
            conn,
            &[ErrorCode::PROTOCOL_ERROR, ErrorCode::FRAME_SIZE_ERROR],
        )
        .await
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

fn ping_acked<'a>(_config: &'a Config, conn: &'a mut Conn, _request: &'a Request) -> Check<'a> {
    async move {
        conn.write_ping(false, PING_DATA).await?;
        verifier::verify_ping_frame_with_ack(conn, PING_DATA).await
    }
    .boxed()
}

fn ping_ack_ignored<'a>(
    _config: &'a Config,
    conn: &'a mut Conn,
    _request: &'a Request,
) -> Check<'a> {
    async move {
        conn.write_ping(true, *b"invalid\0").await?;
        conn.write_ping(false, PING_DATA).await?;
        verifier::verify_ping_frame_with_ack(conn, PING_DATA).await
    }
    .boxed()
}

fn ping_on_stream<'a>(
    _config: &'a Config,
    conn: &'a mut Conn,
    _request: &'a Request,
) -> Check<'a> {
    async move {
        conn.write_raw_frame(FrameType::PING, 0, 1, &[0; 8]).await?;
        verifier::verify_connection_error(conn, &[ErrorCode::PROTOCOL_ERROR]).await
    }
    .boxed()
}

fn ping_bad_length<'a>(
    _config: &'a Config,
    conn: &'a mut Conn,
    _request: &'a Request,
) -> Check<'a> {
    async move {
        conn.write_raw_frame(FrameType::PING, 0, 0, &[0; 6]).await?;
        verifier::verify_connection_error(conn, &[ErrorCode::FRAME_SIZE_ERROR]).await
    }
    .boxed()
}
