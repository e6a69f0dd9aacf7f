mod common;

use std::time::Duration;

use common::{pair, pair_as, read_frame, write_frame};
use h2probe::wire::{
    CLIENT_PREFACE, ContinuationFrame, Frame, HeaderEncoder, HeaderField, HeadersFrame,
    PingFrame, Setting, SettingId, SettingsFrame, WindowUpdateFrame,
};
use h2probe::{Role, TestError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

const TIMEOUT: Duration = Duration::from_secs(1);

#[tokio::test]
async fn client_handshake_learns_peer_settings() {
    let (mut conn, mut peer) = pair(TIMEOUT);
    let server = tokio::spawn(async move {
        let mut preface = [0u8; 24];
        peer.read_exact(&mut preface).await.unwrap();
        assert_eq!(&preface[..], CLIENT_PREFACE);

        write_frame(
            &mut peer,
            SettingsFrame::new(vec![Setting::new(SettingId::MAX_FRAME_SIZE, 32_768)]),
        )
        .await
        .unwrap();

        let Frame::Settings(settings) = read_frame(&mut peer).await else {
            panic!("client must open with SETTINGS");
        };
        assert!(!settings.is_ack());
        assert_eq!(settings.value(SettingId::INITIAL_WINDOW_SIZE), Some(65_535));
        write_frame(&mut peer, SettingsFrame::ack()).await.unwrap();

        let Frame::Settings(ack) = read_frame(&mut peer).await else {
            panic!("client must acknowledge our SETTINGS");
        };
        assert!(ack.is_ack());
        peer
    });

    conn.handshake().await.unwrap();
    assert_eq!(conn.max_frame_size(), 32_768);
    assert_eq!(conn.setting(SettingId::MAX_FRAME_SIZE), Some(32_768));
    let _peer = server.await.unwrap();
}

#[tokio::test]
async fn non_settings_frame_aborts_handshake() {
    let (mut conn, mut peer) = pair(TIMEOUT);
    let server = tokio::spawn(async move {
        let mut preface = [0u8; 24];
        peer.read_exact(&mut preface).await.unwrap();
        write_frame(&mut peer, PingFrame::new(false, [0; 8]))
            .await
            .unwrap();
        peer
    });

    let err = conn.handshake().await.unwrap_err();
    assert!(err.is_fatal());
    match err {
        TestError::Handshake(msg) => assert!(msg.starts_with("expected SETTINGS"), "{msg}"),
        other => panic!("unexpected error {other}"),
    }
    let _peer = server.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn silent_peer_times_out_handshake() {
    let (mut conn, _peer) = pair(TIMEOUT);
    let err = conn.handshake().await.unwrap_err();
    assert!(matches!(err, TestError::Timeout));
    assert!(!err.is_fatal());
    assert!(conn.is_closed());
}

#[tokio::test]
async fn server_role_handshake_then_request() {
    let (mut conn, mut peer) = pair_as(Role::Server, TIMEOUT);
    let client = tokio::spawn(async move {
        peer.write_all(CLIENT_PREFACE).await.unwrap();
        write_frame(&mut peer, SettingsFrame::new(vec![])).await.unwrap();

        let Frame::Settings(settings) = read_frame(&mut peer).await else {
            panic!("server must send SETTINGS");
        };
        assert!(!settings.is_ack());
        write_frame(&mut peer, SettingsFrame::ack()).await.unwrap();
        let Frame::Settings(ack) = read_frame(&mut peer).await else {
            panic!("server must acknowledge our SETTINGS");
        };
        assert!(ack.is_ack());

        let block = HeaderEncoder::new().encode(&[
            HeaderField::new(":method", "GET"),
            HeaderField::new(":scheme", "http"),
            HeaderField::new(":path", "/client/6.7/1"),
            HeaderField::new(":authority", "127.0.0.1:30000"),
        ]);
        let (first, rest) = block.split_at(block.len() / 2);
        write_frame(&mut peer, HeadersFrame::new(1, first.to_vec(), true, false))
            .await
            .unwrap();
        write_frame(&mut peer, ContinuationFrame::new(1, true, rest.to_vec()))
            .await
            .unwrap();
        peer
    });

    conn.handshake().await.unwrap();
    let request = conn.read_request().await.unwrap();
    assert_eq!(request.stream_id, 1);
    assert_eq!(request.header(":path"), Some("/client/6.7/1"));
    assert_eq!(request.header(":method"), Some("GET"));
    let _peer = client.await.unwrap();
}

#[tokio::test]
async fn server_role_rejects_bad_preface() {
    let (mut conn, mut peer) = pair_as(Role::Server, TIMEOUT);
    peer.write_all(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n").await.unwrap();
    let err = conn.handshake().await.unwrap_err();
    assert!(matches!(err, TestError::Handshake(_)));
}

fn get_request(path: &str) -> Vec<u8> {
    HeaderEncoder::new().encode(&[
        HeaderField::new(":method", "GET"),
        HeaderField::new(":scheme", "http"),
        HeaderField::new(":path", path),
        HeaderField::new(":authority", "127.0.0.1:30000"),
    ])
}

#[tokio::test]
async fn server_role_does_not_wait_for_the_ack() {
    let (mut conn, mut peer) = pair_as(Role::Server, TIMEOUT);
    // curl and nghttp2 send their request before acknowledging ours.
    peer.write_all(CLIENT_PREFACE).await.unwrap();
    write_frame(
        &mut peer,
        SettingsFrame::new(vec![Setting::new(SettingId::MAX_CONCURRENT_STREAMS, 100)]),
    )
    .await
    .unwrap();
    write_frame(&mut peer, WindowUpdateFrame::new(0, 1 << 20))
        .await
        .unwrap();
    write_frame(
        &mut peer,
        HeadersFrame::new(1, get_request("/client/6.7/1"), true, true),
    )
    .await
    .unwrap();

    conn.handshake().await.unwrap();
    assert_eq!(conn.setting(SettingId::MAX_CONCURRENT_STREAMS), Some(100));

    let Frame::Settings(ours) = read_frame(&mut peer).await else {
        panic!("server must send SETTINGS");
    };
    assert!(!ours.is_ack());
    let Frame::Settings(ack) = read_frame(&mut peer).await else {
        panic!("server must acknowledge the client SETTINGS");
    };
    assert!(ack.is_ack());

    write_frame(&mut peer, SettingsFrame::ack()).await.unwrap();
    let request = conn.read_request().await.unwrap();
    assert_eq!(request.stream_id, 1);
    assert_eq!(request.header(":path"), Some("/client/6.7/1"));
}

#[tokio::test]
async fn server_role_requires_settings_first() {
    let (mut conn, mut peer) = pair_as(Role::Server, TIMEOUT);
    peer.write_all(CLIENT_PREFACE).await.unwrap();
    write_frame(&mut peer, WindowUpdateFrame::new(0, 1 << 20))
        .await
        .unwrap();

    match conn.handshake().await.unwrap_err() {
        TestError::Handshake(msg) => assert!(
            msg.starts_with("expected SETTINGS, got WINDOW_UPDATE"),
            "{msg}"
        ),
        other => panic!("unexpected error {other}"),
    }
}
