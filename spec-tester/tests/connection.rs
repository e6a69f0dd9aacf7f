mod common;

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use common::{pair, read_frame, write_frame};
use h2probe::wire::{
    DataFrame, ErrorCode, Frame, GoAwayFrame, HeaderDecoder, HeaderField, HeadersFrame,
    PingFrame, SettingsFrame,
};
use h2probe::{Conn, Event, EventKind, Role};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::time::Instant;

const TIMEOUT: Duration = Duration::from_secs(1);

#[tokio::test(start_paused = true)]
async fn every_read_gets_a_fresh_deadline() {
    let (mut conn, mut peer) = pair(TIMEOUT);
    let trickle = tokio::spawn(async move {
        for _ in 0..3 {
            tokio::time::sleep(Duration::from_millis(600)).await;
            write_frame(&mut peer, PingFrame::new(false, [0; 8]))
                .await
                .unwrap();
        }
        peer
    });

    let started = Instant::now();
    for _ in 0..3 {
        assert!(matches!(conn.wait_event().await, Event::Frame(Frame::Ping(_))));
        assert!(!conn.is_closed());
    }
    assert!(started.elapsed() > TIMEOUT);

    assert_eq!(conn.wait_event().await, Event::Timeout);
    assert!(conn.is_closed());
    let _peer = trickle.await.unwrap();
}

#[tokio::test]
async fn received_data_replenishes_both_windows() {
    let (mut conn, peer) = pair(TIMEOUT);
    let (mut rx, mut tx) = tokio::io::split(peer);
    // Four full frames overrun the initial 65,535 octet window by one.
    let sender = tokio::spawn(async move {
        for _ in 0..4 {
            write_frame(&mut tx, DataFrame::new(1, false, vec![0u8; 16_384]))
                .await
                .unwrap();
        }
        tx
    });

    for _ in 0..4 {
        assert_eq!(conn.wait_event().await.kind(), EventKind::DataFrame);
    }
    let _tx = sender.await.unwrap();

    for stream_id in [0, 1] {
        let Frame::WindowUpdate(update) = read_frame(&mut rx).await else {
            panic!("expected WINDOW_UPDATE on stream {stream_id}");
        };
        assert_eq!(update.header.stream_id, stream_id);
        assert_eq!(update.increment, 65_536);
    }
}

#[tokio::test]
async fn wait_by_type_skips_other_frames() {
    let (mut conn, mut peer) = pair(TIMEOUT);
    write_frame(&mut peer, PingFrame::new(false, [0; 8]))
        .await
        .unwrap();
    write_frame(&mut peer, SettingsFrame::ack()).await.unwrap();
    write_frame(&mut peer, GoAwayFrame::new(0, ErrorCode::NO_ERROR, &b""[..]))
        .await
        .unwrap();

    let event = conn.wait_event_by_type(EventKind::GoAwayFrame).await.unwrap();
    assert_eq!(event.kind(), EventKind::GoAwayFrame);
    assert!(!conn.is_closed());
}

#[tokio::test]
async fn wait_by_type_reports_the_close() {
    let (mut conn, mut peer) = pair(TIMEOUT);
    write_frame(&mut peer, PingFrame::new(false, [0; 8]))
        .await
        .unwrap();
    drop(peer);

    let last = conn
        .wait_event_by_type(EventKind::GoAwayFrame)
        .await
        .unwrap_err();
    assert_eq!(last, Some(Event::ConnectionClosed));
}

#[tokio::test(start_paused = true)]
async fn wait_by_type_keeps_the_frame_over_a_trailing_timeout() {
    let (mut conn, mut peer) = pair(TIMEOUT);
    write_frame(&mut peer, PingFrame::new(false, [0; 8]))
        .await
        .unwrap();

    let last = conn
        .wait_event_by_type(EventKind::GoAwayFrame)
        .await
        .unwrap_err();
    assert_eq!(last.map(|e| e.kind()), Some(EventKind::PingFrame));
    drop(peer);
}

#[tokio::test]
async fn table_size_update_leads_the_next_header_block() {
    let (mut conn, mut peer) = pair(TIMEOUT);
    conn.set_max_dynamic_table_size(128);
    let fields = [
        HeaderField::new(":method", "GET"),
        HeaderField::new(":path", "/"),
    ];
    let block = conn.encode_headers(&fields);
    conn.write_headers(HeadersFrame::new(1, block, true, true))
        .await
        .unwrap();

    let Frame::Headers(headers) = read_frame(&mut peer).await else {
        panic!("expected HEADERS");
    };
    // 001 prefix with the 5-bit integer 128.
    assert_eq!(&headers.block_fragment[..2], &[0x3f, 0x61]);
    let decoded = HeaderDecoder::new()
        .decode(&headers.block_fragment)
        .unwrap();
    assert_eq!(decoded, fields);

    // Announced once only.
    assert_eq!(conn.encode_headers(&fields), vec![0x82, 0x84]);
}

/// A transport whose reads always fail with something other than a hangup.
struct BrokenLink;

impl AsyncRead for BrokenLink {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Ready(Err(io::Error::other("link down")))
    }
}

impl AsyncWrite for BrokenLink {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[tokio::test]
async fn transport_error_is_reported_and_ends_the_connection() {
    let mut conn = Conn::new(BrokenLink, Role::Client, &common::config(TIMEOUT));
    assert_eq!(conn.wait_event().await, Event::Error("link down".to_string()));
    assert!(conn.is_closed());
}
