//! Scripted peers for the integration tests.

#![allow(dead_code)]

use std::io;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use h2probe::wire::{FRAME_HEADER_LEN, Frame, FrameHeader};
use h2probe::{Config, Conn, Role};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream};

pub fn config(timeout: Duration) -> Config {
    Config {
        timeout,
        ..Config::default()
    }
}

/// A client-role connection and the raw peer end of its pipe.
pub fn pair(timeout: Duration) -> (Conn, DuplexStream) {
    pair_as(Role::Client, timeout)
}

pub fn pair_as(role: Role, timeout: Duration) -> (Conn, DuplexStream) {
    let (ours, theirs) = tokio::io::duplex(1 << 16);
    (Conn::new(ours, role, &config(timeout)), theirs)
}

pub async fn write_frame<W>(w: &mut W, frame: impl Into<Frame>) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = BytesMut::new();
    frame.into().encode(&mut buf);
    w.write_all(&buf).await
}

/// Read one frame without interpreting its payload.
pub async fn read_raw_frame<R>(r: &mut R) -> io::Result<(FrameHeader, Vec<u8>)>
where
    R: AsyncRead + Unpin,
{
    let mut head = [0u8; FRAME_HEADER_LEN];
    r.read_exact(&mut head).await?;
    let header = FrameHeader::parse(&head);
    let mut payload = vec![0u8; header.length as usize];
    r.read_exact(&mut payload).await?;
    Ok((header, payload))
}

pub async fn read_frame<R>(r: &mut R) -> Frame
where
    R: AsyncRead + Unpin,
{
    let (header, payload) = read_raw_frame(r).await.unwrap();
    Frame::parse(header, Bytes::from(payload)).unwrap()
}
