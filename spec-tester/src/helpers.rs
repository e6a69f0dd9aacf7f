//! Small building blocks shared by scenarios.

use h2probe_wire::{Frame, HeaderField, HeadersFrame};

use crate::config::Config;
use crate::connection::Conn;
use crate::error::TestError;
use crate::event::Event;

/// `len` repetitions of `x`.
pub fn dummy_string(len: usize) -> String {
    "x".repeat(len)
}

pub fn dummy_bytes(len: usize) -> Vec<u8> {
    vec![b'x'; len]
}

pub fn header_field(name: &str, value: &str) -> HeaderField {
    HeaderField::new(name, value)
}

/// Pseudo-header fields of a GET for the configured path.
pub fn common_headers(config: &Config) -> Vec<HeaderField> {
    vec![
        header_field(":method", "GET"),
        header_field(":scheme", config.scheme()),
        header_field(":path", &config.path),
        header_field(":authority", &config.authority()),
    ]
}

pub fn common_resp_headers() -> Vec<HeaderField> {
    vec![
        header_field(":status", "200"),
        header_field("access-control-allow-origin", "*"),
    ]
}

/// `count` distinct headers, each with a value of `max_header_len` octets.
pub fn dummy_headers(config: &Config, count: usize) -> Vec<HeaderField> {
    let value = dummy_string(config.max_header_len);
    (0..count)
        .map(|i| header_field(&format!("x-dummy{i}"), &value))
        .collect()
}

/// Total DATA length the server sends in response to a GET of the
/// configured path, measured on a separate connection.
pub async fn server_data_length(config: &Config) -> Result<usize, TestError> {
    let mut conn = Conn::dial(config).await?;
    conn.handshake().await?;

    let block = conn.encode_headers(&common_headers(config));
    conn.write_headers(HeadersFrame::new(1, block, true, true))
        .await?;

    let mut len = 0;
    while !conn.is_closed() {
        let done = match conn.wait_event().await {
            Event::Frame(Frame::Data(data)) => {
                len += data.header.length as usize;
                data.stream_ended()
            }
            Event::Frame(Frame::Headers(headers)) => headers.stream_ended(),
            _ => false,
        };
        if done {
            conn.close().await;
            return Ok(len);
        }
    }
    Err(TestError::Protocol(
        "unable to get server data length".to_string(),
    ))
}
