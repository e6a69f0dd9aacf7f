//! Connection-scoped HPACK state.
//!
//! Both halves keep their dynamic table across calls, so one encoder and one
//! decoder must live exactly as long as the connection they belong to.

use std::fmt;

use fluke_hpack::encoder::encode_integer;
use fluke_hpack::{Decoder, Encoder};

use crate::error::FrameError;

/// One header field, name and value as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderField {
    pub name: String,
    pub value: String,
}

impl HeaderField {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for HeaderField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.value)
    }
}

/// Initial value of SETTINGS_HEADER_TABLE_SIZE, and the largest dynamic
/// table the encoder will switch to.
pub const DEFAULT_HEADER_TABLE_SIZE: usize = 4096;

/// Stateful header block encoder.
pub struct HeaderEncoder {
    inner: Encoder<'static>,
    /// Size to announce at the start of the next block.
    pending_size_update: Option<usize>,
}

impl HeaderEncoder {
    pub fn new() -> Self {
        Self {
            inner: Encoder::new(),
            pending_size_update: None,
        }
    }

    /// Resize the dynamic table, capped at [`DEFAULT_HEADER_TABLE_SIZE`].
    ///
    /// The next block produced by [`encode`](Self::encode) opens with a
    /// dynamic table size update carrying the new size.
    pub fn set_max_table_size(&mut self, size: usize) {
        let size = size.min(DEFAULT_HEADER_TABLE_SIZE);
        self.inner.set_max_table_size(size);
        self.pending_size_update = Some(size);
    }

    /// Encode `fields` into one header block, updating the dynamic table.
    pub fn encode(&mut self, fields: &[HeaderField]) -> Vec<u8> {
        let mut block = Vec::new();
        if let Some(size) = self.pending_size_update.take() {
            // 001xxxxx: dynamic table size update with a 5-bit prefix.
            let mut update = encode_integer(size, 5);
            update[0] |= 0x20;
            block.extend_from_slice(&update);
        }
        block.extend(
            self.inner.encode(
                fields
                    .iter()
                    .map(|field| (field.name.as_bytes(), field.value.as_bytes())),
            ),
        );
        block
    }
}

impl Default for HeaderEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Stateful header block decoder.
pub struct HeaderDecoder {
    inner: Decoder<'static>,
}

impl HeaderDecoder {
    pub fn new() -> Self {
        Self {
            inner: Decoder::new(),
        }
    }

    /// Decode one complete header block. Non-UTF-8 octets are replaced.
    pub fn decode(&mut self, block: &[u8]) -> Result<Vec<HeaderField>, FrameError> {
        let fields = self
            .inner
            .decode(block)
            .map_err(|e| FrameError::Hpack(format!("{e:?}")))?;
        Ok(fields
            .into_iter()
            .map(|(name, value)| {
                HeaderField::new(
                    String::from_utf8_lossy(&name),
                    String::from_utf8_lossy(&value),
                )
            })
            .collect())
    }
}

impl Default for HeaderDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_table_hit_is_one_octet() {
        let mut encoder = HeaderEncoder::new();
        assert_eq!(encoder.encode(&[HeaderField::new(":method", "GET")]), vec![0x82]);
    }

    #[test]
    fn dynamic_table_persists_across_blocks() {
        let mut encoder = HeaderEncoder::new();
        let fields = [HeaderField::new("x-dummy0", "aaaaaaaaaaaaaaaa")];
        let first = encoder.encode(&fields);
        let second = encoder.encode(&fields);
        assert!(second.len() < first.len());

        let mut decoder = HeaderDecoder::new();
        assert_eq!(decoder.decode(&first).unwrap(), fields);
        assert_eq!(decoder.decode(&second).unwrap(), fields);
    }

    #[test]
    fn table_resize_is_announced_once() {
        let mut encoder = HeaderEncoder::new();
        encoder.set_max_table_size(128);
        let fields = [HeaderField::new(":method", "GET")];

        let first = encoder.encode(&fields);
        // 0x3f 0x61: size update to 31 + 97 = 128, then the indexed field.
        assert_eq!(first, vec![0x3f, 0x61, 0x82]);
        assert_eq!(encoder.encode(&fields), vec![0x82]);

        let mut decoder = HeaderDecoder::new();
        assert_eq!(decoder.decode(&first).unwrap(), fields);
    }

    #[test]
    fn table_resize_is_capped() {
        let mut encoder = HeaderEncoder::new();
        encoder.set_max_table_size(1 << 20);
        let block = encoder.encode(&[HeaderField::new(":method", "GET")]);
        // 4096 - 31 = 4065 = 0xe1 0x1f as a varint.
        assert_eq!(block, vec![0x3f, 0xe1, 0x1f, 0x82]);
    }

    #[test]
    fn truncated_block_is_an_error() {
        let mut decoder = HeaderDecoder::new();
        // Literal with incremental indexing, name length 5, no name octets.
        assert!(matches!(
            decoder.decode(&[0x40, 0x05]),
            Err(FrameError::Hpack(_))
        ));
    }
}
