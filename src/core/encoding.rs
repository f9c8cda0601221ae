//! Text encoding applied before output reaches a sink
//!
//! Both directions are total: text always encodes, and invalid byte
//! sequences decode to U+FFFD.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const REPLACEMENT_CHARACTER: char = char::REPLACEMENT_CHARACTER;

pub trait TextCodec: Send + Sync {
    fn encode(&self, text: &str) -> Vec<u8>;

    fn decode(&self, bytes: &[u8]) -> String;

    /// Number of bytes `encode(text)` produces.
    fn encoded_len(&self, text: &str) -> usize {
        self.encode(text).len()
    }

    fn name(&self) -> &str;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Utf8Codec;

impl TextCodec for Utf8Codec {
    fn encode(&self, text: &str) -> Vec<u8> {
        text.as_bytes().to_vec()
    }

    fn decode(&self, bytes: &[u8]) -> String {
        String::from_utf8_lossy(bytes).into_owned()
    }

    fn encoded_len(&self, text: &str) -> usize {
        text.len()
    }

    fn name(&self) -> &str {
        "utf-8"
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Utf16Codec {
    big_endian: bool,
}

impl Utf16Codec {
    pub fn little_endian() -> Self {
        Self { big_endian: false }
    }

    pub fn big_endian() -> Self {
        Self { big_endian: true }
    }
}

impl TextCodec for Utf16Codec {
    fn encode(&self, text: &str) -> Vec<u8> {
        let mut out = Vec::with_capacity(text.len() * 2);
        for unit in text.encode_utf16() {
            let bytes = if self.big_endian {
                unit.to_be_bytes()
            } else {
                unit.to_le_bytes()
            };
            out.extend_from_slice(&bytes);
        }
        out
    }

    fn decode(&self, bytes: &[u8]) -> String {
        let units = bytes.chunks(2).map(|pair| match *pair {
            [a, b] if self.big_endian => u16::from_be_bytes([a, b]),
            [a, b] => u16::from_le_bytes([a, b]),
            // Dangling odd byte
            _ => 0xFFFD,
        });
        char::decode_utf16(units)
            .map(|r| r.unwrap_or(REPLACEMENT_CHARACTER))
            .collect()
    }

    fn encoded_len(&self, text: &str) -> usize {
        text.encode_utf16().count() * 2
    }

    fn name(&self) -> &str {
        if self.big_endian {
            "utf-16be"
        } else {
            "utf-16le"
        }
    }
}

/// Encodings selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Encoding {
    #[default]
    Utf8,
    Utf16Le,
    Utf16Be,
}

impl Encoding {
    pub fn codec(self) -> Arc<dyn TextCodec> {
        match self {
            Encoding::Utf8 => Arc::new(Utf8Codec),
            Encoding::Utf16Le => Arc::new(Utf16Codec::little_endian()),
            Encoding::Utf16Be => Arc::new(Utf16Codec::big_endian()),
        }
    }
}
