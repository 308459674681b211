// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 hfed contributors

//! Opaque-buffer encoding for attribute and parameter values.
//!
//! HLA attribute values cross the RTI boundary as opaque byte buffers. The
//! canonical encodings used by hfed are:
//!
//! - strings: `HLAunicodeString`, a u32 code-unit count followed by UTF-16LE
//!   code units,
//! - integers: little-endian two's-complement,
//! - doubles: little-endian IEEE 754.

pub mod cursor;

pub use cursor::{Cursor, CursorMut};

use std::fmt;

/// Encoding error used within the `encoding` module.
#[derive(Debug, Clone)]
pub enum EncodeError {
    WriteFailed { offset: usize, reason: String },
    ReadFailed { offset: usize, reason: String },
    InvalidData { reason: String },
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::WriteFailed { offset, reason } => {
                write!(f, "write failed at offset {}: {}", offset, reason)
            }
            EncodeError::ReadFailed { offset, reason } => {
                write!(f, "read failed at offset {}: {}", offset, reason)
            }
            EncodeError::InvalidData { reason } => write!(f, "invalid data: {}", reason),
        }
    }
}

impl std::error::Error for EncodeError {}

pub type EncodeResult<T> = core::result::Result<T, EncodeError>;

/// Encode a string as an HLAunicodeString into a fresh buffer.
pub fn encode_unicode_string(value: &str) -> Vec<u8> {
    let units: Vec<u16> = value.encode_utf16().collect();
    let mut out = Vec::with_capacity(4 + units.len() * 2);
    out.extend_from_slice(&(units.len() as u32).to_le_bytes());
    for unit in units {
        out.extend_from_slice(&unit.to_le_bytes());
    }
    out
}

/// Decode an HLAunicodeString from the start of `buffer`.
pub fn decode_unicode_string(buffer: &[u8]) -> EncodeResult<String> {
    let mut cursor = Cursor::new(buffer);
    cursor.read_unicode_string()
}

/// Encode an i64 as little-endian two's-complement.
pub fn encode_i64(value: i64) -> Vec<u8> {
    value.to_le_bytes().to_vec()
}

/// Decode a little-endian i64 from the start of `buffer`.
pub fn decode_i64(buffer: &[u8]) -> EncodeResult<i64> {
    Cursor::new(buffer).read_i64_le()
}

/// Encode a u16 as little-endian.
pub fn encode_u16(value: u16) -> Vec<u8> {
    value.to_le_bytes().to_vec()
}

/// Decode a little-endian u16 from the start of `buffer`.
pub fn decode_u16(buffer: &[u8]) -> EncodeResult<u16> {
    Cursor::new(buffer).read_u16_le()
}

/// Encode an f64 as little-endian IEEE 754.
pub fn encode_f64(value: f64) -> Vec<u8> {
    value.to_bits().to_le_bytes().to_vec()
}

/// Decode a little-endian f64 from the start of `buffer`.
pub fn decode_f64(buffer: &[u8]) -> EncodeResult<f64> {
    Cursor::new(buffer).read_f64_le()
}

/// Encode a list of strings as a u32 count followed by HLAunicodeStrings.
pub fn encode_string_list(values: &[String]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(values.len() as u32).to_le_bytes());
    for value in values {
        out.extend_from_slice(&encode_unicode_string(value));
    }
    out
}

/// Decode a string list produced by [`encode_string_list`].
pub fn decode_string_list(buffer: &[u8]) -> EncodeResult<Vec<String>> {
    let mut cursor = Cursor::new(buffer);
    let count = cursor.read_u32_le()? as usize;
    let mut out = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        out.push(cursor.read_unicode_string()?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unicode_string_round_trip() {
        for s in ["", "master", "fédéré-α", "\u{1F680} launch"] {
            let encoded = encode_unicode_string(s);
            assert_eq!(decode_unicode_string(&encoded).unwrap(), s);
        }
    }

    #[test]
    fn test_unicode_string_layout() {
        // "ab" -> count 2, then 'a' 'b' as UTF-16LE units.
        let encoded = encode_unicode_string("ab");
        assert_eq!(encoded, vec![2, 0, 0, 0, b'a', 0, b'b', 0]);
    }

    #[test]
    fn test_scalar_round_trips() {
        assert_eq!(decode_i64(&encode_i64(-42)).unwrap(), -42);
        assert_eq!(decode_u16(&encode_u16(7)).unwrap(), 7);
        let x = 1234.5625_f64;
        assert_eq!(decode_f64(&encode_f64(x)).unwrap(), x);
    }

    #[test]
    fn test_string_list_round_trip() {
        let values = vec!["A".to_string(), "B".to_string(), "long-federate-name".to_string()];
        assert_eq!(decode_string_list(&encode_string_list(&values)).unwrap(), values);
    }

    #[test]
    fn test_truncated_buffer_rejected() {
        let encoded = encode_unicode_string("hello");
        assert!(decode_unicode_string(&encoded[..encoded.len() - 1]).is_err());
        assert!(decode_i64(&[1, 2, 3]).is_err());
    }
}
