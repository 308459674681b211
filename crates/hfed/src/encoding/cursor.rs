// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 hfed contributors

//! Bounds-checked read/write cursors over attribute-value buffers.

use super::{EncodeError, EncodeResult};

/// Generate little-endian write methods for primitive types.
///
/// Each generated method:
/// 1. Checks buffer bounds (returns `EncodeError::WriteFailed` on overflow)
/// 2. Converts the value via `to_le_bytes()`
/// 3. Copies bytes and advances the offset
macro_rules! impl_write_le {
    ($name:ident, $type:ty, $size:expr) => {
        pub fn $name(&mut self, value: $type) -> EncodeResult<()> {
            if self.offset + $size > self.buffer.len() {
                return Err(EncodeError::WriteFailed {
                    offset: self.offset,
                    reason: "buffer too small".into(),
                });
            }
            let bytes = value.to_le_bytes();
            self.buffer[self.offset..self.offset + $size].copy_from_slice(&bytes);
            self.offset += $size;
            Ok(())
        }
    };
}

/// Generate little-endian read methods for primitive types.
macro_rules! impl_read_le {
    ($name:ident, $type:ty, $size:expr) => {
        pub fn $name(&mut self) -> EncodeResult<$type> {
            if self.offset + $size > self.buffer.len() {
                return Err(EncodeError::ReadFailed {
                    offset: self.offset,
                    reason: "unexpected end of buffer".into(),
                });
            }
            let mut bytes = [0u8; $size];
            bytes.copy_from_slice(&self.buffer[self.offset..self.offset + $size]);
            self.offset += $size;
            Ok(<$type>::from_le_bytes(bytes))
        }
    };
}

/// Mutable cursor for writing (bounds-checked).
pub struct CursorMut<'a> {
    buffer: &'a mut [u8],
    offset: usize,
}

impl<'a> CursorMut<'a> {
    pub fn new(buffer: &'a mut [u8]) -> Self {
        Self { buffer, offset: 0 }
    }

    impl_write_le!(write_u8, u8, 1);
    impl_write_le!(write_u16_le, u16, 2);
    impl_write_le!(write_u32_le, u32, 4);
    impl_write_le!(write_i64_le, i64, 8);

    pub fn write_f64_le(&mut self, value: f64) -> EncodeResult<()> {
        if self.offset + 8 > self.buffer.len() {
            return Err(EncodeError::WriteFailed {
                offset: self.offset,
                reason: "buffer too small".into(),
            });
        }
        let bytes = value.to_bits().to_le_bytes();
        self.buffer[self.offset..self.offset + 8].copy_from_slice(&bytes);
        self.offset += 8;
        Ok(())
    }

    pub fn write_bytes(&mut self, data: &[u8]) -> EncodeResult<()> {
        if self.offset + data.len() > self.buffer.len() {
            return Err(EncodeError::WriteFailed {
                offset: self.offset,
                reason: "buffer too small".into(),
            });
        }
        self.buffer[self.offset..self.offset + data.len()].copy_from_slice(data);
        self.offset += data.len();
        Ok(())
    }

    /// Write an HLAunicodeString (u32 count + UTF-16LE code units).
    pub fn write_unicode_string(&mut self, value: &str) -> EncodeResult<()> {
        let units: Vec<u16> = value.encode_utf16().collect();
        self.write_u32_le(units.len() as u32)?;
        for unit in units {
            self.write_u16_le(unit)?;
        }
        Ok(())
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.offset)
    }
}

/// Immutable cursor for reading (bounds-checked).
pub struct Cursor<'a> {
    buffer: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, offset: 0 }
    }

    impl_read_le!(read_u8, u8, 1);
    impl_read_le!(read_u16_le, u16, 2);
    impl_read_le!(read_u32_le, u32, 4);
    impl_read_le!(read_i64_le, i64, 8);

    pub fn read_f64_le(&mut self) -> EncodeResult<f64> {
        if self.offset + 8 > self.buffer.len() {
            return Err(EncodeError::ReadFailed {
                offset: self.offset,
                reason: "unexpected end of buffer".into(),
            });
        }
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&self.buffer[self.offset..self.offset + 8]);
        self.offset += 8;
        Ok(f64::from_bits(u64::from_le_bytes(bytes)))
    }

    /// Read an HLAunicodeString (u32 count + UTF-16LE code units).
    ///
    /// Unpaired surrogates are replaced rather than rejected; vendor RTIs
    /// are not uniformly strict about what they forward.
    pub fn read_unicode_string(&mut self) -> EncodeResult<String> {
        let count = self.read_u32_le()? as usize;
        if self.offset + count * 2 > self.buffer.len() {
            return Err(EncodeError::ReadFailed {
                offset: self.offset,
                reason: "unicode string exceeds buffer".into(),
            });
        }
        let mut units = Vec::with_capacity(count);
        for _ in 0..count {
            units.push(self.read_u16_le()?);
        }
        Ok(String::from_utf16_lossy(&units))
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_round_trip() {
        let mut buffer = [0u8; 64];
        {
            let mut w = CursorMut::new(&mut buffer);
            w.write_u8(0xAB).unwrap();
            w.write_u16_le(513).unwrap();
            w.write_u32_le(70_000).unwrap();
            w.write_i64_le(-9_000_000_000).unwrap();
            w.write_f64_le(2.5).unwrap();
            w.write_unicode_string("hi").unwrap();
        }
        let mut r = Cursor::new(&buffer);
        assert_eq!(r.read_u8().unwrap(), 0xAB);
        assert_eq!(r.read_u16_le().unwrap(), 513);
        assert_eq!(r.read_u32_le().unwrap(), 70_000);
        assert_eq!(r.read_i64_le().unwrap(), -9_000_000_000);
        assert_eq!(r.read_f64_le().unwrap(), 2.5);
        assert_eq!(r.read_unicode_string().unwrap(), "hi");
    }

    #[test]
    fn test_write_overflow_reports_offset() {
        let mut buffer = [0u8; 2];
        let mut w = CursorMut::new(&mut buffer);
        w.write_u16_le(1).unwrap();
        match w.write_u16_le(2) {
            Err(EncodeError::WriteFailed { offset, .. }) => assert_eq!(offset, 2),
            other => panic!("expected WriteFailed, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_read_past_end_fails() {
        let buffer = [0u8; 3];
        let mut r = Cursor::new(&buffer);
        assert!(r.read_u32_le().is_err());
    }
}
