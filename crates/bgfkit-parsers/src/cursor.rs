// bgfkit-parsers/src/cursor.rs
//! Bounds-checked little-endian reader over an in-memory buffer

use byteorder::{ByteOrder, LittleEndian};
use encoding_rs::WINDOWS_1252;

use crate::traits::{ParseError, ParseResult};

/// Forward-only reader over a byte slice
///
/// Every read is bounds-checked and fails with
/// [`ParseError::TruncatedInput`] instead of panicking. The only backward
/// movement is [`ByteCursor::seek_from_end`], which footer decoding uses.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    /// Create a cursor positioned at offset 0
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current offset from the start of the buffer
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Total buffer length
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the underlying buffer is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes left after the current position
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Whether every byte has been consumed
    pub fn is_at_end(&self) -> bool {
        self.remaining() == 0
    }

    /// The whole underlying buffer
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Read exactly `n` bytes
    pub fn read_fixed(&mut self, n: usize) -> ParseResult<&'a [u8]> {
        if n > self.remaining() {
            return Err(ParseError::TruncatedInput {
                offset: self.pos,
                requested: n,
                available: self.remaining(),
            });
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    pub fn read_u8(&mut self) -> ParseResult<u8> {
        Ok(self.read_fixed(1)?[0])
    }

    pub fn read_u32(&mut self) -> ParseResult<u32> {
        Ok(LittleEndian::read_u32(self.read_fixed(4)?))
    }

    pub fn read_f32(&mut self) -> ParseResult<f32> {
        Ok(LittleEndian::read_f32(self.read_fixed(4)?))
    }

    pub fn read_vec2(&mut self) -> ParseResult<[f32; 2]> {
        Ok([self.read_f32()?, self.read_f32()?])
    }

    pub fn read_vec3(&mut self) -> ParseResult<[f32; 3]> {
        Ok([self.read_f32()?, self.read_f32()?, self.read_f32()?])
    }

    /// Read a quaternion stored as x, y, z, w
    pub fn read_quat(&mut self) -> ParseResult<[f32; 4]> {
        Ok([
            self.read_f32()?,
            self.read_f32()?,
            self.read_f32()?,
            self.read_f32()?,
        ])
    }

    /// Read a count prefix and check it against the bytes left
    ///
    /// `record_size` is the minimum encoded size of one element. A count that
    /// cannot possibly fit is reported as truncation before anything is
    /// allocated.
    pub fn read_count(&mut self, record_size: usize) -> ParseResult<usize> {
        let offset = self.pos;
        let count = self.read_u32()? as usize;
        let needed = count.saturating_mul(record_size);
        if needed > self.remaining() {
            return Err(ParseError::TruncatedInput {
                offset,
                requested: needed,
                available: self.remaining(),
            });
        }
        Ok(count)
    }

    /// Read a NUL-terminated Windows-1252 string
    pub fn read_cstring(&mut self) -> ParseResult<String> {
        let start = self.pos;
        let rest = &self.data[self.pos.min(self.data.len())..];
        let Some(len) = rest.iter().position(|&b| b == 0) else {
            return Err(ParseError::TruncatedInput {
                offset: start,
                requested: rest.len() + 1,
                available: rest.len(),
            });
        };

        let raw = &rest[..len];
        // Control bytes in a name mean the cursor is out of step with the records
        if raw.iter().any(|&b| b < 0x20 && b != b'\t') {
            return Err(ParseError::InvalidEncoding { offset: start });
        }

        let (text, had_errors) = WINDOWS_1252.decode_without_bom_handling(raw);
        if had_errors {
            return Err(ParseError::InvalidEncoding { offset: start });
        }

        self.pos += len + 1;
        Ok(text.into_owned())
    }

    /// Look at the next byte without consuming it
    pub fn peek_u8(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    /// Check whether the next bytes equal `pattern` without consuming them
    pub fn peek_pattern(&self, pattern: &[u8]) -> bool {
        self.data
            .get(self.pos..)
            .is_some_and(|rest| rest.starts_with(pattern))
    }

    /// Move to `offset` bytes before the end of the buffer
    pub fn seek_from_end(&mut self, offset: usize) -> ParseResult<()> {
        if offset > self.data.len() {
            return Err(ParseError::TruncatedInput {
                offset: 0,
                requested: offset,
                available: self.data.len(),
            });
        }
        self.pos = self.data.len() - offset;
        Ok(())
    }

    /// Offset of the last occurrence of `pattern` at or after `from`
    pub fn rfind(&self, pattern: &[u8], from: usize) -> Option<usize> {
        if pattern.is_empty() || from >= self.data.len() {
            return None;
        }
        self.data[from..]
            .windows(pattern.len())
            .rposition(|window| window == pattern)
            .map(|idx| from + idx)
    }
}
