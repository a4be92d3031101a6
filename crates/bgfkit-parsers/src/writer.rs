// bgfkit-parsers/src/writer.rs
//! Little-endian output buffer, the encoding counterpart of [`ByteCursor`]
//!
//! [`ByteCursor`]: crate::cursor::ByteCursor

use byteorder::{ByteOrder, LittleEndian};
use encoding_rs::WINDOWS_1252;

use crate::traits::{ParseError, ParseResult};

/// Growable buffer with typed little-endian writes
#[derive(Debug, Default, Clone)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> usize {
        self.buf.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn put_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn put_u32(&mut self, value: u32) {
        let mut bytes = [0u8; 4];
        LittleEndian::write_u32(&mut bytes, value);
        self.buf.extend_from_slice(&bytes);
    }

    pub fn put_f32(&mut self, value: f32) {
        let mut bytes = [0u8; 4];
        LittleEndian::write_f32(&mut bytes, value);
        self.buf.extend_from_slice(&bytes);
    }

    pub fn put_f32s(&mut self, values: &[f32]) {
        for &value in values {
            self.put_f32(value);
        }
    }

    /// Write a count prefix
    pub fn put_count(&mut self, count: usize) -> ParseResult<()> {
        let count = u32::try_from(count).map_err(|_| ParseError::InvalidHeader {
            message: format!("count {count} does not fit in 32 bits"),
        })?;
        self.put_u32(count);
        Ok(())
    }

    /// Write a NUL-terminated Windows-1252 string
    ///
    /// Fails if the text contains a NUL or a character Windows-1252 cannot
    /// represent, since the result would not decode back to the same name.
    pub fn put_cstring(&mut self, text: &str) -> ParseResult<()> {
        let offset = self.position();
        if text.contains('\0') {
            return Err(ParseError::InvalidEncoding { offset });
        }
        let (bytes, _, had_errors) = WINDOWS_1252.encode(text);
        if had_errors {
            return Err(ParseError::InvalidEncoding { offset });
        }
        self.buf.extend_from_slice(&bytes);
        self.buf.push(0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::ByteCursor;

    #[test]
    fn test_written_values_read_back() {
        let mut writer = ByteWriter::new();
        writer.put_u8(0x28);
        writer.put_u32(0xDEAD_BEEF);
        writer.put_f32(-2.25);
        writer.put_cstring("Zunftstube ä").unwrap();

        let data = writer.into_inner();
        let mut cursor = ByteCursor::new(&data);
        assert_eq!(cursor.read_u8().unwrap(), 0x28);
        assert_eq!(cursor.read_u32().unwrap(), 0xDEAD_BEEF);
        assert_eq!(cursor.read_f32().unwrap(), -2.25);
        assert_eq!(cursor.read_cstring().unwrap(), "Zunftstube ä");
        assert!(cursor.is_at_end());
    }

    #[test]
    fn test_unencodable_names_rejected() {
        let mut writer = ByteWriter::new();
        assert!(writer.put_cstring("城").is_err());
        assert!(writer.put_cstring("a\0b").is_err());
        assert_eq!(writer.position(), 0);
    }
}
