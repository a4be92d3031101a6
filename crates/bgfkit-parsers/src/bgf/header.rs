// bgfkit-parsers/src/bgf/header.rs
//! BGF file header

use serde::{Deserialize, Serialize};

use crate::cursor::ByteCursor;
use crate::traits::{ParseError, ParseResult};
use crate::writer::ByteWriter;

/// Magic bytes at offset 0 of every BGF file
pub const BGF_MAGIC: &[u8; 4] = b"BGF\0";

/// Format versions this decoder understands
pub const SUPPORTED_VERSIONS: &[u32] = &[3];

/// Fixed header at the start of a BGF file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BgfHeader {
    pub version: u32,
    pub flags: u32,
    /// Model name as stored by the exporter
    pub name: String,
    /// Texture count claimed by the header; never trusted
    pub texture_hint: u32,
    /// Object count claimed by the header; never trusted
    pub object_hint: u32,
}

impl BgfHeader {
    /// Decode the header at the cursor's current position
    ///
    /// This is the fast-fail gate: anything that is not a supported BGF file
    /// is rejected here with [`ParseError::InvalidHeader`].
    pub fn from_cursor(cursor: &mut ByteCursor<'_>) -> ParseResult<Self> {
        let magic = cursor.read_fixed(4).map_err(|_| ParseError::InvalidHeader {
            message: format!("file too small ({} bytes) for a BGF header", cursor.len()),
        })?;
        if magic != BGF_MAGIC {
            return Err(ParseError::InvalidHeader {
                message: format!("bad magic {magic:02X?}, expected {BGF_MAGIC:02X?}"),
            });
        }

        let version = cursor.read_u32()?;
        if !SUPPORTED_VERSIONS.contains(&version) {
            return Err(ParseError::InvalidHeader {
                message: format!("unsupported version {version}, supported: {SUPPORTED_VERSIONS:?}"),
            });
        }

        let flags = cursor.read_u32()?;
        let name = cursor.read_cstring()?;
        let texture_hint = cursor.read_u32()?;
        let object_hint = cursor.read_u32()?;

        Ok(Self {
            version,
            flags,
            name,
            texture_hint,
            object_hint,
        })
    }

    /// Encode the header
    pub fn write_to(&self, writer: &mut ByteWriter) -> ParseResult<()> {
        writer.put_bytes(BGF_MAGIC);
        writer.put_u32(self.version);
        writer.put_u32(self.flags);
        writer.put_cstring(&self.name)?;
        writer.put_u32(self.texture_hint);
        writer.put_u32(self.object_hint);
        Ok(())
    }
}

impl Default for BgfHeader {
    fn default() -> Self {
        Self {
            version: SUPPORTED_VERSIONS[0],
            flags: 0,
            name: String::new(),
            texture_hint: 0,
            object_hint: 0,
        }
    }
}
