// bgfkit-parsers/src/bgf/texture.rs
//! Texture records

use serde::{Deserialize, Serialize};

use crate::cursor::ByteCursor;
use crate::traits::ParseResult;
use crate::writer::ByteWriter;

/// Lookahead byte that opens a texture record
pub const TEXTURE_MARKER: u8 = 0x28;

/// Pixel layout of an embedded texture payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    /// Name-only reference to an image file shipped elsewhere
    External,
    Rgb24,
    Rgba32,
    Indexed8,
    /// Tag this decoder does not know; the payload is kept as-is
    Unknown(u8),
}

impl PixelFormat {
    pub fn from_tag(tag: u8) -> Self {
        match tag {
            0 => Self::External,
            1 => Self::Rgb24,
            2 => Self::Rgba32,
            3 => Self::Indexed8,
            other => Self::Unknown(other),
        }
    }

    pub fn tag(self) -> u8 {
        match self {
            Self::External => 0,
            Self::Rgb24 => 1,
            Self::Rgba32 => 2,
            Self::Indexed8 => 3,
            Self::Unknown(tag) => tag,
        }
    }
}

/// One texture entry of a BGF file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BgfTexture {
    /// Index referenced by mapping entries
    pub index: u32,
    /// Image name, usually a file name in the extracted texture directory
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Embedded pixel data; empty for external references
    #[serde(skip)]
    pub payload: Vec<u8>,
}

impl BgfTexture {
    /// Whether the next record is a texture, without consuming anything
    pub fn is_texture(cursor: &ByteCursor<'_>) -> bool {
        cursor.peek_u8() == Some(TEXTURE_MARKER)
    }

    /// Decode one texture record, marker included
    pub fn from_cursor(cursor: &mut ByteCursor<'_>) -> ParseResult<Self> {
        let _marker = cursor.read_u8()?;
        let index = cursor.read_u32()?;
        let name = cursor.read_cstring()?;
        let width = cursor.read_u32()?;
        let height = cursor.read_u32()?;
        let format = PixelFormat::from_tag(cursor.read_u8()?);
        let payload_len = cursor.read_u32()? as usize;
        let payload = cursor.read_fixed(payload_len)?.to_vec();

        Ok(Self {
            index,
            name,
            width,
            height,
            format,
            payload,
        })
    }

    /// Encode this record, marker included
    pub fn write_to(&self, writer: &mut ByteWriter) -> ParseResult<()> {
        writer.put_u8(TEXTURE_MARKER);
        writer.put_u32(self.index);
        writer.put_cstring(&self.name)?;
        writer.put_u32(self.width);
        writer.put_u32(self.height);
        writer.put_u8(self.format.tag());
        writer.put_count(self.payload.len())?;
        writer.put_bytes(&self.payload);
        Ok(())
    }

    /// Whether the image lives outside the BGF file
    pub fn is_external(&self) -> bool {
        self.payload.is_empty()
    }

    /// File stem of `name`, used for texture lookups
    pub fn stem(&self) -> &str {
        match self.name.rfind('.') {
            Some(dot) if dot > 0 => &self.name[..dot],
            _ => &self.name,
        }
    }
}
