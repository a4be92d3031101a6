// bgfkit-parsers/src/bgf/mapping.rs
//! Material slot to texture mapping

use serde::{Deserialize, Serialize};

use crate::cursor::ByteCursor;
use crate::traits::{ParseError, ParseResult};
use crate::writer::ByteWriter;

/// Byte that opens the mapping object
pub const MAPPING_MARKER: u8 = 0x33;

/// Binds one material slot to one texture index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub slot: u32,
    pub texture_index: u32,
}

/// The mapping object that follows the game objects
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BgfMappingObject {
    pub entries: Vec<MappingEntry>,
}

impl BgfMappingObject {
    /// Decode the mapping object at the cursor's current position
    pub fn from_cursor(cursor: &mut ByteCursor<'_>) -> ParseResult<Self> {
        let offset = cursor.position();
        let marker = cursor.read_u8()?;
        if marker != MAPPING_MARKER {
            return Err(ParseError::UnexpectedMarker {
                offset,
                expected: MAPPING_MARKER,
                found: marker,
            });
        }

        let count = cursor.read_count(8)?;
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            entries.push(MappingEntry {
                slot: cursor.read_u32()?,
                texture_index: cursor.read_u32()?,
            });
        }

        Ok(Self { entries })
    }

    /// Encode the mapping object, marker included
    pub fn write_to(&self, writer: &mut ByteWriter) -> ParseResult<()> {
        writer.put_u8(MAPPING_MARKER);
        writer.put_count(self.entries.len())?;
        for entry in &self.entries {
            writer.put_u32(entry.slot);
            writer.put_u32(entry.texture_index);
        }
        Ok(())
    }

    /// Texture index bound to `slot`; the first entry wins on duplicates
    pub fn texture_for_slot(&self, slot: u32) -> Option<u32> {
        self.entries
            .iter()
            .find(|entry| entry.slot == slot)
            .map(|entry| entry.texture_index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
