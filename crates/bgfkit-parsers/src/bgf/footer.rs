// bgfkit-parsers/src/bgf/footer.rs
//! BGF footer in its two shapes

use serde::{Deserialize, Serialize};

use crate::cursor::ByteCursor;
use crate::traits::{ParseError, ParseResult};
use crate::writer::ByteWriter;

/// Pattern that opens every footer
pub const FOOTER_ANCHOR: &[u8; 4] = b"BGFE";

/// Which footer layout a file uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FooterShape {
    /// Anchor, texture/object/mapping counts and checksum
    Standard,
    /// Anchor and object count only
    Reduced,
}

impl FooterShape {
    /// Encoded size in bytes, anchor included
    pub const fn size(self) -> usize {
        match self {
            Self::Standard => 20,
            Self::Reduced => 8,
        }
    }

    pub const fn other(self) -> Self {
        match self {
            Self::Standard => Self::Reduced,
            Self::Reduced => Self::Standard,
        }
    }
}

/// Decoded footer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BgfFooter {
    Standard {
        texture_count: u32,
        object_count: u32,
        mapping_count: u32,
        checksum: u32,
    },
    Reduced {
        object_count: u32,
    },
}

/// Counts decoded from the body, checked against the footer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedCounts {
    pub textures: usize,
    /// Top-level game objects
    pub objects: usize,
    pub mapping_entries: usize,
}

impl BgfFooter {
    /// Locate and decode the footer after `body_end`
    ///
    /// Returns the footer and the opaque gap bytes between `body_end` and the
    /// anchor. The anchor must sit exactly `shape.size()` bytes from the end.
    pub fn locate(
        cursor: &mut ByteCursor<'_>,
        body_end: usize,
        shape: FooterShape,
        source: &str,
    ) -> ParseResult<(Self, Vec<u8>)> {
        let len = cursor.len();
        let expected = len.checked_sub(shape.size()).filter(|&at| at >= body_end);

        let anchored_at_expected = expected.is_some_and(|at| {
            cursor
                .data()
                .get(at..at + FOOTER_ANCHOR.len())
                .is_some_and(|bytes| bytes == FOOTER_ANCHOR)
        });

        let anchor = match expected {
            Some(at) if anchored_at_expected => at,
            _ => {
                let found = cursor
                    .rfind(FOOTER_ANCHOR, body_end)
                    .ok_or_else(|| ParseError::FooterPatternNotFound(source.to_string()))?;
                return Err(ParseError::FooterMisaligned {
                    anchor: found,
                    expected: len.saturating_sub(shape.size()),
                });
            }
        };

        let gap = cursor.data()[body_end..anchor].to_vec();

        cursor.seek_from_end(shape.size())?;
        cursor.read_fixed(FOOTER_ANCHOR.len())?;
        let footer = match shape {
            FooterShape::Standard => Self::Standard {
                texture_count: cursor.read_u32()?,
                object_count: cursor.read_u32()?,
                mapping_count: cursor.read_u32()?,
                checksum: cursor.read_u32()?,
            },
            FooterShape::Reduced => Self::Reduced {
                object_count: cursor.read_u32()?,
            },
        };

        Ok((footer, gap))
    }

    /// Encode the footer for a body that is already in `writer`
    ///
    /// The checksum stored in a standard footer is ignored and recomputed
    /// from the bytes written so far.
    pub fn write_to(&self, writer: &mut ByteWriter) {
        let checksum = checksum_of(writer.as_slice());
        writer.put_bytes(FOOTER_ANCHOR);
        match *self {
            Self::Standard {
                texture_count,
                object_count,
                mapping_count,
                ..
            } => {
                writer.put_u32(texture_count);
                writer.put_u32(object_count);
                writer.put_u32(mapping_count);
                writer.put_u32(checksum);
            }
            Self::Reduced { object_count } => writer.put_u32(object_count),
        }
    }

    pub fn shape(&self) -> FooterShape {
        match self {
            Self::Standard { .. } => FooterShape::Standard,
            Self::Reduced { .. } => FooterShape::Reduced,
        }
    }

    pub fn object_count(&self) -> u32 {
        match *self {
            Self::Standard { object_count, .. } | Self::Reduced { object_count } => object_count,
        }
    }

    /// Compare the footer with what was actually decoded
    ///
    /// `body` is every byte before the anchor. Mismatches are logged, or
    /// returned as errors when `strict` is set.
    pub fn confirm(&self, counts: DecodedCounts, body: &[u8], strict: bool) -> ParseResult<()> {
        let mut checks: Vec<(&'static str, u32, usize)> = vec![("objects", self.object_count(), counts.objects)];
        if let Self::Standard {
            texture_count,
            mapping_count,
            ..
        } = *self
        {
            checks.push(("textures", texture_count, counts.textures));
            checks.push(("mapping entries", mapping_count, counts.mapping_entries));
        }

        for (what, expected, actual) in checks {
            if expected as usize != actual {
                if strict {
                    return Err(ParseError::CountMismatch {
                        what,
                        expected,
                        actual,
                    });
                }
                tracing::warn!(what, expected, actual, "Footer count does not match decoded data");
            }
        }

        if let Self::Standard { checksum, .. } = *self {
            let actual = checksum_of(body);
            if actual != checksum {
                if strict {
                    return Err(ParseError::ChecksumMismatch {
                        expected: checksum,
                        actual,
                    });
                }
                tracing::warn!(
                    expected = format_args!("{checksum:08X}"),
                    actual = format_args!("{actual:08X}"),
                    "Footer checksum does not match"
                );
            }
        }

        Ok(())
    }
}

/// Wrapping byte sum used by the standard footer
pub fn checksum_of(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .fold(0u32, |sum, &b| sum.wrapping_add(u32::from(b)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_standard_footer(body: &[u8], counts: [u32; 3]) -> Vec<u8> {
        let mut data = body.to_vec();
        let checksum = checksum_of(&data);
        data.extend_from_slice(FOOTER_ANCHOR);
        for count in counts {
            data.extend_from_slice(&count.to_le_bytes());
        }
        data.extend_from_slice(&checksum.to_le_bytes());
        data
    }

    #[test]
    fn test_standard_footer_with_gap() {
        let data = with_standard_footer(b"bodyGAP", [1, 2, 3]);
        let mut cursor = ByteCursor::new(&data);

        let (footer, gap) = BgfFooter::locate(&mut cursor, 4, FooterShape::Standard, "t.bgf").unwrap();
        assert_eq!(gap, b"GAP");
        assert_eq!(footer.shape(), FooterShape::Standard);
        assert_eq!(footer.object_count(), 2);

        let counts = DecodedCounts {
            textures: 1,
            objects: 2,
            mapping_entries: 3,
        };
        assert!(footer.confirm(counts, &data[..7], true).is_ok());
    }

    #[test]
    fn test_reduced_footer() {
        let mut data = b"body".to_vec();
        data.extend_from_slice(FOOTER_ANCHOR);
        data.extend_from_slice(&5u32.to_le_bytes());
        let mut cursor = ByteCursor::new(&data);

        let (footer, gap) = BgfFooter::locate(&mut cursor, 4, FooterShape::Reduced, "t.bgf").unwrap();
        assert!(gap.is_empty());
        assert_eq!(footer, BgfFooter::Reduced { object_count: 5 });
    }

    #[test]
    fn test_wrong_shape_is_misaligned() {
        let data = with_standard_footer(b"body", [0, 0, 0]);
        let mut cursor = ByteCursor::new(&data);
        assert!(matches!(
            BgfFooter::locate(&mut cursor, 4, FooterShape::Reduced, "t.bgf"),
            Err(ParseError::FooterMisaligned { anchor: 4, expected: 16 })
        ));
    }

    #[test]
    fn test_missing_anchor() {
        let data = vec![0u8; 40];
        let mut cursor = ByteCursor::new(&data);
        assert!(matches!(
            BgfFooter::locate(&mut cursor, 0, FooterShape::Standard, "t.bgf"),
            Err(ParseError::FooterPatternNotFound(_))
        ));
    }

    #[test]
    fn test_count_mismatch_lenient_and_strict() {
        let footer = BgfFooter::Standard {
            texture_count: 1,
            object_count: 1,
            mapping_count: 0,
            checksum: 0,
        };
        let counts = DecodedCounts {
            textures: 2,
            objects: 1,
            mapping_entries: 0,
        };

        assert!(footer.confirm(counts, &[], false).is_ok());
        assert!(matches!(
            footer.confirm(counts, &[], true),
            Err(ParseError::CountMismatch { what: "textures", expected: 1, actual: 2 })
        ));
    }

    #[test]
    fn test_checksum_mismatch_strict() {
        let footer = BgfFooter::Standard {
            texture_count: 0,
            object_count: 0,
            mapping_count: 0,
            checksum: 1,
        };
        let counts = DecodedCounts {
            textures: 0,
            objects: 0,
            mapping_entries: 0,
        };
        assert!(matches!(
            footer.confirm(counts, &[1, 1], true),
            Err(ParseError::ChecksumMismatch { expected: 1, actual: 2 })
        ));
    }

    #[test]
    fn test_checksum_wraps() {
        assert_eq!(checksum_of(&[0xFF; 4]), 0x3FC);
        assert_eq!(checksum_of(&[]), 0);
    }
}
