// bgfkit-parsers/src/bgf/mod.rs
//! BGF model container parser
//!
//! A BGF file is a sequence of sections with no length framing between the
//! repeated groups:
//!
//! ```text
//! Header → Texture* → GameObject* → Mapping → [gap] → Footer
//! ```
//!
//! Group boundaries are found by peeking at the next record marker. The
//! stream position after the last game object is where the mapping object
//! must start, so every stage consumes its records exactly. The footer is
//! found by searching backwards for its anchor, and its shape depends on the
//! file name (see [`quirks`]).

mod footer;
mod game_object;
mod header;
mod mapping;
pub mod quirks;
mod texture;

pub use footer::{checksum_of, BgfFooter, DecodedCounts, FooterShape, FOOTER_ANCHOR};
pub use game_object::{BgfFace, BgfGameObject, Descendants, GAME_OBJECT_MARKER};
pub use header::{BgfHeader, BGF_MAGIC, SUPPORTED_VERSIONS};
pub use mapping::{BgfMappingObject, MappingEntry, MAPPING_MARKER};
pub use texture::{BgfTexture, PixelFormat, TEXTURE_MARKER};

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cursor::ByteCursor;
use crate::traits::{
    HumanReadable, ParseError, ParseOptions, ParsePhase, ParseProgress,
    ParseResult, Parser, ProgressCallback,
};
use crate::writer::ByteWriter;

/// A fully decoded BGF document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BgfFile {
    /// Path the document was decoded from
    pub source: PathBuf,
    pub header: BgfHeader,
    pub textures: Vec<BgfTexture>,
    /// Top-level game objects; children hang off each object
    pub game_objects: Vec<BgfGameObject>,
    pub mapping: BgfMappingObject,
    /// Opaque bytes between the mapping object and the footer anchor
    #[serde(skip)]
    pub gap: Vec<u8>,
    pub footer: BgfFooter,
}

impl BgfFile {
    /// Decode the file at `path`
    pub fn from_file(path: impl AsRef<Path>, options: &ParseOptions) -> ParseResult<Self> {
        BgfParser::new().parse_file_with_options(path.as_ref(), options, None)
    }

    /// Decode an in-memory buffer; `source` selects footer quirks
    pub fn from_bytes(data: &[u8], source: impl AsRef<Path>, options: &ParseOptions) -> ParseResult<Self> {
        BgfParser::new().parse_bytes(data, source.as_ref(), options, None)
    }

    /// Encode the document back into the BGF layout
    ///
    /// Footer counts and checksum are recomputed from the document; the
    /// footer shape is kept.
    pub fn to_bytes(&self) -> ParseResult<Vec<u8>> {
        let mut writer = ByteWriter::new();
        self.header.write_to(&mut writer)?;
        for texture in &self.textures {
            texture.write_to(&mut writer)?;
        }
        for object in &self.game_objects {
            object.write_to(&mut writer)?;
        }
        self.mapping.write_to(&mut writer)?;
        writer.put_bytes(&self.gap);

        let footer = match self.footer.shape() {
            FooterShape::Standard => BgfFooter::Standard {
                texture_count: count_u32(self.textures.len())?,
                object_count: count_u32(self.game_objects.len())?,
                mapping_count: count_u32(self.mapping.len())?,
                checksum: 0,
            },
            FooterShape::Reduced => BgfFooter::Reduced {
                object_count: count_u32(self.game_objects.len())?,
            },
        };
        footer.write_to(&mut writer);
        Ok(writer.into_inner())
    }

    /// File name of the source, for log messages
    pub fn file_name(&self) -> String {
        self.source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Texture whose record index is `index`
    pub fn texture_by_index(&self, index: u32) -> Option<&BgfTexture> {
        self.textures.iter().find(|texture| texture.index == index)
    }

    /// Texture bound to a face's material slot, if the slot resolves
    pub fn texture_for_slot(&self, slot: u32) -> Option<&BgfTexture> {
        self.mapping
            .texture_for_slot(slot)
            .and_then(|index| self.texture_by_index(index))
    }

    /// Every game object, depth-first, parents before children
    pub fn all_objects(&self) -> impl Iterator<Item = &BgfGameObject> {
        self.game_objects.iter().flat_map(BgfGameObject::descendants)
    }

    pub fn total_vertex_count(&self) -> usize {
        self.all_objects().map(BgfGameObject::vertex_count).sum()
    }

    pub fn total_face_count(&self) -> usize {
        self.all_objects().map(BgfGameObject::face_count).sum()
    }
}

fn count_u32(count: usize) -> ParseResult<u32> {
    u32::try_from(count).map_err(|_| ParseError::InvalidHeader {
        message: format!("count {count} does not fit in 32 bits"),
    })
}

impl HumanReadable for BgfFile {
    fn to_readable_string(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("BGF model '{}'\n", self.header.name));
        out.push_str(&format!("  Version: {}\n", self.header.version));
        out.push_str(&format!("  Footer: {:?}\n", self.footer.shape()));
        out.push_str(&format!("  Textures: {}\n", self.textures.len()));
        for texture in &self.textures {
            out.push_str(&format!(
                "    [{}] {} {}x{} {:?}\n",
                texture.index, texture.name, texture.width, texture.height, texture.format
            ));
        }
        out.push_str(&format!(
            "  Objects: {} ({} vertices, {} faces)\n",
            self.all_objects().count(),
            self.total_vertex_count(),
            self.total_face_count()
        ));
        for object in &self.game_objects {
            write_object_line(&mut out, object, 2);
        }
        out.push_str(&format!("  Mapping entries: {}\n", self.mapping.len()));
        for entry in &self.mapping.entries {
            out.push_str(&format!("    slot {} -> texture {}\n", entry.slot, entry.texture_index));
        }
        if !self.gap.is_empty() {
            out.push_str(&format!("  Gap: {} bytes\n", self.gap.len()));
        }
        out
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "source": self.source.display().to_string(),
            "header": self.header,
            "footer": self.footer,
            "textures": self.textures,
            "objects": self.game_objects.iter().map(object_summary).collect::<Vec<_>>(),
            "mapping": self.mapping.entries,
            "gap_bytes": self.gap.len(),
            "total_vertices": self.total_vertex_count(),
            "total_faces": self.total_face_count(),
        })
    }
}

fn write_object_line(out: &mut String, object: &BgfGameObject, indent: usize) {
    out.push_str(&format!(
        "{:width$}{} ({} vertices, {} faces, slots {:?})\n",
        "",
        object.name,
        object.vertex_count(),
        object.face_count(),
        object.material_slots().as_slice(),
        width = indent * 2
    ));
    for child in &object.children {
        write_object_line(out, child, indent + 1);
    }
}

fn object_summary(object: &BgfGameObject) -> serde_json::Value {
    serde_json::json!({
        "name": object.name,
        "transform": object.transform,
        "vertices": object.vertex_count(),
        "faces": object.face_count(),
        "material_slots": object.material_slots().to_vec(),
        "children": object.children.iter().map(object_summary).collect::<Vec<_>>(),
    })
}

/// BGF model parser
#[derive(Debug, Default, Clone, Copy)]
pub struct BgfParser;

impl BgfParser {
    pub fn new() -> Self {
        Self
    }

    fn report(
        progress: Option<&ProgressCallback>,
        phase: ParsePhase,
        cursor: &ByteCursor<'_>,
        items: usize,
    ) {
        if let Some(callback) = progress {
            callback(ParseProgress {
                phase,
                bytes_processed: cursor.position() as u64,
                total_bytes: Some(cursor.len() as u64),
                items_processed: items as u64,
            });
        }
    }

    fn decode_footer(
        cursor: &mut ByteCursor<'_>,
        body_end: usize,
        source: &Path,
        options: &ParseOptions,
    ) -> ParseResult<(BgfFooter, Vec<u8>)> {
        let shape = quirks::footer_shape_for(source, &options.extra_reduced_footer_files);
        let name = source.display().to_string();

        match BgfFooter::locate(cursor, body_end, shape, &name) {
            Err(ParseError::FooterMisaligned { anchor, expected }) if options.footer_fallback => {
                let other = shape.other();
                warn!(
                    path = %name,
                    selected = ?shape,
                    retry = ?other,
                    anchor,
                    expected,
                    "Footer does not match the selected shape, retrying"
                );
                BgfFooter::locate(cursor, body_end, other, &name)
            }
            result => result,
        }
    }
}

impl Parser for BgfParser {
    type Output = BgfFile;

    fn extensions(&self) -> &[&str] {
        &["bgf"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(BGF_MAGIC)
    }

    fn name(&self) -> &str {
        "BGF Model Parser"
    }

    fn supported_versions(&self) -> &[u32] {
        SUPPORTED_VERSIONS
    }

    fn parse_bytes(
        &self,
        data: &[u8],
        source: &Path,
        options: &ParseOptions,
        progress: Option<&ProgressCallback>,
    ) -> ParseResult<BgfFile> {
        crate::log_parse_start!(self.name(), source);
        let start = Instant::now();
        let mut cursor = ByteCursor::new(data);

        Self::report(progress, ParsePhase::ReadingHeader, &cursor, 0);
        let header = BgfHeader::from_cursor(&mut cursor)?;
        debug!(name = %header.name, version = header.version, "Decoded BGF header");

        Self::report(progress, ParsePhase::Textures, &cursor, 0);
        let mut textures = Vec::new();
        while BgfTexture::is_texture(&cursor) {
            options.check_cancelled()?;
            let texture = BgfTexture::from_cursor(&mut cursor)
                .map_err(|e| e.with_context(format!("texture {}", textures.len())))?;
            textures.push(texture);
        }
        debug!(count = textures.len(), hint = header.texture_hint, "Decoded textures");

        Self::report(progress, ParsePhase::GameObjects, &cursor, textures.len());
        let mut game_objects = Vec::new();
        while BgfGameObject::is_game_object(&cursor) {
            options.check_cancelled()?;
            let object = BgfGameObject::from_cursor(&mut cursor, options).map_err(|e| match e {
                ParseError::RecursionLimitExceeded { .. } => e,
                other => other.with_context(format!("game object {}", game_objects.len())),
            })?;
            game_objects.push(object);
        }
        debug!(count = game_objects.len(), hint = header.object_hint, "Decoded game objects");

        options.check_cancelled()?;
        Self::report(progress, ParsePhase::Mapping, &cursor, game_objects.len());
        let mapping = BgfMappingObject::from_cursor(&mut cursor)?;
        debug!(entries = mapping.len(), "Decoded mapping object");

        Self::report(progress, ParsePhase::Footer, &cursor, mapping.len());
        let body_end = cursor.position();
        let (footer, gap) = Self::decode_footer(&mut cursor, body_end, source, options)?;
        let anchor = body_end + gap.len();
        footer.confirm(
            DecodedCounts {
                textures: textures.len(),
                objects: game_objects.len(),
                mapping_entries: mapping.len(),
            },
            &data[..anchor],
            options.strict_validation,
        )?;
        if !gap.is_empty() {
            debug!(bytes = gap.len(), "Preserved gap before footer");
        }

        Self::report(progress, ParsePhase::Complete, &cursor, 0);
        crate::log_parse_complete!(self.name(), start.elapsed(), game_objects.len());

        Ok(BgfFile {
            source: source.to_path_buf(),
            header,
            textures,
            game_objects,
            mapping,
            gap,
            footer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bgfkit_core::Transform;

    fn triangle(name: &str, material: u32) -> BgfGameObject {
        let mut object = BgfGameObject::new(name);
        object.vertices = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        object.faces.push(BgfFace {
            indices: [0, 1, 2],
            uvs: [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]],
            material,
        });
        object
    }

    fn sample(shape: FooterShape) -> BgfFile {
        let mut root = triangle("root", 0);
        root.transform = Transform::from_position([1.0, 2.0, 3.0]);
        root.children.push(triangle("child", 1));

        BgfFile {
            source: PathBuf::from("sample.bgf"),
            header: BgfHeader {
                name: "sample".into(),
                texture_hint: 1,
                object_hint: 1,
                ..BgfHeader::default()
            },
            textures: vec![BgfTexture {
                index: 0,
                name: "wall.tga".into(),
                width: 8,
                height: 8,
                format: PixelFormat::External,
                payload: Vec::new(),
            }],
            game_objects: vec![root],
            mapping: BgfMappingObject {
                entries: vec![MappingEntry {
                    slot: 0,
                    texture_index: 0,
                }],
            },
            gap: b"pad".to_vec(),
            footer: match shape {
                FooterShape::Standard => BgfFooter::Standard {
                    texture_count: 0,
                    object_count: 0,
                    mapping_count: 0,
                    checksum: 0,
                },
                FooterShape::Reduced => BgfFooter::Reduced { object_count: 0 },
            },
        }
    }

    #[test]
    fn test_encode_decode_document() {
        let original = sample(FooterShape::Standard);
        let bytes = original.to_bytes().unwrap();

        let options = ParseOptions {
            strict_validation: true,
            ..ParseOptions::default()
        };
        let decoded = BgfFile::from_bytes(&bytes, "sample.bgf", &options).unwrap();

        assert_eq!(decoded.header, original.header);
        assert_eq!(decoded.textures, original.textures);
        assert_eq!(decoded.game_objects, original.game_objects);
        assert_eq!(decoded.mapping, original.mapping);
        assert_eq!(decoded.gap, b"pad");
        assert_eq!(decoded.footer.object_count(), 1);
        // Encoding a decoded document reproduces the input
        assert_eq!(decoded.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_slot_resolution() {
        let file = sample(FooterShape::Standard);
        assert_eq!(file.texture_for_slot(0).map(|t| t.name.as_str()), Some("wall.tga"));
        assert!(file.texture_for_slot(1).is_none());
        assert_eq!(file.all_objects().count(), 2);
        assert_eq!(file.total_face_count(), 2);
        assert!(file.all_objects().any(|object| object.name == "child"));
    }

    #[test]
    fn test_progress_phases_in_order() {
        use std::sync::{Arc, Mutex};

        let bytes = sample(FooterShape::Standard).to_bytes().unwrap();
        let phases = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&phases);
        let callback: ProgressCallback = Box::new(move |p: ParseProgress| {
            sink.lock().unwrap().push(p.phase);
        });

        BgfParser::new()
            .parse_bytes(&bytes, Path::new("sample.bgf"), &ParseOptions::default(), Some(&callback))
            .unwrap();

        assert_eq!(
            *phases.lock().unwrap(),
            vec![
                ParsePhase::ReadingHeader,
                ParsePhase::Textures,
                ParsePhase::GameObjects,
                ParsePhase::Mapping,
                ParsePhase::Footer,
                ParsePhase::Complete,
            ]
        );
    }

    #[test]
    fn test_readable_summary() {
        let file = sample(FooterShape::Reduced);
        let text = file.to_readable_string();
        assert!(text.contains("BGF model 'sample'"));
        assert!(text.contains("child"));

        let json = file.to_json();
        assert_eq!(json["total_faces"], 2);
        assert_eq!(json["objects"][0]["children"][0]["name"], "child");
    }
}
