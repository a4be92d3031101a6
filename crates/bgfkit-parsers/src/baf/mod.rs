// bgfkit-parsers/src/baf/mod.rs
//! BAF skeletal animation parser
//!
//! A BAF file names its bones once and then stores one transform per bone
//! for every keyframe. Clip boundaries are not part of the binary file; they
//! live in an INI sidecar next to it (see [`ini`]).

pub mod ini;

pub use ini::{AnimationClip, BafIniFile};

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cursor::ByteCursor;
use crate::traits::{
    HumanReadable, ParseError, ParseOptions, ParsePhase, ParseProgress, ParseResult, Parser,
    ProgressCallback,
};
use crate::writer::ByteWriter;

/// Magic bytes at offset 0 of every BAF file
pub const BAF_MAGIC: &[u8; 4] = b"BAF\0";

/// Format versions this decoder understands
pub const BAF_SUPPORTED_VERSIONS: &[u32] = &[1];

/// Encoded size of one bone pose: translation and rotation
const BONE_KEY_SIZE: usize = 28;

/// Pose of one bone at one keyframe, relative to its parent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoneKey {
    pub translation: [f32; 3],
    /// Quaternion x, y, z, w
    pub rotation: [f32; 4],
}

/// One sampled pose of the whole skeleton
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BafKeyframe {
    /// Seconds from the start of the file
    pub time: f32,
    /// One entry per bone, in bone order
    pub bones: Vec<BoneKey>,
}

/// A decoded BAF animation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BafFile {
    pub source: PathBuf,
    pub version: u32,
    pub bones: Vec<String>,
    pub keyframes: Vec<BafKeyframe>,
}

impl BafFile {
    /// Decode the file at `path`
    pub fn from_file(path: impl AsRef<Path>) -> ParseResult<Self> {
        BafParser::new().parse_file(path.as_ref())
    }

    /// Decode an in-memory buffer
    pub fn from_bytes(data: &[u8], source: impl AsRef<Path>) -> ParseResult<Self> {
        BafParser::new().parse_bytes(data, source.as_ref(), &ParseOptions::default(), None)
    }

    /// Encode the animation back into the BAF layout
    pub fn to_bytes(&self) -> ParseResult<Vec<u8>> {
        let mut writer = ByteWriter::new();
        writer.put_bytes(BAF_MAGIC);
        writer.put_u32(self.version);
        writer.put_count(self.bones.len())?;
        for bone in &self.bones {
            writer.put_cstring(bone)?;
        }
        writer.put_count(self.keyframes.len())?;
        for (frame_idx, keyframe) in self.keyframes.iter().enumerate() {
            if keyframe.bones.len() != self.bones.len() {
                return Err(ParseError::InvalidHeader {
                    message: format!(
                        "keyframe {frame_idx} has {} bone poses, expected {}",
                        keyframe.bones.len(),
                        self.bones.len()
                    ),
                });
            }
            writer.put_f32(keyframe.time);
            for key in &keyframe.bones {
                writer.put_f32s(&key.translation);
                writer.put_f32s(&key.rotation);
            }
        }
        Ok(writer.into_inner())
    }

    /// Position of `name` in the bone list
    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|bone| bone == name)
    }

    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    pub fn keyframe_count(&self) -> usize {
        self.keyframes.len()
    }

    /// Time of the last keyframe, 0 for an empty animation
    pub fn duration(&self) -> f32 {
        self.keyframes.last().map_or(0.0, |frame| frame.time)
    }

    /// Pose of bone `bone` at keyframe `frame`
    pub fn key(&self, frame: usize, bone: usize) -> Option<&BoneKey> {
        self.keyframes.get(frame)?.bones.get(bone)
    }
}

impl HumanReadable for BafFile {
    fn to_readable_string(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("BAF animation {}\n", self.source.display()));
        out.push_str(&format!("  Version: {}\n", self.version));
        out.push_str(&format!("  Bones: {}\n", self.bones.len()));
        for (idx, bone) in self.bones.iter().enumerate() {
            out.push_str(&format!("    [{idx}] {bone}\n"));
        }
        out.push_str(&format!(
            "  Keyframes: {} ({:.3}s)\n",
            self.keyframes.len(),
            self.duration()
        ));
        out
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "source": self.source.display().to_string(),
            "version": self.version,
            "bones": self.bones,
            "keyframes": self.keyframes.len(),
            "duration": self.duration(),
        })
    }
}

/// BAF animation parser
#[derive(Debug, Default, Clone, Copy)]
pub struct BafParser;

impl BafParser {
    pub fn new() -> Self {
        Self
    }
}

impl Parser for BafParser {
    type Output = BafFile;

    fn extensions(&self) -> &[&str] {
        &["baf"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(BAF_MAGIC)
    }

    fn name(&self) -> &str {
        "BAF Animation Parser"
    }

    fn supported_versions(&self) -> &[u32] {
        BAF_SUPPORTED_VERSIONS
    }

    fn parse_bytes(
        &self,
        data: &[u8],
        source: &Path,
        options: &ParseOptions,
        progress: Option<&ProgressCallback>,
    ) -> ParseResult<BafFile> {
        let start = Instant::now();
        let mut cursor = ByteCursor::new(data);

        let magic = cursor.read_fixed(4).map_err(|_| ParseError::InvalidHeader {
            message: format!("file too small ({} bytes) for a BAF header", data.len()),
        })?;
        if magic != BAF_MAGIC {
            return Err(ParseError::InvalidHeader {
                message: format!("bad magic {magic:02X?}, expected {BAF_MAGIC:02X?}"),
            });
        }
        let version = cursor.read_u32()?;
        if !BAF_SUPPORTED_VERSIONS.contains(&version) {
            return Err(ParseError::InvalidHeader {
                message: format!("unsupported BAF version {version}"),
            });
        }

        let bone_count = cursor.read_count(1)?;
        let mut bones = Vec::with_capacity(bone_count);
        for idx in 0..bone_count {
            let name = cursor
                .read_cstring()
                .map_err(|e| e.with_context(format!("bone name {idx}")))?;
            bones.push(name);
        }

        let frame_size = 4 + bone_count * BONE_KEY_SIZE;
        let keyframe_count = cursor.read_count(frame_size)?;
        let mut keyframes = Vec::with_capacity(keyframe_count);
        for _ in 0..keyframe_count {
            options.check_cancelled()?;
            let time = cursor.read_f32()?;
            let mut keys = Vec::with_capacity(bone_count);
            for _ in 0..bone_count {
                keys.push(BoneKey {
                    translation: cursor.read_vec3()?,
                    rotation: cursor.read_quat()?,
                });
            }
            keyframes.push(BafKeyframe { time, bones: keys });
        }

        if let Some(callback) = progress {
            callback(ParseProgress {
                phase: ParsePhase::Keyframes,
                bytes_processed: cursor.position() as u64,
                total_bytes: Some(data.len() as u64),
                items_processed: keyframes.len() as u64,
            });
        }
        if !cursor.is_at_end() {
            debug!(trailing = cursor.remaining(), "Ignoring bytes after last keyframe");
        }
        crate::log_parse_complete!(self.name(), start.elapsed(), keyframes.len());

        Ok(BafFile {
            source: source.to_path_buf(),
            version,
            bones,
            keyframes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BafFile {
        let pose = |x: f32| BoneKey {
            translation: [x, 0.0, 0.0],
            rotation: [0.0, 0.0, 0.0, 1.0],
        };
        BafFile {
            source: PathBuf::from("walk.baf"),
            version: 1,
            bones: vec!["root".into(), "arm".into()],
            keyframes: (0..3)
                .map(|i| BafKeyframe {
                    time: i as f32 * 0.5,
                    bones: vec![pose(0.0), pose(i as f32)],
                })
                .collect(),
        }
    }

    #[test]
    fn test_encode_decode() {
        let original = sample();
        let bytes = original.to_bytes().unwrap();
        let decoded = BafFile::from_bytes(&bytes, "walk.baf").unwrap();

        assert_eq!(decoded, original);
        assert_eq!(decoded.bone_index("arm"), Some(1));
        assert_eq!(decoded.bone_index("leg"), None);
        assert_eq!(decoded.duration(), 1.0);
        assert_eq!(decoded.key(2, 1).unwrap().translation, [2.0, 0.0, 0.0]);
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = sample().to_bytes().unwrap();
        bytes[0] = b'X';
        assert!(matches!(
            BafFile::from_bytes(&bytes, "walk.baf"),
            Err(ParseError::InvalidHeader { .. })
        ));
    }

    #[test]
    fn test_truncated_keyframes() {
        let bytes = sample().to_bytes().unwrap();
        let cut = &bytes[..bytes.len() - 10];
        assert!(matches!(
            BafFile::from_bytes(cut, "walk.baf"),
            Err(ParseError::TruncatedInput { .. })
        ));
    }

    #[test]
    fn test_mismatched_pose_count_is_not_encoded() {
        let mut animation = sample();
        animation.keyframes[1].bones.pop();
        assert!(animation.to_bytes().is_err());
    }
}
