// bgfkit-parsers/src/baf/ini.rs
//! Clip definitions from the INI sidecar of a BAF file
//!
//! ```ini
//! ; comment
//! [walk]
//! start = 0
//! end   = 24
//! ```
//!
//! Parsing is lenient: anything that cannot be understood is skipped with a
//! warning, and only complete clips are kept.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::traits::{ParseError, ParseResult};

/// Name of the clip used when no sidecar exists
pub const DEFAULT_CLIP_NAME: &str = "default";

/// A named keyframe range, both ends inclusive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimationClip {
    pub name: String,
    pub start: usize,
    pub end: usize,
}

impl AnimationClip {
    /// Number of keyframes in the clip
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    /// A clip always spans at least one keyframe
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Clips defined for one BAF file, in definition order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BafIniFile {
    pub clips: Vec<AnimationClip>,
}

/// Section being filled while scanning lines
#[derive(Default)]
struct PendingClip {
    name: String,
    line: usize,
    start: Option<usize>,
    end: Option<usize>,
}

impl BafIniFile {
    /// Sidecar path for a BAF file: same directory and stem, `.ini` extension
    pub fn sidecar_path(baf_path: &Path) -> PathBuf {
        baf_path.with_extension("ini")
    }

    /// Read and parse a sidecar file
    pub fn from_file(path: impl AsRef<Path>) -> ParseResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ParseError::SourceNotFound(path.to_path_buf()));
        }
        let bytes = std::fs::read(path)?;
        // Sidecars are written with the same legacy code page as the binaries
        let (text, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
        Ok(Self::parse(&text))
    }

    /// Parse sidecar text; never fails
    pub fn parse(text: &str) -> Self {
        let mut ini = Self::default();
        let mut current: Option<PendingClip> = None;

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            if let Some(rest) = line.strip_prefix('[') {
                let Some(name) = rest.strip_suffix(']') else {
                    warn!(line = line_no, text = %line, "Skipping unterminated section header");
                    continue;
                };
                if let Some(done) = current.take() {
                    ini.finish(done);
                }
                current = Some(PendingClip {
                    name: name.trim().to_string(),
                    line: line_no,
                    ..PendingClip::default()
                });
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                warn!(line = line_no, text = %line, "Skipping line without '='");
                continue;
            };
            let Some(clip) = current.as_mut() else {
                warn!(line = line_no, text = %line, "Skipping key outside of a section");
                continue;
            };

            let key = key.trim().to_ascii_lowercase();
            let slot = match key.as_str() {
                "start" => &mut clip.start,
                "end" => &mut clip.end,
                _ => continue,
            };
            match value.trim().parse::<usize>() {
                Ok(frame) => *slot = Some(frame),
                Err(_) => {
                    warn!(line = line_no, key = %key, value = %value.trim(), "Skipping non-numeric value");
                }
            }
        }

        if let Some(done) = current.take() {
            ini.finish(done);
        }
        ini
    }

    fn finish(&mut self, pending: PendingClip) {
        let (Some(start), Some(end)) = (pending.start, pending.end) else {
            warn!(clip = %pending.name, line = pending.line, "Dropping clip without start and end");
            return;
        };
        if end < start {
            warn!(clip = %pending.name, start, end, "Dropping clip that ends before it starts");
            return;
        }

        let clip = AnimationClip {
            name: pending.name,
            start,
            end,
        };
        if let Some(existing) = self.clips.iter_mut().find(|c| c.name == clip.name) {
            warn!(clip = %clip.name, "Clip defined twice, keeping the later definition");
            *existing = clip;
        } else {
            self.clips.push(clip);
        }
    }

    /// A single clip spanning all `keyframe_count` keyframes
    pub fn whole_range(keyframe_count: usize) -> Self {
        let clips = if keyframe_count == 0 {
            Vec::new()
        } else {
            vec![AnimationClip {
                name: DEFAULT_CLIP_NAME.to_string(),
                start: 0,
                end: keyframe_count - 1,
            }]
        };
        Self { clips }
    }

    /// Load the sidecar of `baf_path`, or fall back to [`Self::whole_range`]
    pub fn for_animation(baf_path: &Path, keyframe_count: usize) -> ParseResult<Self> {
        let sidecar = Self::sidecar_path(baf_path);
        if sidecar.exists() {
            Self::from_file(&sidecar)
        } else {
            warn!(
                path = %sidecar.display(),
                "No clip sidecar found, using one clip over all keyframes"
            );
            Ok(Self::whole_range(keyframe_count))
        }
    }

    pub fn clip(&self, name: &str) -> Option<&AnimationClip> {
        self.clips.iter().find(|clip| clip.name == name)
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_clips() {
        let ini = BafIniFile::parse(
            "; idle and walk\n\
             [idle]\n\
             start = 0\n\
             end = 9\n\
             \n\
             # second clip\n\
             [walk]\n\
             START=10\n\
             end=24\n\
             speed = 2\n",
        );

        assert_eq!(ini.len(), 2);
        assert_eq!(
            ini.clip("idle"),
            Some(&AnimationClip {
                name: "idle".into(),
                start: 0,
                end: 9
            })
        );
        assert_eq!(ini.clip("walk").map(AnimationClip::len), Some(15));
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let ini = BafIniFile::parse(
            "start = 3\n\
             [broken\n\
             [run]\n\
             start = x\n\
             just text\n\
             start = 2\n\
             end = 4\n",
        );
        assert_eq!(ini.clips.len(), 1);
        assert_eq!(ini.clips[0].start, 2);
        assert_eq!(ini.clips[0].end, 4);
    }

    #[test]
    fn test_incomplete_and_inverted_clips_dropped() {
        let ini = BafIniFile::parse("[a]\nstart=1\n[b]\nstart=5\nend=2\n[c]\nstart=0\nend=0\n");
        let names: Vec<&str> = ini.clips.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["c"]);
    }

    #[test]
    fn test_duplicate_clip_later_wins() {
        let ini = BafIniFile::parse("[walk]\nstart=0\nend=5\n[idle]\nstart=6\nend=7\n[walk]\nstart=1\nend=3\n");
        assert_eq!(ini.len(), 2);
        let walk = ini.clip("walk").unwrap();
        assert_eq!((walk.start, walk.end), (1, 3));
    }

    #[test]
    fn test_whole_range() {
        let ini = BafIniFile::whole_range(30);
        assert_eq!(ini.clips[0].name, DEFAULT_CLIP_NAME);
        assert_eq!((ini.clips[0].start, ini.clips[0].end), (0, 29));
        assert!(BafIniFile::whole_range(0).is_empty());
    }

    #[test]
    fn test_sidecar_path() {
        assert_eq!(
            BafIniFile::sidecar_path(Path::new("anims/walk.baf")),
            PathBuf::from("anims/walk.ini")
        );
    }
}
