//! Material resolution shared by both converters
//!
//! A face names a material slot. The mapping object binds slots to texture
//! indices, and the texture record names an image in the extracted texture
//! directory. Any broken link along that chain leaves the face unresolved,
//! which the [`MissingMaterialPolicy`] turns into an untextured face or an
//! error.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use bgfkit_parsers::{BgfFile, BgfTexture};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{ExportError, ExportResult};
use crate::report::ConversionWarning;

/// Name of the material assigned to faces without a texture
pub const UNTEXTURED_MATERIAL: &str = "untextured";

/// What to do with a face whose material slot does not resolve
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MissingMaterialPolicy {
    /// Emit the face without a texture and warn once per slot
    #[default]
    Untextured,
    /// Fail the conversion with [`ExportError::UnresolvedMaterial`]
    Error,
}

impl FromStr for MissingMaterialPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "untextured" => Ok(Self::Untextured),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown missing-material policy '{other}'")),
        }
    }
}

impl fmt::Display for MissingMaterialPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Untextured => f.write_str("untextured"),
            Self::Error => f.write_str("error"),
        }
    }
}

/// Resolves face material slots of one document
#[derive(Debug)]
pub struct MaterialResolver<'a> {
    file: &'a BgfFile,
    policy: MissingMaterialPolicy,
    unresolved: BTreeSet<u32>,
}

impl<'a> MaterialResolver<'a> {
    pub fn new(file: &'a BgfFile, policy: MissingMaterialPolicy) -> Self {
        Self {
            file,
            policy,
            unresolved: BTreeSet::new(),
        }
    }

    /// Texture for a face of `object`, or `None` for an untextured face
    pub fn resolve(&mut self, object: &str, slot: u32) -> ExportResult<Option<&'a BgfTexture>> {
        if let Some(texture) = self.file.texture_for_slot(slot) {
            return Ok(Some(texture));
        }

        match self.policy {
            MissingMaterialPolicy::Error => Err(ExportError::UnresolvedMaterial {
                object: object.to_string(),
                slot,
            }),
            MissingMaterialPolicy::Untextured => {
                if self.unresolved.insert(slot) {
                    warn!(
                        file = %self.file.file_name(),
                        object,
                        slot,
                        "Material slot does not resolve to a texture, emitting untextured faces"
                    );
                }
                Ok(None)
            }
        }
    }

    /// Slots that fell back to the untextured material so far
    pub fn unresolved_slots(&self) -> impl Iterator<Item = u32> + '_ {
        self.unresolved.iter().copied()
    }

    /// One report entry per unresolved slot
    pub fn warnings(&self) -> impl Iterator<Item = ConversionWarning> + '_ {
        self.unresolved
            .iter()
            .map(|&slot| ConversionWarning::UntexturedSlot { slot })
    }
}

/// Index of the extracted texture directory
///
/// Texture records name images with or without an extension and in any
/// case, so files are indexed by lower-case stem.
#[derive(Debug, Clone)]
pub struct TextureLibrary {
    root: PathBuf,
    by_stem: HashMap<String, PathBuf>,
}

impl TextureLibrary {
    /// A library that resolves every name under `root` without looking at disk
    pub fn empty(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            by_stem: HashMap::new(),
        }
    }

    /// Index every file below `root`; a missing directory gives an empty index
    pub fn scan(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let mut by_stem: HashMap<String, PathBuf> = HashMap::new();

        for entry in WalkDir::new(&root)
            .follow_links(true)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_type().is_file())
        {
            let Some(stem) = entry.path().file_stem() else {
                continue;
            };
            let key = stem.to_string_lossy().to_lowercase();
            // Shortest path wins so results do not depend on walk order
            let path = entry.into_path();
            match by_stem.get(&key) {
                Some(existing) if shorter_or_equal(existing, &path) => {}
                _ => {
                    by_stem.insert(key, path);
                }
            }
        }

        debug!(root = %root.display(), textures = by_stem.len(), "Indexed texture directory");
        Self { root, by_stem }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.by_stem.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_stem.is_empty()
    }

    /// On-disk path for a texture name
    ///
    /// Unknown names resolve to `<root>/<name>`, so outputs still point at
    /// where the image is expected to be.
    pub fn resolve(&self, name: &str) -> PathBuf {
        let stem = Path::new(name)
            .file_stem()
            .map(|s| s.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        self.by_stem
            .get(&stem)
            .cloned()
            .unwrap_or_else(|| self.root.join(name))
    }

    /// Whether `name` matched a file on disk
    pub fn contains(&self, name: &str) -> bool {
        Path::new(name)
            .file_stem()
            .is_some_and(|s| self.by_stem.contains_key(&s.to_string_lossy().to_lowercase()))
    }
}

fn shorter_or_equal(a: &Path, b: &Path) -> bool {
    let (a_len, b_len) = (a.components().count(), b.components().count());
    a_len < b_len || (a_len == b_len && a <= b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bgfkit_parsers::{BgfFooter, BgfHeader, BgfMappingObject, MappingEntry, PixelFormat};

    fn file_with_mapping(entries: &[(u32, u32)]) -> BgfFile {
        BgfFile {
            source: PathBuf::from("m.bgf"),
            header: BgfHeader::default(),
            textures: vec![BgfTexture {
                index: 0,
                name: "wall.tga".into(),
                width: 1,
                height: 1,
                format: PixelFormat::External,
                payload: Vec::new(),
            }],
            game_objects: Vec::new(),
            mapping: BgfMappingObject {
                entries: entries
                    .iter()
                    .map(|&(slot, texture_index)| MappingEntry { slot, texture_index })
                    .collect(),
            },
            gap: Vec::new(),
            footer: BgfFooter::Reduced { object_count: 0 },
        }
    }

    #[test]
    fn test_resolved_slot() {
        let file = file_with_mapping(&[(0, 0)]);
        let mut resolver = MaterialResolver::new(&file, MissingMaterialPolicy::Error);
        let texture = resolver.resolve("obj", 0).unwrap().unwrap();
        assert_eq!(texture.name, "wall.tga");
    }

    #[test]
    fn test_untextured_policy_warns_once_per_slot() {
        // Slot 1 has no entry, slot 2 points past the texture list
        let file = file_with_mapping(&[(0, 0), (2, 9)]);
        let mut resolver = MaterialResolver::new(&file, MissingMaterialPolicy::Untextured);

        assert!(resolver.resolve("a", 1).unwrap().is_none());
        assert!(resolver.resolve("b", 1).unwrap().is_none());
        assert!(resolver.resolve("b", 2).unwrap().is_none());

        assert_eq!(resolver.unresolved_slots().collect::<Vec<_>>(), [1, 2]);
        assert_eq!(resolver.warnings().count(), 2);
    }

    #[test]
    fn test_error_policy() {
        let file = file_with_mapping(&[]);
        let mut resolver = MaterialResolver::new(&file, MissingMaterialPolicy::Error);
        assert!(matches!(
            resolver.resolve("wall", 0),
            Err(ExportError::UnresolvedMaterial { slot: 0, .. })
        ));
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("Error".parse::<MissingMaterialPolicy>().unwrap(), MissingMaterialPolicy::Error);
        assert_eq!(MissingMaterialPolicy::default().to_string(), "untextured");
        assert!("skip".parse::<MissingMaterialPolicy>().is_err());
    }

    #[test]
    fn test_texture_library_lookup() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub").join("Wall.TGA"), b"x").unwrap();

        let library = TextureLibrary::scan(dir.path());
        assert_eq!(library.len(), 1);
        assert!(library.contains("wall"));
        assert_eq!(library.resolve("wall.bmp"), dir.path().join("sub").join("Wall.TGA"));
        assert_eq!(library.resolve("roof.tga"), dir.path().join("roof.tga"));
    }

    #[test]
    fn test_missing_texture_dir() {
        let library = TextureLibrary::scan("/nonexistent/textures");
        assert!(library.is_empty());
    }
}
