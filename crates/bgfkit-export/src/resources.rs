//! Game resource containers and the output tree layout
//!
//! Models and textures ship in two ZIP archives under `<game>/Resources`.
//! They are unpacked once into `<out>/bgf` and `<out>/tex` before conversion.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::error::ExportResult;
use crate::paths::write_atomic;

pub const RESOURCES_DIR: &str = "Resources";
pub const OBJECTS_BIN: &str = "objects.bin";
pub const TEXTURES_BIN: &str = "textures.bin";

pub const OBJ_DIR: &str = "obj";
pub const GLTF_DIR: &str = "gltf";
pub const TEXTURE_DIR: &str = "tex";
pub const BGF_DIR: &str = "bgf";

/// Directories of one output tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    pub root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn obj_dir(&self) -> PathBuf {
        self.root.join(OBJ_DIR)
    }

    pub fn gltf_dir(&self) -> PathBuf {
        self.root.join(GLTF_DIR)
    }

    pub fn texture_dir(&self) -> PathBuf {
        self.root.join(TEXTURE_DIR)
    }

    pub fn bgf_dir(&self) -> PathBuf {
        self.root.join(BGF_DIR)
    }

    pub fn create_all(&self) -> io::Result<()> {
        for dir in [self.obj_dir(), self.gltf_dir(), self.texture_dir(), self.bgf_dir()] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

/// Paths of the two resource containers of a game installation
pub fn resource_archives(game_path: &Path) -> (PathBuf, PathBuf) {
    let resources = game_path.join(RESOURCES_DIR);
    (resources.join(OBJECTS_BIN), resources.join(TEXTURES_BIN))
}

/// Unpack every file of a ZIP archive below `dest`, returning the file count
///
/// Entries whose names would escape `dest` are skipped with a warning.
pub fn extract_archive(archive_path: &Path, dest: &Path) -> ExportResult<usize> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file)?;
    std::fs::create_dir_all(dest)?;

    let mut extracted = 0;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let Some(relative) = entry.enclosed_name() else {
            warn!(archive = %archive_path.display(), entry = %entry.name(), "Skipping archive entry outside the target directory");
            continue;
        };
        let target = dest.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&target)?;
            continue;
        }

        let mut data = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
        io::copy(&mut entry, &mut data)?;
        write_atomic(&target, &data)?;
        extracted += 1;
    }

    info!(archive = %archive_path.display(), files = extracted, "Extracted resource archive");
    Ok(extracted)
}

/// Extract the texture container and, when present, the model container
///
/// `textures.bin` must exist. `objects.bin` is only needed to convert every
/// model and is skipped when a single model is converted without it.
pub fn extract_resources(game_path: &Path, layout: &OutputLayout) -> ExportResult<usize> {
    let (objects, textures) = resource_archives(game_path);
    let mut total = extract_archive(&textures, &layout.texture_dir())?;
    if objects.is_file() {
        total += extract_archive(&objects, &layout.bgf_dir())?;
    } else {
        debug!(archive = %objects.display(), "Model archive not present");
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut zip = ZipWriter::new(File::create(path).unwrap());
        for (name, data) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_extract_nested_entries() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("objects.bin");
        write_zip(&archive, &[("houses/ob_haus.bgf", b"BGF\0"), ("ob_tisch.bgf", b"BGF\0")]);

        let dest = dir.path().join("out");
        assert_eq!(extract_archive(&archive, &dest).unwrap(), 2);
        assert!(dest.join("houses").join("ob_haus.bgf").is_file());
    }

    #[test]
    fn test_escaping_entry_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("textures.bin");
        write_zip(&archive, &[("../evil.tga", b"x"), ("wall.tga", b"x")]);

        let dest = dir.path().join("tex");
        assert_eq!(extract_archive(&archive, &dest).unwrap(), 1);
        assert!(!dir.path().join("evil.tga").exists());
    }

    #[test]
    fn test_objects_archive_optional() {
        let dir = tempfile::tempdir().unwrap();
        write_zip(&dir.path().join(RESOURCES_DIR).join(TEXTURES_BIN), &[("wall.tga", b"x")]);
        let layout = OutputLayout::new(dir.path().join("out"));

        assert_eq!(extract_resources(dir.path(), &layout).unwrap(), 1);
        assert!(layout.texture_dir().join("wall.tga").is_file());
    }

    #[test]
    fn test_missing_textures_archive_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(dir.path().join("out"));
        assert!(extract_resources(dir.path(), &layout).is_err());
    }
}
