//! Path utilities for the output tree

use std::io::Write;
use std::path::{Component, Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::{ExportError, ExportResult};

/// Normalize path separators to forward slashes (for URIs and MTL files)
pub fn normalize_path<P: AsRef<Path>>(path: P) -> String {
    path.as_ref().to_string_lossy().replace('\\', "/")
}

/// Path of `target` as seen from directory `from`, with forward slashes
///
/// Both paths are compared component-wise, so they should both be absolute
/// or both be relative to the same base. Falls back to `target` unchanged
/// when they share no common prefix (for example different drive letters).
pub fn relative_path(from: &Path, target: &Path) -> String {
    let from: Vec<Component<'_>> = from.components().filter(|c| *c != Component::CurDir).collect();
    let to: Vec<Component<'_>> = target.components().filter(|c| *c != Component::CurDir).collect();

    let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();
    if common == 0 && from.first().is_some_and(|c| matches!(c, Component::Prefix(_) | Component::RootDir)) {
        return normalize_path(target);
    }

    let mut relative = PathBuf::new();
    for _ in common..from.len() {
        relative.push("..");
    }
    for component in &to[common..] {
        relative.push(component.as_os_str());
    }
    normalize_path(relative)
}

/// Write `bytes` to `path` so that readers never see a partial file
///
/// The data goes to a temporary file in the same directory, which is then
/// renamed over `path`. Parent directories are created as needed.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> ExportResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| ExportError::Persist {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}

/// A serialized output that has not been written yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFile {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

impl PendingFile {
    pub fn new(path: impl Into<PathBuf>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            bytes: bytes.into(),
        }
    }
}

/// Write every file with [`write_atomic`], all or nothing
///
/// If one write fails, the files already written by this call are removed
/// again before the error is returned.
pub fn write_all_atomic(files: &[PendingFile]) -> ExportResult<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(files.len());
    for file in files {
        if let Err(e) = write_atomic(&file.path, &file.bytes) {
            for path in &written {
                let _ = std::fs::remove_file(path);
            }
            return Err(e);
        }
        written.push(file.path.clone());
    }
    Ok(written)
}
