//! Export errors

use std::path::PathBuf;

use bgfkit_parsers::ParseError;
use thiserror::Error;

/// Errors raised while converting or writing outputs
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Material slot {slot} of '{object}' does not resolve to a texture")]
    UnresolvedMaterial { object: String, slot: u32 },

    #[error("Cannot move finished output into place at {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type ExportResult<T> = Result<T, ExportError>;

impl From<ExportError> for bgfkit_core::Error {
    fn from(error: ExportError) -> Self {
        match error {
            ExportError::Io(io) => bgfkit_core::Error::Io(io),
            ExportError::Parse(parse) => parse.into(),
            ExportError::Persist { path, source } => bgfkit_core::Error::Output {
                path,
                message: source.to_string(),
            },
            ExportError::UnresolvedMaterial { .. } => bgfkit_core::Error::reference(error.to_string()),
            ExportError::Zip(_) | ExportError::Serialization(_) => bgfkit_core::Error::Format {
                path: PathBuf::new(),
                message: error.to_string(),
            },
        }
    }
}
