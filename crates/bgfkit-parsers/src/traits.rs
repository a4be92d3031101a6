// bgfkit-parsers/src/traits.rs
//! Core traits defining the parser interface for all file formats.
//!
//! This module establishes a unified parsing interface that enables:
//! - Consistent error handling across all formats
//! - Progress reporting per decoding stage
//! - Cooperative cancellation at record boundaries

use std::path::{Path, PathBuf};

use bgfkit_core::CancellationToken;
use thiserror::Error;

/// Errors that can occur during parsing operations
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Source not found: {0}")]
    SourceNotFound(PathBuf),

    #[error("Invalid header: {message}")]
    InvalidHeader { message: String },

    #[error("Truncated input at offset {offset}: requested {requested} bytes, available {available}")]
    TruncatedInput {
        offset: usize,
        requested: usize,
        available: usize,
    },

    #[error("Invalid string encoding at offset {offset}")]
    InvalidEncoding { offset: usize },

    #[error("Unexpected marker at offset {offset}: expected 0x{expected:02X}, found 0x{found:02X}")]
    UnexpectedMarker { offset: usize, expected: u8, found: u8 },

    #[error("Malformed geometry in '{object}': face {face} references vertex {index}, but only {vertex_count} vertices exist")]
    MalformedGeometry {
        object: String,
        face: usize,
        index: u32,
        vertex_count: usize,
    },

    #[error("Recursion limit exceeded: depth {depth} is above the limit of {limit}")]
    RecursionLimitExceeded { depth: u32, limit: u32 },

    #[error("Footer anchor pattern not found in {0}")]
    FooterPatternNotFound(String),

    #[error("Footer misaligned: anchor at offset {anchor}, expected at {expected}")]
    FooterMisaligned { anchor: usize, expected: usize },

    #[error("Count mismatch for {what}: footer says {expected}, decoded {actual}")]
    CountMismatch {
        what: &'static str,
        expected: u32,
        actual: usize,
    },

    #[error("Checksum mismatch: expected {expected:08X}, got {actual:08X}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("Parsing cancelled")]
    Cancelled,

    #[error("Nested error in {context}: {source}")]
    Nested {
        context: String,
        #[source]
        source: Box<ParseError>,
    },
}

impl ParseError {
    /// Wrap this error with additional context
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ParseError::Nested {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, looking through context wrappers
    pub fn root(&self) -> &ParseError {
        match self {
            ParseError::Nested { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<ParseError> for bgfkit_core::Error {
    fn from(error: ParseError) -> Self {
        match error.root() {
            ParseError::SourceNotFound(path) => bgfkit_core::Error::FileNotFound(path.clone()),
            ParseError::Cancelled => bgfkit_core::Error::Cancelled,
            _ => match error {
                ParseError::Io(io) => bgfkit_core::Error::Io(io),
                // The decoder does not know its source path; callers attach it with `with_path`
                other => bgfkit_core::Error::format(PathBuf::new(), other.to_string()),
            },
        }
    }
}

/// Result type alias for parsing operations
pub type ParseResult<T> = Result<T, ParseError>;

/// Progress callback for long-running parse operations
pub type ProgressCallback = Box<dyn Fn(ParseProgress) + Send + Sync>;

/// Progress information during parsing
#[derive(Debug, Clone)]
pub struct ParseProgress {
    /// Current phase of parsing
    pub phase: ParsePhase,
    /// Bytes processed so far
    pub bytes_processed: u64,
    /// Total bytes to process (if known)
    pub total_bytes: Option<u64>,
    /// Number of records decoded in this phase
    pub items_processed: u64,
}

/// Phases of the parsing process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsePhase {
    /// Reading file headers
    ReadingHeader,
    /// Reading the texture group
    Textures,
    /// Reading the game-object group
    GameObjects,
    /// Reading the mapping object
    Mapping,
    /// Reading the footer
    Footer,
    /// Reading keyframes
    Keyframes,
    /// Parsing complete
    Complete,
}

/// Configuration options for parsing
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Turn footer count and checksum mismatches into errors
    pub strict_validation: bool,
    /// Maximum nesting depth for game-object hierarchies
    pub max_nesting_depth: u32,
    /// Retry the other footer shape when the selected one does not align
    pub footer_fallback: bool,
    /// File names that use the reduced footer, on top of the built-in table
    pub extra_reduced_footer_files: Vec<String>,
    /// Checked between records
    pub cancel: CancellationToken,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            strict_validation: false,
            max_nesting_depth: 32,
            footer_fallback: false,
            extra_reduced_footer_files: Vec::new(),
            cancel: CancellationToken::new(),
        }
    }
}

impl ParseOptions {
    /// Fail with `Cancelled` if cancellation was requested
    pub fn check_cancelled(&self) -> ParseResult<()> {
        if self.cancel.is_cancelled() {
            Err(ParseError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Core trait for all file format parsers
///
/// The formats handled here are small enough to be read into memory in one
/// go, so parsers work on byte slices. The source path is passed along
/// because some decisions (the BGF footer quirk table) are keyed by file name.
pub trait Parser: Send + Sync {
    /// The parsed output type
    type Output: Send + Sync;

    /// Returns the file extensions this parser handles (e.g., ["bgf"])
    fn extensions(&self) -> &[&str];

    /// Returns the magic bytes that identify this file type (if applicable)
    fn magic_bytes(&self) -> Option<&[u8]> {
        None
    }

    /// Returns a human-readable name for this parser
    fn name(&self) -> &str;

    /// Returns the format version(s) supported by this parser
    fn supported_versions(&self) -> &[u32] {
        &[]
    }

    /// Parse an in-memory buffer read from `source`
    fn parse_bytes(
        &self,
        data: &[u8],
        source: &Path,
        options: &ParseOptions,
        progress: Option<&ProgressCallback>,
    ) -> ParseResult<Self::Output>;

    /// Parse from a file path
    fn parse_file(&self, path: &Path) -> ParseResult<Self::Output> {
        self.parse_file_with_options(path, &ParseOptions::default(), None)
    }

    /// Parse from a file path with options
    fn parse_file_with_options(
        &self,
        path: &Path,
        options: &ParseOptions,
        progress: Option<&ProgressCallback>,
    ) -> ParseResult<Self::Output> {
        if !path.exists() {
            return Err(ParseError::SourceNotFound(path.to_path_buf()));
        }

        let data = std::fs::read(path)?;
        self.parse_bytes(&data, path, options, progress).inspect_err(|e| {
            crate::log_parse_error!(self.name(), e);
        })
    }

    /// Check if this parser can handle the given file
    fn can_parse(&self, path: &Path) -> bool {
        // Check extension
        if let Some(ext) = path.extension() {
            let ext_str = ext.to_string_lossy().to_lowercase();
            if self.extensions().iter().any(|e| e.to_lowercase() == ext_str) {
                return true;
            }
        }

        // Try to check magic bytes if available
        if let Some(magic) = self.magic_bytes() {
            if let Ok(mut file) = std::fs::File::open(path) {
                use std::io::Read;
                let mut buffer = vec![0u8; magic.len()];
                if file.read_exact(&mut buffer).is_ok() {
                    return buffer == magic;
                }
            }
        }

        false
    }
}

/// Trait for converting parsed data to human-readable formats
pub trait HumanReadable {
    /// Convert to a human-readable string representation
    fn to_readable_string(&self) -> String;

    /// Convert to formatted JSON
    fn to_json(&self) -> serde_json::Value;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_context() {
        let error = ParseError::InvalidHeader {
            message: "bad magic".into(),
        };

        let contextualized = error.with_context("parsing header");

        match &contextualized {
            ParseError::Nested { context, .. } => {
                assert_eq!(context, "parsing header");
            }
            _ => panic!("Expected Nested error"),
        }
        assert!(matches!(contextualized.root(), ParseError::InvalidHeader { .. }));
    }

    #[test]
    fn test_conversion_into_core_error() {
        use bgfkit_core::ErrorCategory;

        let missing: bgfkit_core::Error = ParseError::SourceNotFound(PathBuf::from("x.bgf")).into();
        assert_eq!(missing.category(), ErrorCategory::Configuration);

        let cancelled: bgfkit_core::Error = ParseError::Cancelled.with_context("objects").into();
        assert_eq!(cancelled.category(), ErrorCategory::Cancelled);

        let format: bgfkit_core::Error = ParseError::FooterPatternNotFound("a.bgf".into()).into();
        assert_eq!(format.category(), ErrorCategory::Format);
    }

    #[test]
    fn test_cancelled_options() {
        let options = ParseOptions::default();
        assert!(options.check_cancelled().is_ok());
        options.cancel.cancel();
        assert!(matches!(options.check_cancelled(), Err(ParseError::Cancelled)));
    }
}
