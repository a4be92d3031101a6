//! Unified error handling for bgfkit
//!
//! Every crate in the workspace reports failures with its own error type
//! (`ParseError`, `ExportError`). At the pipeline boundary they are folded
//! into this [`Error`], whose [`ErrorCategory`] describes the batch policy:
//! configuration errors abort before any decoding, format errors abort only
//! the affected file, reference errors degrade output, I/O errors abort the
//! affected output.

use std::path::PathBuf;
use thiserror::Error;

/// Unified error type for all bgfkit operations
#[derive(Error, Debug)]
pub enum Error {
    // ==================== Configuration Errors ====================

    /// Missing or invalid input path, missing resource container
    #[error("Invalid configuration: {message}")]
    Configuration {
        message: String,
    },

    /// A required input does not exist
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    // ==================== Format Errors ====================

    /// The input could not be decoded
    #[error("Format error in {path}: {message}")]
    Format {
        path: PathBuf,
        message: String,
    },

    // ==================== Reference Errors ====================

    /// A material, texture or bone reference could not be resolved
    #[error("Unresolved reference: {message}")]
    Reference {
        message: String,
    },

    // ==================== I/O Errors ====================

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An output could not be written
    #[error("Cannot write {path}: {message}")]
    Output {
        path: PathBuf,
        message: String,
    },

    // ==================== General Errors ====================

    /// Operation cancelled
    #[error("Operation cancelled")]
    Cancelled,

    /// Custom error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

/// Result type using the unified Error
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification used by the batch driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Fatal before any decoding starts
    Configuration,
    /// Fatal for one file
    Format,
    /// Degrades output, never fatal
    Reference,
    /// Fatal for the affected output
    Io,
    /// The caller asked to stop
    Cancelled,
}

impl Error {
    /// Create an error with additional context
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Error::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Create a format error for the given input
    pub fn format(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::Format {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a reference error
    pub fn reference(message: impl Into<String>) -> Self {
        Error::Reference {
            message: message.into(),
        }
    }

    /// Classify this error, looking through context wrappers
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Configuration { .. } | Error::FileNotFound(_) => ErrorCategory::Configuration,
            Error::Format { .. } => ErrorCategory::Format,
            Error::Reference { .. } => ErrorCategory::Reference,
            Error::Io(_) | Error::Output { .. } => ErrorCategory::Io,
            Error::Cancelled => ErrorCategory::Cancelled,
            Error::WithContext { source, .. } => source.category(),
        }
    }

    /// Attach the input path to format errors that were raised without one
    pub fn with_path(self, path: impl Into<PathBuf>) -> Self {
        match self {
            Error::Format { path: current, message } if current.as_os_str().is_empty() => Error::Format {
                path: path.into(),
                message,
            },
            Error::WithContext { context, source } => Error::WithContext {
                context,
                source: Box::new((*source).with_path(path)),
            },
            other => other,
        }
    }

    /// Check if this is a "not found" type error
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::FileNotFound(_) => true,
            Error::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            Error::WithContext { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<Error>,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.into().with_context(f()))
    }
}
