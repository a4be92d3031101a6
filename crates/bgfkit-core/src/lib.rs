//! bgfkit Core Library
//!
//! This crate provides common types, utilities, and error handling
//! shared across all bgfkit components.

pub mod cancel;
pub mod error;
pub mod types;

pub use cancel::CancellationToken;
pub use error::{Error, ErrorCategory, Result, ResultExt};
pub use types::*;

/// Re-export commonly used items
pub mod prelude {
    pub use crate::cancel::CancellationToken;
    pub use crate::error::{Error, ErrorCategory, Result, ResultExt};
    pub use crate::types::*;
}
