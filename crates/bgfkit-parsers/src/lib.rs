//! bgfkit-parsers
//!
//! Decoders (and matching encoders) for the Europa 1400 model formats.
//!
//! # Supported Formats
//!
//! | Format | Extension | Description |
//! |--------|-----------|-------------|
//! | BGF    | `.bgf`    | Model container: textures, object hierarchy, material mapping |
//! | BAF    | `.baf`    | Skeletal animation keyframes |
//! | INI    | `.ini`    | Clip ranges for a BAF file |
//!
//! # Example
//!
//! ```rust,ignore
//! use bgfkit_parsers::{BgfFile, ParseOptions};
//!
//! let model = BgfFile::from_file("ob_haus.bgf", &ParseOptions::default())?;
//! println!("{} objects", model.all_objects().count());
//! ```

pub mod baf;
pub mod bgf;
pub mod cursor;
pub mod logging;
pub mod traits;
pub mod writer;

// Re-export main types
pub use traits::{
    HumanReadable, ParseError, ParseOptions, ParsePhase, ParseProgress,
    ParseResult, Parser, ProgressCallback,
};

pub use baf::{AnimationClip, BafFile, BafIniFile, BafKeyframe, BafParser, BoneKey};
pub use bgf::{
    BgfFace, BgfFile, BgfFooter, BgfGameObject, BgfHeader, BgfMappingObject, BgfParser,
    BgfTexture, FooterShape, MappingEntry, PixelFormat,
};
pub use cursor::ByteCursor;
pub use writer::ByteWriter;

/// Version of the parsers crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
