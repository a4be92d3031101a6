//! bgfkit export pipeline
//!
//! Converts decoded BGF models to standard formats:
//! - Wavefront OBJ + MTL (flattened, world space)
//! - glTF 2.0 (node hierarchy, materials, optional skin and animations)
//!
//! and drives whole conversion runs: resource extraction, texture lookup
//! and parallel batch conversion.

pub mod coords;
pub mod error;
pub mod gltf;
pub mod materials;
pub mod paths;
pub mod pipeline;
pub mod report;
pub mod resources;
pub mod wavefront;

pub use error::{ExportError, ExportResult};
pub use gltf::{AnimationInput, GltfExportOptions, GltfExporter};
pub use materials::{MaterialResolver, MissingMaterialPolicy, TextureLibrary};
pub use paths::PendingFile;
pub use pipeline::{BatchProgress, ModelsDecoder, ModelsDecoderConfig};
pub use report::{BatchReport, ConversionReport, ConversionWarning, FailedConversion};
pub use resources::OutputLayout;
pub use wavefront::{WavefrontObject, WavefrontOptions};

/// Version of the export crate, written into output headers
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
