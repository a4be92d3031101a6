//! glTF 2.0 exporter
//!
//! Exports decoded BGF models, optionally merged with a BAF animation, to
//! glTF 2.0 (JSON + BIN, or a single GLB).

mod animation;
mod exporter;

pub use animation::AnimationInput;
pub use exporter::{GltfExportOptions, GltfExporter};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// glTF 2.0 root structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Gltf {
    pub asset: Asset,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub scenes: Vec<Scene>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub nodes: Vec<Node>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub meshes: Vec<Mesh>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub materials: Vec<Material>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub textures: Vec<Texture>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub images: Vec<Image>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub accessors: Vec<Accessor>,
    #[serde(skip_serializing_if = "Vec::is_empty", default, rename = "bufferViews")]
    pub buffer_views: Vec<BufferView>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub buffers: Vec<Buffer>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub skins: Vec<Skin>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub animations: Vec<Animation>,
}

impl Gltf {
    /// Index of the first node with the given name
    pub fn node_by_name(&self, name: &str) -> Option<usize> {
        self.nodes
            .iter()
            .position(|node| node.name.as_deref() == Some(name))
    }
}

/// glTF asset metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generator: Option<String>,
}

impl Default for Asset {
    fn default() -> Self {
        Self {
            version: "2.0".to_string(),
            generator: Some(format!("bgfkit {}", crate::VERSION)),
        }
    }
}

/// glTF scene
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub nodes: Vec<usize>,
}

/// glTF node
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Node {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mesh: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skin: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translation: Option<[f32; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<[f32; 4]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<[f32; 3]>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub children: Vec<usize>,
}

/// glTF mesh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mesh {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub primitives: Vec<Primitive>,
}

/// glTF mesh primitive
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Primitive {
    pub attributes: BTreeMap<String, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indices: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub material: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<u32>,
}

/// glTF material
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Material {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "pbrMetallicRoughness")]
    pub pbr_metallic_roughness: Option<PbrMetallicRoughness>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "doubleSided")]
    pub double_sided: Option<bool>,
}

/// PBR metallic roughness material
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PbrMetallicRoughness {
    #[serde(skip_serializing_if = "Option::is_none", rename = "baseColorFactor")]
    pub base_color_factor: Option<[f32; 4]>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "baseColorTexture")]
    pub base_color_texture: Option<TextureInfo>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "metallicFactor")]
    pub metallic_factor: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "roughnessFactor")]
    pub roughness_factor: Option<f32>,
}

/// Reference from a material to a texture
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextureInfo {
    pub index: usize,
}

/// glTF texture
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Texture {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<usize>,
}

/// glTF image, always an external file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

/// glTF accessor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Accessor {
    #[serde(skip_serializing_if = "Option::is_none", rename = "bufferView")]
    pub buffer_view: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "byteOffset")]
    pub byte_offset: Option<usize>,
    #[serde(rename = "componentType")]
    pub component_type: u32,
    pub count: usize,
    #[serde(rename = "type")]
    pub accessor_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<Vec<f32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<Vec<f32>>,
}

/// glTF buffer view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferView {
    pub buffer: usize,
    #[serde(skip_serializing_if = "Option::is_none", rename = "byteOffset")]
    pub byte_offset: Option<usize>,
    #[serde(rename = "byteLength")]
    pub byte_length: usize,
    #[serde(skip_serializing_if = "Option::is_none", rename = "byteStride")]
    pub byte_stride: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<u32>,
}

/// glTF buffer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Buffer {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(rename = "byteLength")]
    pub byte_length: usize,
}

/// glTF skin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Skin {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "inverseBindMatrices")]
    pub inverse_bind_matrices: usize,
    pub joints: Vec<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skeleton: Option<usize>,
}

/// glTF animation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Animation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub channels: Vec<AnimationChannel>,
    pub samplers: Vec<AnimationSampler>,
}

/// Binds a sampler to a node property
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimationChannel {
    pub sampler: usize,
    pub target: AnimationTarget,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimationTarget {
    pub node: usize,
    /// `translation`, `rotation` or `scale`
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimationSampler {
    /// Accessor of keyframe times in seconds
    pub input: usize,
    /// Accessor of keyframe values
    pub output: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interpolation: Option<String>,
}

// glTF component type constants
pub const COMPONENT_TYPE_UNSIGNED_SHORT: u32 = 5123;
pub const COMPONENT_TYPE_UNSIGNED_INT: u32 = 5125;
pub const COMPONENT_TYPE_FLOAT: u32 = 5126;

// glTF buffer view target constants
pub const TARGET_ARRAY_BUFFER: u32 = 34962;
pub const TARGET_ELEMENT_ARRAY_BUFFER: u32 = 34963;

// glTF primitive mode constants
pub const MODE_TRIANGLES: u32 = 4;

// GLB container
pub const GLB_MAGIC: &[u8; 4] = b"glTF";
pub const GLB_VERSION: u32 = 2;
pub const GLB_CHUNK_JSON: u32 = 0x4E4F_534A;
pub const GLB_CHUNK_BIN: u32 = 0x004E_4942;
