//! glTF exporter implementation

use super::*;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use bgfkit_core::types::IDENTITY_ROTATION;
use bgfkit_parsers::{BgfFace, BgfFile, BgfGameObject, BgfTexture};
use glam::Mat4;
use tracing::debug;

use crate::coords;
use crate::error::{ExportError, ExportResult};
use crate::materials::{MaterialResolver, MissingMaterialPolicy, TextureLibrary, UNTEXTURED_MATERIAL};
use crate::paths::{relative_path, write_all_atomic, PendingFile};
use crate::report::ConversionReport;

/// glTF export options
#[derive(Debug, Clone)]
pub struct GltfExportOptions {
    /// Export as GLB (single binary file) instead of separate JSON + BIN
    pub use_glb: bool,
    /// Pretty-print JSON
    pub pretty_json: bool,
    /// Handling of faces whose material slot has no texture
    pub missing_material: MissingMaterialPolicy,
}

impl Default for GltfExportOptions {
    fn default() -> Self {
        Self {
            use_glb: false,
            pretty_json: true,
            missing_material: MissingMaterialPolicy::default(),
        }
    }
}

/// glTF exporter
///
/// One exporter can convert many files in turn; buffers are reset on every
/// [`build`](Self::build).
pub struct GltfExporter {
    options: GltfExportOptions,
    textures: Option<Arc<TextureLibrary>>,
    binary_data: Vec<u8>,
    accessors: Vec<Accessor>,
    buffer_views: Vec<BufferView>,
    /// World matrix of every node, in node order
    pub(super) node_world: Vec<Mat4>,
}

impl GltfExporter {
    /// Create a new glTF exporter
    pub fn new(options: GltfExportOptions) -> Self {
        Self {
            options,
            textures: None,
            binary_data: Vec::new(),
            accessors: Vec::new(),
            buffer_views: Vec::new(),
            node_world: Vec::new(),
        }
    }

    /// Resolve image URIs against an extracted texture directory
    pub fn with_textures(mut self, library: Arc<TextureLibrary>) -> Self {
        self.textures = Some(library);
        self
    }

    pub fn options(&self) -> &GltfExportOptions {
        &self.options
    }

    /// Binary buffer of the last build
    pub fn binary_data(&self) -> &[u8] {
        &self.binary_data
    }

    /// Convert a model and write it next to `output_path`
    ///
    /// The extension of `output_path` is replaced by `.gltf`/`.bin` or `.glb`.
    pub fn export(
        &mut self,
        file: &BgfFile,
        animation: Option<&AnimationInput>,
        output_path: impl AsRef<Path>,
    ) -> ExportResult<ConversionReport> {
        let (files, mut report) = self.render(file, animation, output_path)?;
        report.outputs = write_all_atomic(&files)?;
        Ok(report)
    }

    /// Convert a model and serialize its output files without writing them
    pub fn render(
        &mut self,
        file: &BgfFile,
        animation: Option<&AnimationInput>,
        output_path: impl AsRef<Path>,
    ) -> ExportResult<(Vec<PendingFile>, ConversionReport)> {
        let output_path = output_path.as_ref();

        let (mut gltf, report) = self.build(file, animation)?;
        let out_dir = output_path.parent().unwrap_or_else(|| Path::new("."));
        self.link_images(&mut gltf, out_dir);

        let files = if self.options.use_glb {
            vec![self.glb_file(&mut gltf, output_path)?]
        } else {
            self.separate_files(&mut gltf, output_path)?
        };
        Ok((files, report))
    }

    /// Build the glTF structure for a model and an optional animation
    ///
    /// Image URIs are the texture names as stored; [`export`](Self::export)
    /// rewrites them relative to the output directory.
    pub fn build(
        &mut self,
        file: &BgfFile,
        animation: Option<&AnimationInput>,
    ) -> ExportResult<(Gltf, ConversionReport)> {
        // Reset state
        self.binary_data.clear();
        self.accessors.clear();
        self.buffer_views.clear();
        self.node_world.clear();

        let mut gltf = Gltf::default();
        let mut report = ConversionReport::new(&file.source);
        let mut resolver = MaterialResolver::new(file, self.options.missing_material);
        let mut materials = MaterialTable::default();

        let mut roots = Vec::with_capacity(file.game_objects.len());
        for object in &file.game_objects {
            roots.push(self.add_node(&mut gltf, object, Mat4::IDENTITY, &mut resolver, &mut materials)?);
        }

        gltf.scene = Some(0);
        gltf.scenes.push(Scene {
            name: file.source.file_stem().map(|s| s.to_string_lossy().into_owned()),
            nodes: roots,
        });

        if let Some(input) = animation {
            self.add_animation(&mut gltf, input, &mut report);
        }

        for warning in resolver.warnings() {
            report.warn(warning);
        }
        materials.finish(&mut gltf);

        gltf.accessors = std::mem::take(&mut self.accessors);
        gltf.buffer_views = std::mem::take(&mut self.buffer_views);
        if !self.binary_data.is_empty() {
            gltf.buffers.push(Buffer {
                uri: None,
                byte_length: self.binary_data.len(),
            });
        }

        debug!(
            file = %file.file_name(),
            nodes = gltf.nodes.len(),
            meshes = gltf.meshes.len(),
            materials = gltf.materials.len(),
            animations = gltf.animations.len(),
            bytes = self.binary_data.len(),
            "Built glTF document"
        );

        Ok((gltf, report))
    }

    /// Add a node for `object` and its subtree, returning the node index
    fn add_node(
        &mut self,
        gltf: &mut Gltf,
        object: &BgfGameObject,
        parent_world: Mat4,
        resolver: &mut MaterialResolver<'_>,
        materials: &mut MaterialTable,
    ) -> ExportResult<usize> {
        let local = coords::transform(&object.transform);
        let world = parent_world * coords::matrix(&local);
        let rotation = coords::unit_rotation(local.rotation);

        let index = gltf.nodes.len();
        gltf.nodes.push(Node {
            name: Some(object.name.clone()),
            translation: (local.position != [0.0; 3]).then_some(local.position),
            rotation: (rotation != IDENTITY_ROTATION).then_some(rotation),
            scale: (local.scale != [1.0; 3]).then_some(local.scale),
            ..Node::default()
        });
        self.node_world.push(world);

        if object.has_geometry() {
            let mesh = self.add_mesh(gltf, object, resolver, materials)?;
            gltf.nodes[index].mesh = Some(mesh);
        }

        for child in &object.children {
            let child_index = self.add_node(gltf, child, world, resolver, materials)?;
            gltf.nodes[index].children.push(child_index);
        }

        Ok(index)
    }

    /// One mesh per object, one primitive per material
    fn add_mesh(
        &mut self,
        gltf: &mut Gltf,
        object: &BgfGameObject,
        resolver: &mut MaterialResolver<'_>,
        materials: &mut MaterialTable,
    ) -> ExportResult<usize> {
        // Face indices grouped per material, in first-use order
        let mut groups: Vec<(usize, Vec<usize>)> = Vec::new();
        for (face_index, face) in object.faces.iter().enumerate() {
            let texture = resolver.resolve(&object.name, face.material)?;
            let material = materials.material_for(texture);
            match groups.iter_mut().find(|(m, _)| *m == material) {
                Some((_, faces)) => faces.push(face_index),
                None => groups.push((material, vec![face_index])),
            }
        }

        let mut primitives = Vec::with_capacity(groups.len());
        for (material, faces) in groups {
            primitives.push(self.add_primitive(object, &faces, material)?);
        }

        let mesh = gltf.meshes.len();
        gltf.meshes.push(Mesh {
            name: Some(object.name.clone()),
            primitives,
        });
        Ok(mesh)
    }

    /// Deduplicate `(vertex, uv)` corners of the given faces into one primitive
    fn add_primitive(
        &mut self,
        object: &BgfGameObject,
        faces: &[usize],
        material: usize,
    ) -> ExportResult<Primitive> {
        let mut remap: HashMap<(u32, [u32; 2]), u32> = HashMap::new();
        let mut positions: Vec<[f32; 3]> = Vec::new();
        let mut uvs: Vec<[f32; 2]> = Vec::new();
        let mut indices: Vec<u32> = Vec::with_capacity(faces.len() * 3);

        for &face_index in faces {
            let face: &BgfFace = &object.faces[face_index];
            for corner in coords::winding([0usize, 1, 2]) {
                let vertex = face.indices[corner];
                let uv = face.uvs[corner];
                let key = (vertex, [uv[0].to_bits(), uv[1].to_bits()]);

                let index = match remap.get(&key) {
                    Some(&index) => index,
                    None => {
                        let index = u32::try_from(positions.len()).map_err(|_| {
                            ExportError::Io(std::io::Error::other("primitive exceeds u32 vertex range"))
                        })?;
                        positions.push(coords::vertex(object, face_index, vertex)?);
                        uvs.push(uv);
                        remap.insert(key, index);
                        index
                    }
                };
                indices.push(index);
            }
        }

        let mut attributes = BTreeMap::new();
        attributes.insert("POSITION".to_string(), self.add_positions(&positions));
        attributes.insert("TEXCOORD_0".to_string(), self.push_floats(&uvs, "VEC2", None, Some(TARGET_ARRAY_BUFFER)));
        let indices = self.add_indices(&indices, positions.len());

        Ok(Primitive {
            attributes,
            indices: Some(indices),
            material: Some(material),
            mode: Some(MODE_TRIANGLES),
        })
    }

    /// Add position data with the bounds glTF requires
    fn add_positions(&mut self, positions: &[[f32; 3]]) -> usize {
        let mut min = [f32::MAX; 3];
        let mut max = [f32::MIN; 3];
        for position in positions {
            for i in 0..3 {
                min[i] = min[i].min(position[i]);
                max[i] = max[i].max(position[i]);
            }
        }
        self.push_floats(positions, "VEC3", Some((min.to_vec(), max.to_vec())), Some(TARGET_ARRAY_BUFFER))
    }

    /// Add index data, as `u16` when every index fits
    fn add_indices(&mut self, indices: &[u32], vertex_count: usize) -> usize {
        self.align();
        let offset = self.binary_data.len();

        // 0xFFFF is reserved for primitive restart
        let component_type = if vertex_count < u16::MAX as usize {
            let narrow: Vec<u16> = indices.iter().map(|&i| i as u16).collect();
            self.binary_data.extend_from_slice(bytemuck::cast_slice(&narrow));
            COMPONENT_TYPE_UNSIGNED_SHORT
        } else {
            self.binary_data.extend_from_slice(bytemuck::cast_slice(indices));
            COMPONENT_TYPE_UNSIGNED_INT
        };

        self.add_accessor(offset, indices.len(), "SCALAR", component_type, None, Some(TARGET_ELEMENT_ARRAY_BUFFER))
    }

    /// Append float items to the buffer and describe them with an accessor
    pub(super) fn push_floats<T: bytemuck::Pod>(
        &mut self,
        items: &[T],
        accessor_type: &str,
        bounds: Option<(Vec<f32>, Vec<f32>)>,
        target: Option<u32>,
    ) -> usize {
        self.align();
        let offset = self.binary_data.len();
        self.binary_data.extend_from_slice(bytemuck::cast_slice(items));
        self.add_accessor(offset, items.len(), accessor_type, COMPONENT_TYPE_FLOAT, bounds, target)
    }

    /// Add accessor and buffer view for the bytes written since `offset`
    fn add_accessor(
        &mut self,
        offset: usize,
        count: usize,
        accessor_type: &str,
        component_type: u32,
        bounds: Option<(Vec<f32>, Vec<f32>)>,
        target: Option<u32>,
    ) -> usize {
        let byte_length = self.binary_data.len() - offset;

        let buffer_view_index = self.buffer_views.len();
        self.buffer_views.push(BufferView {
            buffer: 0,
            byte_offset: Some(offset),
            byte_length,
            byte_stride: None,
            target,
        });

        let (min, max) = match bounds {
            Some((min, max)) => (Some(min), Some(max)),
            None => (None, None),
        };

        let accessor_index = self.accessors.len();
        self.accessors.push(Accessor {
            buffer_view: Some(buffer_view_index),
            byte_offset: None,
            component_type,
            count,
            accessor_type: accessor_type.to_string(),
            max,
            min,
        });

        accessor_index
    }

    /// Pad the buffer so the next view starts on a 4-byte boundary
    fn align(&mut self) {
        while self.binary_data.len() % 4 != 0 {
            self.binary_data.push(0);
        }
    }

    /// Point image URIs at the texture files, relative to `out_dir`
    fn link_images(&self, gltf: &mut Gltf, out_dir: &Path) {
        let Some(library) = &self.textures else {
            return;
        };
        for image in &mut gltf.images {
            if let Some(uri) = &image.uri {
                image.uri = Some(relative_path(out_dir, &library.resolve(uri)));
            }
        }
    }

    /// Separate JSON + BIN files
    fn separate_files(&self, gltf: &mut Gltf, output_path: &Path) -> ExportResult<Vec<PendingFile>> {
        let mut files = Vec::with_capacity(2);

        if let Some(buffer) = gltf.buffers.first_mut() {
            let bin_path = output_path.with_extension("bin");
            buffer.uri = bin_path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned());
            files.push(PendingFile::new(bin_path, self.binary_data.clone()));
        }

        let json = if self.options.pretty_json {
            serde_json::to_string_pretty(gltf)?
        } else {
            serde_json::to_string(gltf)?
        };
        files.push(PendingFile::new(output_path.with_extension("gltf"), json));

        Ok(files)
    }

    /// GLB (binary glTF)
    fn glb_file(&self, gltf: &mut Gltf, output_path: &Path) -> ExportResult<PendingFile> {
        if let Some(buffer) = gltf.buffers.first_mut() {
            buffer.uri = None;
        }
        Ok(PendingFile::new(output_path.with_extension("glb"), self.glb_bytes(gltf)?))
    }

    /// Serialize a GLB container holding `gltf` and the binary buffer
    pub fn glb_bytes(&self, gltf: &Gltf) -> ExportResult<Vec<u8>> {
        let json = serde_json::to_string(gltf)?;
        let json_len = json.len();
        let json_padding = (4 - (json_len % 4)) % 4;
        let bin_len = self.binary_data.len();
        let bin_padding = (4 - (bin_len % 4)) % 4;

        let bin_chunk = if bin_len > 0 { 8 + bin_len + bin_padding } else { 0 };
        let total_len = 12 + 8 + json_len + json_padding + bin_chunk;
        let to_u32 = |len: usize| {
            u32::try_from(len).map_err(|_| ExportError::Io(std::io::Error::other("GLB exceeds 4 GiB")))
        };

        let mut out = Vec::with_capacity(total_len);

        // GLB header
        out.extend_from_slice(GLB_MAGIC);
        out.extend_from_slice(&GLB_VERSION.to_le_bytes());
        out.extend_from_slice(&to_u32(total_len)?.to_le_bytes());

        // JSON chunk, space padded
        out.extend_from_slice(&to_u32(json_len + json_padding)?.to_le_bytes());
        out.extend_from_slice(&GLB_CHUNK_JSON.to_le_bytes());
        out.extend_from_slice(json.as_bytes());
        out.resize(out.len() + json_padding, b' ');

        // BIN chunk, zero padded
        if bin_len > 0 {
            out.extend_from_slice(&to_u32(bin_len + bin_padding)?.to_le_bytes());
            out.extend_from_slice(&GLB_CHUNK_BIN.to_le_bytes());
            out.extend_from_slice(&self.binary_data);
            out.resize(out.len() + bin_padding, 0);
        }

        Ok(out)
    }
}

/// Materials, textures and images of one document
#[derive(Default)]
struct MaterialTable {
    materials: Vec<Material>,
    textures: Vec<Texture>,
    images: Vec<Image>,
    by_texture: HashMap<u32, usize>,
    untextured: Option<usize>,
}

impl MaterialTable {
    /// Material index for a resolved texture, created on first use
    fn material_for(&mut self, texture: Option<&BgfTexture>) -> usize {
        match texture {
            Some(texture) => self.textured(texture),
            None => self.untextured(),
        }
    }

    fn textured(&mut self, texture: &BgfTexture) -> usize {
        if let Some(&material) = self.by_texture.get(&texture.index) {
            return material;
        }

        let stem = texture.stem().to_string();
        // Two textures may share a stem; material names stay unique
        let name = if self.materials.iter().any(|m| m.name.as_deref() == Some(stem.as_str())) {
            format!("{stem}_{}", texture.index)
        } else {
            stem.clone()
        };
        let image = self.images.len();
        self.images.push(Image {
            name: Some(stem.clone()),
            uri: Some(texture.name.clone()),
        });

        let texture_index = self.textures.len();
        self.textures.push(Texture {
            name: Some(stem.clone()),
            source: Some(image),
        });

        let material = self.materials.len();
        self.materials.push(Material {
            name: Some(name),
            pbr_metallic_roughness: Some(PbrMetallicRoughness {
                base_color_texture: Some(TextureInfo { index: texture_index }),
                metallic_factor: Some(0.0),
                roughness_factor: Some(1.0),
                ..PbrMetallicRoughness::default()
            }),
            double_sided: None,
        });
        self.by_texture.insert(texture.index, material);
        material
    }

    fn untextured(&mut self) -> usize {
        if let Some(material) = self.untextured {
            return material;
        }
        let material = self.materials.len();
        self.materials.push(Material {
            name: Some(UNTEXTURED_MATERIAL.to_string()),
            pbr_metallic_roughness: Some(PbrMetallicRoughness {
                base_color_factor: Some([0.8, 0.8, 0.8, 1.0]),
                metallic_factor: Some(0.0),
                roughness_factor: Some(1.0),
                ..PbrMetallicRoughness::default()
            }),
            double_sided: None,
        });
        self.untextured = Some(material);
        material
    }

    fn finish(self, gltf: &mut Gltf) {
        gltf.materials = self.materials;
        gltf.textures = self.textures;
        gltf.images = self.images;
    }
}
