//! Wavefront OBJ + MTL exporter
//!
//! The object tree is flattened into world space: OBJ has no hierarchy, so
//! each game object becomes an `o` group and its local transform is baked
//! into the vertex positions.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use bgfkit_parsers::{BgfFile, BgfGameObject, BgfTexture};
use glam::{Mat4, Vec3};
use tracing::debug;

use crate::coords;
use crate::error::ExportResult;
use crate::materials::{MaterialResolver, MissingMaterialPolicy, TextureLibrary, UNTEXTURED_MATERIAL};
use crate::paths::{relative_path, write_all_atomic, PendingFile};
use crate::report::ConversionReport;

/// Wavefront export options
#[derive(Debug, Clone, Default)]
pub struct WavefrontOptions {
    /// Handling of faces whose material slot has no texture
    pub missing_material: MissingMaterialPolicy,
}

/// One triangle corner: 0-based position and UV indices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjCorner {
    pub position: usize,
    pub uv: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjFace {
    pub corners: [ObjCorner; 3],
    /// Index into [`WavefrontObject::materials`]
    pub material: usize,
}

/// Faces of one game object
#[derive(Debug, Clone, PartialEq)]
pub struct ObjGroup {
    pub name: String,
    pub faces: Vec<ObjFace>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjMaterial {
    pub name: String,
    /// Texture name as stored in the BGF file; `None` for the untextured material
    pub texture: Option<String>,
}

/// OBJ/MTL pair derived from one BGF document
#[derive(Debug, Clone, PartialEq)]
pub struct WavefrontObject {
    pub name: String,
    pub positions: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub groups: Vec<ObjGroup>,
    pub materials: Vec<ObjMaterial>,
}

impl WavefrontObject {
    /// Flatten a decoded model into world-space OBJ data
    pub fn from_bgf_file(file: &BgfFile, options: &WavefrontOptions) -> ExportResult<(Self, ConversionReport)> {
        let mut builder = Builder {
            resolver: MaterialResolver::new(file, options.missing_material),
            object: WavefrontObject {
                name: file
                    .source
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                positions: Vec::new(),
                uvs: Vec::new(),
                groups: Vec::new(),
                materials: Vec::new(),
            },
            uv_index: HashMap::new(),
            by_texture: HashMap::new(),
            untextured: None,
        };

        for object in &file.game_objects {
            builder.add_object(object, Mat4::IDENTITY)?;
        }

        let mut report = ConversionReport::new(&file.source);
        for warning in builder.resolver.warnings() {
            report.warn(warning);
        }

        let object = builder.object;
        debug!(
            file = %file.file_name(),
            vertices = object.positions.len(),
            uvs = object.uvs.len(),
            groups = object.groups.len(),
            materials = object.materials.len(),
            "Built Wavefront document"
        );
        Ok((object, report))
    }

    pub fn face_count(&self) -> usize {
        self.groups.iter().map(|g| g.faces.len()).sum()
    }

    /// Serialize the OBJ text, referencing `mtl_name` as its material library
    pub fn to_obj_string(&self, mtl_name: &str) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# bgfkit {}", crate::VERSION);
        let _ = writeln!(out, "mtllib {mtl_name}");

        for [x, y, z] in &self.positions {
            let _ = writeln!(out, "v {x} {y} {z}");
        }
        for [u, v] in &self.uvs {
            let _ = writeln!(out, "vt {u} {v}");
        }

        for group in &self.groups {
            let _ = writeln!(out, "o {}", group.name);
            let mut current: Option<usize> = None;
            for face in &group.faces {
                if current != Some(face.material) {
                    let _ = writeln!(out, "usemtl {}", self.materials[face.material].name);
                    current = Some(face.material);
                }
                out.push('f');
                // OBJ indices are 1-based
                for corner in &face.corners {
                    let _ = write!(out, " {}/{}", corner.position + 1, corner.uv + 1);
                }
                out.push('\n');
            }
        }
        out
    }

    /// Serialize the MTL text; `texture_uri` maps a texture name to its `map_Kd` path
    pub fn to_mtl_string(&self, texture_uri: impl Fn(&str) -> String) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# bgfkit {}", crate::VERSION);

        for material in &self.materials {
            let _ = writeln!(out, "\nnewmtl {}", material.name);
            out.push_str("Ka 1 1 1\n");
            match &material.texture {
                Some(texture) => {
                    out.push_str("Kd 1 1 1\nd 1\nillum 1\n");
                    let _ = writeln!(out, "map_Kd {}", texture_uri(texture));
                }
                None => out.push_str("Kd 0.8 0.8 0.8\nd 1\nillum 1\n"),
            }
        }
        out
    }

    /// Serialize `<dir>/<stem>.obj` and `<dir>/<stem>.mtl` without touching the disk
    ///
    /// Texture paths in the MTL file are relative to `dir`.
    pub fn render(&self, dir: &Path, stem: &str, textures: &TextureLibrary) -> Vec<PendingFile> {
        let mtl_name = format!("{stem}.mtl");
        let mtl = self.to_mtl_string(|name| relative_path(dir, &textures.resolve(name)));
        vec![
            PendingFile::new(dir.join(format!("{stem}.obj")), self.to_obj_string(&mtl_name)),
            PendingFile::new(dir.join(&mtl_name), mtl),
        ]
    }

    /// Write `<dir>/<stem>.obj` and `<dir>/<stem>.mtl`
    pub fn write(&self, dir: &Path, stem: &str, textures: &TextureLibrary) -> ExportResult<Vec<PathBuf>> {
        write_all_atomic(&self.render(dir, stem, textures))
    }
}

struct Builder<'a> {
    resolver: MaterialResolver<'a>,
    object: WavefrontObject,
    /// UV bit patterns to their index, shared by every group
    uv_index: HashMap<[u32; 2], usize>,
    by_texture: HashMap<u32, usize>,
    untextured: Option<usize>,
}

impl Builder<'_> {
    fn add_object(&mut self, object: &BgfGameObject, parent_world: Mat4) -> ExportResult<()> {
        let world = parent_world * coords::matrix(&coords::transform(&object.transform));

        if object.has_geometry() {
            let base = self.object.positions.len();
            self.object.positions.extend(
                object
                    .vertices
                    .iter()
                    .map(|&v| world.transform_point3(Vec3::from_array(coords::position(v))).to_array()),
            );

            let mut faces = Vec::with_capacity(object.faces.len());
            for (face_index, face) in object.faces.iter().enumerate() {
                let texture = self.resolver.resolve(&object.name, face.material)?;
                let material = self.material_for(texture);

                let mut corners = [ObjCorner { position: 0, uv: 0 }; 3];
                for (slot, corner) in coords::winding([0usize, 1, 2]).into_iter().enumerate() {
                    let vertex = face.indices[corner];
                    // Validates the index against this object's vertex list
                    coords::vertex(object, face_index, vertex)?;
                    corners[slot] = ObjCorner {
                        position: base + vertex as usize,
                        uv: self.uv(coords::obj_uv(face.uvs[corner])),
                    };
                }
                faces.push(ObjFace { corners, material });
            }

            self.object.groups.push(ObjGroup {
                name: object.name.clone(),
                faces,
            });
        }

        for child in &object.children {
            self.add_object(child, world)?;
        }
        Ok(())
    }

    fn uv(&mut self, uv: [f32; 2]) -> usize {
        let key = [uv[0].to_bits(), uv[1].to_bits()];
        if let Some(&index) = self.uv_index.get(&key) {
            return index;
        }
        let index = self.object.uvs.len();
        self.object.uvs.push(uv);
        self.uv_index.insert(key, index);
        index
    }

    fn material_for(&mut self, texture: Option<&BgfTexture>) -> usize {
        let materials = &mut self.object.materials;
        match texture {
            Some(texture) => *self.by_texture.entry(texture.index).or_insert_with(|| {
                let mut name = texture.stem().to_string();
                if materials.iter().any(|m| m.name == name) {
                    name = format!("{name}_{}", texture.index);
                }
                materials.push(ObjMaterial {
                    name,
                    texture: Some(texture.name.clone()),
                });
                materials.len() - 1
            }),
            None => *self.untextured.get_or_insert_with(|| {
                materials.push(ObjMaterial {
                    name: UNTEXTURED_MATERIAL.to_string(),
                    texture: None,
                });
                materials.len() - 1
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bgfkit_core::Transform;
    use bgfkit_parsers::{BgfFace, BgfFooter, BgfHeader, BgfMappingObject, MappingEntry, PixelFormat};

    fn triangle(name: &str, slot: u32) -> BgfGameObject {
        let mut object = BgfGameObject::new(name);
        object.vertices = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 1.0]];
        object.faces = vec![BgfFace {
            indices: [0, 1, 2],
            uvs: [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]],
            material: slot,
        }];
        object
    }

    fn document(objects: Vec<BgfGameObject>) -> BgfFile {
        BgfFile {
            source: PathBuf::from("haus.bgf"),
            header: BgfHeader::default(),
            textures: vec![BgfTexture {
                index: 0,
                name: "wall.tga".into(),
                width: 1,
                height: 1,
                format: PixelFormat::External,
                payload: Vec::new(),
            }],
            game_objects: objects,
            mapping: BgfMappingObject {
                entries: vec![MappingEntry { slot: 0, texture_index: 0 }],
            },
            gap: Vec::new(),
            footer: BgfFooter::Reduced { object_count: 1 },
        }
    }

    #[test]
    fn test_face_line_and_uv_flip() {
        let (obj, report) =
            WavefrontObject::from_bgf_file(&document(vec![triangle("wall", 0)]), &WavefrontOptions::default())
                .unwrap();
        let text = obj.to_obj_string("haus.mtl");

        assert!(text.contains("mtllib haus.mtl\n"));
        assert!(text.contains("v 0 1 -1\n"));
        // V is flipped for OBJ
        assert!(text.contains("vt 0 1\n"));
        assert!(text.contains("vt 0 0\n"));
        // Winding reversed
        assert!(text.contains("f 1/1 3/2 2/3\n"));
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_child_positions_in_world_space() {
        let mut parent = BgfGameObject::new("base");
        parent.transform = Transform::from_position([0.0, 10.0, 0.0]);
        parent.children.push(triangle("roof", 0));

        let (obj, _) = WavefrontObject::from_bgf_file(&document(vec![parent]), &WavefrontOptions::default()).unwrap();
        assert_eq!(obj.groups.len(), 1);
        assert_eq!(obj.groups[0].name, "roof");
        assert_eq!(obj.positions[0], [0.0, 10.0, 0.0]);
    }

    #[test]
    fn test_uvs_shared_between_groups() {
        let (obj, _) = WavefrontObject::from_bgf_file(
            &document(vec![triangle("a", 0), triangle("b", 0)]),
            &WavefrontOptions::default(),
        )
        .unwrap();

        assert_eq!(obj.positions.len(), 6);
        assert_eq!(obj.uvs.len(), 3);
        assert_eq!(obj.groups[1].faces[0].corners[0].position, 3);
    }

    #[test]
    fn test_untextured_material_in_mtl() {
        let (obj, report) =
            WavefrontObject::from_bgf_file(&document(vec![triangle("door", 7)]), &WavefrontOptions::default())
                .unwrap();
        let mtl = obj.to_mtl_string(|name| name.to_string());

        assert!(mtl.contains("newmtl untextured\n"));
        assert!(!mtl.contains("map_Kd"));
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_usemtl_only_on_change() {
        let mut object = triangle("wall", 0);
        let face = object.faces[0].clone();
        object.faces.push(face);

        let (obj, _) = WavefrontObject::from_bgf_file(&document(vec![object]), &WavefrontOptions::default()).unwrap();
        let text = obj.to_obj_string("haus.mtl");
        assert_eq!(text.matches("usemtl wall").count(), 1);
        assert_eq!(obj.face_count(), 2);
    }

    #[test]
    fn test_render_stays_in_memory() {
        let dir = tempfile::tempdir().unwrap();
        let (obj, _) =
            WavefrontObject::from_bgf_file(&document(vec![triangle("wall", 0)]), &WavefrontOptions::default())
                .unwrap();
        let obj_dir = dir.path().join("obj");
        let files = obj.render(&obj_dir, "haus", &TextureLibrary::empty(dir.path().join("tex")));

        assert_eq!(files[0].path, obj_dir.join("haus.obj"));
        assert_eq!(files[1].path, obj_dir.join("haus.mtl"));
        assert!(String::from_utf8_lossy(&files[1].bytes).contains("map_Kd ../tex/wall.tga"));
        assert!(!obj_dir.exists());
    }
}
