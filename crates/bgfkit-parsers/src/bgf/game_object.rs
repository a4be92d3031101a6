// bgfkit-parsers/src/bgf/game_object.rs
//! Game-object records: transformed, textured meshes with nested children

use bgfkit_core::Transform;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::cursor::ByteCursor;
use crate::traits::{ParseError, ParseOptions, ParseResult};
use crate::writer::ByteWriter;

/// Lookahead byte that opens a game-object record
pub const GAME_OBJECT_MARKER: u8 = 0x2E;

/// Encoded size of one vertex
const VERTEX_SIZE: usize = 12;
/// Encoded size of one face: 3 indices, 3 UV pairs, material slot
const FACE_SIZE: usize = 40;
/// Smallest possible encoded game object (marker, empty name, transform, three zero counts)
const MIN_OBJECT_SIZE: usize = 1 + 1 + 40 + 12;

/// One triangle of a game object
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BgfFace {
    /// Vertex indices into the owning object's vertex list
    pub indices: [u32; 3],
    /// Per-corner texture coordinates, V pointing down
    pub uvs: [[f32; 2]; 3],
    /// Material slot, resolved through the mapping object
    pub material: u32,
}

/// A node of the model hierarchy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BgfGameObject {
    pub name: String,
    /// Transform relative to the parent object
    pub transform: Transform,
    pub vertices: Vec<[f32; 3]>,
    pub faces: Vec<BgfFace>,
    pub children: Vec<BgfGameObject>,
}

impl BgfGameObject {
    /// Create an empty object with an identity transform
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Transform::IDENTITY,
            vertices: Vec::new(),
            faces: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Whether the next record is a game object, without consuming anything
    pub fn is_game_object(cursor: &ByteCursor<'_>) -> bool {
        cursor.peek_u8() == Some(GAME_OBJECT_MARKER)
    }

    /// Decode one top-level game object and all of its descendants
    pub fn from_cursor(cursor: &mut ByteCursor<'_>, options: &ParseOptions) -> ParseResult<Self> {
        Self::read_at_depth(cursor, options, 1)
    }

    fn read_at_depth(
        cursor: &mut ByteCursor<'_>,
        options: &ParseOptions,
        depth: u32,
    ) -> ParseResult<Self> {
        if depth > options.max_nesting_depth {
            return Err(ParseError::RecursionLimitExceeded {
                depth,
                limit: options.max_nesting_depth,
            });
        }

        let offset = cursor.position();
        let marker = cursor.read_u8()?;
        if marker != GAME_OBJECT_MARKER {
            return Err(ParseError::UnexpectedMarker {
                offset,
                expected: GAME_OBJECT_MARKER,
                found: marker,
            });
        }

        let name = cursor.read_cstring()?;
        let transform = Transform {
            position: cursor.read_vec3()?,
            rotation: cursor.read_quat()?,
            scale: cursor.read_vec3()?,
        };

        let vertex_count = cursor.read_count(VERTEX_SIZE)?;
        let mut vertices = Vec::with_capacity(vertex_count);
        for _ in 0..vertex_count {
            vertices.push(cursor.read_vec3()?);
        }

        let face_count = cursor.read_count(FACE_SIZE)?;
        let mut faces = Vec::with_capacity(face_count);
        for face_idx in 0..face_count {
            let indices = [cursor.read_u32()?, cursor.read_u32()?, cursor.read_u32()?];
            if let Some(&index) = indices.iter().find(|&&i| i as usize >= vertex_count) {
                return Err(ParseError::MalformedGeometry {
                    object: name,
                    face: face_idx,
                    index,
                    vertex_count,
                });
            }
            let uvs = [cursor.read_vec2()?, cursor.read_vec2()?, cursor.read_vec2()?];
            let material = cursor.read_u32()?;
            faces.push(BgfFace {
                indices,
                uvs,
                material,
            });
        }

        let child_count = cursor.read_count(MIN_OBJECT_SIZE)?;
        let mut children = Vec::with_capacity(child_count);
        for _ in 0..child_count {
            let child = Self::read_at_depth(cursor, options, depth + 1)
                .map_err(|e| wrap_child_error(e, &name))?;
            children.push(child);
        }

        tracing::trace!(
            object = %name,
            depth,
            vertices = vertex_count,
            faces = face_count,
            children = child_count,
            "Decoded game object"
        );

        Ok(Self {
            name,
            transform,
            vertices,
            faces,
            children,
        })
    }

    /// Encode this object and its descendants, markers included
    pub fn write_to(&self, writer: &mut ByteWriter) -> ParseResult<()> {
        writer.put_u8(GAME_OBJECT_MARKER);
        writer.put_cstring(&self.name)?;
        writer.put_f32s(&self.transform.position);
        writer.put_f32s(&self.transform.rotation);
        writer.put_f32s(&self.transform.scale);

        writer.put_count(self.vertices.len())?;
        for vertex in &self.vertices {
            writer.put_f32s(vertex);
        }

        writer.put_count(self.faces.len())?;
        for face in &self.faces {
            for index in face.indices {
                writer.put_u32(index);
            }
            for uv in &face.uvs {
                writer.put_f32s(uv);
            }
            writer.put_u32(face.material);
        }

        writer.put_count(self.children.len())?;
        for child in &self.children {
            child.write_to(writer)?;
        }
        Ok(())
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Whether this object carries any geometry
    pub fn has_geometry(&self) -> bool {
        !self.faces.is_empty()
    }

    /// Distinct material slots used by this object's faces, in first-use order
    pub fn material_slots(&self) -> SmallVec<[u32; 4]> {
        let mut slots = SmallVec::new();
        for face in &self.faces {
            if !slots.contains(&face.material) {
                slots.push(face.material);
            }
        }
        slots
    }

    /// This object and all of its descendants, depth-first, parents first
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }
}

/// Keep the innermost structural error visible while recording the path
fn wrap_child_error(error: ParseError, parent: &str) -> ParseError {
    match error {
        // Limits and cancellation are reported as-is so callers can match on them
        ParseError::RecursionLimitExceeded { .. } | ParseError::Cancelled => error,
        other => other.with_context(format!("child of '{parent}'")),
    }
}

/// Depth-first iterator over a game-object tree
pub struct Descendants<'a> {
    stack: Vec<&'a BgfGameObject>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a BgfGameObject;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> BgfGameObject {
        let mut root = BgfGameObject::new("root");
        let mut arm = BgfGameObject::new("arm");
        arm.children.push(BgfGameObject::new("hand"));
        root.children.push(arm);
        root.children.push(BgfGameObject::new("leg"));
        root
    }

    #[test]
    fn test_descendants_depth_first() {
        let root = tree();
        let names: Vec<&str> = root.descendants().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["root", "arm", "hand", "leg"]);
    }

    #[test]
    fn test_material_slots_first_use_order() {
        let mut object = BgfGameObject::new("wall");
        object.vertices = vec![[0.0; 3]; 3];
        for material in [2, 0, 2, 1] {
            object.faces.push(BgfFace {
                indices: [0, 1, 2],
                uvs: [[0.0; 2]; 3],
                material,
            });
        }
        assert_eq!(object.material_slots().as_slice(), &[2, 0, 1]);
        assert!(object.has_geometry());
        assert!(!BgfGameObject::new("empty").has_geometry());
    }

    #[test]
    fn test_unexpected_marker() {
        let data = [0x33u8, 0, 0, 0, 0];
        let mut cursor = ByteCursor::new(&data);
        assert!(matches!(
            BgfGameObject::from_cursor(&mut cursor, &ParseOptions::default()),
            Err(ParseError::UnexpectedMarker {
                offset: 0,
                expected: GAME_OBJECT_MARKER,
                found: 0x33
            })
        ));
    }
}
