//! Coordinate and texture-space conversions
//!
//! BGF data is left-handed and Y-up with V pointing down. Both output formats
//! are right-handed and Y-up, so Z is mirrored: positions become
//! `(x, y, -z)`, quaternions `(-x, -y, z, w)`, and triangle winding is
//! reversed to keep faces pointing outwards.

use bgfkit_core::types::IDENTITY_ROTATION;
use bgfkit_core::Transform;
use bgfkit_parsers::{BgfGameObject, ParseError};
use glam::{Mat4, Quat, Vec3};

use crate::error::ExportResult;

/// Mirror a BGF position into the output frame
pub fn position(p: [f32; 3]) -> [f32; 3] {
    [p[0], p[1], negate(p[2])]
}

/// Mirror a BGF rotation (x, y, z, w) into the output frame
pub fn rotation(q: [f32; 4]) -> [f32; 4] {
    [negate(q[0]), negate(q[1]), q[2], q[3]]
}

// Zero stays +0.0 so text outputs never print "-0"
fn negate(x: f32) -> f32 {
    0.0 - x
}

/// Reverse the winding of a triangle
pub fn winding<T: Copy>(corners: [T; 3]) -> [T; 3] {
    [corners[0], corners[2], corners[1]]
}

/// Texture coordinate for OBJ, whose V axis points up
pub fn obj_uv(uv: [f32; 2]) -> [f32; 2] {
    [uv[0], 1.0 - uv[1]]
}

/// A local transform converted into the output frame
pub fn transform(t: &Transform) -> Transform {
    Transform {
        position: position(t.position),
        rotation: rotation(t.rotation),
        scale: t.scale,
    }
}

/// Unit quaternion for `q`; a zero quaternion means no rotation
pub fn unit_rotation(q: [f32; 4]) -> [f32; 4] {
    let rotation = Quat::from_array(q);
    if rotation.length_squared() > f32::EPSILON {
        rotation.normalize().to_array()
    } else {
        IDENTITY_ROTATION
    }
}

/// Matrix of a transform that is already in the output frame
pub fn matrix(t: &Transform) -> Mat4 {
    Mat4::from_scale_rotation_translation(
        Vec3::from_array(t.scale),
        Quat::from_array(unit_rotation(t.rotation)),
        Vec3::from_array(t.position),
    )
}

/// Local position of vertex `index` used by face `face`, in the output frame
pub fn vertex(object: &BgfGameObject, face: usize, index: u32) -> ExportResult<[f32; 3]> {
    object
        .vertices
        .get(index as usize)
        .map(|&v| position(v))
        .ok_or_else(|| {
            ParseError::MalformedGeometry {
                object: object.name.clone(),
                face,
                index,
                vertex_count: object.vertices.len(),
            }
            .into()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mirror_is_an_involution() {
        let p = [1.0, 2.0, 3.0];
        assert_eq!(position(p), [1.0, 2.0, -3.0]);
        assert_eq!(position(position(p)), p);

        let q = [0.1, 0.2, 0.3, 0.9];
        assert_eq!(rotation(rotation(q)), q);
    }

    #[test]
    fn test_mirrored_rotation_matches_mirrored_points() {
        // Rotating then mirroring equals mirroring then applying the mirrored rotation
        let q = Quat::from_axis_angle(Vec3::new(1.0, 2.0, 0.5).normalize(), 0.8);
        let p = Vec3::new(0.3, -1.0, 2.0);

        let rotated = q * p;
        let expected = Vec3::from_array(position(rotated.to_array()));

        let mirrored_q = Quat::from_array(rotation(q.to_array()));
        let actual = mirrored_q * Vec3::from_array(position(p.to_array()));

        assert!((expected - actual).length() < 1e-5);
    }

    #[test]
    fn test_mirrored_zero_is_positive() {
        assert!(position([0.0; 3])[2].is_sign_positive());
        assert!(rotation([0.0, 0.0, 0.0, 1.0])[0].is_sign_positive());
    }

    #[test]
    fn test_winding_and_uv() {
        assert_eq!(winding([0, 1, 2]), [0, 2, 1]);
        assert_eq!(obj_uv([0.25, 0.0]), [0.25, 1.0]);
    }

    #[test]
    fn test_vertex_lookup_out_of_range() {
        let mut object = BgfGameObject::new("wall");
        object.vertices.push([0.0, 0.0, 1.0]);
        assert_eq!(vertex(&object, 0, 0).unwrap(), [0.0, 0.0, -1.0]);
        assert!(vertex(&object, 0, 1).is_err());
    }

    #[test]
    fn test_matrix_of_zero_rotation() {
        let t = Transform {
            rotation: [0.0; 4],
            ..Transform::from_position([1.0, 0.0, 0.0])
        };
        let m = matrix(&t);
        assert!((m.transform_point3(Vec3::ZERO) - Vec3::X).length() < 1e-6);
    }
}
