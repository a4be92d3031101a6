//! Common types used across bgfkit
//!
//! This module provides shared type definitions used by multiple crates.

use serde::{Deserialize, Serialize};

/// Identity quaternion (x, y, z, w)
pub const IDENTITY_ROTATION: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Local transform of a scene object or bone
///
/// Rotation is a quaternion stored as `[x, y, z, w]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: [f32; 3],
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: [0.0, 0.0, 0.0],
        rotation: IDENTITY_ROTATION,
        scale: [1.0, 1.0, 1.0],
    };

    /// Create a transform with only a translation
    pub fn from_position(position: [f32; 3]) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    /// Check whether this transform leaves points unchanged
    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}
