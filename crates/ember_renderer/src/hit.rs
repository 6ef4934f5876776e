//! Ray-surface intersection record.

use ember_math::{Vec2, Vec3};

/// Sentinel for "no primitive / no material".
pub const INVALID_INDEX: usize = usize::MAX;

/// Everything an integrator needs at a hit point.
///
/// The hit object and its material are referenced by index into the scene's
/// primitive and material arrays. `distance` starts at infinity and every
/// primitive that finds a closer hit lowers it.
#[derive(Debug, Clone, Copy)]
pub struct Intersection {
    pub hit: bool,
    pub back_face: bool,
    pub position: Vec3,
    /// Shading normal (vertex normals interpolated when available).
    pub normal: Vec3,
    /// Geometric normal of the hit surface.
    pub ng: Vec3,
    pub tangent: Vec3,
    pub bitangent: Vec3,
    pub distance: f32,
    pub uv: Vec2,
    pub material: usize,
    pub object: usize,
    /// Whether the recorded hit lies on an emissive primitive; used by the
    /// robust-light tolerance when comparing hit distances.
    pub hit_emissive: bool,
}

impl Default for Intersection {
    fn default() -> Self {
        Self {
            hit: false,
            back_face: false,
            position: Vec3::ZERO,
            normal: Vec3::ZERO,
            ng: Vec3::ZERO,
            tangent: Vec3::ZERO,
            bitangent: Vec3::ZERO,
            distance: f32::MAX,
            uv: Vec2::ZERO,
            material: INVALID_INDEX,
            object: INVALID_INDEX,
            hit_emissive: false,
        }
    }
}
