//! Math foundation for the ember renderer.
//!
//! Re-exports glam for vector/matrix types and adds the ray tracing
//! primitives the rest of the workspace builds on: rays with cached
//! reciprocal directions, axis-aligned bounding boxes with a slab
//! intersector, random-variate mappings, and a per-pixel sampler.

// Re-export glam for convenience
pub use glam::*;

mod aabb;
mod ray;
mod sampler;
pub mod sampling;

pub use aabb::Aabb;
pub use ray::Ray;
pub use sampler::Sampler;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec3_basics() {
        let v = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(v.dot(Vec3::X), 1.0);
        assert_eq!(Vec3::X.cross(Vec3::Y), Vec3::Z);
    }

    #[test]
    fn test_mat4_column_major() {
        let m = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(m.col(3).truncate(), Vec3::new(1.0, 2.0, 3.0));
    }
}
