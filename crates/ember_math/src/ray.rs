//! Ray type for path tracing.

use crate::Vec3;

/// Epsilon for the lower ray domain bound. A comparatively large value is
/// used so rays leaving a surface do not re-intersect it along mesh seams.
pub const RAY_T_MIN: f32 = 1e-3;

/// A ray with cached reciprocal direction and sign bits for the slab test.
///
/// The direction must stay unit length; write it through [`Ray::set_direction`]
/// so the cache is refreshed.
#[derive(Debug, Copy, Clone)]
pub struct Ray {
    pub origin: Vec3,
    direction: Vec3,
    inv_dir: Vec3,
    sign: [usize; 3],
    /// Closed parametric domain of valid hits.
    pub t_min: f32,
    pub t_max: f32,
    /// Shadow rays short-circuit shading: primitives only report the hit,
    /// material and distance for them.
    pub shadow: bool,
    /// Remaining or accumulated bounce budget, depending on the integrator.
    pub depth: u32,
    /// Whether the previous interaction was a delta (Dirac) event.
    pub is_delta: bool,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        let mut ray = Self {
            origin,
            direction: Vec3::Z,
            inv_dir: Vec3::ONE,
            sign: [0; 3],
            t_min: RAY_T_MIN,
            t_max: f32::MAX,
            shadow: false,
            depth: 0,
            is_delta: false,
        };
        ray.set_direction(direction);
        ray
    }

    /// A ray used only for occlusion queries.
    pub fn shadow(origin: Vec3, direction: Vec3) -> Self {
        let mut ray = Self::new(origin, direction);
        ray.shadow = true;
        ray
    }

    #[inline]
    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    #[inline]
    pub fn inv_dir(&self) -> Vec3 {
        self.inv_dir
    }

    /// Sign bit per axis: 1 when the reciprocal direction is negative.
    #[inline]
    pub fn sign(&self) -> [usize; 3] {
        self.sign
    }

    #[inline]
    pub fn set_origin(&mut self, origin: Vec3) {
        self.origin = origin;
    }

    /// Renormalizes and refreshes the reciprocal-direction cache.
    pub fn set_direction(&mut self, direction: Vec3) {
        self.direction = direction.normalize();
        self.inv_dir = self.direction.recip();
        self.sign = [
            (self.inv_dir.x < 0.0) as usize,
            (self.inv_dir.y < 0.0) as usize,
            (self.inv_dir.z < 0.0) as usize,
        ];
    }

    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_renormalized() {
        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, 10.0));
        assert!((ray.direction().length() - 1.0).abs() < 1e-6);
        assert_eq!(ray.direction(), Vec3::Z);
    }

    #[test]
    fn test_inv_dir_and_sign_follow_direction() {
        let mut ray = Ray::new(Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(ray.sign(), [0, 0, 0]);
        assert_eq!(ray.inv_dir().x, 1.0);

        ray.set_direction(Vec3::new(-1.0, -3.0, 0.5));
        assert_eq!(ray.sign()[0], 1);
        assert_eq!(ray.sign()[1], 1);
        assert_eq!(ray.sign()[2], 0);
        let d = ray.direction();
        assert!((ray.inv_dir().x - 1.0 / d.x).abs() < 1e-6);
    }

    #[test]
    fn test_at() {
        let ray = Ray::new(Vec3::new(1.0, 0.0, 0.0), Vec3::X);
        assert_eq!(ray.at(2.0), Vec3::new(3.0, 0.0, 0.0));
    }
}
