//! Axis-aligned bounding box with the slab ray intersector used by the BVH.

use crate::{Ray, Vec3};

/// An AABB described by its two extreme corners, `min <= max` componentwise.
///
/// The default box is empty (inverted infinities) so it can be grown by
/// union without special cases.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Aabb {
    pub const EMPTY: Aabb = Aabb {
        min: Vec3::splat(f32::MAX),
        max: Vec3::splat(f32::MIN),
    };

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Box spanning two arbitrary corner points.
    pub fn from_points(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Smallest box containing both operands.
    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn grow(&mut self, other: &Aabb) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    pub fn grow_point(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    #[inline]
    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn surface_area(&self) -> f32 {
        if self.min.x > self.max.x {
            return 0.0;
        }
        let e = self.extent();
        (e.x * e.y + e.y * e.z + e.z * e.x) * 2.0
    }

    #[inline]
    fn corner(&self, sign: usize) -> Vec3 {
        if sign == 0 {
            self.min
        } else {
            self.max
        }
    }

    /// Slab test. Returns the entry distance, or `None` when the ray misses
    /// the box or exits before `t_min` / enters after `t_max`. The entry
    /// distance may be negative when the origin is inside the box.
    pub fn intersect(&self, ray: &Ray) -> Option<f32> {
        let sign = ray.sign();
        let inv = ray.inv_dir();

        let mut tmin = (self.corner(sign[0]).x - ray.origin.x) * inv.x;
        let mut tmax = (self.corner(1 - sign[0]).x - ray.origin.x) * inv.x;

        let tymin = (self.corner(sign[1]).y - ray.origin.y) * inv.y;
        let tymax = (self.corner(1 - sign[1]).y - ray.origin.y) * inv.y;
        if tmin > tymax || tymin > tmax {
            return None;
        }
        tmin = tmin.max(tymin);
        tmax = tmax.min(tymax);

        let tzmin = (self.corner(sign[2]).z - ray.origin.z) * inv.z;
        let tzmax = (self.corner(1 - sign[2]).z - ray.origin.z) * inv.z;
        if tmin > tzmax || tzmin > tmax {
            return None;
        }
        tmin = tmin.max(tzmin);
        tmax = tmax.min(tzmax);

        if tmax < ray.t_min || tmin > ray.t_max {
            return None;
        }
        Some(tmin)
    }

    /// Containment test, inclusive of the faces.
    pub fn contains(&self, p: Vec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }
}
