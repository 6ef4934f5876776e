//! Triangle primitive. Möller-Trumbore intersection.

use crate::hit::Intersection;
use ember_math::{sampling, Aabb, Ray, Sampler, Vec2, Vec3};

const EPSILON: f32 = 1e-6;

#[derive(Debug, Clone)]
pub struct Triangle {
    pub pos: [Vec3; 3],
    pub vn: Option<[Vec3; 3]>,
    pub vt: Option<[Vec2; 3]>,
    /// Precomputed edges from vertex 0.
    pub e01: Vec3,
    pub e02: Vec3,
    /// Geometric normal.
    pub normal: Vec3,
    pub tangent: Vec3,
    pub bitangent: Vec3,
    pub center: Vec3,
    pub bound: Aabb,
    pub area: f32,
    pub material: usize,
    pub emissive: bool,
}

impl Triangle {
    pub fn new(pos: [Vec3; 3], vn: Option<[Vec3; 3]>, vt: Option<[Vec2; 3]>, material: usize) -> Self {
        let e01 = pos[1] - pos[0];
        let e02 = pos[2] - pos[0];
        let normal = e01.cross(e02).normalize_or_zero();

        let mut bound = Aabb::EMPTY;
        for p in pos {
            bound.grow_point(p);
        }

        let (tangent, bitangent) = tangent_frame(vt.as_ref(), e01, e02, normal);

        Self {
            pos,
            vn,
            vt,
            e01,
            e02,
            normal,
            tangent,
            bitangent,
            center: (pos[0] + pos[1] + pos[2]) / 3.0,
            bound,
            area: e01.cross(e02).length() * 0.5,
            material,
            emissive: false,
        }
    }

    /// Möller-Trumbore. Updates `isect` when a closer qualifying hit is
    /// found; shadow rays record only the hit, material and distance.
    pub fn intersect(&self, ray: &Ray, isect: &mut Intersection, self_index: usize, robust: bool) {
        let pvec = ray.direction().cross(self.e02);
        let det = self.e01.dot(pvec);
        // Parallel to the triangle plane.
        if det.abs() < EPSILON {
            return;
        }

        let det_inv = 1.0 / det;
        let tvec = ray.origin - self.pos[0];
        let u = tvec.dot(pvec) * det_inv;
        if !(0.0..=1.0).contains(&u) {
            return;
        }

        let qvec = tvec.cross(self.e01);
        let v = ray.direction().dot(qvec) * det_inv;
        if v < 0.0 || u + v > 1.0 {
            return;
        }

        let t = self.e02.dot(qvec) * det_inv;
        if t < ray.t_min || t > ray.t_max {
            return;
        }
        if !accept_distance(t, isect, self.emissive, robust) {
            return;
        }

        isect.hit = true;
        isect.object = self_index;
        isect.material = self.material;
        isect.hit_emissive = self.emissive;
        isect.distance = t;

        if ray.shadow {
            return;
        }

        isect.back_face = ray.direction().dot(self.normal) > 0.0;
        isect.position = ray.at(t);
        isect.ng = self.normal;
        isect.normal = match &self.vn {
            Some(vn) => (vn[0] * (1.0 - u - v) + vn[1] * u + vn[2] * v).normalize(),
            None => self.normal,
        };
        isect.uv = match &self.vt {
            Some(vt) => vt[0] * (1.0 - u - v) + vt[1] * u + vt[2] * v,
            None => Vec2::new(u, v),
        };
        isect.tangent = self.tangent;
        isect.bitangent = self.bitangent;
    }

    /// Uniform point on the triangle surface, pdf `1 / area`.
    pub fn sample(&self, self_index: usize, rng: &mut Sampler) -> (Intersection, f32) {
        let u0 = rng.next_2d();
        let x = u0.x.sqrt();
        let y = u0.y;
        let u = x * (1.0 - y);
        let v = x * y;

        let mut isect = Intersection {
            hit: true,
            position: self.pos[0] * (1.0 - x) + self.pos[1] * u + self.pos[2] * v,
            material: self.material,
            object: self_index,
            hit_emissive: self.emissive,
            uv: Vec2::new(u, v),
            tangent: self.tangent,
            bitangent: self.bitangent,
            ..Default::default()
        };
        isect.normal = match &self.vn {
            Some(vn) => (vn[0] * (1.0 - u - v) + vn[1] * u + vn[2] * v).normalize(),
            None => self.normal,
        };
        isect.ng = self.normal;

        (isect, 1.0 / self.area)
    }
}

/// Distance acceptance including the robust-light tolerance: hits on
/// emissive primitives may displace (or resist displacement by) surfaces
/// lying within `EPSILON` of them, so lights coplanar with geometry stay
/// visible.
pub(crate) fn accept_distance(t: f32, isect: &Intersection, self_emissive: bool, robust: bool) -> bool {
    let diff = t - isect.distance;
    if robust {
        if isect.hit && isect.hit_emissive {
            diff <= -EPSILON
        } else if self_emissive {
            diff <= EPSILON
        } else {
            diff <= 0.0
        }
    } else {
        diff <= 0.0
    }
}

/// Tangent frame from the UV gradients when texture coordinates exist and
/// are non-degenerate, otherwise an orthonormal basis around the normal.
fn tangent_frame(vt: Option<&[Vec2; 3]>, e01: Vec3, e02: Vec3, normal: Vec3) -> (Vec3, Vec3) {
    if let Some(vt) = vt {
        let duv01 = vt[1] - vt[0];
        let duv02 = vt[2] - vt[0];
        let det = duv01.x * duv02.y - duv02.x * duv01.y;
        if det.abs() > EPSILON {
            let f = 1.0 / det;
            let tangent = (e01 * duv02.y - e02 * duv01.y) * f;
            let bitangent = (e02 * duv01.x - e01 * duv02.x) * f;
            return (tangent, bitangent);
        }
    }
    sampling::orthonormal_basis(normal)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_triangle() -> Triangle {
        Triangle::new(
            [
                Vec3::new(-1.0, -1.0, -1.0),
                Vec3::new(1.0, -1.0, -1.0),
                Vec3::new(0.0, 1.0, -1.0),
            ],
            None,
            None,
            0,
        )
    }

    #[test]
    fn test_hit_through_center() {
        let tri = unit_triangle();
        let ray = Ray::new(Vec3::ZERO, -Vec3::Z);
        let mut isect = Intersection::default();
        tri.intersect(&ray, &mut isect, 7, false);
        assert!(isect.hit);
        assert!((isect.distance - 1.0).abs() < 1e-5);
        assert_eq!(isect.object, 7);
    }

    #[test]
    fn test_miss_behind() {
        let tri = unit_triangle();
        let ray = Ray::new(Vec3::ZERO, Vec3::Z);
        let mut isect = Intersection::default();
        tri.intersect(&ray, &mut isect, 0, false);
        assert!(!isect.hit);
    }

    #[test]
    fn test_shadow_ray_skips_shading_data() {
        let tri = unit_triangle();
        let ray = Ray::shadow(Vec3::ZERO, -Vec3::Z);
        let mut isect = Intersection::default();
        tri.intersect(&ray, &mut isect, 0, false);
        assert!(isect.hit);
        assert!(isect.distance < 1.0 + 1e-5);
        // Shading fields stay at their defaults.
        assert_eq!(isect.normal, Vec3::ZERO);
    }

    #[test]
    fn test_area() {
        let tri = Triangle::new([Vec3::ZERO, Vec3::X, Vec3::Y], None, None, 0);
        assert!((tri.area - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_sample_points_on_surface() {
        let tri = unit_triangle();
        let mut rng = Sampler::from_seed(5);
        for _ in 0..200 {
            let (isect, pdf) = tri.sample(0, &mut rng);
            assert!((pdf - 1.0 / tri.area).abs() < 1e-6);
            // All samples lie in the z = -1 plane inside the bound.
            assert!((isect.position.z + 1.0).abs() < 1e-5);
            assert!(tri.bound.contains(isect.position));
        }
    }

    /// Reference intersection: plane hit plus barycentric containment.
    fn plane_barycentric(tri: &Triangle, ray: &Ray) -> Option<(f32, f32, f32)> {
        let denom = ray.direction().dot(tri.normal);
        if denom.abs() < 1e-6 {
            return None;
        }
        let t = (tri.pos[0] - ray.origin).dot(tri.normal) / denom;
        if t < ray.t_min {
            return None;
        }
        let p = ray.at(t);
        // Solve p - p0 = u e01 + v e02 in the triangle plane.
        let d = p - tri.pos[0];
        let d00 = tri.e01.dot(tri.e01);
        let d01 = tri.e01.dot(tri.e02);
        let d11 = tri.e02.dot(tri.e02);
        let d20 = d.dot(tri.e01);
        let d21 = d.dot(tri.e02);
        let det = d00 * d11 - d01 * d01;
        let u = (d11 * d20 - d01 * d21) / det;
        let v = (d00 * d21 - d01 * d20) / det;
        if u >= 0.0 && v >= 0.0 && u + v <= 1.0 {
            Some((t, u, v))
        } else {
            None
        }
    }

    #[test]
    fn test_moeller_trumbore_matches_plane_barycentric() {
        let mut rng = Sampler::from_seed(77);
        let mut checked = 0;
        while checked < 200 {
            let p = |rng: &mut Sampler| {
                Vec3::new(rng.next_1d(), rng.next_1d(), rng.next_1d()) * 4.0 - Vec3::splat(2.0)
            };
            let tri = Triangle::new([p(&mut rng), p(&mut rng), p(&mut rng)], None, None, 0);
            if tri.area < 0.1 {
                continue;
            }
            // Aim through a point well inside the triangle.
            let b = rng.next_2d() * 0.6 + Vec2::splat(0.15);
            let target = tri.pos[0] + tri.e01 * b.x * (1.0 - b.y) + tri.e02 * b.x * b.y;
            let origin = p(&mut rng) + Vec3::new(0.0, 0.0, 5.0);
            if (target - origin).length() < 0.5 {
                continue;
            }
            let ray = Ray::new(origin, target - origin);
            // Skip grazing configurations where both algorithms get noisy.
            if ray.direction().dot(tri.normal).abs() < 1e-2 {
                continue;
            }

            let mut isect = Intersection::default();
            tri.intersect(&ray, &mut isect, 0, false);
            let reference = plane_barycentric(&tri, &ray);

            match (isect.hit, reference) {
                (true, Some((t, _, _))) => {
                    assert!(
                        (isect.distance - t).abs() < 1e-3 * t.max(1.0),
                        "t mismatch {} vs {t}",
                        isect.distance
                    );
                }
                (false, None) => {}
                (hit, reference) => {
                    panic!("classification mismatch: mt hit={hit}, reference={reference:?}")
                }
            }
            checked += 1;
        }
    }
}
