//! Analytic sphere primitive.

use crate::hit::Intersection;
use crate::triangle::accept_distance;
use ember_math::{sampling, Aabb, Ray, Sampler, Vec3};
use std::f32::consts::PI;

#[derive(Debug, Clone)]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f32,
    pub bound: Aabb,
    pub area: f32,
    pub material: usize,
    pub emissive: bool,
}

impl Sphere {
    pub fn new(center: Vec3, radius: f32, material: usize) -> Self {
        Self {
            center,
            radius,
            bound: Aabb::new(center - Vec3::splat(radius), center + Vec3::splat(radius)),
            area: 4.0 * PI * radius * radius,
            material,
            emissive: false,
        }
    }

    pub fn intersect(&self, ray: &Ray, isect: &mut Intersection, self_index: usize, robust: bool) {
        let oc = ray.origin - self.center;
        let a = ray.direction().dot(ray.direction());
        let half_b = oc.dot(ray.direction());
        let c = oc.dot(oc) - self.radius * self.radius;

        let discriminant = half_b * half_b - a * c;
        if discriminant < 0.0 {
            return;
        }
        let sqrt_d = discriminant.sqrt();

        let mut t = (-half_b - sqrt_d) / a;
        if t < ray.t_min {
            t = (-half_b + sqrt_d) / a;
            if t < ray.t_min {
                return;
            }
        }
        if t > ray.t_max || !accept_distance(t, isect, self.emissive, robust) {
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

        isect.position = ray.at(t);
        let normal = (isect.position - self.center) / self.radius;
        isect.normal = normal;
        isect.ng = normal;
        isect.back_face = ray.direction().dot(normal) > 0.0;
        let (tangent, bitangent) = sampling::orthonormal_basis(normal);
        isect.tangent = tangent;
        isect.bitangent = bitangent;
    }

    /// Uniform point on the sphere surface, pdf `1 / area`.
    pub fn sample(&self, self_index: usize, rng: &mut Sampler) -> (Intersection, f32) {
        let normal = sampling::uniform_sphere(rng.next_2d());
        let (tangent, bitangent) = sampling::orthonormal_basis(normal);
        let isect = Intersection {
            hit: true,
            position: self.center + normal * self.radius,
            normal,
            ng: normal,
            tangent,
            bitangent,
            material: self.material,
            object: self_index,
            hit_emissive: self.emissive,
            ..Default::default()
        };
        (isect, 1.0 / self.area)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_front() {
        let s = Sphere::new(Vec3::new(0.0, 0.0, -3.0), 1.0, 0);
        let ray = Ray::new(Vec3::ZERO, -Vec3::Z);
        let mut isect = Intersection::default();
        s.intersect(&ray, &mut isect, 0, false);
        assert!(isect.hit);
        assert!((isect.distance - 2.0).abs() < 1e-5);
        assert!((isect.normal - Vec3::Z).length() < 1e-5);
        assert!(!isect.back_face);
    }

    #[test]
    fn test_hit_from_inside() {
        let s = Sphere::new(Vec3::ZERO, 1.0, 0);
        let ray = Ray::new(Vec3::ZERO, Vec3::X);
        let mut isect = Intersection::default();
        s.intersect(&ray, &mut isect, 0, false);
        assert!(isect.hit);
        assert!((isect.distance - 1.0).abs() < 1e-5);
        assert!(isect.back_face);
    }

    #[test]
    fn test_miss() {
        let s = Sphere::new(Vec3::new(0.0, 5.0, -3.0), 1.0, 0);
        let ray = Ray::new(Vec3::ZERO, -Vec3::Z);
        let mut isect = Intersection::default();
        s.intersect(&ray, &mut isect, 0, false);
        assert!(!isect.hit);
    }

    #[test]
    fn test_area() {
        let s = Sphere::new(Vec3::ZERO, 2.0, 0);
        assert!((s.area - 16.0 * PI).abs() < 1e-4);
    }

    #[test]
    fn test_sample_on_surface() {
        let s = Sphere::new(Vec3::new(1.0, 2.0, 3.0), 0.5, 0);
        let mut rng = Sampler::from_seed(9);
        for _ in 0..200 {
            let (isect, pdf) = s.sample(0, &mut rng);
            assert!(((isect.position - s.center).length() - 0.5).abs() < 1e-4);
            assert!((pdf - 1.0 / s.area).abs() < 1e-6);
            assert!((isect.normal.length() - 1.0).abs() < 1e-4);
        }
    }
}
