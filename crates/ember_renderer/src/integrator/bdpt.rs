//! Bidirectional path tracer.
//!
//! One camera subpath and one light subpath per pixel sample; every
//! `(t, s)` pairing is evaluated and the pairings contributing to the same
//! path depth are combined with power-heuristic weights accumulated per
//! depth.

use super::{offset_origin, Integrator, EPSILON};
use crate::{Intersection, Scene};
use ember_core::IntegratorConfig;
use ember_math::{Ray, Sampler, Vec2, Vec3};

/// A recorded subpath vertex with its running attenuation and accumulated
/// pdf.
#[derive(Debug, Clone, Copy)]
struct Vertex {
    position: Vec3,
    normal: Vec3,
    tangent: Vec3,
    bitangent: Vec3,
    uv: Vec2,
    /// Incident direction (filled on light subpaths, sampled on camera
    /// subpaths).
    wi: Vec3,
    /// Outgoing direction (toward the previous camera vertex).
    wo: Vec3,
    pdf: f32,
    material: usize,
    attenuation: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PathType {
    Camera,
    Light,
}

pub struct BidirectionalIntegrator {
    max_depth: usize,
}

impl BidirectionalIntegrator {
    pub fn new(config: &IntegratorConfig) -> Self {
        Self {
            max_depth: config.max_bounce as usize,
        }
    }

    fn generate_path(
        &self,
        scene: &Scene,
        init_ray: Ray,
        kind: PathType,
        rng: &mut Sampler,
    ) -> Vec<Vertex> {
        let mut path = Vec::with_capacity(self.max_depth);
        let mut ray = init_ray;
        let mut attenuation = Vec3::ONE;
        let mut accum_pdf = 1.0f32;
        let mut remaining = self.max_depth;

        while remaining > 0 {
            let mut isect = Intersection::default();
            scene.intersect(&ray, &mut isect);
            if !isect.hit {
                break;
            }

            let material_idx = isect.material;
            let material = scene.material(material_idx);

            let mut v = Vertex {
                position: isect.position,
                normal: isect.normal,
                tangent: isect.tangent,
                bitangent: isect.bitangent,
                uv: isect.uv,
                wi: Vec3::ZERO,
                wo: Vec3::ZERO,
                pdf: accum_pdf,
                material: material_idx,
                attenuation,
            };
            match kind {
                PathType::Camera => v.wo = -ray.direction(),
                PathType::Light => v.wi = -ray.direction(),
            }

            if material.emissive() {
                // Only a camera path that reached the emitter directly or
                // through a delta chain keeps the terminal light vertex.
                if kind == PathType::Camera && (remaining == self.max_depth || ray.is_delta) {
                    path.push(v);
                }
                break;
            }

            let s = match kind {
                PathType::Camera => {
                    let s = material.sample(v.wo, v.normal, v.tangent, v.bitangent, rng);
                    v.wi = s.wi;
                    s
                }
                PathType::Light => {
                    let s = material.sample(v.wi, v.normal, v.tangent, v.bitangent, rng);
                    v.wo = s.wi;
                    s
                }
            };

            let mut f = material.eval(v.wo, v.wi, v.normal, v.uv, v.tangent, v.bitangent);
            if !s.is_delta {
                f *= v.wi.dot(v.normal).abs();
            }
            if s.pdf > EPSILON {
                attenuation *= f / s.pdf;
            }

            path.push(v);
            accum_pdf *= s.pdf;

            let dir = match kind {
                PathType::Camera => v.wi,
                PathType::Light => v.wo,
            };
            ray.set_origin(offset_origin(v.position, v.normal, dir));
            ray.set_direction(dir);
            ray.is_delta = s.is_delta;
            remaining -= 1;
        }

        path
    }

    /// Contribution and pdf of the pairing of `t` camera vertices with `s`
    /// light vertices.
    #[allow(clippy::too_many_arguments)]
    fn eval_path(
        &self,
        scene: &Scene,
        camera_path: &[Vertex],
        light_path: &[Vertex],
        le: Vec3,
        t: usize,
        s: usize,
        rng: &mut Sampler,
    ) -> (Vec3, f32) {
        let vc = camera_path[t - 1];
        let mc = scene.material(vc.material);

        // Camera subpath terminated on the emitter itself.
        if mc.emissive() {
            // TODO: unify the emitter back-face test with the area-light
            // check in PathIntegrator::direct_light.
            if vc.wo.dot(vc.normal) > 0.0 {
                return (mc.emission() * vc.attenuation, vc.pdf);
            }
            return (Vec3::ZERO, 0.0);
        }

        if s == 0 {
            let pdf = vc.pdf;
            if mc.is_delta() {
                // Delta vertex: push one sampled bounce toward the lights.
                let smp = mc.sample(vc.wo, vc.normal, vc.tangent, vc.bitangent, rng);
                let ray = Ray::new(
                    offset_origin(vc.position, vc.normal, smp.wi),
                    smp.wi,
                );
                let mut isect = Intersection::default();
                scene.intersect(&ray, &mut isect);
                if isect.hit
                    && scene.material(isect.material).emissive()
                    && smp.wi.dot(isect.normal) < 0.0
                {
                    let gated = !scene.directional_area_light
                        || smp.wi.dot(-isect.normal) > 1.0 - scene.directional_solid_angle;
                    if gated {
                        let f = mc.eval(vc.wo, smp.wi, vc.normal, vc.uv, vc.tangent, vc.bitangent);
                        return (
                            scene.material(isect.material).emission() * vc.attenuation * f,
                            pdf,
                        );
                    }
                }
                (Vec3::ZERO, pdf)
            } else {
                if let Some(ls) = scene.sample_light(vc.position, rng) {
                    let li = if !scene.directional_area_light
                        || ls.wi.dot(-ls.normal) > 1.0 - scene.directional_solid_angle
                    {
                        ls.emission
                    } else {
                        Vec3::ZERO
                    };
                    if ls.pdf > EPSILON {
                        let f = mc.eval(vc.wo, ls.wi, vc.normal, vc.uv, vc.tangent, vc.bitangent);
                        return (
                            li * vc.attenuation * f * ls.geom * ls.wi.dot(vc.normal).abs()
                                / ls.pdf,
                            pdf,
                        );
                    }
                }
                (Vec3::ZERO, pdf)
            }
        } else {
            let vl = light_path[s - 1];
            let ml = scene.material(vl.material);
            if mc.is_delta() {
                // No deterministic connection through a Dirac vertex.
                return (Vec3::ZERO, 0.0);
            }

            let d = vl.position - vc.position;
            let dist = d.length();
            if dist < EPSILON {
                return (Vec3::ZERO, 0.0);
            }
            let dir = d / dist;

            let f = vl.attenuation
                * ml.eval(-dir, vl.wi, vl.normal, vl.uv, vl.tangent, vl.bitangent)
                * vc.attenuation
                * mc.eval(vc.wo, dir, vc.normal, vc.uv, vc.tangent, vc.bitangent);

            let geom = geometry_term(vc.position, vc.normal, vl.position, vl.normal);
            let visibility = scene.visibility_dist(
                offset_origin(vc.position, vc.normal, dir),
                dir,
                dist,
            );
            let pdf = vc.pdf * vl.pdf;
            let l_indir = le * f * geom * visibility;

            // Relight the camera vertex directly as well.
            let mut l_dir = Vec3::ZERO;
            if let Some(ls) = scene.sample_light(vc.position, rng) {
                let li = if !scene.directional_area_light
                    || ls.wi.dot(-ls.normal) > 1.0 - scene.directional_solid_angle
                {
                    ls.emission
                } else {
                    Vec3::ZERO
                };
                if ls.pdf > EPSILON {
                    l_dir = li
                        * vc.attenuation
                        * mc.eval(vc.wo, ls.wi, vc.normal, vc.uv, vc.tangent, vc.bitangent)
                        * ls.geom
                        * ls.wi.dot(vc.normal).abs()
                        / ls.pdf;
                }
            }

            (l_dir + l_indir, pdf)
        }
    }
}

fn geometry_term(p0: Vec3, n0: Vec3, p1: Vec3, n1: Vec3) -> f32 {
    let w = p1 - p0;
    let dist = w.length();
    if dist < EPSILON {
        return 0.0;
    }
    let w = w / dist;
    (w.dot(n0) * w.dot(n1)).abs() / (dist * dist)
}

impl Integrator for BidirectionalIntegrator {
    fn pixel_color(&self, x: u32, y: u32, sample_id: u32, scene: &Scene) -> Vec3 {
        let mut rng = Sampler::for_pixel(x, y, sample_id);
        let u0 = rng.next_2d() - Vec2::splat(0.5);
        let u1 = rng.next_2d();
        let camera_ray = scene.camera.ray(x, y, scene.width, scene.height, u0, u1);

        let Some((light_ray, le, light_pdf)) = scene.sample_light_ray(&mut rng) else {
            // Bidirectional transport needs at least one area light.
            return Vec3::ZERO;
        };
        let le = le / light_pdf;

        let camera_path = self.generate_path(scene, camera_ray, PathType::Camera, &mut rng);
        let light_path = self.generate_path(scene, light_ray, PathType::Light, &mut rng);

        // Per-depth contributions and MIS weight accumulators.
        let mut ls = vec![Vec3::ZERO; self.max_depth];
        let mut weights = vec![0.0f32; self.max_depth];

        for t in 1..=camera_path.len() {
            for s in 0..=light_path.len() {
                let depth = t + s;
                if depth > self.max_depth {
                    continue;
                }
                let (l, pdf) = self.eval_path(scene, &camera_path, &light_path, le, t, s, &mut rng);
                let w = pdf * pdf;
                ls[t - 1] += l * w;
                weights[t - 1] += w;
            }
        }

        let mut total = Vec3::ZERO;
        for d in 0..self.max_depth {
            if weights[d] > EPSILON {
                total += ls[d] / weights[d];
            }
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SceneBuilder;
    use ember_core::{BlinnPhong, Camera, IntegratorConfig, IntegratorKind, Material};

    fn cornell_like() -> crate::Scene {
        let mut builder = SceneBuilder::new(8, 8);
        let white = builder.add_material(Material::BlinnPhong(BlinnPhong::diffuse(
            "white",
            Vec3::splat(0.7),
        )));
        let mut light = BlinnPhong::diffuse("light", Vec3::ZERO);
        light.emission = Vec3::splat(12.0);
        light.emissive = true;
        let light_id = builder.add_material(Material::BlinnPhong(light));

        builder.add_quad(
            [
                Vec3::new(-3.0, 0.0, -3.0),
                Vec3::new(-3.0, 0.0, 3.0),
                Vec3::new(3.0, 0.0, 3.0),
                Vec3::new(3.0, 0.0, -3.0),
            ],
            Some(white),
        );
        builder.add_quad(
            [
                Vec3::new(-1.0, 4.0, -1.0),
                Vec3::new(1.0, 4.0, -1.0),
                Vec3::new(1.0, 4.0, 1.0),
                Vec3::new(-1.0, 4.0, 1.0),
            ],
            Some(light_id),
        );
        builder.camera(Camera::new(
            Vec3::new(0.0, 2.0, 7.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::Y,
            45f32.to_radians(),
            1.0,
        ));
        builder.integrator(IntegratorConfig {
            kind: IntegratorKind::Bidirectional,
            max_bounce: 4,
            ..Default::default()
        });
        builder.build().unwrap()
    }

    #[test]
    fn test_produces_finite_light() {
        let scene = cornell_like();
        let integrator = BidirectionalIntegrator::new(&scene.integrator);
        let mut mean = Vec3::ZERO;
        let spp = 256;
        for s in 0..spp {
            let c = integrator.pixel_color(4, 5, s, &scene);
            assert!(c.x.is_finite() && c.y.is_finite() && c.z.is_finite());
            assert!(c.min_element() >= 0.0);
            mean += c;
        }
        mean /= spp as f32;
        assert!(mean.x > 0.0, "floor pixel should be lit, got {mean}");
    }

    #[test]
    fn test_no_lights_is_black() {
        let mut builder = SceneBuilder::new(4, 4);
        let m = builder.add_material(Material::BlinnPhong(BlinnPhong::diffuse(
            "m",
            Vec3::splat(0.5),
        )));
        builder.add_sphere(Vec3::new(0.0, 0.0, -3.0), 1.0, Some(m));
        builder.camera(Camera::new(Vec3::ZERO, -Vec3::Z, Vec3::Y, 60f32.to_radians(), 1.0));
        let scene = builder.build().unwrap();
        let integrator = BidirectionalIntegrator::new(&scene.integrator);
        assert_eq!(integrator.pixel_color(2, 2, 0, &scene), Vec3::ZERO);
    }

    #[test]
    fn test_geometry_term_symmetric_and_falls_off() {
        let g1 = geometry_term(Vec3::ZERO, Vec3::Y, Vec3::new(0.0, 2.0, 0.0), -Vec3::Y);
        let g2 = geometry_term(Vec3::new(0.0, 2.0, 0.0), -Vec3::Y, Vec3::ZERO, Vec3::Y);
        assert!((g1 - g2).abs() < 1e-6);
        let far = geometry_term(Vec3::ZERO, Vec3::Y, Vec3::new(0.0, 4.0, 0.0), -Vec3::Y);
        assert!((g1 / far - 4.0).abs() < 1e-3);
    }

    #[test]
    fn test_agrees_with_path_tracer_on_direct_lighting() {
        // On a simple diffuse scene both integrators estimate the same
        // radiance.
        let scene = cornell_like();
        let bdpt = BidirectionalIntegrator::new(&scene.integrator);
        let mut pt_cfg = scene.integrator.clone();
        pt_cfg.kind = IntegratorKind::MonteCarlo;
        let pt = super::super::PathIntegrator::new(&pt_cfg);

        let spp = 8192;
        let (mut a, mut b) = (0.0f64, 0.0f64);
        for s in 0..spp {
            a += bdpt.pixel_color(4, 5, s, &scene).x as f64;
            b += pt.pixel_color(4, 5, s, &scene).x as f64;
        }
        a /= spp as f64;
        b /= spp as f64;
        // The per-depth weighting blends strategies of unequal path length,
        // so only ballpark agreement is expected on indirect light.
        assert!(
            (a - b).abs() < 0.25 * b.max(0.02),
            "bdpt {a} vs path tracer {b}"
        );
    }
}
