//! Whitted-style integrator: deterministic direct lighting at every
//! diffuse bounce, recursion through delta materials.

use super::{offset_origin, Integrator, EPSILON};
use crate::Scene;
use ember_core::IntegratorConfig;
use ember_math::{sampling, Sampler, Vec2, Vec3};

pub struct WhittedIntegrator {
    max_depth: u32,
}

impl WhittedIntegrator {
    pub fn new(config: &IntegratorConfig) -> Self {
        Self {
            max_depth: config.max_bounce,
        }
    }
}

impl Integrator for WhittedIntegrator {
    fn pixel_color(&self, x: u32, y: u32, sample_id: u32, scene: &Scene) -> Vec3 {
        let mut rng = Sampler::for_pixel(x, y, sample_id);
        let u0 = rng.next_2d() - Vec2::splat(0.5);
        let u1 = rng.next_2d();
        let mut ray = scene
            .camera
            .ray(x, y, scene.width, scene.height, u0, u1);

        let mut l = Vec3::ZERO;
        let mut attenuation = Vec3::ONE;

        for depth in 0..self.max_depth {
            let mut isect = crate::Intersection::default();
            scene.intersect(&ray, &mut isect);

            if !isect.hit {
                // Infinite lights are already integrated at every diffuse
                // vertex; only primary rays and delta chains see them here.
                if depth == 0 || ray.is_delta {
                    if scene.hit_sun(ray.direction()) {
                        l += attenuation * scene.sun.as_ref().unwrap().radiance;
                    }
                    l += attenuation * scene.env_radiance(ray.direction());
                }
                break;
            }

            let wo = -ray.direction();
            let material = scene.material(isect.material);

            if material.is_delta() {
                let s = material.sample(wo, isect.normal, isect.tangent, isect.bitangent, &mut rng);
                attenuation *= material.eval(
                    wo,
                    s.wi,
                    isect.normal,
                    isect.uv,
                    isect.tangent,
                    isect.bitangent,
                );
                ray.set_origin(offset_origin(isect.position, isect.normal, s.wi));
                ray.set_direction(s.wi);
                ray.is_delta = true;
                continue;
            }

            if material.emissive() {
                if depth == 0 || ray.is_delta {
                    l += attenuation * material.emission();
                }
                break;
            }

            // Direct lighting from every enabled light source.
            if scene.lights_total_area > 0.0 {
                if let Some(ls) = scene.sample_light(isect.position, &mut rng) {
                    if ls.pdf > EPSILON && sampling::luminance(ls.emission) > EPSILON {
                        let f = material.eval(
                            wo,
                            ls.wi,
                            isect.normal,
                            isect.uv,
                            isect.tangent,
                            isect.bitangent,
                        );
                        l += attenuation * f * ls.emission * ls.geom
                            * ls.wi.dot(isect.normal).abs()
                            / ls.pdf;
                    }
                }
            }

            if let Some((li, wi, pdf, geom)) = scene.sample_sun(isect.position, isect.normal, &mut rng)
            {
                if pdf > EPSILON && sampling::luminance(li) > EPSILON {
                    let f = material.eval(wo, wi, isect.normal, isect.uv, isect.tangent, isect.bitangent);
                    l += attenuation * f * li * geom * wi.dot(isect.normal).abs() / pdf;
                }
            }

            if let Some((li, wi, pdf, geom)) =
                scene.sample_envmap(isect.position, isect.normal, &mut rng)
            {
                if pdf > EPSILON && sampling::luminance(li) > EPSILON {
                    let f = material.eval(wo, wi, isect.normal, isect.uv, isect.tangent, isect.bitangent);
                    l += attenuation * f * li * geom * wi.dot(isect.normal).abs() / pdf;
                }
            }

            // Continue along a sampled direction.
            let s = material.sample(wo, isect.normal, isect.tangent, isect.bitangent, &mut rng);
            let mut f = material.eval(wo, s.wi, isect.normal, isect.uv, isect.tangent, isect.bitangent);
            if !s.is_delta {
                f *= s.wi.dot(isect.normal).abs();
            }
            if s.pdf > EPSILON {
                attenuation *= f / s.pdf;
            }

            ray.set_origin(offset_origin(isect.position, isect.normal, s.wi));
            ray.set_direction(s.wi);
            ray.is_delta = s.is_delta;
        }

        l
    }
}
