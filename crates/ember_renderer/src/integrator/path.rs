//! Unidirectional path tracer with next-event estimation and multiple
//! importance sampling.

use super::{mis_weight, offset_origin, Integrator, EPSILON, MAX_PATH_LENGTH, RUSSIAN_ROULETTE};
use crate::{Intersection, Scene};
use ember_core::{IntegratorConfig, MisHeuristic};
use ember_math::{sampling, Ray, Sampler, Vec2, Vec3};

/// The light strategies combined by the direct estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LightKind {
    Area,
    Sun,
    Env,
}

pub struct PathIntegrator {
    max_depth: u32,
    use_mis: bool,
    russian_roulette: bool,
    heuristic: MisHeuristic,
}

impl PathIntegrator {
    pub fn new(config: &IntegratorConfig) -> Self {
        Self {
            max_depth: config.max_bounce,
            use_mis: config.use_mis,
            russian_roulette: config.russian_roulette,
            heuristic: config.heuristic,
        }
    }

    /// Direct-light estimator for one light type: a light-sampling leg and,
    /// under MIS, a BSDF-sampling leg, combined with the configured
    /// heuristic. Delta lobes skip the weighting since light sampling can
    /// never produce them.
    fn direct_light(
        &self,
        kind: LightKind,
        scene: &Scene,
        wo: Vec3,
        isect: &Intersection,
        rng: &mut Sampler,
    ) -> Vec3 {
        let material = scene.material(isect.material);
        let mut ld = Vec3::ZERO;

        // Light-sampling leg.
        let sampled = match kind {
            LightKind::Area => scene.sample_light(isect.position, rng).map(|ls| {
                let li = if !scene.directional_area_light
                    || ls.wi.dot(-ls.normal) > 1.0 - scene.directional_solid_angle
                {
                    ls.emission
                } else {
                    Vec3::ZERO
                };
                (li, ls.wi, ls.pdf, ls.geom)
            }),
            LightKind::Sun => scene.sample_sun(isect.position, isect.normal, rng),
            LightKind::Env => scene.sample_envmap(isect.position, isect.normal, rng),
        };

        if let Some((li, wi, light_pdf, geom)) = sampled {
            if light_pdf > EPSILON && sampling::luminance(li) > EPSILON {
                let f = material.eval(wo, wi, isect.normal, isect.uv, isect.tangent, isect.bitangent)
                    * wi.dot(isect.normal).abs();
                if f.max_element() > EPSILON {
                    let weight = if self.use_mis {
                        let mat_pdf =
                            material.pdf(wo, wi, isect.normal, isect.tangent, isect.bitangent);
                        mis_weight(self.heuristic, 1.0, light_pdf, 1.0, mat_pdf)
                    } else {
                        1.0
                    };
                    ld += li * f * geom * weight / light_pdf;
                }
            }
        }

        // BSDF-sampling leg.
        if self.use_mis {
            let s = material.sample(wo, isect.normal, isect.tangent, isect.bitangent, rng);
            let mut f =
                material.eval(wo, s.wi, isect.normal, isect.uv, isect.tangent, isect.bitangent);
            if !s.is_delta {
                f *= s.wi.dot(isect.normal).abs();
            }
            if f.max_element() > EPSILON && s.pdf > EPSILON {
                let shadow = Ray::shadow(
                    offset_origin(isect.position, isect.normal, s.wi),
                    s.wi,
                );
                let mut hit = Intersection::default();
                scene.intersect(&shadow, &mut hit);

                let resolved: Option<(Vec3, f32)> = match kind {
                    LightKind::Area => {
                        let n_light = light_normal(scene, &shadow, &hit);
                        if hit.hit
                            && scene.material(hit.material).emissive()
                            && s.wi.dot(n_light) < 0.0
                        {
                            let li = if !scene.directional_area_light
                                || s.wi.dot(-n_light) > 1.0 - scene.directional_solid_angle
                            {
                                scene.material(hit.material).emission()
                            } else {
                                Vec3::ZERO
                            };
                            Some((li, 1.0 / scene.lights_total_area))
                        } else {
                            None
                        }
                    }
                    LightKind::Sun => {
                        if !hit.hit && scene.hit_sun(s.wi) {
                            let sun = scene.sun.as_ref().unwrap();
                            Some((sun.radiance, 1.0 / sun.solid_angle))
                        } else {
                            None
                        }
                    }
                    LightKind::Env => {
                        if !hit.hit {
                            Some((scene.env_radiance(s.wi), sampling::INV_TWO_PI))
                        } else {
                            None
                        }
                    }
                };

                if let Some((li, light_pdf)) = resolved {
                    if sampling::luminance(li) > EPSILON {
                        let weight = if s.is_delta {
                            1.0
                        } else {
                            mis_weight(self.heuristic, 1.0, s.pdf, 1.0, light_pdf)
                        };
                        ld += li * f * weight / s.pdf;
                    }
                }
            }
        }

        ld
    }
}

/// Geometric normal at a shadow-ray hit. Shadow rays skip shading data, so
/// reconstruct it from the primitive.
fn light_normal(scene: &Scene, ray: &Ray, hit: &Intersection) -> Vec3 {
    if !hit.hit {
        return Vec3::ZERO;
    }
    match scene.primitive(hit.object) {
        crate::Primitive::Triangle(t) => t.normal,
        crate::Primitive::Sphere(s) => (ray.at(hit.distance) - s.center) / s.radius,
    }
}

impl Integrator for PathIntegrator {
    fn pixel_color(&self, x: u32, y: u32, sample_id: u32, scene: &Scene) -> Vec3 {
        let mut rng = Sampler::for_pixel(x, y, sample_id);
        let u0 = rng.next_2d() - Vec2::splat(0.5);
        let u1 = rng.next_2d();
        let mut ray = scene.camera.ray(x, y, scene.width, scene.height, u0, u1);

        let mut l = Vec3::ZERO;
        let mut beta = Vec3::ONE;
        let mut depth = 0u32;

        loop {
            if !self.russian_roulette && depth >= self.max_depth {
                break;
            }
            if depth >= MAX_PATH_LENGTH {
                break;
            }

            let mut isect = Intersection::default();
            scene.intersect(&ray, &mut isect);

            if !isect.hit {
                // The direct estimator at each vertex already integrates the
                // infinite lights, so the escaped ray only contributes on
                // primary and delta chains.
                if depth == 0 || ray.is_delta {
                    if scene.hit_sun(ray.direction()) {
                        l += beta * scene.sun.as_ref().unwrap().radiance;
                    }
                    l += beta * scene.env_radiance(ray.direction());
                }
                break;
            }

            let material = scene.material(isect.material);

            if material.emissive() {
                if (depth == 0 || ray.is_delta) && ray.direction().dot(isect.normal) < 0.0 {
                    l += beta * material.emission();
                }
                break;
            }

            let wo = -ray.direction();

            if material.is_delta() {
                let s = material.sample(wo, isect.normal, isect.tangent, isect.bitangent, &mut rng);
                beta *= material.eval(
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
                depth += 1;
                continue;
            }

            // Next-event estimation per enabled light type.
            if scene.lights_total_area > 0.0 {
                l += beta * self.direct_light(LightKind::Area, scene, wo, &isect, &mut rng);
            }
            if scene.sun.is_some() {
                l += beta * self.direct_light(LightKind::Sun, scene, wo, &isect, &mut rng);
            }
            if scene.envmap.is_some() {
                l += beta * self.direct_light(LightKind::Env, scene, wo, &isect, &mut rng);
            }

            // Sample the BSDF for the continuation ray.
            let s = material.sample(wo, isect.normal, isect.tangent, isect.bitangent, &mut rng);
            if s.pdf > EPSILON {
                let mut f =
                    material.eval(wo, s.wi, isect.normal, isect.uv, isect.tangent, isect.bitangent);
                if !s.is_delta {
                    f *= s.wi.dot(isect.normal).abs();
                }
                beta *= f / s.pdf;
            } else {
                break;
            }

            ray.set_origin(offset_origin(isect.position, isect.normal, s.wi));
            ray.set_direction(s.wi);
            ray.is_delta = s.is_delta;
            depth += 1;

            if self.russian_roulette {
                if rng.next_1d() > RUSSIAN_ROULETTE {
                    break;
                }
                beta /= RUSSIAN_ROULETTE;
            }
        }

        l
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SceneBuilder;
    use ember_core::{BlinnPhong, Camera, EnvMap, Material};

    /// White Lambertian sphere in a constant-radiance environment: the
    /// furnace must neither gain nor lose energy.
    #[test]
    fn test_furnace_white_sphere() {
        let mut builder = SceneBuilder::new(4, 4);
        let white = builder.add_material(Material::BlinnPhong(BlinnPhong::diffuse(
            "white",
            Vec3::ONE,
        )));
        builder.add_sphere(Vec3::new(0.0, 0.0, -3.0), 1.0, Some(white));
        builder.envmap(EnvMap::constant(Vec3::ONE), 1.0);
        builder.camera(Camera::new(
            Vec3::ZERO,
            Vec3::new(0.0, 0.0, -3.0),
            Vec3::Y,
            30f32.to_radians(),
            1.0,
        ));
        let scene = builder.build().unwrap();
        let integrator = PathIntegrator::new(&scene.integrator);

        // Center pixels look straight at the sphere.
        let mut mean = Vec3::ZERO;
        let spp = 1024;
        for s in 0..spp {
            mean += integrator.pixel_color(2, 2, s, &scene);
        }
        mean /= spp as f32;
        assert!(
            (mean.x - 1.0).abs() < 0.02,
            "furnace reads {mean} instead of 1"
        );
    }

    /// The estimator must agree with a brute-force quadrature of the
    /// direct illumination from a square light onto a Lambertian floor.
    #[test]
    fn test_direct_light_matches_quadrature() {
        let albedo = 0.8;
        let emission = Vec3::splat(15.0);
        let mut builder = SceneBuilder::new(9, 9);
        let white = builder.add_material(Material::BlinnPhong(BlinnPhong::diffuse(
            "white",
            Vec3::splat(albedo),
        )));
        let mut light = BlinnPhong::diffuse("light", Vec3::ZERO);
        light.emission = emission;
        light.emissive = true;
        let light_id = builder.add_material(Material::BlinnPhong(light));

        builder.add_quad(
            [
                Vec3::new(-8.0, 0.0, -8.0),
                Vec3::new(-8.0, 0.0, 8.0),
                Vec3::new(8.0, 0.0, 8.0),
                Vec3::new(8.0, 0.0, -8.0),
            ],
            Some(white),
        );
        // 1x1 light centered at (0, 2, 0), facing down.
        let (hx, hz, ly) = (0.5, 0.5, 2.0);
        builder.add_quad(
            [
                Vec3::new(-hx, ly, -hz),
                Vec3::new(hx, ly, -hz),
                Vec3::new(hx, ly, hz),
                Vec3::new(-hx, ly, hz),
            ],
            Some(light_id),
        );
        builder.camera(Camera::new(
            Vec3::new(0.0, 1.0, 4.0),
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::Y,
            40f32.to_radians(),
            1.0,
        ));
        // Single bounce: the estimate is exactly the direct term.
        builder.integrator(ember_core::IntegratorConfig {
            max_bounce: 1,
            ..Default::default()
        });
        let scene = builder.build().unwrap();

        // Quadrature reference for the radiance leaving the floor point the
        // center pixel sees:
        // L = albedo/pi * sum Le * cos_f * cos_l / d^2 * dA
        let target = {
            let cam = &scene.camera;
            let ray = cam.ray_pinhole(4, 4, 9, 9, Vec2::ZERO);
            let mut isect = Intersection::default();
            scene.intersect(&ray, &mut isect);
            assert!(isect.hit);
            isect.position
        };
        let n = 400;
        let mut reference = 0.0f64;
        let cell = (2.0 * hx / n as f32) * (2.0 * hz / n as f32);
        for i in 0..n {
            for j in 0..n {
                let q = Vec3::new(
                    -hx + (i as f32 + 0.5) / n as f32 * 2.0 * hx,
                    ly,
                    -hz + (j as f32 + 0.5) / n as f32 * 2.0 * hz,
                );
                let d = q - target;
                let dist2 = d.dot(d);
                let wi = d / dist2.sqrt();
                let cos_f = wi.y.max(0.0);
                let cos_l = wi.y.max(0.0); // light faces straight down
                reference +=
                    (albedo / std::f32::consts::PI * emission.x * cos_f * cos_l / dist2 * cell)
                        as f64;
            }
        }

        let integrator = PathIntegrator::new(&scene.integrator);
        let spp = 4096;
        let mut mean = 0.0f64;
        for s in 0..spp {
            mean += integrator.pixel_color(4, 4, s, &scene).x as f64;
        }
        mean /= spp as f64;

        assert!(
            (mean - reference).abs() < 0.05 * reference.max(0.01),
            "estimate {mean} vs quadrature {reference}"
        );
    }

    #[test]
    fn test_mis_reduces_variance_not_mean() {
        // With and without MIS the estimator converges to the same value.
        let mut builder = SceneBuilder::new(8, 8);
        let white = builder.add_material(Material::BlinnPhong(
            BlinnPhong::diffuse("w", Vec3::splat(0.6)).with_specular(Vec3::splat(0.3), 24.0),
        ));
        let mut light = BlinnPhong::diffuse("light", Vec3::ZERO);
        light.emission = Vec3::splat(8.0);
        light.emissive = true;
        let light_id = builder.add_material(Material::BlinnPhong(light));
        builder.add_quad(
            [
                Vec3::new(-4.0, 0.0, -4.0),
                Vec3::new(-4.0, 0.0, 4.0),
                Vec3::new(4.0, 0.0, 4.0),
                Vec3::new(4.0, 0.0, -4.0),
            ],
            Some(white),
        );
        builder.add_quad(
            [
                Vec3::new(-1.5, 3.0, -1.5),
                Vec3::new(1.5, 3.0, -1.5),
                Vec3::new(1.5, 3.0, 1.5),
                Vec3::new(-1.5, 3.0, 1.5),
            ],
            Some(light_id),
        );
        builder.camera(Camera::new(
            Vec3::new(0.0, 1.5, 5.0),
            Vec3::ZERO,
            Vec3::Y,
            45f32.to_radians(),
            1.0,
        ));
        let mut scene = builder.build().unwrap();

        let spp = 4096;
        let mut with_mis = 0.0f64;
        scene.integrator.use_mis = true;
        let integrator = PathIntegrator::new(&scene.integrator);
        for s in 0..spp {
            with_mis += integrator.pixel_color(4, 5, s, &scene).x as f64;
        }
        with_mis /= spp as f64;

        scene.integrator.use_mis = false;
        let integrator = PathIntegrator::new(&scene.integrator);
        let mut without_mis = 0.0f64;
        for s in 0..spp {
            without_mis += integrator.pixel_color(4, 5, s, &scene).x as f64;
        }
        without_mis /= spp as f64;

        assert!(
            (with_mis - without_mis).abs() < 0.08 * with_mis.max(0.05),
            "MIS {with_mis} vs plain {without_mis}"
        );
    }
}
