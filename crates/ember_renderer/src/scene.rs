//! Render scene: geometry behind the accelerator, materials, camera and
//! light sampling strategies.
//!
//! Built once through [`SceneBuilder`]; immutable afterwards and shared
//! across worker threads without locks.

use crate::bvh::{Bvh, SplitMethod, TraversalMode};
use crate::hit::{Intersection, INVALID_INDEX};
use crate::image_buf::{project_to_screen, ImageU8};
use crate::primitive::Primitive;
use crate::{Sphere, Triangle};
use ember_core::{
    BlinnPhong, Camera, EnvMap, IntegratorConfig, KernelConfig, Material, SceneError,
};
use ember_math::{sampling, Ray, Sampler, Vec2, Vec3};

const EPSILON: f32 = 1e-6;

/// A hit within 1% of the expected light distance still counts as seeing
/// the light. Source-level heuristic against shadow acne on emitters.
pub const VISIBILITY_DIST_SLACK: f32 = 1.01;

/// Distant sun disk.
#[derive(Debug, Clone)]
pub struct Sun {
    pub direction: Vec3,
    pub solid_angle: f32,
    pub radiance: Vec3,
}

impl Default for Sun {
    fn default() -> Self {
        Self {
            direction: Vec3::new(-1.0, 1.0, 1.0).normalize(),
            solid_angle: 6.87e-2,
            radiance: Vec3::splat(50.0),
        }
    }
}

/// One draw from the area-light distribution.
#[derive(Debug, Clone, Copy)]
pub struct LightSample {
    pub position: Vec3,
    pub normal: Vec3,
    pub emission: Vec3,
    pub object: usize,
    pub wi: Vec3,
    /// Area pdf, `1 / lights_total_area`.
    pub pdf: f32,
    /// `V * max(-wi . n_light, eps) / |PQ|^2`.
    pub geom: f32,
}

pub struct Scene {
    pub materials: Vec<Material>,
    pub accel: Bvh,
    pub camera: Camera,
    pub width: u32,
    pub height: u32,
    pub scale: f32,
    /// Indices of emissive primitives in `accel.primitives`.
    pub lights: Vec<usize>,
    /// Prefix sums of light areas; last element equals the total area.
    pub lights_cdf: Vec<f32>,
    pub lights_total_area: f32,
    pub envmap: Option<EnvMap>,
    pub envmap_scale: f32,
    pub sun: Option<Sun>,
    pub integrator: IntegratorConfig,
    pub kernel: KernelConfig,
    /// Restrict area lights to emit near their normal direction.
    pub directional_area_light: bool,
    pub directional_solid_angle: f32,
}

impl Scene {
    pub fn builder(width: u32, height: u32) -> SceneBuilder {
        SceneBuilder::new(width, height)
    }

    #[inline]
    pub fn intersect(&self, ray: &Ray, isect: &mut Intersection) {
        self.accel.intersect(ray, isect);
    }

    #[inline]
    pub fn material(&self, index: usize) -> &Material {
        &self.materials[index]
    }

    #[inline]
    pub fn primitive(&self, index: usize) -> &Primitive {
        &self.accel.primitives[index]
    }

    /// Environment radiance along `dir`, already scaled.
    pub fn env_radiance(&self, dir: Vec3) -> Vec3 {
        match &self.envmap {
            Some(env) => env.sample(dir) * self.envmap_scale,
            None => Vec3::ZERO,
        }
    }

    /// Whether a direction points into the sun disk.
    pub fn hit_sun(&self, wi: Vec3) -> bool {
        match &self.sun {
            Some(sun) => {
                sun.direction.dot(wi).abs() > 1.0 - sun.solid_angle * sampling::TWO_PI
            }
            None => false,
        }
    }

    /// Pick a light by inverse-CDF over areas and sample a point on it.
    pub fn sample_light(&self, p: Vec3, rng: &mut Sampler) -> Option<LightSample> {
        if self.lights_total_area <= 0.0 {
            return None;
        }
        let pick = rng.next_1d() * self.lights_total_area;
        let idx = self
            .lights_cdf
            .partition_point(|&c| c < pick)
            .min(self.lights.len() - 1);
        let prim_index = self.lights[idx];

        let (light_isect, _area_pdf) = self.primitive(prim_index).sample(prim_index, rng);
        let pdf = 1.0 / self.lights_total_area;

        let pq = light_isect.position - p;
        let pq2 = pq.dot(pq);
        if pq2 < EPSILON {
            return None;
        }
        let wi = pq / pq2.sqrt();

        let visibility = self.visibility(p, wi, prim_index, pq2.sqrt());
        let geom = visibility * (-wi.dot(light_isect.normal)).max(EPSILON) / pq2;

        Some(LightSample {
            position: light_isect.position,
            normal: light_isect.normal,
            emission: self.material(light_isect.material).emission(),
            object: prim_index,
            wi,
            pdf,
            geom,
        })
    }

    /// Cone sample toward the sun: `(radiance, wi, pdf, geom)`. The pdf is
    /// zero when the sample falls below the shading normal.
    pub fn sample_sun(&self, p: Vec3, n: Vec3, rng: &mut Sampler) -> Option<(Vec3, Vec3, f32, f32)> {
        let sun = self.sun.as_ref()?;
        let u = rng.next_2d();
        let cos_theta_max = 1.0 - sun.solid_angle * sampling::TWO_PI;
        let dir = sampling::uniform_cone(u, cos_theta_max);
        let wi = sampling::local_to_world(dir, sun.direction).normalize();

        let pdf = if wi.dot(n) > 0.0 {
            1.0 / sun.solid_angle
        } else {
            0.0
        };

        let ray = Ray::shadow(p, wi);
        let mut isect = Intersection::default();
        self.intersect(&ray, &mut isect);
        let geom = if isect.hit { 0.0 } else { 1.0 };

        Some((sun.radiance, wi, pdf, geom))
    }

    /// Uniform-hemisphere sample toward the environment:
    /// `(radiance, wi, pdf, geom)`.
    pub fn sample_envmap(
        &self,
        p: Vec3,
        n: Vec3,
        rng: &mut Sampler,
    ) -> Option<(Vec3, Vec3, f32, f32)> {
        self.envmap.as_ref()?;
        let dir = sampling::uniform_hemisphere(rng.next_2d());
        let wi = sampling::local_to_world(dir, n).normalize();
        let pdf = sampling::INV_TWO_PI;

        let ray = Ray::shadow(p, wi);
        let mut isect = Intersection::default();
        self.intersect(&ray, &mut isect);
        let geom = if isect.hit { 0.0 } else { 1.0 };

        Some((self.env_radiance(wi), wi, pdf, geom))
    }

    /// Emit a ray from a light surface, for light subpaths. Returns the ray,
    /// the light emission, and the combined pick-position-direction pdf.
    pub fn sample_light_ray(&self, rng: &mut Sampler) -> Option<(Ray, Vec3, f32)> {
        if self.lights_total_area <= 0.0 {
            return None;
        }
        let pick = rng.next_1d() * self.lights_total_area;
        let idx = self
            .lights_cdf
            .partition_point(|&c| c < pick)
            .min(self.lights.len() - 1);
        let prim_index = self.lights[idx];
        let (isect, _) = self.primitive(prim_index).sample(prim_index, rng);
        let emission = self.material(isect.material).emission();

        if self.directional_area_light {
            let ray = Ray::new(isect.position, isect.normal);
            Some((ray, emission, 1.0 / self.lights_total_area))
        } else {
            let dir = sampling::local_to_world(
                sampling::uniform_hemisphere(rng.next_2d()),
                isect.normal,
            );
            let ray = Ray::new(isect.position, dir);
            let pdf = sampling::INV_TWO_PI / self.lights_total_area;
            Some((ray, emission, pdf))
        }
    }

    /// 1 when the first hit along `wi` is the expected light primitive or
    /// lies within the distance slack of it, else 0.
    pub fn visibility(&self, p: Vec3, wi: Vec3, object: usize, expected_dist: f32) -> f32 {
        let ray = Ray::shadow(p, wi);
        let mut isect = Intersection::default();
        self.intersect(&ray, &mut isect);

        if !isect.hit || isect.object == object {
            return 1.0;
        }
        if isect.distance * VISIBILITY_DIST_SLACK >= expected_dist {
            return 1.0;
        }
        0.0
    }

    /// Distance-only visibility, for BDPT connections where no primitive
    /// identity is known.
    pub fn visibility_dist(&self, p: Vec3, wi: Vec3, dist: f32) -> f32 {
        let ray = Ray::shadow(p, wi);
        let mut isect = Intersection::default();
        self.intersect(&ray, &mut isect);

        if !isect.hit || isect.distance * VISIBILITY_DIST_SLACK >= dist {
            1.0
        } else {
            0.0
        }
    }

    /// Overlay triangle edges into an image, back faces culled.
    pub fn draw_wireframe(&self, image: &mut ImageU8, color: Vec3) {
        let transform = self.camera.proj_view();
        for prim in &self.accel.primitives {
            if let Primitive::Triangle(tri) = prim {
                let projected: Vec<_> = tri
                    .pos
                    .iter()
                    .map(|&p| project_to_screen(p, &transform, image.width(), image.height()))
                    .collect();
                if let (Some(a), Some(b), Some(c)) = (projected[0], projected[1], projected[2]) {
                    let e01 = (b - a).as_vec2();
                    let e02 = (c - a).as_vec2();
                    // Screen-space back-face cull.
                    if e01.x * e02.y - e01.y * e02.x > 0.0 {
                        continue;
                    }
                    image.draw_line(a, b, color);
                    image.draw_line(b, c, color);
                    image.draw_line(c, a, color);
                }
            }
        }
    }
}

/// Staging area for a scene. All inputs are in-memory; file parsing lives
/// with the caller.
pub struct SceneBuilder {
    width: u32,
    height: u32,
    scale: f32,
    camera: Camera,
    materials: Vec<Material>,
    primitives: Vec<Primitive>,
    envmap: Option<EnvMap>,
    envmap_scale: f32,
    sun: Option<Sun>,
    integrator: IntegratorConfig,
    kernel: KernelConfig,
    directional_area_light: bool,
    directional_solid_angle: f32,
    split_method: SplitMethod,
    traversal: TraversalMode,
}

impl SceneBuilder {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            scale: 1.0,
            camera: Camera::default(),
            materials: Vec::new(),
            primitives: Vec::new(),
            envmap: None,
            envmap_scale: 1.0,
            sun: None,
            integrator: IntegratorConfig::default(),
            kernel: KernelConfig::default(),
            directional_area_light: false,
            directional_solid_angle: 0.1,
            split_method: SplitMethod::default(),
            traversal: TraversalMode::default(),
        }
    }

    /// Uniform scene scale. Set this before adding geometry or the camera;
    /// it is applied at insertion time.
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    pub fn camera(&mut self, camera: Camera) -> &mut Self {
        let mut camera = camera;
        camera.eye *= self.scale;
        camera.at *= self.scale;
        camera.aspect = self.width as f32 / self.height as f32;
        self.camera = camera;
        self
    }

    pub fn add_material(&mut self, material: Material) -> usize {
        self.materials.push(material);
        self.materials.len() - 1
    }

    pub fn material_by_name(&self, name: &str) -> Option<usize> {
        self.materials.iter().position(|m| m.name() == name)
    }

    pub fn add_triangle(
        &mut self,
        pos: [Vec3; 3],
        vn: Option<[Vec3; 3]>,
        vt: Option<[Vec2; 3]>,
        material: Option<usize>,
    ) -> &mut Self {
        let pos = pos.map(|p| p * self.scale);
        self.primitives.push(Primitive::Triangle(Triangle::new(
            pos,
            vn,
            vt,
            material.unwrap_or(INVALID_INDEX),
        )));
        self
    }

    /// Two triangles covering a planar quad, vertices in winding order.
    pub fn add_quad(&mut self, corners: [Vec3; 4], material: Option<usize>) -> &mut Self {
        self.add_triangle([corners[0], corners[1], corners[2]], None, None, material);
        self.add_triangle([corners[0], corners[2], corners[3]], None, None, material);
        self
    }

    pub fn add_sphere(&mut self, center: Vec3, radius: f32, material: Option<usize>) -> &mut Self {
        self.primitives.push(Primitive::Sphere(Sphere::new(
            center * self.scale,
            radius * self.scale,
            material.unwrap_or(INVALID_INDEX),
        )));
        self
    }

    /// Emissive override by material name, as light declarations do.
    pub fn set_emission(&mut self, name: &str, radiance: Vec3) -> Result<&mut Self, SceneError> {
        let idx = self
            .material_by_name(name)
            .ok_or_else(|| SceneError::UnknownMaterial(name.to_string()))?;
        self.materials[idx].set_emission(radiance);
        Ok(self)
    }

    pub fn envmap(&mut self, envmap: EnvMap, scale: f32) -> &mut Self {
        self.envmap = Some(envmap);
        self.envmap_scale = scale;
        self
    }

    pub fn sun(&mut self, sun: Sun) -> &mut Self {
        self.sun = Some(Sun {
            direction: sun.direction.normalize(),
            ..sun
        });
        self
    }

    pub fn integrator(&mut self, config: IntegratorConfig) -> &mut Self {
        self.integrator = config;
        self
    }

    pub fn kernel(&mut self, config: KernelConfig) -> &mut Self {
        self.kernel = config;
        self
    }

    pub fn directional_area_light(&mut self, enabled: bool, solid_angle: f32) -> &mut Self {
        self.directional_area_light = enabled;
        self.directional_solid_angle = solid_angle;
        self
    }

    /// Select the spatial index. The octree is accepted for compatibility
    /// with older scene descriptions and resolves to the BVH.
    pub fn accelerator(&mut self, kind: ember_core::AccelKind) -> &mut Self {
        if kind == ember_core::AccelKind::Octree {
            log::info!("octree accelerator requested, using bvh");
        }
        self
    }

    pub fn split_method(&mut self, method: SplitMethod) -> &mut Self {
        self.split_method = method;
        self
    }

    pub fn traversal(&mut self, mode: TraversalMode) -> &mut Self {
        self.traversal = mode;
        self
    }

    /// Validate and freeze the scene: substitute the fallback material,
    /// flag emissive primitives, build the BVH, and set up the light CDF.
    pub fn build(mut self) -> Result<Scene, SceneError> {
        if self.width == 0 || self.height == 0 {
            return Err(SceneError::Malformed {
                field: "camera.width/height",
                message: "resolution must be positive".into(),
            });
        }
        if self.integrator.spp == 0 {
            return Err(SceneError::Malformed {
                field: "integrator.spp",
                message: "samples per pixel must be positive".into(),
            });
        }
        if self.kernel.size == 0 {
            return Err(SceneError::Malformed {
                field: "kernel.size",
                message: "tile size must be positive".into(),
            });
        }
        if !(self.camera.fov > 0.0 && self.camera.fov < std::f32::consts::PI) {
            return Err(SceneError::Malformed {
                field: "camera.fovy",
                message: format!("field of view {} out of range", self.camera.fov),
            });
        }

        // Primitives without a material fall back to a loud default so the
        // render still completes.
        let orphans = self
            .primitives
            .iter()
            .filter(|p| p.material() >= self.materials.len())
            .count();
        if orphans > 0 {
            log::warn!("{orphans} primitives without material, using fallback");
            let fallback = self.materials.len();
            self.materials.push(Material::BlinnPhong(BlinnPhong::missing()));
            for prim in &mut self.primitives {
                if prim.material() >= fallback {
                    prim.set_material(fallback);
                }
            }
        }

        for prim in &mut self.primitives {
            let emissive = self.materials[prim.material()].emissive();
            prim.set_emissive(emissive);
        }

        log::info!(
            "scene: {} materials, {} primitives",
            self.materials.len(),
            self.primitives.len()
        );

        let start = std::time::Instant::now();
        let mut accel = Bvh::build(self.primitives, self.split_method);
        accel.traversal = self.traversal;
        accel.robust_light = self.integrator.robust_light;
        log::info!("bvh build took {:?}", start.elapsed());

        // Light CDF over the reordered primitive array.
        let mut lights = Vec::new();
        let mut lights_cdf = Vec::new();
        let mut total_area = 0.0f32;
        for (i, prim) in accel.primitives.iter().enumerate() {
            if prim.emissive() {
                total_area += prim.area();
                lights.push(i);
                lights_cdf.push(total_area);
            }
        }
        log::info!("lights: {} with total area {total_area}", lights.len());

        Ok(Scene {
            materials: self.materials,
            accel,
            camera: self.camera,
            width: self.width,
            height: self.height,
            scale: self.scale,
            lights,
            lights_cdf,
            lights_total_area: total_area,
            envmap: self.envmap,
            envmap_scale: self.envmap_scale,
            sun: self.sun,
            integrator: self.integrator,
            kernel: self.kernel,
            directional_area_light: self.directional_area_light,
            directional_solid_angle: self.directional_solid_angle,
        })
    }
}
