//! Surface scattering models.
//!
//! `Material` is a tagged sum over the three supported models. Every
//! variant satisfies the same contract:
//!
//! - `sample` draws an incident direction for a given outgoing direction,
//!   returning the pdf of the draw and whether it came from a delta lobe;
//! - `eval` returns the BSDF value without the `|N.wi|` cosine (the
//!   integrator applies it for non-delta events);
//! - `pdf` returns the density `sample` would have produced the pair with.
//!
//! Delta lobes report `pdf = 1` and their `eval` is the finite
//! reflectance/transmittance without a Dirac factor. `wo` and `wi` are unit
//! world-space directions, both pointing away from the surface.

use crate::{Disney, Texture2D};
use ember_math::sampling::{self, INV_PI, INV_TWO_PI};
use ember_math::{Sampler, Vec2, Vec3};

/// Above this exponent the Phong lobe is so narrow it is treated as a
/// mirror (delta) reflection.
pub const BLINN_PHONG_SHININESS_THRESHOLD: f32 = 500.0;

const EPSILON: f32 = 1e-6;

/// Result of importance sampling a material.
#[derive(Debug, Clone, Copy)]
pub struct BsdfSample {
    pub wi: Vec3,
    pub pdf: f32,
    pub is_delta: bool,
}

/// Schlick's approximation of the Fresnel reflectance for a relative index
/// of refraction.
pub(crate) fn fresnel_schlick(cos_theta: f32, eta: f32) -> f32 {
    let r0 = (1.0 - eta) / (1.0 + eta);
    let r0 = r0 * r0;
    r0 + (1.0 - r0) * (1.0 - cos_theta).clamp(0.0, 1.0).powi(5)
}

#[derive(Debug, Clone)]
pub enum Material {
    BlinnPhong(BlinnPhong),
    Glass(Glass),
    Disney(Disney),
}

impl Material {
    pub fn name(&self) -> &str {
        match self {
            Material::BlinnPhong(m) => &m.name,
            Material::Glass(m) => &m.name,
            Material::Disney(m) => &m.name,
        }
    }

    pub fn emissive(&self) -> bool {
        match self {
            Material::BlinnPhong(m) => m.emissive,
            Material::Glass(m) => m.emissive,
            Material::Disney(m) => m.emissive,
        }
    }

    pub fn emission(&self) -> Vec3 {
        match self {
            Material::BlinnPhong(m) => m.emission,
            Material::Glass(m) => m.emission,
            Material::Disney(m) => m.emission,
        }
    }

    /// Whether the whole material is a Dirac scatterer (cannot be reached
    /// by light sampling).
    pub fn is_delta(&self) -> bool {
        matches!(self, Material::Glass(_))
    }

    pub fn set_emission(&mut self, emission: Vec3) {
        let (e, flag) = (emission, emission.max_element() > EPSILON);
        match self {
            Material::BlinnPhong(m) => {
                m.emission = e;
                m.emissive = flag;
            }
            Material::Glass(m) => {
                m.emission = e;
                m.emissive = flag;
            }
            Material::Disney(m) => {
                m.emission = e;
                m.emissive = flag;
            }
        }
    }

    pub fn sample(
        &self,
        wo: Vec3,
        n: Vec3,
        tangent: Vec3,
        bitangent: Vec3,
        rng: &mut Sampler,
    ) -> BsdfSample {
        match self {
            Material::BlinnPhong(m) => m.sample(wo, n, tangent, bitangent, rng),
            Material::Glass(m) => m.sample(wo, n, rng),
            Material::Disney(m) => m.sample(wo, n, tangent, bitangent, rng),
        }
    }

    pub fn eval(&self, wo: Vec3, wi: Vec3, n: Vec3, uv: Vec2, tangent: Vec3, bitangent: Vec3) -> Vec3 {
        match self {
            Material::BlinnPhong(m) => m.eval(wo, wi, n, uv),
            Material::Glass(m) => m.eval(),
            Material::Disney(m) => m.eval(wo, wi, n, tangent, bitangent),
        }
    }

    pub fn pdf(&self, wo: Vec3, wi: Vec3, n: Vec3, tangent: Vec3, bitangent: Vec3) -> f32 {
        match self {
            Material::BlinnPhong(m) => m.pdf(wo, wi, n),
            Material::Glass(_) => 1.0,
            Material::Disney(m) => m.pdf(wo, wi, n, tangent, bitangent),
        }
    }

    /// Uniform-hemisphere fallback sampler shared by every variant.
    pub fn sample_uniform(&self, n: Vec3, rng: &mut Sampler) -> (Vec3, f32) {
        let dir = sampling::uniform_hemisphere(rng.next_2d());
        let wi = sampling::local_to_world(dir, n).normalize();
        (wi, INV_TWO_PI)
    }
}

/// Classic Blinn-Phong with three lobes: textured Lambertian diffuse, a
/// Phong lobe around the mirror direction, and a delta Snell refraction
/// enabled when `ior != 1`.
#[derive(Debug, Clone)]
pub struct BlinnPhong {
    pub name: String,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub transmittance: Vec3,
    pub shininess: f32,
    pub ior: f32,
    pub emission: Vec3,
    pub emissive: bool,
    pub diffuse_texture: Option<Texture2D>,
}

impl Default for BlinnPhong {
    fn default() -> Self {
        Self {
            name: String::new(),
            diffuse: Vec3::ZERO,
            specular: Vec3::ZERO,
            transmittance: Vec3::ZERO,
            shininess: 1.0,
            ior: 1.0,
            emission: Vec3::ZERO,
            emissive: false,
            diffuse_texture: None,
        }
    }
}

impl BlinnPhong {
    pub fn diffuse(name: impl Into<String>, albedo: Vec3) -> Self {
        Self {
            name: name.into(),
            diffuse: albedo,
            ..Default::default()
        }
    }

    /// The fallback used when a primitive references no known material.
    pub fn missing() -> Self {
        Self::diffuse("missing", Vec3::new(1.0, 0.0, 1.0))
    }

    pub fn with_specular(mut self, specular: Vec3, shininess: f32) -> Self {
        self.specular = specular;
        self.shininess = shininess;
        self
    }

    pub fn with_transmittance(mut self, transmittance: Vec3, ior: f32) -> Self {
        self.transmittance = transmittance;
        self.ior = ior;
        self
    }

    pub fn with_texture(mut self, texture: Texture2D) -> Self {
        self.diffuse_texture = Some(texture);
        self
    }

    /// Lobe selection probabilities from the lobe luminances, renormalized
    /// to sum to 1. The refraction share is scaled by `1 - F`.
    fn probabilities(&self, wo: Vec3, n: Vec3) -> (f32, f32, f32) {
        let mut pd = sampling::luminance(self.diffuse);
        let mut ps = sampling::luminance(self.specular);
        let mut pr = 0.0;
        if (1.0 - self.ior).abs() > EPSILON {
            let no_v = wo.dot(n).abs();
            pr = sampling::luminance(self.transmittance) * (1.0 - fresnel_schlick(no_v, self.ior));
        }
        let total = pd + ps + pr;
        if total < EPSILON {
            return (1.0, 0.0, 0.0);
        }
        let inv = 1.0 / total;
        pd *= inv;
        ps *= inv;
        pr *= inv;
        (pd, ps, pr)
    }

    fn bsdf_diffuse(&self, uv: Vec2) -> Vec3 {
        match &self.diffuse_texture {
            Some(tex) => tex.sample(uv) * INV_PI,
            None => self.diffuse * INV_PI,
        }
    }

    fn bsdf_specular(&self, wo: Vec3, wi: Vec3, n: Vec3) -> Vec3 {
        let no_l = n.dot(wi);
        let no_v = n.dot(wo);
        if no_l > 0.0 && no_v > 0.0 {
            let refl = sampling::reflect(-wo, n);
            let a = refl.dot(wi).max(0.0);
            return self.specular * (2.0 + self.shininess) * INV_TWO_PI * a.powf(self.shininess);
        }
        Vec3::ZERO
    }

    fn bsdf_refract(&self, wo: Vec3, wi: Vec3, n: Vec3, pr: f32) -> Vec3 {
        let no_v = n.dot(wo);
        let no_l = n.dot(wi);
        if no_l * no_v < 0.0 && pr > EPSILON {
            return self.transmittance;
        }
        Vec3::ZERO
    }

    fn sample_diffuse(&self, u: Vec2, n: Vec3) -> Vec3 {
        let theta = u.x.sqrt().acos();
        let phi = u.y * sampling::TWO_PI;
        let dir = sampling::spherical_direction(theta, phi);
        sampling::local_to_world(dir, n).normalize()
    }

    fn sample_specular(&self, wo: Vec3, u: Vec2, n: Vec3) -> Vec3 {
        let cos = u.x.powf(1.0 / (self.shininess + 1.0));
        let refl = sampling::reflect(-wo, n);
        let theta = cos.clamp(-1.0, 1.0).acos();
        let phi = u.y * sampling::TWO_PI;
        let dir = sampling::spherical_direction(theta, phi);
        sampling::local_to_world(dir, refl).normalize()
    }

    fn sample_refract(&self, wo: Vec3, n: Vec3) -> Vec3 {
        let back_face = n.dot(wo) < 0.0;
        let refracted = if back_face {
            sampling::refract(-wo, -n, self.ior)
        } else {
            sampling::refract(-wo, n, 1.0 / self.ior)
        };
        match refracted {
            Some(wi) => wi,
            // Total internal reflection.
            None => sampling::reflect(-wo, n),
        }
    }

    fn pdf_diffuse(&self, wi: Vec3, n: Vec3) -> f32 {
        n.dot(wi).max(0.0) * INV_PI
    }

    fn pdf_specular(&self, wo: Vec3, wi: Vec3, n: Vec3) -> f32 {
        let refl = sampling::reflect(-wo, n);
        let cos = refl.dot(wi).max(0.0);
        (self.shininess + 1.0) * INV_TWO_PI * cos.powf(self.shininess)
    }

    pub fn sample(
        &self,
        wo: Vec3,
        n: Vec3,
        _tangent: Vec3,
        _bitangent: Vec3,
        rng: &mut Sampler,
    ) -> BsdfSample {
        let u = rng.next_2d();
        let rnd = rng.next_1d();
        let (pd, ps, _pr) = self.probabilities(wo, n);

        let mut is_delta = false;
        let wi = if rnd < pd {
            self.sample_diffuse(u, n)
        } else if rnd < pd + ps {
            if self.shininess >= BLINN_PHONG_SHININESS_THRESHOLD {
                is_delta = true;
            }
            self.sample_specular(wo, u, n)
        } else {
            is_delta = true;
            self.sample_refract(wo, n)
        };

        BsdfSample {
            wi,
            pdf: self.pdf(wo, wi, n),
            is_delta,
        }
    }

    pub fn eval(&self, wo: Vec3, wi: Vec3, n: Vec3, uv: Vec2) -> Vec3 {
        let (_pd, _ps, pr) = self.probabilities(wo, n);
        let no_l = n.dot(wi);
        let no_v = n.dot(wo);

        let mut f = Vec3::ZERO;
        if no_l > 0.0 && no_v > 0.0 {
            f += self.bsdf_diffuse(uv);
        }
        f += self.bsdf_specular(wo, wi, n);
        f += self.bsdf_refract(wo, wi, n, pr);
        f
    }

    /// Mixture pdf over the three lobes.
    pub fn pdf(&self, wo: Vec3, wi: Vec3, n: Vec3) -> f32 {
        let (pd, ps, pr) = self.probabilities(wo, n);
        pd * self.pdf_diffuse(wi, n) + ps * self.pdf_specular(wo, wi, n) + pr
    }
}

/// Ideal dielectric: every interaction is a Dirac reflection or refraction
/// chosen by the Fresnel term.
#[derive(Debug, Clone)]
pub struct Glass {
    pub name: String,
    pub transmittance: Vec3,
    pub ior: f32,
    pub emission: Vec3,
    pub emissive: bool,
}

impl Glass {
    pub fn new(name: impl Into<String>, transmittance: Vec3, ior: f32) -> Self {
        Self {
            name: name.into(),
            transmittance,
            ior,
            emission: Vec3::ZERO,
            emissive: false,
        }
    }

    pub fn sample(&self, wo: Vec3, n: Vec3, rng: &mut Sampler) -> BsdfSample {
        let back_face = n.dot(wo) < 0.0;
        let eta = if back_face { self.ior } else { 1.0 / self.ior };
        let normal = if back_face { -n } else { n };

        let cos_theta = wo.dot(normal).min(1.0);
        let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
        let cannot_refract = eta * sin_theta > 1.0;

        let wi = if cannot_refract || rng.next_1d() < fresnel_schlick(cos_theta, eta) {
            sampling::reflect(-wo, normal)
        } else {
            sampling::refract(-wo, normal, eta)
                .unwrap_or_else(|| sampling::reflect(-wo, normal))
        };

        BsdfSample {
            wi,
            pdf: 1.0,
            is_delta: true,
        }
    }

    pub fn eval(&self) -> Vec3 {
        self.transmittance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> (Vec3, Vec3, Vec3) {
        let n = Vec3::Z;
        let (t, b) = sampling::orthonormal_basis(n);
        (n, t, b)
    }

    /// Uniform-hemisphere estimate of the reflected energy
    /// `int f |cos| dw` for a fixed outgoing direction.
    fn uniform_energy(material: &Material, wo: Vec3, n: Vec3, samples: u32, seed: u64) -> f32 {
        let (t, b) = sampling::orthonormal_basis(n);
        let mut rng = Sampler::from_seed(seed);
        let mut sum = 0.0;
        for _ in 0..samples {
            let wi = sampling::local_to_world(sampling::uniform_hemisphere(rng.next_2d()), n);
            let f = material.eval(wo, wi, n, Vec2::ZERO, t, b);
            sum += sampling::luminance(f) * wi.dot(n).abs() * sampling::TWO_PI;
        }
        sum / samples as f32
    }

    /// Same integral estimated with the material's own importance sampler.
    fn importance_energy(material: &Material, wo: Vec3, n: Vec3, samples: u32, seed: u64) -> f32 {
        let (t, b) = sampling::orthonormal_basis(n);
        let mut rng = Sampler::from_seed(seed);
        let mut sum = 0.0;
        for _ in 0..samples {
            let s = material.sample(wo, n, t, b, &mut rng);
            if s.pdf < 1e-6 {
                continue;
            }
            let f = material.eval(wo, s.wi, n, Vec2::ZERO, t, b);
            sum += sampling::luminance(f) * s.wi.dot(n).abs() / s.pdf;
        }
        sum / samples as f32
    }

    #[test]
    fn test_lobe_probabilities_normalized() {
        let m = BlinnPhong::diffuse("m", Vec3::splat(0.5))
            .with_specular(Vec3::splat(0.3), 20.0)
            .with_transmittance(Vec3::splat(0.4), 1.5);
        let (pd, ps, pr) = m.probabilities(Vec3::Z, Vec3::Z);
        assert!((pd + ps + pr - 1.0).abs() < 1e-5);
        assert!(pd > 0.0 && ps > 0.0 && pr > 0.0);
    }

    #[test]
    fn test_diffuse_energy_matches_albedo() {
        let albedo = 0.8;
        let m = Material::BlinnPhong(BlinnPhong::diffuse("d", Vec3::splat(albedo)));
        let wo = Vec3::new(0.3, 0.1, 0.8).normalize();
        let e = uniform_energy(&m, wo, Vec3::Z, 400_000, 11);
        assert!((e - albedo).abs() < 0.02, "estimated albedo {e}");
    }

    #[test]
    fn test_blinn_phong_energy_bounded() {
        let m = Material::BlinnPhong(
            BlinnPhong::diffuse("s", Vec3::splat(0.5)).with_specular(Vec3::splat(0.4), 32.0),
        );
        let wo = Vec3::new(0.2, -0.3, 0.9).normalize();
        let e = uniform_energy(&m, wo, Vec3::Z, 400_000, 12);
        assert!(e <= 1.05, "energy {e} exceeds 1");
    }

    #[test]
    fn test_blinn_phong_sampler_consistency() {
        let m = Material::BlinnPhong(
            BlinnPhong::diffuse("s", Vec3::splat(0.4)).with_specular(Vec3::splat(0.3), 16.0),
        );
        let wo = Vec3::new(0.1, 0.4, 0.9).normalize();
        let reference = uniform_energy(&m, wo, Vec3::Z, 600_000, 21);
        let estimated = importance_energy(&m, wo, Vec3::Z, 600_000, 22);
        assert!(
            (reference - estimated).abs() < 0.03 * reference.max(0.1),
            "uniform {reference} vs importance {estimated}"
        );
    }

    #[test]
    fn test_shininess_threshold_marks_delta() {
        let m = BlinnPhong::diffuse("m", Vec3::ZERO).with_specular(Vec3::ONE, 1000.0);
        let (n, t, b) = frame();
        let wo = Vec3::new(0.4, 0.0, 0.9).normalize();
        let mut rng = Sampler::from_seed(5);
        let mut saw_delta = false;
        for _ in 0..64 {
            let s = m.sample(wo, n, t, b, &mut rng);
            saw_delta |= s.is_delta;
        }
        assert!(saw_delta);
    }

    #[test]
    fn test_glass_is_delta_and_unit_pdf() {
        let g = Material::Glass(Glass::new("g", Vec3::ONE, 1.5));
        assert!(g.is_delta());
        let (n, t, b) = frame();
        let wo = Vec3::new(0.3, 0.2, 0.93).normalize();
        let mut rng = Sampler::from_seed(3);
        let s = g.sample(wo, n, t, b, &mut rng);
        assert_eq!(s.pdf, 1.0);
        assert!(s.is_delta);
        assert_eq!(g.pdf(wo, s.wi, n, t, b), 1.0);
    }

    #[test]
    fn test_glass_snell_or_mirror() {
        let glass = Glass::new("g", Vec3::ONE, 1.5);
        let n = Vec3::Z;
        let wo = Vec3::new(0.5, 0.0, (1.0f32 - 0.25).sqrt()).normalize();
        let mut rng = Sampler::from_seed(17);
        let sin_i = wo.cross(n).length();
        for _ in 0..256 {
            let s = glass.sample(wo, n, &mut rng);
            let wi = s.wi;
            if wi.z > 0.0 {
                // Mirror reflection.
                assert!((wi - sampling::reflect(-wo, n)).length() < 1e-5);
            } else {
                // Snell: sin_t = sin_i / ior.
                let sin_t = wi.cross(n).length();
                assert!((sin_t - sin_i / 1.5).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn test_refraction_lobe_transmits() {
        let m = BlinnPhong::diffuse("t", Vec3::ZERO)
            .with_transmittance(Vec3::splat(0.9), 1.5);
        let n = Vec3::Z;
        let wo = Vec3::new(0.2, 0.0, 0.98).normalize();
        // Direction through the surface evaluates to the transmittance.
        let wi = Vec3::new(0.1, 0.0, -0.99).normalize();
        let f = m.eval(wo, wi, n, Vec2::ZERO);
        assert!((f - Vec3::splat(0.9)).length() < 1e-5);
        // Same-side pairs see no refraction term.
        let wi_up = Vec3::new(0.1, 0.0, 0.99).normalize();
        let f_up = m.eval(wo, wi_up, n, Vec2::ZERO);
        assert!(f_up.x < 0.9);
    }

    #[test]
    fn test_sample_uniform_pdf() {
        let m = Material::BlinnPhong(BlinnPhong::diffuse("u", Vec3::ONE));
        let mut rng = Sampler::from_seed(1);
        let (wi, pdf) = m.sample_uniform(Vec3::Z, &mut rng);
        assert!(wi.z >= 0.0);
        assert!((pdf - INV_TWO_PI).abs() < 1e-7);
    }
}
