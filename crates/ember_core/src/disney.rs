//! Disney principled BSDF.
//!
//! Anisotropic microfacet specular (GTR2 + anisotropic Smith G) layered
//! over Burley diffuse with subsurface and sheen terms, plus a GTR1
//! clearcoat lobe. Sampling mixes the cosine-weighted diffuse lobe and the
//! GTR2 half-vector lobe; the pdf is the average of those two.

use crate::material::BsdfSample;
use ember_math::sampling::{self, INV_PI};
use ember_math::{Sampler, Vec2, Vec3};
use std::f32::consts::PI;

const S_EPSILON: f32 = 1e-3;

/// Schlick weight `(1 - cos)^5`.
fn schlick_weight(cos_theta: f32) -> f32 {
    let m = (1.0 - cos_theta).clamp(0.0, 1.0);
    let m2 = m * m;
    m2 * m2 * m
}

/// Generalized Trowbridge-Reitz, gamma = 1 (clearcoat distribution).
fn gtr1(no_h: f32, a: f32) -> f32 {
    if a >= 1.0 {
        return INV_PI;
    }
    let a2 = a * a;
    let t = 1.0 + (a2 - 1.0) * no_h * no_h;
    (a2 - 1.0) / (PI * a2.ln() * t)
}

/// Anisotropic GTR2 distribution.
fn gtr2_aniso(no_h: f32, ho_x: f32, ho_y: f32, ax: f32, ay: f32) -> f32 {
    let d = (ho_x / ax).powi(2) + (ho_y / ay).powi(2) + no_h * no_h;
    1.0 / (PI * ax * ay * d * d)
}

fn smith_g_ggx(no_v: f32, alpha_g: f32) -> f32 {
    let a = alpha_g * alpha_g;
    let b = no_v * no_v;
    1.0 / (no_v.abs() + (a + b - a * b).sqrt().max(1e-6))
}

fn smith_g_ggx_aniso(no_v: f32, vo_x: f32, vo_y: f32, ax: f32, ay: f32) -> f32 {
    1.0 / (no_v + ((vo_x * ax).powi(2) + (vo_y * ay).powi(2) + no_v * no_v).sqrt())
}

#[derive(Debug, Clone)]
pub struct Disney {
    pub name: String,
    pub base_color: Vec3,
    pub subsurface: f32,
    pub roughness: f32,
    pub metallic: f32,
    pub specular: f32,
    pub specular_tint: f32,
    pub clearcoat: f32,
    pub clearcoat_gloss: f32,
    pub anisotropic: f32,
    pub sheen: f32,
    pub sheen_tint: f32,
    pub emission: Vec3,
    pub emissive: bool,
}

impl Default for Disney {
    fn default() -> Self {
        Self {
            name: String::new(),
            base_color: Vec3::splat(0.8),
            subsurface: 0.0,
            roughness: 0.5,
            metallic: 0.0,
            specular: 0.5,
            specular_tint: 0.0,
            clearcoat: 0.0,
            clearcoat_gloss: 1.0,
            anisotropic: 0.0,
            sheen: 0.0,
            sheen_tint: 0.5,
            emission: Vec3::ZERO,
            emissive: false,
        }
    }
}

impl Disney {
    pub fn new(name: impl Into<String>, base_color: Vec3) -> Self {
        Self {
            name: name.into(),
            base_color,
            ..Default::default()
        }
    }

    pub fn with_roughness(mut self, roughness: f32) -> Self {
        self.roughness = roughness.clamp(0.0, 1.0);
        self
    }

    pub fn with_metallic(mut self, metallic: f32) -> Self {
        self.metallic = metallic.clamp(0.0, 1.0);
        self
    }

    pub fn with_anisotropic(mut self, anisotropic: f32) -> Self {
        self.anisotropic = anisotropic.clamp(0.0, 1.0);
        self
    }

    pub fn with_clearcoat(mut self, clearcoat: f32, gloss: f32) -> Self {
        self.clearcoat = clearcoat;
        self.clearcoat_gloss = gloss;
        self
    }

    pub fn with_sheen(mut self, sheen: f32, tint: f32) -> Self {
        self.sheen = sheen;
        self.sheen_tint = tint;
        self
    }

    /// Anisotropy-scaled roughness along tangent and bitangent.
    fn alphas(&self) -> (f32, f32) {
        let aspect = (1.0 - self.anisotropic * 0.9).sqrt();
        let r2 = self.roughness * self.roughness;
        ((r2 / aspect).max(S_EPSILON), (r2 * aspect).max(S_EPSILON))
    }

    fn tint(&self) -> Vec3 {
        let lum = sampling::luminance(self.base_color);
        if lum > 0.0 {
            self.base_color / lum
        } else {
            Vec3::ONE
        }
    }

    fn diffuse_lobe(&self, no_l: f32, no_v: f32, lo_h: f32) -> Vec3 {
        let fl = schlick_weight(no_l);
        let fv = schlick_weight(no_v);
        let fd90 = 0.5 + 2.0 * lo_h * lo_h * self.roughness;
        let fd = (1.0 + (fd90 - 1.0) * fl) * (1.0 + (fd90 - 1.0) * fv);
        self.base_color * INV_PI * fd
    }

    fn subsurface_lobe(&self, no_l: f32, no_v: f32, lo_h: f32) -> Vec3 {
        let fl = schlick_weight(no_l);
        let fv = schlick_weight(no_v);
        let fss90 = lo_h * lo_h * self.roughness;
        let fss = (1.0 + (fss90 - 1.0) * fl) * (1.0 + (fss90 - 1.0) * fv);
        let ss = 1.25 * (fss * (1.0 / (no_l + no_v) - 0.5) + 0.5);
        self.base_color * INV_PI * ss
    }

    #[allow(clippy::too_many_arguments)]
    fn microfacet_lobe(
        &self,
        no_l: f32,
        no_v: f32,
        no_h: f32,
        lo_h: f32,
        l: Vec3,
        v: Vec3,
        h: Vec3,
        tangent: Vec3,
        bitangent: Vec3,
    ) -> Vec3 {
        let c_spec0 = {
            let tint = Vec3::ONE.lerp(self.tint(), self.specular_tint) * self.specular * 0.08;
            tint.lerp(self.base_color, self.metallic)
        };
        let (ax, ay) = self.alphas();
        let ds = gtr2_aniso(no_h, h.dot(tangent), h.dot(bitangent), ax, ay);
        let fh = schlick_weight(lo_h);
        let fs = c_spec0.lerp(Vec3::ONE, fh);
        let gs = smith_g_ggx_aniso(no_l, l.dot(tangent), l.dot(bitangent), ax, ay)
            * smith_g_ggx_aniso(no_v, v.dot(tangent), v.dot(bitangent), ax, ay);
        fs * gs * ds
    }

    fn clearcoat_lobe(&self, no_l: f32, no_v: f32, no_h: f32, lo_h: f32) -> f32 {
        let gloss = 0.1 + (S_EPSILON - 0.1) * self.clearcoat_gloss;
        let dr = gtr1(no_h.abs(), gloss);
        let fh = schlick_weight(lo_h);
        let fr = 0.04 + 0.96 * fh;
        let gr = smith_g_ggx(no_l, 0.25) * smith_g_ggx(no_v, 0.25);
        0.25 * self.clearcoat * fr * gr * dr
    }

    fn sheen_lobe(&self, lo_h: f32) -> Vec3 {
        let fh = schlick_weight(lo_h);
        Vec3::ONE.lerp(self.tint(), self.sheen_tint) * fh * self.sheen
    }

    fn sample_diffuse(&self, u: Vec2, n: Vec3) -> Vec3 {
        let dir = sampling::cosine_hemisphere(u);
        sampling::local_to_world(dir, n).normalize()
    }

    fn sample_microfacet(&self, wo: Vec3, tangent: Vec3, bitangent: Vec3, u: Vec2, n: Vec3) -> Vec3 {
        let (ax, ay) = self.alphas();

        let mut phi = (ay / ax * (2.0 * PI * u.y + 0.5 * PI).tan()).atan();
        if u.y > 0.5 {
            phi += PI;
        }
        let (sin_phi, cos_phi) = phi.sin_cos();
        let alpha2 = 1.0 / (cos_phi * cos_phi / (ax * ax) + sin_phi * sin_phi / (ay * ay));
        let tan2_theta = alpha2 * u.x / (1.0 - u.x).max(1e-6);
        let cos_theta = 1.0 / (1.0 + tan2_theta).sqrt();
        let sin_theta = (1.0 - cos_theta * cos_theta).max(1e-6).sqrt();

        let wh_local = sampling::spherical_to_cartesian(sin_theta, cos_theta, phi);
        let mut wh = tangent * wh_local.x + bitangent * wh_local.y + n * wh_local.z;
        if !sampling::same_hemisphere(wo, wh, n) {
            wh = -wh;
        }
        sampling::reflect(-wo, wh).normalize()
    }

    fn pdf_diffuse(&self, wo: Vec3, wi: Vec3, n: Vec3) -> f32 {
        if sampling::same_hemisphere(wo, wi, n) {
            n.dot(wi).abs() * INV_PI
        } else {
            0.0
        }
    }

    fn pdf_microfacet(&self, wo: Vec3, wi: Vec3, n: Vec3, tangent: Vec3, bitangent: Vec3) -> f32 {
        if !sampling::same_hemisphere(wo, wi, n) {
            return 0.0;
        }
        let h = (wo + wi).normalize();
        let (ax, ay) = self.alphas();

        let ho_x = h.dot(tangent);
        let ho_y = h.dot(bitangent);
        let no_h = n.dot(h);

        let denom = ho_x * ho_x / (ax * ax) + ho_y * ho_y / (ay * ay) + no_h * no_h;
        if denom == 0.0 {
            return 0.0;
        }
        let pdf_h = no_h / (PI * ax * ay * denom * denom);
        let vo_h = wo.dot(h);
        if vo_h <= 1e-6 {
            return 0.0;
        }
        // Half-vector density to incident-direction density.
        pdf_h / (4.0 * vo_h)
    }

    pub fn sample(
        &self,
        wo: Vec3,
        n: Vec3,
        tangent: Vec3,
        bitangent: Vec3,
        rng: &mut Sampler,
    ) -> BsdfSample {
        let u = rng.next_2d();
        let wi = if rng.next_1d() < 0.5 {
            self.sample_diffuse(u, n)
        } else {
            self.sample_microfacet(wo, tangent, bitangent, u, n)
        };

        BsdfSample {
            wi,
            pdf: self.pdf(wo, wi, n, tangent, bitangent),
            is_delta: false,
        }
    }

    pub fn eval(&self, wo: Vec3, wi: Vec3, n: Vec3, tangent: Vec3, bitangent: Vec3) -> Vec3 {
        if !sampling::same_hemisphere(wo, wi, n) {
            return Vec3::ZERO;
        }
        let no_l = n.dot(wi);
        let no_v = n.dot(wo);
        if no_l < 0.0 || no_v < 0.0 {
            return Vec3::ZERO;
        }

        let h = (wo + wi).normalize();
        let no_h = n.dot(h);
        let lo_h = wo.dot(h);

        let diffuse = self
            .diffuse_lobe(no_l, no_v, lo_h)
            .lerp(self.subsurface_lobe(no_l, no_v, lo_h), self.subsurface);
        let sheen = self.sheen_lobe(lo_h);
        let micro = self.microfacet_lobe(no_l, no_v, no_h, lo_h, wi, wo, h, tangent, bitangent);
        let coat = self.clearcoat_lobe(no_l, no_v, no_h, lo_h);

        (diffuse + sheen) * (1.0 - self.metallic) + micro + Vec3::splat(coat)
    }

    /// Average of the two sampled lobe pdfs.
    pub fn pdf(&self, wo: Vec3, wi: Vec3, n: Vec3, tangent: Vec3, bitangent: Vec3) -> f32 {
        let p_diffuse = self.pdf_diffuse(wo, wi, n);
        let p_micro = self.pdf_microfacet(wo, wi, n, tangent, bitangent);
        (p_diffuse + p_micro) * 0.5
    }
}
