//! Random-variate mappings and frame helpers shared by materials, lights
//! and integrators.

use crate::{Vec2, Vec3};
use std::f32::consts::PI;

pub const TWO_PI: f32 = 2.0 * PI;
pub const INV_PI: f32 = 1.0 / PI;
pub const INV_TWO_PI: f32 = 0.5 / PI;

/// Uniform direction on the upper (z >= 0) hemisphere, pdf `1 / 2pi`.
pub fn uniform_hemisphere(u: Vec2) -> Vec3 {
    let phi = u.y * TWO_PI;
    let z = (1.0 - 2.0 * u.x).abs();
    let r = (1.0 - z * z).max(0.0).sqrt();
    Vec3::new(r * phi.cos(), r * phi.sin(), z)
}

/// Uniform direction on the unit sphere, pdf `1 / 4pi`.
pub fn uniform_sphere(u: Vec2) -> Vec3 {
    let s = 2.0 * (u.y * (1.0 - u.y)).max(0.0).sqrt();
    Vec3::new(
        (TWO_PI * u.x).cos() * s,
        (TWO_PI * u.x).sin() * s,
        1.0 - 2.0 * u.y,
    )
}

/// Concentric (Shirley) mapping of the unit square onto the unit disk.
pub fn concentric_disk(u: Vec2) -> Vec2 {
    let offset = u * 2.0 - Vec2::ONE;
    if offset.x == 0.0 && offset.y == 0.0 {
        return Vec2::ZERO;
    }
    let (r, theta) = if offset.x.abs() > offset.y.abs() {
        (offset.x, (PI / 4.0) * (offset.y / offset.x))
    } else {
        (offset.y, (PI / 2.0) - (PI / 4.0) * (offset.x / offset.y))
    };
    Vec2::new(theta.cos() * r, theta.sin() * r)
}

/// Cosine-weighted direction on the upper hemisphere, pdf `cos(theta) / pi`.
pub fn cosine_hemisphere(u: Vec2) -> Vec3 {
    let d = concentric_disk(u);
    let z = (1.0 - d.x * d.x - d.y * d.y).max(0.0).sqrt();
    Vec3::new(d.x, d.y, z)
}

/// Uniform direction inside the cone `cos(theta) >= cos_theta_max` around +z,
/// pdf `1 / (2pi (1 - cos_theta_max))`.
pub fn uniform_cone(u: Vec2, cos_theta_max: f32) -> Vec3 {
    let cos_theta = (1.0 - u.x) + u.x * cos_theta_max;
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    let phi = u.y * TWO_PI;
    spherical_to_cartesian(sin_theta, cos_theta, phi)
}

#[inline]
pub fn spherical_to_cartesian(sin_theta: f32, cos_theta: f32, phi: f32) -> Vec3 {
    Vec3::new(sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta)
}

#[inline]
pub fn spherical_direction(theta: f32, phi: f32) -> Vec3 {
    spherical_to_cartesian(theta.sin(), theta.cos(), phi)
}

/// Rotate a local (+z up) direction into the frame whose z axis is `n`.
pub fn local_to_world(dir: Vec3, n: Vec3) -> Vec3 {
    let (t, b) = orthonormal_basis(n);
    t * dir.x + b * dir.y + n * dir.z
}

/// Tangent and bitangent completing `n` to a right-handed frame.
pub fn orthonormal_basis(n: Vec3) -> (Vec3, Vec3) {
    let b = if n.x.abs() > n.y.abs() {
        let inv_len = 1.0 / (n.x * n.x + n.z * n.z).sqrt();
        Vec3::new(n.z * inv_len, 0.0, -n.x * inv_len)
    } else {
        let inv_len = 1.0 / (n.y * n.y + n.z * n.z).sqrt();
        Vec3::new(0.0, n.z * inv_len, -n.y * inv_len)
    };
    (b.cross(n), b)
}

/// Equirectangular lookup coordinates for a unit direction.
pub fn direction_to_equirect(dir: Vec3) -> Vec2 {
    Vec2::new(
        dir.z.atan2(dir.x) * INV_TWO_PI + 0.5,
        dir.y.clamp(-1.0, 1.0).asin() * INV_PI + 0.5,
    )
}

/// Van der Corput radical inverse, base 2.
fn radical_inverse_vdc(mut bits: u32) -> f32 {
    bits = (bits << 16) | (bits >> 16);
    bits = ((bits & 0x5555_5555) << 1) | ((bits & 0xAAAA_AAAA) >> 1);
    bits = ((bits & 0x3333_3333) << 2) | ((bits & 0xCCCC_CCCC) >> 2);
    bits = ((bits & 0x0F0F_0F0F) << 4) | ((bits & 0xF0F0_F0F0) >> 4);
    bits = ((bits & 0x00FF_00FF) << 8) | ((bits & 0xFF00_FF00) >> 8);
    bits as f32 * 2.328_306_4e-10
}

/// i-th point of the n-point Hammersley set in the unit square.
pub fn hammersley(i: u32, n: u32) -> Vec2 {
    Vec2::new(i as f32 / n as f32, radical_inverse_vdc(i))
}

#[inline]
pub fn reflect(v: Vec3, n: Vec3) -> Vec3 {
    v - 2.0 * v.dot(n) * n
}

/// Refract `v` (pointing toward the surface) through a surface with normal
/// `n`, for the relative index `eta`. `None` on total internal reflection.
pub fn refract(v: Vec3, n: Vec3, eta: f32) -> Option<Vec3> {
    let cos_i = (-v).dot(n).min(1.0);
    let sin2_t = eta * eta * (1.0 - cos_i * cos_i);
    if sin2_t > 1.0 {
        return None;
    }
    let cos_t = (1.0 - sin2_t).sqrt();
    Some(eta * v + (eta * cos_i - cos_t) * n)
}

#[inline]
pub fn same_hemisphere(wo: Vec3, wi: Vec3, n: Vec3) -> bool {
    wo.dot(n) * wi.dot(n) > 0.0
}

/// Perceptual luminance used for lobe-selection probabilities and the
/// environment importance grid.
#[inline]
pub fn luminance(c: Vec3) -> f32 {
    0.3 * c.x + 0.59 * c.y + 0.11 * c.z
}
