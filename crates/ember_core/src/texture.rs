//! Texture sampling: 2D surface maps and the equirectangular environment.
//!
//! The core consumes float RGB pixel buffers; decoding image files into
//! those buffers is the loader layer's job. `from_rgba8` covers the common
//! byte-image case including the y-flip and optional sRGB decode applied at
//! load time.

use ember_math::{sampling, Vec2, Vec3};

const GAMMA: f32 = 2.2;

/// Float RGB texture with repeat wrapping and bilinear filtering.
#[derive(Debug, Clone)]
pub struct Texture2D {
    width: usize,
    height: usize,
    pixels: Vec<Vec3>,
}

impl Texture2D {
    /// Build from raw float pixels in row-major order, row 0 at v = 0.
    pub fn from_pixels(width: usize, height: usize, pixels: Vec<Vec3>) -> Self {
        assert_eq!(pixels.len(), width * height);
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Build from an 8-bit RGBA byte image as decoders produce it (row 0 at
    /// the top). Rows are flipped so v grows upward, and `srgb` applies the
    /// gamma-power decode to linear space.
    pub fn from_rgba8(width: usize, height: usize, data: &[u8], srgb: bool) -> Self {
        assert!(data.len() >= width * height * 4);
        let mut pixels = vec![Vec3::ZERO; width * height];
        for y in 0..height {
            let src_row = height - 1 - y;
            for x in 0..width {
                let o = (src_row * width + x) * 4;
                let mut c = Vec3::new(
                    data[o] as f32 / 255.0,
                    data[o + 1] as f32 / 255.0,
                    data[o + 2] as f32 / 255.0,
                );
                if srgb {
                    c = c.powf(GAMMA);
                }
                pixels[y * width + x] = c;
            }
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn solid(color: Vec3) -> Self {
        Self::from_pixels(1, 1, vec![color])
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Texel fetch with clamped coordinates.
    fn at(&self, x: i64, y: i64) -> Vec3 {
        let x = x.clamp(0, self.width as i64 - 1) as usize;
        let y = y.clamp(0, self.height as i64 - 1) as usize;
        self.pixels[y * self.width + x]
    }

    /// Bilinear sample with repeat wrapping.
    pub fn sample(&self, uv: Vec2) -> Vec3 {
        let mut u = uv.x - uv.x.floor();
        let mut v = uv.y - uv.y.floor();
        u *= self.width as f32;
        v *= self.height as f32;
        let x = u.floor();
        let y = v.floor();
        u -= x;
        v -= y;
        let (x, y) = (x as i64, y as i64);

        (self.at(x, y) * (1.0 - u) + self.at(x + 1, y) * u) * (1.0 - v)
            + (self.at(x, y + 1) * (1.0 - u) + self.at(x + 1, y + 1) * u) * v
    }
}

/// Resolution of the (theta, phi) importance grid.
const WEIGHT_GRID_SIZE: usize = 16;
/// Samples averaged per grid cell.
const WEIGHT_SAMPLES: u32 = 512;

/// Equirectangular HDR environment map with a precomputed importance grid.
#[derive(Debug, Clone)]
pub struct EnvMap {
    width: usize,
    height: usize,
    pixels: Vec<Vec3>,
    /// Mean luminance per spherical cell, normalized to sum to 1.
    weights: Vec<f32>,
}

impl EnvMap {
    pub fn from_pixels(width: usize, height: usize, pixels: Vec<Vec3>) -> Self {
        assert_eq!(pixels.len(), width * height);
        let mut env = Self {
            width,
            height,
            pixels,
            weights: Vec::new(),
        };
        env.weights = env.calc_weights(WEIGHT_SAMPLES);
        env
    }

    /// Constant-radiance environment, used by furnace tests.
    pub fn constant(radiance: Vec3) -> Self {
        Self::from_pixels(1, 1, vec![radiance])
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    pub fn weight_grid_size(&self) -> usize {
        WEIGHT_GRID_SIZE
    }

    fn at(&self, x: i64, y: i64) -> Vec3 {
        let x = x.clamp(0, self.width as i64 - 1) as usize;
        let y = y.clamp(0, self.height as i64 - 1) as usize;
        self.pixels[y * self.width + x]
    }

    /// Radiance arriving from `dir` (world space, need not be normalized).
    pub fn sample(&self, dir: Vec3) -> Vec3 {
        let uv = sampling::direction_to_equirect(dir.normalize());
        let mut u = uv.x;
        let mut v = 1.0 - uv.y; // image convention: top row is +y
        u *= self.width as f32;
        v *= self.height as f32;
        let x = u.floor();
        let y = v.floor();
        u -= x;
        v -= y;
        let (x, y) = (x as i64, y as i64);

        (self.at(x, y) * (1.0 - u) + self.at(x + 1, y) * u) * (1.0 - v)
            + (self.at(x, y + 1) * (1.0 - u) + self.at(x + 1, y + 1) * u) * v
    }

    /// Mean luminance per (theta, phi) cell, jittered by Hammersley points,
    /// normalized so the grid sums to 1.
    fn calc_weights(&self, num_samples: u32) -> Vec<f32> {
        let n = WEIGHT_GRID_SIZE;
        let delta_theta = std::f32::consts::PI / n as f32;
        let delta_phi = sampling::TWO_PI / n as f32;
        let mut weights = vec![0.0f32; n * n];
        let mut total = 0.0f32;
        for i in 0..n {
            for j in 0..n {
                let mut intensity = 0.0;
                for s in 0..num_samples {
                    let xi = sampling::hammersley(s, num_samples);
                    let theta = (i as f32 + xi.x) * delta_theta;
                    let phi = (j as f32 + xi.y) * delta_phi;
                    let li = self.sample(sampling::spherical_direction(theta, phi));
                    intensity += sampling::luminance(li);
                }
                let mean = intensity / num_samples as f32;
                weights[i * n + j] = mean;
                total += mean;
            }
        }
        if total > 0.0 {
            for w in &mut weights {
                *w /= total;
            }
        }
        weights
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solid_sample() {
        let t = Texture2D::solid(Vec3::new(0.2, 0.4, 0.8));
        assert_eq!(t.sample(Vec2::new(0.3, 0.9)), Vec3::new(0.2, 0.4, 0.8));
    }

    #[test]
    fn test_repeat_wrap() {
        let t = Texture2D::from_pixels(
            2,
            1,
            vec![Vec3::ZERO, Vec3::ONE],
        );
        let a = t.sample(Vec2::new(0.25, 0.5));
        let b = t.sample(Vec2::new(1.25, 0.5));
        assert!((a - b).length() < 1e-6);
    }

    #[test]
    fn test_rgba8_flip_and_srgb() {
        // Two rows: top white, bottom black.
        let data: Vec<u8> = vec![
            255, 255, 255, 255, // top row
            0, 0, 0, 255, // bottom row
        ];
        let t = Texture2D::from_rgba8(1, 2, &data, true);
        // v = 0 addresses the bottom of the image after the flip.
        assert!(t.sample(Vec2::new(0.5, 0.0)).x < 0.5);
        assert!(t.sample(Vec2::new(0.5, 1.0)).x > 0.5);
    }

    #[test]
    fn test_srgb_decode_darkens_midtones() {
        let data: Vec<u8> = vec![128, 128, 128, 255];
        let linear = Texture2D::from_rgba8(1, 1, &data, false);
        let decoded = Texture2D::from_rgba8(1, 1, &data, true);
        assert!(decoded.sample(Vec2::ZERO).x < linear.sample(Vec2::ZERO).x);
    }

    #[test]
    fn test_envmap_constant() {
        let env = EnvMap::constant(Vec3::ONE);
        for dir in [Vec3::X, Vec3::Y, -Vec3::Z, Vec3::new(0.3, -0.5, 0.8)] {
            assert!((env.sample(dir) - Vec3::ONE).length() < 1e-6);
        }
    }

    #[test]
    fn test_envmap_weights_normalized() {
        let env = EnvMap::constant(Vec3::new(2.0, 2.0, 2.0));
        let sum: f32 = env.weights().iter().sum();
        assert!((sum - 1.0).abs() < 1e-3, "weight sum {sum}");
        assert_eq!(env.weights().len(), 16 * 16);
    }

    #[test]
    fn test_envmap_directional_lookup() {
        // Bright band at the top of the image (up direction).
        let w = 8;
        let h = 4;
        let mut pixels = vec![Vec3::ZERO; w * h];
        for x in 0..w {
            pixels[x] = Vec3::ONE * 10.0;
        }
        let env = EnvMap::from_pixels(w, h, pixels);
        assert!(
            sampling::luminance(env.sample(Vec3::Y))
                > sampling::luminance(env.sample(-Vec3::Y))
        );
    }
}
