//! Per-pixel random number source.

use crate::Vec2;
use rand::rngs::SmallRng;
use rand::{Rng, RngCore, SeedableRng};

/// Deterministic RNG stream for one pixel sample.
///
/// Seeding from `(x, y, sample_id)` makes sample values independent of the
/// tile scheduling order, so renders are reproducible across thread counts
/// and traversal modes.
pub struct Sampler {
    rng: SmallRng,
}

impl Sampler {
    pub fn for_pixel(x: u32, y: u32, sample_id: u32) -> Self {
        Self::from_seed(pixel_seed(x, y, sample_id))
    }

    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Uniform sample in `[0, 1)`.
    #[inline]
    pub fn next_1d(&mut self) -> f32 {
        self.rng.gen()
    }

    /// Two independent uniform samples in `[0, 1)`.
    #[inline]
    pub fn next_2d(&mut self) -> Vec2 {
        Vec2::new(self.rng.gen(), self.rng.gen())
    }

    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }
}

/// SplitMix-style mix of the pixel coordinates and sample index.
pub fn pixel_seed(x: u32, y: u32, sample_id: u32) -> u64 {
    let mut h = (x as u64) << 40 ^ (y as u64) << 20 ^ sample_id as u64;
    h = h.wrapping_add(0x9E37_79B9_7F4A_7C15);
    h = (h ^ (h >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    h = (h ^ (h >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    h ^ (h >> 31)
}
