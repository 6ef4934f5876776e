//! Tile scheduler and progressive accumulation.
//!
//! The image is partitioned into square tiles held in a shared work queue.
//! A pool of workers pulls a tile, renders a batch of additional samples
//! for it into private scratch, merges the batch into the shared film, and
//! requeues the tile until it reaches the target spp. The batch size adapts
//! so one dispatch takes roughly [`TARGET_DISPATCH_MS`]; the same pacing
//! drives a compute-kernel backend, where each dispatch covers one tile.

use crate::image_buf::ImageF32;
use crate::integrator::Integrator;
use crate::Scene;
use ember_core::ToneMap;
use ember_math::Vec3;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Instant;

/// Target duration of one tile dispatch.
pub const TARGET_DISPATCH_MS: f32 = 50.0;
const MAX_SAMPLES_PER_FRAME: u32 = 256;

/// Rectangular block of pixels rendered as one work unit.
#[derive(Debug, Clone, Copy)]
pub struct Tile {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Tile {
    pub fn pixel_count(&self) -> u32 {
        self.width * self.height
    }
}

/// Partition an image into square tiles of edge `size` (border tiles are
/// smaller).
pub fn generate_tiles(width: u32, height: u32, size: u32) -> Vec<Tile> {
    let mut tiles = Vec::new();
    let mut y = 0;
    while y < height {
        let mut x = 0;
        while x < width {
            tiles.push(Tile {
                x,
                y,
                width: size.min(width - x),
                height: size.min(height - y),
            });
            x += size;
        }
        y += size;
    }
    tiles
}

/// Progressive accumulator: radiance sums plus a per-pixel sample counter.
pub struct ProgressiveFilm {
    pub accum: ImageF32,
    pub samples: Vec<u32>,
}

impl ProgressiveFilm {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            accum: ImageF32::new(width, height),
            samples: vec![0; (width * height) as usize],
        }
    }

    /// Mean radiance so far; black where nothing accumulated yet.
    pub fn mean_at(&self, x: u32, y: u32) -> Vec3 {
        let n = self.samples[(y * self.accum.width() + x) as usize];
        if n == 0 {
            Vec3::ZERO
        } else {
            self.accum.color_at(x, y) / n as f32
        }
    }

    fn merge_tile(&mut self, tile: &Tile, pixels: &[Vec3], batch: u32) {
        let mut i = 0;
        for dy in 0..tile.height {
            for dx in 0..tile.width {
                let (x, y) = (tile.x + dx, tile.y + dy);
                self.accum.increment_pixel(x, y, pixels[i]);
                self.samples[(y * self.accum.width() + x) as usize] += batch;
                i += 1;
            }
        }
    }

    /// Final post-processing: divide by the sample count, tone map, gamma
    /// encode, saturate.
    pub fn resolve(&self, tone_map: ToneMap) -> crate::ImageU8 {
        let mut out = crate::ImageU8::new(self.accum.width(), self.accum.height());
        for y in 0..self.accum.height() {
            for x in 0..self.accum.width() {
                let c = resolve_pixel(self.mean_at(x, y), tone_map);
                out.set_pixel(x as i32, y as i32, c);
            }
        }
        out
    }
}

pub(crate) fn resolve_pixel(mean: Vec3, tone_map: ToneMap) -> Vec3 {
    let mapped = match tone_map {
        ToneMap::Reinhard => crate::reinhard_tone_mapping(mean),
        ToneMap::Aces => crate::aces_tone_mapping(mean),
    };
    crate::saturate(crate::gamma_correction(mapped))
}

/// One radiance sample, guarded against non-finite values and clamped per
/// the scene's firefly clamp.
pub(crate) fn guarded_sample(
    integrator: &dyn Integrator,
    x: u32,
    y: u32,
    sample_id: u32,
    scene: &Scene,
) -> Vec3 {
    let c = integrator.pixel_color(x, y, sample_id, scene);
    if !(c.x.is_finite() && c.y.is_finite() && c.z.is_finite()) {
        return Vec3::ZERO;
    }
    let clamp = scene.integrator.clamp;
    c.clamp(Vec3::splat(clamp.min), Vec3::splat(clamp.max))
}

struct WorkItem {
    tile_index: usize,
    done: u32,
}

/// Render `target_spp` samples per pixel through the tile queue. The
/// cancel flag is polled between tile pulls; on cancellation the partial
/// film is returned.
pub fn render_tiles(
    scene: &Scene,
    integrator: &dyn Integrator,
    target_spp: u32,
    cancel: Option<&AtomicBool>,
) -> ProgressiveFilm {
    let tiles = generate_tiles(scene.width, scene.height, scene.kernel.size);
    let film = Mutex::new(ProgressiveFilm::new(scene.width, scene.height));

    let queue: Mutex<VecDeque<WorkItem>> = Mutex::new(
        (0..tiles.len())
            .map(|tile_index| WorkItem {
                tile_index,
                done: 0,
            })
            .collect(),
    );
    let tiles_remaining = AtomicUsize::new(tiles.len());
    let samples_per_frame = AtomicU32::new(1);

    let workers = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    log::info!(
        "render: {} tiles of {} px, {} workers, {} spp",
        tiles.len(),
        scene.kernel.size,
        workers,
        target_spp
    );

    std::thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| loop {
                if cancel.is_some_and(|c| c.load(Ordering::Relaxed)) {
                    break;
                }
                if tiles_remaining.load(Ordering::Acquire) == 0 {
                    break;
                }
                let Some(item) = queue.lock().unwrap().pop_front() else {
                    // Other workers may still requeue their tiles.
                    std::thread::yield_now();
                    continue;
                };

                let tile = tiles[item.tile_index];
                let batch = samples_per_frame
                    .load(Ordering::Relaxed)
                    .min(target_spp - item.done)
                    .max(1);

                let start = Instant::now();
                let mut scratch = vec![Vec3::ZERO; tile.pixel_count() as usize];
                let mut i = 0;
                for dy in 0..tile.height {
                    for dx in 0..tile.width {
                        let (x, y) = (tile.x + dx, tile.y + dy);
                        for s in item.done..item.done + batch {
                            scratch[i] += guarded_sample(integrator, x, y, s, scene);
                        }
                        i += 1;
                    }
                }

                // Steer the batch size toward the dispatch target.
                let elapsed_ms = start.elapsed().as_secs_f32() * 1e3;
                if elapsed_ms > 0.0 {
                    let adapted = (batch as f32 * TARGET_DISPATCH_MS / elapsed_ms)
                        .clamp(1.0, MAX_SAMPLES_PER_FRAME as f32);
                    samples_per_frame.store(adapted as u32, Ordering::Relaxed);
                }

                film.lock().unwrap().merge_tile(&tile, &scratch, batch);

                let done = item.done + batch;
                if done >= target_spp {
                    tiles_remaining.fetch_sub(1, Ordering::Release);
                } else {
                    queue.lock().unwrap().push_back(WorkItem {
                        tile_index: item.tile_index,
                        done,
                    });
                }
            });
        }
    });

    film.into_inner().unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tiles_cover_image_exactly() {
        for (w, h, s) in [(128, 128, 32), (100, 70, 32), (5, 5, 32), (33, 65, 16)] {
            let tiles = generate_tiles(w, h, s);
            let total: u32 = tiles.iter().map(|t| t.pixel_count()).sum();
            assert_eq!(total, w * h, "{w}x{h}/{s}");
            // No tile exceeds the image.
            for t in &tiles {
                assert!(t.x + t.width <= w);
                assert!(t.y + t.height <= h);
            }
        }
    }

    #[test]
    fn test_film_merge_and_mean() {
        let mut film = ProgressiveFilm::new(8, 8);
        let tile = Tile {
            x: 2,
            y: 2,
            width: 2,
            height: 2,
        };
        let pixels = vec![Vec3::splat(4.0); 4];
        film.merge_tile(&tile, &pixels, 2);
        assert_eq!(film.mean_at(2, 2), Vec3::splat(2.0));
        assert_eq!(film.mean_at(0, 0), Vec3::ZERO);
    }

    #[test]
    fn test_resolve_applies_gamma() {
        let mut film = ProgressiveFilm::new(1, 1);
        film.merge_tile(
            &Tile {
                x: 0,
                y: 0,
                width: 1,
                height: 1,
            },
            &[Vec3::splat(1.0)],
            1,
        );
        let img = film.resolve(ToneMap::Reinhard);
        // Reinhard(1) = 0.5, gamma-encoded upward.
        let v = img.color_at(0, 0).x;
        assert!(v > 0.5 && v < 1.0, "resolved {v}");
    }
}
