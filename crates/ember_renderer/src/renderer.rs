//! Renderer context: owns the scene, the selected integrator and the
//! resolved framebuffer path.

use crate::integrator::{create_integrator, Integrator};
use crate::tile::{guarded_sample, render_tiles, resolve_pixel};
use crate::{ImageF32, ImageU8, ProgressiveFilm, Scene};
use ember_core::IntegratorKind;
use ember_math::Vec3;
use rayon::prelude::*;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

pub struct Renderer {
    pub scene: Scene,
    integrator: Box<dyn Integrator>,
}

impl Renderer {
    /// Select the integrator from the scene's configuration.
    pub fn new(scene: Scene) -> Self {
        let integrator = create_integrator(&scene.integrator);
        Self { scene, integrator }
    }

    pub fn integrator(&self) -> &dyn Integrator {
        self.integrator.as_ref()
    }

    /// Full-quality render through the tile scheduler, resolved to 8-bit
    /// sRGB. Cancellation yields the partial accumulation.
    pub fn render(&self, cancel: Option<&AtomicBool>) -> ImageU8 {
        self.render_film(cancel).resolve(self.scene.integrator.tone_map)
    }

    /// Same as [`Renderer::render`] but returning the raw film.
    pub fn render_film(&self, cancel: Option<&AtomicBool>) -> ProgressiveFilm {
        render_tiles(
            &self.scene,
            self.integrator.as_ref(),
            self.scene.integrator.spp,
            cancel,
        )
    }

    /// Accumulate `spp` further samples into a running-average image that
    /// already holds `integrated_spp` samples per pixel. Used for
    /// progressive preview; sample ids continue where the previous
    /// invocation stopped, so a split render equals a single one.
    pub fn render_n_samples(&self, image: &mut ImageF32, spp: u32, integrated_spp: u32) {
        let width = self.scene.width;
        let scene = &self.scene;
        let integrator = self.integrator.as_ref();

        image
            .pixels_mut()
            .par_chunks_mut(width as usize)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, px) in row.iter_mut().enumerate() {
                    let mut color = Vec3::ZERO;
                    for s in 0..spp {
                        color += guarded_sample(
                            integrator,
                            x as u32,
                            y as u32,
                            integrated_spp + s,
                            scene,
                        );
                    }
                    color /= spp as f32;

                    let alpha = spp as f32 / (spp + integrated_spp) as f32;
                    *px = *px * (1.0 - alpha) + color * alpha;
                }
            });
    }

    /// Resolve a running-average image (as produced by
    /// [`Renderer::render_n_samples`]) to 8-bit sRGB.
    pub fn resolve_average(&self, image: &ImageF32) -> ImageU8 {
        let mut out = ImageU8::new(image.width(), image.height());
        for y in 0..image.height() {
            for x in 0..image.width() {
                let c = resolve_pixel(image.color_at(x, y), self.scene.integrator.tone_map);
                out.set_pixel(x as i32, y as i32, c);
            }
        }
        out
    }
}

/// Canonical output path:
/// `<out>/<scene>_<spp>SPP_<W>X<H>[_MIS]_<integrator>.png`.
pub fn output_filename(
    out_dir: &str,
    scene_name: &str,
    spp: u32,
    width: u32,
    height: u32,
    use_mis: bool,
    kind: IntegratorKind,
) -> PathBuf {
    let mis = if use_mis { "_MIS" } else { "" };
    PathBuf::from(out_dir).join(format!(
        "{scene_name}_{spp}SPP_{width}X{height}{mis}_{}.png",
        kind.label()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_filename() {
        let p = output_filename("Output", "cornell", 128, 1024, 768, true, IntegratorKind::MonteCarlo);
        assert_eq!(
            p,
            PathBuf::from("Output/cornell_128SPP_1024X768_MIS_mc.png")
        );
        let p = output_filename("o", "s", 1, 2, 3, false, IntegratorKind::Whitted);
        assert_eq!(p, PathBuf::from("o/s_1SPP_2X3_whitted.png"));
    }
}
