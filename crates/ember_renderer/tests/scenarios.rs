//! End-to-end scenario tests exercising the full scene -> integrator ->
//! tile-scheduler pipeline.

use ember_core::{
    BlinnPhong, Camera, EnvMap, Glass, IntegratorConfig, IntegratorKind, Material, ToneMap,
};
use ember_math::Vec3;
use ember_renderer::integrator::PathIntegrator;
use ember_renderer::{Integrator, Renderer, Scene, SceneBuilder, TraversalMode};

fn glass_furnace_scene(traversal: TraversalMode) -> Scene {
    let mut builder = SceneBuilder::new(8, 8);
    let glass = builder.add_material(Material::Glass(Glass::new("glass", Vec3::ONE, 1.5)));
    builder.add_sphere(Vec3::new(0.0, 0.0, -4.0), 1.0, Some(glass));
    builder.envmap(EnvMap::constant(Vec3::ONE), 1.0);
    builder.camera(Camera::new(
        Vec3::ZERO,
        Vec3::new(0.0, 0.0, -4.0),
        Vec3::Y,
        30f32.to_radians(),
        1.0,
    ));
    builder.integrator(IntegratorConfig {
        kind: IntegratorKind::MonteCarlo,
        spp: 512,
        max_bounce: 16,
        ..Default::default()
    });
    builder.traversal(traversal);
    builder.build().unwrap()
}

/// A lossless glass sphere inside a constant-radiance environment must
/// neither gain nor lose energy.
#[test]
fn glass_sphere_preserves_furnace_energy() {
    let scene = glass_furnace_scene(TraversalMode::Threaded);
    let integrator = PathIntegrator::new(&scene.integrator);

    let mut mean = 0.0f64;
    let spp = 1024;
    for s in 0..spp {
        mean += integrator.pixel_color(4, 4, s, &scene).x as f64;
    }
    mean /= spp as f64;
    assert!(
        (mean - 1.0).abs() < 0.02,
        "glass furnace reads {mean} instead of 1"
    );
}

/// Stack and threaded BVH traversal produce the identical image when the
/// per-pixel RNG is seeded from (x, y, sample_id).
#[test]
fn traversal_modes_render_identical_images() {
    let images: Vec<_> = [TraversalMode::Stack, TraversalMode::Threaded]
        .into_iter()
        .map(|mode| {
            let scene = glass_furnace_scene(mode);
            let renderer = Renderer::new(scene);
            let mut image =
                ember_renderer::ImageF32::new(renderer.scene.width, renderer.scene.height);
            renderer.render_n_samples(&mut image, 4, 0);
            image
        })
        .collect();

    for (a, b) in images[0].pixels().iter().zip(images[1].pixels().iter()) {
        assert_eq!(a, b, "traversal modes diverged");
    }
}

fn floor_and_light_scene() -> Scene {
    let mut builder = SceneBuilder::new(12, 12);
    let white = builder.add_material(Material::BlinnPhong(BlinnPhong::diffuse(
        "white",
        Vec3::splat(0.75),
    )));
    let mut light = BlinnPhong::diffuse("light", Vec3::ZERO);
    light.emission = Vec3::splat(10.0);
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
            Vec3::new(-1.0, 3.0, -1.0),
            Vec3::new(1.0, 3.0, -1.0),
            Vec3::new(1.0, 3.0, 1.0),
            Vec3::new(-1.0, 3.0, 1.0),
        ],
        Some(light_id),
    );
    builder.camera(Camera::new(
        Vec3::new(0.0, 1.5, 6.0),
        Vec3::new(0.0, 0.5, 0.0),
        Vec3::Y,
        45f32.to_radians(),
        1.0,
    ));
    builder.integrator(IntegratorConfig {
        spp: 8,
        max_bounce: 4,
        tone_map: ToneMap::Reinhard,
        ..Default::default()
    });
    builder.build().unwrap()
}

/// Rendering N samples in one invocation equals N/2 + N/2 across two
/// progressive invocations, up to float accumulation rounding.
#[test]
fn progressive_split_matches_single_shot() {
    let renderer = Renderer::new(floor_and_light_scene());
    let (w, h) = (renderer.scene.width, renderer.scene.height);

    let mut one_shot = ember_renderer::ImageF32::new(w, h);
    renderer.render_n_samples(&mut one_shot, 8, 0);

    let mut split = ember_renderer::ImageF32::new(w, h);
    renderer.render_n_samples(&mut split, 4, 0);
    renderer.render_n_samples(&mut split, 4, 4);

    for (a, b) in one_shot.pixels().iter().zip(split.pixels().iter()) {
        assert!(
            (*a - *b).abs().max_element() < 1e-5,
            "progressive split diverged: {a} vs {b}"
        );
    }
}

/// The tile scheduler and the row-parallel renderer agree on the final
/// means.
#[test]
fn tile_scheduler_matches_row_renderer() {
    let renderer = Renderer::new(floor_and_light_scene());
    let (w, h) = (renderer.scene.width, renderer.scene.height);

    let film = renderer.render_film(None);
    let mut rows = ember_renderer::ImageF32::new(w, h);
    renderer.render_n_samples(&mut rows, renderer.scene.integrator.spp, 0);

    for y in 0..h {
        for x in 0..w {
            let a = film.mean_at(x, y);
            let b = rows.color_at(x, y);
            assert!(
                (a - b).abs().max_element() < 1e-4,
                "scheduler diverged at ({x},{y}): {a} vs {b}"
            );
        }
    }
}

/// Cancellation before the render starts yields an unfinished film that
/// can still be resolved.
#[test]
fn cancelled_render_returns_partial_film() {
    use std::sync::atomic::AtomicBool;

    let renderer = Renderer::new(floor_and_light_scene());
    let cancel = AtomicBool::new(true);
    let film = renderer.render_film(Some(&cancel));
    // Nothing (or at most a few tiles) accumulated; resolve must not panic.
    let _ = film.resolve(ToneMap::Aces);
}

/// Whitted, path tracing and BDPT all produce a finite, resolvable image
/// end to end.
#[test]
fn all_integrators_render() {
    for kind in [
        IntegratorKind::Whitted,
        IntegratorKind::MonteCarlo,
        IntegratorKind::Bidirectional,
    ] {
        let mut scene = floor_and_light_scene();
        scene.integrator.kind = kind;
        scene.integrator.spp = 4;
        let renderer = Renderer::new(scene);
        let film = renderer.render_film(None);
        let lit = film
            .accum
            .pixels()
            .iter()
            .filter(|p| p.max_element() > 0.0)
            .count();
        assert!(lit > 0, "{kind:?} rendered a black image");
        for p in film.accum.pixels() {
            assert!(p.x.is_finite() && p.y.is_finite() && p.z.is_finite());
        }
    }
}
