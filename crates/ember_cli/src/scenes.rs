//! Built-in demo scenes, materialized in code.
//!
//! File-format loaders (OBJ geometry, XML scene descriptions) live outside
//! the core; these scenes exercise the same `SceneBuilder` interface those
//! loaders would target.

use anyhow::{bail, Result};
use ember_core::{
    BlinnPhong, Camera, EnvMap, Glass, IntegratorConfig, IntegratorKind, KernelConfig, Material,
    Texture2D,
};
use ember_math::Vec3;
use ember_renderer::{Scene, SceneBuilder};

pub fn by_name(name: &str, envmap: Option<EnvMap>) -> Result<Scene> {
    match name {
        "cornell-box" => cornell_box(envmap),
        "spheres" => spheres(envmap),
        other => bail!("unknown scene `{other}` (available: cornell-box, spheres)"),
    }
}

/// The classic box: white floor/ceiling/back, red and green side walls, a
/// ceiling light, one tall box stand-in and one glass sphere.
fn cornell_box(envmap: Option<EnvMap>) -> Result<Scene> {
    let mut builder = SceneBuilder::new(512, 512);
    if let Some(env) = envmap {
        builder.envmap(env, 1.0);
    }

    let white = builder.add_material(Material::BlinnPhong(BlinnPhong::diffuse(
        "white",
        Vec3::new(0.725, 0.71, 0.68),
    )));
    let red = builder.add_material(Material::BlinnPhong(BlinnPhong::diffuse(
        "red",
        Vec3::new(0.63, 0.065, 0.05),
    )));
    let green = builder.add_material(Material::BlinnPhong(BlinnPhong::diffuse(
        "green",
        Vec3::new(0.14, 0.45, 0.091),
    )));
    let glass = builder.add_material(Material::Glass(Glass::new("glass", Vec3::splat(0.98), 1.5)));
    let light_mat = builder.add_material(Material::BlinnPhong(BlinnPhong::diffuse(
        "light",
        Vec3::ZERO,
    )));

    let (x0, x1) = (-1.0, 1.0);
    let (y0, y1) = (0.0, 2.0);
    let (z0, z1) = (-1.0, 1.0);

    // Floor (normal up).
    builder.add_quad(
        [
            Vec3::new(x0, y0, z0),
            Vec3::new(x0, y0, z1),
            Vec3::new(x1, y0, z1),
            Vec3::new(x1, y0, z0),
        ],
        Some(white),
    );
    // Ceiling (normal down).
    builder.add_quad(
        [
            Vec3::new(x0, y1, z0),
            Vec3::new(x1, y1, z0),
            Vec3::new(x1, y1, z1),
            Vec3::new(x0, y1, z1),
        ],
        Some(white),
    );
    // Back wall (normal toward camera).
    builder.add_quad(
        [
            Vec3::new(x0, y0, z0),
            Vec3::new(x1, y0, z0),
            Vec3::new(x1, y1, z0),
            Vec3::new(x0, y1, z0),
        ],
        Some(white),
    );
    // Left wall, red (normal +x).
    builder.add_quad(
        [
            Vec3::new(x0, y0, z0),
            Vec3::new(x0, y1, z0),
            Vec3::new(x0, y1, z1),
            Vec3::new(x0, y0, z1),
        ],
        Some(red),
    );
    // Right wall, green (normal -x).
    builder.add_quad(
        [
            Vec3::new(x1, y0, z0),
            Vec3::new(x1, y0, z1),
            Vec3::new(x1, y1, z1),
            Vec3::new(x1, y1, z0),
        ],
        Some(green),
    );
    // Ceiling light patch (normal down).
    builder.add_quad(
        [
            Vec3::new(-0.3, y1 - 1e-3, -0.3),
            Vec3::new(0.3, y1 - 1e-3, -0.3),
            Vec3::new(0.3, y1 - 1e-3, 0.3),
            Vec3::new(-0.3, y1 - 1e-3, 0.3),
        ],
        Some(light_mat),
    );
    builder.set_emission("light", Vec3::new(17.0, 12.0, 4.0))?;

    builder.add_sphere(Vec3::new(0.4, 0.35, 0.3), 0.35, Some(glass));
    // Tall block approximated by a sphere to keep the demo concise.
    builder.add_sphere(Vec3::new(-0.45, 0.45, -0.35), 0.45, Some(white));

    builder.camera(Camera::new(
        Vec3::new(0.0, 1.0, 3.8),
        Vec3::new(0.0, 1.0, 0.0),
        Vec3::Y,
        39.3f32.to_radians(),
        1.0,
    ));
    builder.integrator(IntegratorConfig {
        kind: IntegratorKind::MonteCarlo,
        spp: 128,
        max_bounce: 8,
        ..Default::default()
    });
    builder.kernel(KernelConfig::default());

    Ok(builder.build()?)
}

/// Open-air showcase: checkerboard ground, Disney metal, glass and a
/// textured diffuse sphere under a sun and constant sky.
fn spheres(envmap: Option<EnvMap>) -> Result<Scene> {
    let mut builder = SceneBuilder::new(640, 360);
    let override_env = envmap.is_some();
    if let Some(env) = envmap {
        builder.envmap(env, 1.0);
    }

    let checker = {
        let n = 64usize;
        let mut pixels = vec![Vec3::ZERO; n * n];
        for y in 0..n {
            for x in 0..n {
                let even = (x / 8 + y / 8) % 2 == 0;
                pixels[y * n + x] = if even {
                    Vec3::splat(0.8)
                } else {
                    Vec3::splat(0.25)
                };
            }
        }
        Texture2D::from_pixels(n, n, pixels)
    };
    let ground = builder.add_material(Material::BlinnPhong(
        BlinnPhong::diffuse("ground", Vec3::splat(0.6)).with_texture(checker),
    ));
    let metal = builder.add_material(Material::Disney(
        ember_core::Disney::new("metal", Vec3::new(0.9, 0.7, 0.3))
            .with_metallic(1.0)
            .with_roughness(0.2),
    ));
    let glass = builder.add_material(Material::Glass(Glass::new("glass", Vec3::splat(0.95), 1.5)));
    let plastic = builder.add_material(Material::Disney(
        ember_core::Disney::new("plastic", Vec3::new(0.2, 0.3, 0.8))
            .with_roughness(0.4)
            .with_clearcoat(0.8, 0.9),
    ));

    let size = 30.0;
    builder.add_triangle(
        [
            Vec3::new(-size, 0.0, -size),
            Vec3::new(-size, 0.0, size),
            Vec3::new(size, 0.0, size),
        ],
        None,
        Some([
            ember_math::Vec2::new(0.0, 0.0),
            ember_math::Vec2::new(0.0, 8.0),
            ember_math::Vec2::new(8.0, 8.0),
        ]),
        Some(ground),
    );
    builder.add_triangle(
        [
            Vec3::new(-size, 0.0, -size),
            Vec3::new(size, 0.0, size),
            Vec3::new(size, 0.0, -size),
        ],
        None,
        Some([
            ember_math::Vec2::new(0.0, 0.0),
            ember_math::Vec2::new(8.0, 8.0),
            ember_math::Vec2::new(8.0, 0.0),
        ]),
        Some(ground),
    );

    builder.add_sphere(Vec3::new(-2.2, 1.0, 0.0), 1.0, Some(metal));
    builder.add_sphere(Vec3::new(0.0, 1.0, 0.0), 1.0, Some(glass));
    builder.add_sphere(Vec3::new(2.2, 1.0, 0.0), 1.0, Some(plastic));

    if !override_env {
        builder.envmap(EnvMap::constant(Vec3::new(0.5, 0.65, 0.85)), 1.0);
    }
    builder.sun(ember_renderer::Sun {
        direction: Vec3::new(-0.4, 1.0, 0.6).normalize(),
        solid_angle: 6.87e-2,
        radiance: Vec3::splat(30.0),
    });

    builder.camera(Camera::new(
        Vec3::new(0.0, 2.0, 8.0),
        Vec3::new(0.0, 1.0, 0.0),
        Vec3::Y,
        40f32.to_radians(),
        16.0 / 9.0,
    ));
    builder.integrator(IntegratorConfig {
        kind: IntegratorKind::MonteCarlo,
        spp: 64,
        max_bounce: 8,
        ..Default::default()
    });

    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_scenes_build() {
        for name in ["cornell-box", "spheres"] {
            let scene = by_name(name, None).unwrap();
            assert!(!scene.accel.primitives.is_empty());
        }
    }

    #[test]
    fn test_unknown_scene_errors() {
        assert!(by_name("no-such-scene", None).is_err());
    }

    #[test]
    fn test_cornell_has_lights() {
        let scene = by_name("cornell-box", None).unwrap();
        assert!(scene.lights_total_area > 0.0);
    }
}
