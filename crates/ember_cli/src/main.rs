//! Command-line front end: render a named built-in scene to a PNG.

mod assets;
mod scenes;

use anyhow::{bail, Context, Result};
use ember_renderer::{output_filename, Renderer};
use std::time::Instant;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let Some(scene_name) = args.next() else {
        bail!("usage: ember <scene-name>");
    };
    if args.next().is_some() {
        bail!("expected exactly one scene name");
    }

    // An HDR environment can be swapped in for any scene.
    let envmap = match std::env::var("EMBER_ENVMAP") {
        Ok(path) => Some(assets::load_envmap(std::path::Path::new(&path))?),
        Err(_) => None,
    };

    let scene = scenes::by_name(&scene_name, envmap)?;
    let (spp, width, height) = (scene.integrator.spp, scene.width, scene.height);
    let (use_mis, kind) = (scene.integrator.use_mis, scene.integrator.kind);

    log::info!("rendering `{scene_name}` at {width}x{height}, {spp} spp");
    let renderer = Renderer::new(scene);

    let start = Instant::now();
    let image = renderer.render(None);
    log::info!("render finished in {:?}", start.elapsed());

    let out_dir = "Output";
    std::fs::create_dir_all(out_dir).context("creating output directory")?;
    let path = output_filename(out_dir, &scene_name, spp, width, height, use_mis, kind);
    image
        .write_png(&path)
        .with_context(|| format!("writing {}", path.display()))?;
    log::info!("wrote {}", path.display());

    Ok(())
}
