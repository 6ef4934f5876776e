//! Image asset decoding for the demo scenes.
//!
//! The render core consumes float pixel buffers; this is the thin layer
//! that turns files into them.

use anyhow::{bail, Context, Result};
use ember_core::{EnvMap, Texture2D};
use ember_math::Vec3;
use std::path::Path;

/// Decode an LDR texture. `srgb` requests the gamma decode to linear at
/// load time.
pub fn load_texture(path: &Path, srgb: bool) -> Result<Texture2D> {
    let img = image::open(path).with_context(|| format!("reading texture {}", path.display()))?;
    let rgba = img.to_rgba8();
    let (w, h) = rgba.dimensions();
    Ok(Texture2D::from_rgba8(
        w as usize,
        h as usize,
        rgba.as_raw(),
        srgb,
    ))
}

/// Decode an equirectangular HDR environment map (`.hdr` or `.exr`).
pub fn load_envmap(path: &Path) -> Result<EnvMap> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    if ext != "hdr" && ext != "exr" {
        bail!("unsupported environment map extension `{ext}` (expected hdr or exr)");
    }

    let img =
        image::open(path).with_context(|| format!("reading envmap {}", path.display()))?;
    let rgb = img.to_rgb32f();
    let (w, h) = rgb.dimensions();
    let pixels: Vec<Vec3> = rgb
        .pixels()
        .map(|p| Vec3::new(p[0], p[1], p[2]))
        .collect();
    Ok(EnvMap::from_pixels(w as usize, h as usize, pixels))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_extension_rejected() {
        assert!(load_envmap(Path::new("sky.png")).is_err());
        assert!(load_envmap(Path::new("no_extension")).is_err());
    }

    #[test]
    fn test_missing_file_errors() {
        assert!(load_texture(Path::new("/nonexistent/t.png"), true).is_err());
        assert!(load_envmap(Path::new("/nonexistent/sky.hdr")).is_err());
    }
}
