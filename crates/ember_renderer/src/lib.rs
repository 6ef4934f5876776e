//! Light transport for the ember renderer.
//!
//! Geometry primitives, the BVH accelerator, the render scene with its
//! light sampling strategies, the three integrators (Whitted, Monte Carlo
//! path tracing with MIS, bidirectional path tracing), and the tile
//! scheduler that drives them into a framebuffer.

mod bvh;
mod hit;
mod image_buf;
pub mod integrator;
mod primitive;
mod renderer;
mod scene;
mod sphere;
mod tile;
mod triangle;

pub use bvh::{Bvh, BvhNode, SplitMethod, TraversalMode, SAH_MAX_SEARCH};
pub use hit::{Intersection, INVALID_INDEX};
pub use image_buf::{
    aces_tone_mapping, gamma_correction, gamma_transform, reinhard_tone_mapping, saturate,
    ImageF32, ImageU8,
};
pub use integrator::{create_integrator, Integrator};
pub use primitive::Primitive;
pub use renderer::{output_filename, Renderer};
pub use scene::{LightSample, Scene, SceneBuilder, Sun, VISIBILITY_DIST_SLACK};
pub use sphere::Sphere;
pub use tile::{generate_tiles, render_tiles, ProgressiveFilm, Tile, TARGET_DISPATCH_MS};
pub use triangle::Triangle;
