//! Scene-description layer for the ember renderer.
//!
//! Materials, textures, the camera, and the integrator/kernel configuration.
//! Everything here is renderer-agnostic data plus the BSDF contracts the
//! integrators rely on; geometry and light transport live in
//! `ember_renderer`.

mod camera;
mod config;
mod disney;
mod error;
mod material;
mod texture;

pub use camera::{Camera, CameraMode};
pub use config::{
    AccelKind, Clamp, IntegratorConfig, IntegratorKind, KernelConfig, MisHeuristic, ToneMap,
};
pub use disney::Disney;
pub use error::{SceneError, SceneResult};
pub use material::{BlinnPhong, BsdfSample, Glass, Material};
pub use texture::{EnvMap, Texture2D};
