//! Per-pixel radiance estimators and the MIS combination heuristics.

mod bdpt;
mod path;
mod whitted;

pub use bdpt::BidirectionalIntegrator;
pub use path::PathIntegrator;
pub use whitted::WhittedIntegrator;

use crate::Scene;
use ember_core::{IntegratorConfig, IntegratorKind, MisHeuristic};
use ember_math::Vec3;

pub(crate) const EPSILON: f32 = 1e-6;
/// Offset applied to continuation-ray origins along the normal.
pub(crate) const ORIGIN_EPSILON: f32 = 1e-4;
/// Survival probability for Russian roulette.
pub(crate) const RUSSIAN_ROULETTE: f32 = 0.8;
/// Hard cap on path length; only relevant with Russian roulette enabled.
pub(crate) const MAX_PATH_LENGTH: u32 = 64;

/// A light-transport algorithm producing one radiance sample per call.
///
/// Implementations seed their RNG from `(x, y, sample_id)`, so results are
/// independent of scheduling order.
pub trait Integrator: Send + Sync {
    fn pixel_color(&self, x: u32, y: u32, sample_id: u32, scene: &Scene) -> Vec3;
}

/// Runtime selection from scene configuration.
pub fn create_integrator(config: &IntegratorConfig) -> Box<dyn Integrator> {
    match config.kind {
        IntegratorKind::Whitted => Box::new(WhittedIntegrator::new(config)),
        IntegratorKind::MonteCarlo => Box::new(PathIntegrator::new(config)),
        IntegratorKind::Bidirectional => Box::new(BidirectionalIntegrator::new(config)),
    }
}

// Combination heuristics for estimators with sample counts n0/n1 and
// densities pdf0/pdf1 (Veach).

pub fn balance_heuristic(n0: f32, pdf0: f32, n1: f32, pdf1: f32) -> f32 {
    let f0 = n0 * pdf0;
    let f1 = n1 * pdf1;
    f0 / (f0 + f1)
}

pub fn cutoff_heuristic(n0: f32, pdf0: f32, n1: f32, pdf1: f32, alpha: f32) -> f32 {
    let f0 = n0 * pdf0;
    let f1 = n1 * pdf1;
    let cutoff = alpha * f0.max(f1);
    if f0 < cutoff {
        0.0
    } else if f1 < cutoff {
        1.0
    } else {
        f0 / (f0 + f1)
    }
}

pub fn power_heuristic(n0: f32, pdf0: f32, n1: f32, pdf1: f32) -> f32 {
    let f0 = n0 * pdf0;
    let f1 = n1 * pdf1;
    (f0 * f0) / (f0 * f0 + f1 * f1)
}

pub fn maximum_heuristic(n0: f32, pdf0: f32, n1: f32, pdf1: f32) -> f32 {
    if n0 * pdf0 > n1 * pdf1 {
        1.0
    } else {
        0.0
    }
}

pub(crate) fn mis_weight(h: MisHeuristic, n0: f32, pdf0: f32, n1: f32, pdf1: f32) -> f32 {
    match h {
        MisHeuristic::Balance => balance_heuristic(n0, pdf0, n1, pdf1),
        MisHeuristic::Cutoff => cutoff_heuristic(n0, pdf0, n1, pdf1, 0.1),
        MisHeuristic::Power => power_heuristic(n0, pdf0, n1, pdf1),
        MisHeuristic::Maximum => maximum_heuristic(n0, pdf0, n1, pdf1),
    }
}

/// Offset a point along the normal toward the travel direction.
pub(crate) fn offset_origin(position: Vec3, normal: Vec3, dir: Vec3) -> Vec3 {
    if dir.dot(normal) > 0.0 {
        position + normal * ORIGIN_EPSILON
    } else {
        position - normal * ORIGIN_EPSILON
    }
}
