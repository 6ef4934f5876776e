//! Integrator and kernel configuration carried by the scene.

/// Which light-transport algorithm renders the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntegratorKind {
    Whitted,
    #[default]
    MonteCarlo,
    Bidirectional,
}

impl IntegratorKind {
    /// Short label used in output file names.
    pub fn label(self) -> &'static str {
        match self {
            IntegratorKind::Whitted => "whitted",
            IntegratorKind::MonteCarlo => "mc",
            IntegratorKind::Bidirectional => "bdpt",
        }
    }
}

/// Spatial index requested for the scene. The octree variant is accepted
/// for compatibility and resolves to the BVH.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccelKind {
    #[default]
    Bvh,
    Octree,
}

/// Tone mapping operator applied once during resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToneMap {
    #[default]
    Reinhard,
    Aces,
}

/// Multiple-importance-sampling combination heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MisHeuristic {
    Balance,
    Cutoff,
    #[default]
    Power,
    Maximum,
}

/// Per-sample radiance clamp, a second line of defense against fireflies.
#[derive(Debug, Clone, Copy)]
pub struct Clamp {
    pub min: f32,
    pub max: f32,
}

impl Default for Clamp {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: f32::MAX,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IntegratorConfig {
    pub kind: IntegratorKind,
    pub spp: u32,
    pub max_bounce: u32,
    pub use_mis: bool,
    /// Accept intersections very close to a light as light intersections.
    pub robust_light: bool,
    /// Unbiased early termination with survival probability 0.8.
    pub russian_roulette: bool,
    pub clamp: Clamp,
    pub tone_map: ToneMap,
    pub heuristic: MisHeuristic,
}

impl Default for IntegratorConfig {
    fn default() -> Self {
        Self {
            kind: IntegratorKind::MonteCarlo,
            spp: 1,
            max_bounce: 8,
            use_mis: true,
            robust_light: true,
            russian_roulette: false,
            clamp: Clamp::default(),
            tone_map: ToneMap::default(),
            heuristic: MisHeuristic::default(),
        }
    }
}

/// Tiling parameters for the render kernel.
#[derive(Debug, Clone)]
pub struct KernelConfig {
    /// Tile edge in pixels.
    pub size: u32,
    /// Preprocessor flags forwarded to a GPU kernel backend.
    pub macro_defs: String,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            size: 32,
            macro_defs: String::new(),
        }
    }
}
