use serde::{Deserialize, Serialize};

use deepzoom_core::orbit::DEFAULT_CHECKPOINT_INTERVAL;
use deepzoom_core::series::{DEFAULT_OVERFLOW_BOUND, DEFAULT_TERMS};
use deepzoom_core::{DEFAULT_GLITCH_ALPHA, DEFAULT_PERIODICITY_INTERVAL};

use crate::adaptive::{AdaptivePreset, ScalingLaw};
use crate::tile::{DEFAULT_MAX_TILES_PER_FRAME, DEFAULT_TILE_SIZE, MAX_TILE, MIN_TILE};

/// Validity tolerance `ε` for the series-approximation truncation bound (§4.3).
pub const DEFAULT_SERIES_TOLERANCE: f64 = 1e-6;

/// Zoom at which the precision dispatcher moves from DOUBLE to PERTURBATION.
pub const DEFAULT_PERTURBATION_THRESHOLD: f64 = 1e13;
/// Zoom at which the precision dispatcher requires ARBITRARY precision.
pub const DEFAULT_ARBITRARY_THRESHOLD: f64 = 1e15;
/// Extra decimal digits of precision added on top of `ceil(log10(zoom))`.
pub const DEFAULT_PRECISION_SAFETY_MARGIN: u32 = 10;

/// Iteration-discontinuity threshold (`ITER_DIFF`).
pub const DEFAULT_ITER_DIFF: f64 = 50.0;
/// Statistical-outlier threshold in standard deviations.
pub const DEFAULT_OUTLIER_SIGMA: f64 = 3.0;
/// Smallest glitch cluster not discarded as noise.
pub const DEFAULT_MIN_CLUSTER: usize = 4;
/// Largest cluster eligible for cheap interpolation.
pub const DEFAULT_MAX_ISOLATED: usize = 16;
/// Maximum correction passes before a cluster is surfaced as uncorrectable.
pub const DEFAULT_MAX_CORRECTION_PASSES: u32 = 3;

/// Render options recognized by the coordinator, every field configurable
/// per spec.md §9's "no global statics" design note — thresholds are
/// struct fields with spec-given defaults, not module-level constants
/// consulted directly by the algorithms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    pub escape_radius: f64,
    pub periodicity_interval: u32,
    pub glitch_alpha: f64,

    pub perturbation_threshold: f64,
    pub arbitrary_threshold: f64,
    pub precision_safety_margin: u32,

    pub tile_size: u32,
    pub max_tiles_per_frame: usize,

    pub iter_diff: f64,
    pub outlier_sigma: f64,
    pub min_cluster: usize,
    pub max_isolated: usize,
    pub max_correction_passes: u32,

    pub adaptive_preset: AdaptivePreset,
    pub adaptive_scaling_law: ScalingLaw,

    pub checkpoint_interval: usize,
    pub series_terms: usize,
    pub series_tolerance: f64,
    pub series_overflow_bound: f64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            escape_radius: 2.0,
            periodicity_interval: DEFAULT_PERIODICITY_INTERVAL,
            glitch_alpha: DEFAULT_GLITCH_ALPHA,

            perturbation_threshold: DEFAULT_PERTURBATION_THRESHOLD,
            arbitrary_threshold: DEFAULT_ARBITRARY_THRESHOLD,
            precision_safety_margin: DEFAULT_PRECISION_SAFETY_MARGIN,

            tile_size: DEFAULT_TILE_SIZE,
            max_tiles_per_frame: DEFAULT_MAX_TILES_PER_FRAME,

            iter_diff: DEFAULT_ITER_DIFF,
            outlier_sigma: DEFAULT_OUTLIER_SIGMA,
            min_cluster: DEFAULT_MIN_CLUSTER,
            max_isolated: DEFAULT_MAX_ISOLATED,
            max_correction_passes: DEFAULT_MAX_CORRECTION_PASSES,

            adaptive_preset: AdaptivePreset::Balanced,
            adaptive_scaling_law: ScalingLaw::Logarithmic,

            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
            series_terms: DEFAULT_TERMS,
            series_tolerance: DEFAULT_SERIES_TOLERANCE,
            series_overflow_bound: DEFAULT_OVERFLOW_BOUND,
        }
    }
}

impl CoreConfig {
    /// Clamp `tile_size` into `[MIN_TILE, MAX_TILE]` and round to a power of two.
    pub fn normalized_tile_size(&self) -> u32 {
        crate::tile::normalize_tile_size(self.tile_size).clamp(MIN_TILE, MAX_TILE)
    }
}
