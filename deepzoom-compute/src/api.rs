//! External request/response contract (§6.1/§6.2): the plain, serde-derived
//! types a caller (CLI, UI, network service) exchanges with the coordinator.
//! Coloring and export stay out of scope (§1) — `PaletteLut` models only the
//! shape of the boundary the compute core hands a palette-producing
//! collaborator, not a gradient engine of its own.

use serde::{Deserialize, Serialize};

use deepzoom_core::{FractalKind, Viewport};

use crate::adaptive::{AdaptivePreset, ScalingLaw};
use crate::dispatch::{PrecisionMode, PrecisionOverride};
use crate::glitch::{GlitchClass, CorrectionStrategy};
use crate::supersample::{SsPattern, SupersampleLevel};
use crate::tile::Tile;

/// Every render option the coordinator recognizes (§6.1). Fields with a
/// sensible global default are `Option`; the coordinator falls back to
/// `CoreConfig`'s value (or an adaptive recommendation) when absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderRequest {
    pub width: u32,
    pub height: u32,
    pub viewport: Viewport,
    pub fractal: FractalKind,

    /// Overrides the adaptive-iterations recommendation when set.
    pub max_iterations: Option<u32>,
    pub escape_radius: Option<f64>,

    /// Dispatch tiles incrementally (`max_tiles_per_frame` at a time via
    /// [`crate::coordinator::Coordinator::poll`]) instead of draining the
    /// whole queue synchronously in one [`crate::coordinator::render`] call.
    pub progressive: bool,

    pub antialiasing: bool,
    pub supersample_level: SupersampleLevel,
    pub ss_pattern: SsPattern,

    pub glitch_correction: bool,
    pub adaptive_iterations: bool,
    pub adaptive_preset: Option<AdaptivePreset>,
    pub adaptive_scaling_law: Option<ScalingLaw>,

    pub tile_size: Option<u32>,
    pub worker_count: Option<usize>,

    pub precision_override: Option<PrecisionOverride>,
    pub precision_safety_margin: Option<u32>,
    pub periodicity_interval: Option<u32>,

    /// Wall-clock budget; `None` means unbounded.
    pub timeout_ms: Option<u64>,
}

impl RenderRequest {
    /// A minimal request: direct-mode-friendly viewport, no supersampling,
    /// no adaptive iterations, glitch correction on. Callers override fields
    /// from here rather than filling in every option by hand.
    pub fn new(width: u32, height: u32, viewport: Viewport, fractal: FractalKind) -> Self {
        Self {
            width,
            height,
            viewport,
            fractal,
            max_iterations: None,
            escape_radius: None,
            progressive: false,
            antialiasing: false,
            supersample_level: SupersampleLevel::Fixed(1),
            ss_pattern: SsPattern::Grid,
            glitch_correction: true,
            adaptive_iterations: false,
            adaptive_preset: None,
            adaptive_scaling_law: None,
            tile_size: None,
            worker_count: None,
            precision_override: None,
            precision_safety_margin: None,
            periodicity_interval: None,
            timeout_ms: None,
        }
    }
}

/// Plain lookup-table contract for an external coloring collaborator — 256
/// RGBA entries, index by (smoothed iteration mod 256). The compute core
/// never constructs or interprets one; it only exists so a caller's palette
/// application step has a named type to target.
pub type PaletteLut = [[u8; 4]; 256];

/// Summary statistics for a completed (or cancelled) render (§6.2).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RenderStats {
    pub total_pixels: u64,
    pub tiles_completed: usize,
    pub tiles_total: usize,
    pub avg_iterations: f64,
    pub max_iterations_used: u32,
    pub glitches_detected: usize,
    pub glitches_corrected: usize,
    /// Clusters still flagged after `max_correction_passes` (§4.9,
    /// §7 `GlitchUncorrectable`): the render completes regardless, with
    /// these pixels left as-is.
    pub glitches_uncorrected: usize,
    pub render_time_ms: u64,
    pub pixels_per_second: f64,
    pub precision_mode: PrecisionMode,
    pub ss_passes: u32,
}

impl RenderStats {
    pub(crate) fn new(tiles_total: usize, precision_mode: PrecisionMode) -> Self {
        Self {
            total_pixels: 0,
            tiles_completed: 0,
            tiles_total,
            avg_iterations: 0.0,
            max_iterations_used: 0,
            glitches_detected: 0,
            glitches_corrected: 0,
            glitches_uncorrected: 0,
            render_time_ms: 0,
            pixels_per_second: 0.0,
            precision_mode,
            ss_passes: 0,
        }
    }
}

/// A single classified glitch cluster surfaced for progress reporting,
/// decoupled from [`crate::glitch::GlitchCluster`]'s pixel list (callers
/// rarely need every pixel, just the bounding box and the applied strategy).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GlitchSummary {
    pub class: GlitchClassDto,
    pub strategy: CorrectionStrategyDto,
    pub pixel_count: usize,
    pub bounding_box: (u32, u32, u32, u32),
}

/// Serde-friendly mirrors of [`GlitchClass`]/[`CorrectionStrategy`] — those
/// two live in `glitch.rs` without `Serialize`/`Deserialize` since nothing
/// internal to the coordinator needs to round-trip them; only this
/// progress-reporting boundary does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GlitchClassDto {
    BailoutArtifact,
    PerturbationUnderflow,
    ReferenceOrbitGlitch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CorrectionStrategyDto {
    Interpolate,
    IncreaseIter,
    HighPrecision,
    Rebase,
}

impl From<GlitchClass> for GlitchClassDto {
    fn from(value: GlitchClass) -> Self {
        match value {
            GlitchClass::BailoutArtifact => Self::BailoutArtifact,
            GlitchClass::PerturbationUnderflow => Self::PerturbationUnderflow,
            GlitchClass::ReferenceOrbitGlitch => Self::ReferenceOrbitGlitch,
        }
    }
}

impl From<CorrectionStrategy> for CorrectionStrategyDto {
    fn from(value: CorrectionStrategy) -> Self {
        match value {
            CorrectionStrategy::Interpolate => Self::Interpolate,
            CorrectionStrategy::IncreaseIter => Self::IncreaseIter,
            CorrectionStrategy::HighPrecision => Self::HighPrecision,
            CorrectionStrategy::Rebase => Self::Rebase,
        }
    }
}

/// Progress events published while rendering (§6.2), one per coordinator
/// state transition or per-tile completion. Sent over the `mpsc` channel
/// named in §5; a headless caller that passes no sender simply never reads
/// these (the coordinator doesn't block waiting for a receiver).
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Started { tiles_total: usize, precision_mode: PrecisionMode },
    TileComplete { tile: Tile, tiles_done: usize, tiles_total: usize },
    PassComplete { pass: RenderPass },
    GlitchPassComplete { clusters_found: usize, clusters_corrected: usize },
    Complete { stats: RenderStats },
    Cancelled,
    Error { message: String },
}

/// Which phase of the pipeline a [`ProgressEvent::PassComplete`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPass {
    Dispatching,
    Rendering,
    Supersampling,
}
