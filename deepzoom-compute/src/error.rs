use thiserror::Error;

use deepzoom_core::CoreError;

/// Errors originating from the scheduling, dispatch and correction layer.
///
/// One variant per per-render failure mode in spec.md §7. `SeriesDivergence`
/// is deliberately absent: it is always recovered locally (the dispatcher
/// falls back to `skip_iter = 0`) and is only ever surfaced through
/// `RenderStats`/tracing, never as an `Err`. `GlitchUncorrectable` is kept
/// as a named variant for completeness but the coordinator never constructs
/// it as an `Err`: per spec.md §7 the render still completes with the
/// residual clusters surfaced through `RenderStats::glitches_uncorrected`.
/// Per-pixel and per-tile issues are likewise recovered locally (glitch
/// candidate flag, one re-queue) and never reach this type except when they
/// exhaust their recovery budget.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ComputeError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("invalid render request: {0}")]
    InvalidInput(String),

    #[error("invalid tile size: {0}×{0} (must be > 0)")]
    InvalidTileSize(u32),

    #[error("invalid image dimensions: {width}×{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("glitch cluster could not be corrected after {attempts} passes")]
    GlitchUncorrectable { attempts: u32 },

    #[error("render cancelled")]
    Cancelled,

    #[error("render exceeded its wall-clock budget of {budget_ms}ms")]
    Timeout { budget_ms: u64 },

    #[error("worker crashed twice on the same tile, giving up")]
    WorkerCrash,
}
