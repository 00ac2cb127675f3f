pub mod adaptive;
pub mod api;
pub mod config;
pub mod coordinator;
pub mod dispatch;
pub mod error;
pub mod glitch;
pub mod pixelfield;
pub mod renderer;
pub mod supersample;
pub mod tile;
pub mod worker;

pub use adaptive::{AdaptiveController, AdaptivePreset, ScalingLaw};
pub use api::{
    CorrectionStrategyDto, GlitchClassDto, GlitchSummary, PaletteLut, ProgressEvent, RenderPass,
    RenderRequest, RenderStats,
};
pub use config::CoreConfig;
pub use coordinator::{Coordinator, RenderState};
pub use dispatch::{required_precision_bits, select_precision_mode, PrecisionMode, PrecisionOverride};
pub use error::ComputeError;
pub use glitch::{CorrectionStrategy, GlitchClass, GlitchCluster};
pub use pixelfield::{ComplexityMap, GlitchMap, PixelField, PixelFieldTileData};
pub use renderer::RenderCancel;
pub use supersample::{SsPattern, SupersampleLevel};
pub use tile::{build_tile_grid, spiral_order, ClassifiedTile, Tile, TileKind};
pub use worker::{compute_pixel, compute_point, render_tile, SharedRenderData, WorkerMessage};

/// Convenience result type for the compute crate.
pub type Result<T> = std::result::Result<T, ComputeError>;
