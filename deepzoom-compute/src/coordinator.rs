//! Renders one request end to end (§4.11, §5): precision dispatch,
//! reference-orbit/series construction, tile scheduling, glitch correction
//! and supersampling, published through an explicit [`RenderState`] rather
//! than the teacher's implicit "are we still inside `render()`" tracking.
//!
//! Parallelism is rayon's global pool driven through `par_iter`, the same
//! mechanism the teacher's renderer and this crate's `supersample` module
//! already use; cancellation is the shared [`RenderCancel`] generation
//! counter rather than a channel message, so a cancel observed mid-tile
//! takes effect at the next suspension point without workers needing to
//! poll a queue.

use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use deepzoom_core::{
    iterate_direct, iterate_perturbation, Complex, ComplexBig, FractalKind, FractalParams,
    ReferenceOrbit, SeriesApproximation, Viewport,
};

use crate::adaptive::AdaptiveController;
use crate::api::{ProgressEvent, RenderPass, RenderRequest, RenderStats};
use crate::config::CoreConfig;
use crate::dispatch::{required_precision_bits, select_precision_mode, PrecisionMode};
use crate::error::ComputeError;
use crate::glitch::{self, CorrectionStrategy, GlitchCluster};
use crate::pixelfield::PixelField;
use crate::renderer::RenderCancel;
use crate::supersample::{apply_adaptive_supersample, apply_fixed_supersample, SupersampleLevel};
use crate::tile::{build_tile_grid, classify_tiles_for_symmetry, Tile, TileKind};
use crate::worker::{render_tile, SharedRenderData};

/// A render's lifecycle (§4.11). `Failed` always carries the
/// [`ComputeError`] that ended the render, not just a marker bit.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderState {
    Idle,
    Dispatching,
    Rendering,
    GlitchPass,
    Supersampling,
    Complete,
    Cancelled,
    Failed(ComputeError),
}

/// Owns one render's cancellation handle and lifecycle state. Not meant to
/// be shared across renders — construct a fresh `Coordinator` per request,
/// or call [`Coordinator::render`] again once [`Coordinator::state`] reads
/// `Complete`/`Cancelled`/`Failed`.
pub struct Coordinator {
    config: CoreConfig,
    cancel: Arc<RenderCancel>,
    state: RenderState,
}

impl Coordinator {
    pub fn new(config: CoreConfig) -> Self {
        Self {
            config,
            cancel: Arc::new(RenderCancel::new()),
            state: RenderState::Idle,
        }
    }

    pub fn state(&self) -> RenderState {
        self.state.clone()
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// A handle another thread can call `.cancel()` on while `render` runs.
    pub fn cancel_handle(&self) -> Arc<RenderCancel> {
        Arc::clone(&self.cancel)
    }

    /// Runs one request to completion, cancellation or failure, draining
    /// the whole tile queue synchronously — the `progressive` flag is the
    /// caller's signal to instead dispatch through a tile-at-a-time API a
    /// future UI-facing crate would add; the headless core always drains.
    pub fn render(
        &mut self,
        request: &RenderRequest,
        progress: Option<&Sender<ProgressEvent>>,
    ) -> Result<(PixelField, RenderStats), ComputeError> {
        let started = Instant::now();
        let gen = self.cancel.generation();
        self.state = RenderState::Dispatching;

        if request.width == 0 || request.height == 0 {
            let err = ComputeError::InvalidDimensions {
                width: request.width,
                height: request.height,
            };
            self.state = RenderState::Failed(err.clone());
            return Err(err);
        }

        let zoom = request.viewport.zoom.to_f64();
        let precision_mode = select_precision_mode(zoom, &self.config, request.precision_override);
        let periodicity_interval = request.periodicity_interval.unwrap_or(self.config.periodicity_interval);
        let escape_radius = request.escape_radius.unwrap_or(self.config.escape_radius);

        let adaptive = request.adaptive_iterations.then(|| {
            let preset = request.adaptive_preset.unwrap_or(self.config.adaptive_preset);
            let law = request.adaptive_scaling_law.unwrap_or(self.config.adaptive_scaling_law);
            AdaptiveController::new(preset).with_scaling_law(law)
        });
        let periodicity_interval = adaptive.as_ref().map(|a| a.periodicity_interval()).unwrap_or(periodicity_interval);
        let max_iterations = request
            .max_iterations
            .unwrap_or_else(|| adaptive.as_ref().map(|a| a.recommend(zoom)).unwrap_or(FractalParams::DEFAULT_MAX_ITERATIONS));

        let params = match FractalParams::new(max_iterations, escape_radius) {
            Ok(p) => p,
            Err(e) => {
                let err = ComputeError::Core(e);
                self.state = RenderState::Failed(err.clone());
                return Err(err);
            }
        };

        info!(?precision_mode, max_iterations, zoom, "dispatching render");

        let (orbit, series) = if precision_mode == PrecisionMode::Double {
            (None, None)
        } else {
            let precision_bits = required_precision_bits(zoom, &self.config).max(request.viewport.center.precision_bits());
            let built = match build_reference_orbit(&request.fractal, &request.viewport, precision_bits, &params, &self.config) {
                Ok(o) => o,
                Err(e) => {
                    self.state = RenderState::Failed(e.clone());
                    return Err(e);
                }
            };
            let series = build_series(&request.fractal, &built, &request.viewport, &self.config);
            (Some(built), Some(series))
        };

        let shared = Arc::new(SharedRenderData {
            kind: request.fractal,
            params,
            precision_mode,
            periodicity_interval,
            glitch_alpha: self.config.glitch_alpha,
            orbit,
            series,
        });

        let tile_size = request.tile_size.unwrap_or(self.config.normalized_tile_size());
        let tiles = build_tile_grid(request.width, request.height, tile_size);
        self.cancel.reset_progress(tiles.len());
        if let Some(tx) = progress {
            let _ = tx.send(ProgressEvent::Started { tiles_total: tiles.len(), precision_mode });
        }

        self.state = RenderState::Rendering;
        let mut field = PixelField::new(request.width, request.height);

        let symmetry = (!request.fractal.pixel_seeds_z0())
            .then(|| classify_tiles_for_symmetry(&tiles, request.height, request.viewport.center.to_complex().im, request.viewport.rotation))
            .flatten();

        let dispatch_list: Vec<Tile> = match &symmetry {
            Some(classified) => classified
                .iter()
                .filter(|ct| !matches!(ct.kind, TileKind::Mirror { .. }))
                .map(|ct| ct.tile)
                .collect(),
            None => tiles.clone(),
        };
        let mut ordered = dispatch_list;
        ordered.sort_by_key(|t| t.priority);

        let worker_results: Vec<Option<(Tile, crate::pixelfield::PixelFieldTileData)>> = ordered
            .par_iter()
            .map(|&tile| {
                if self.cancel.is_cancelled(gen) {
                    return None;
                }
                let data = render_tile(&request.viewport, &shared, &tile);
                self.cancel.inc_progress();
                Some((tile, data))
            })
            .collect();

        if self.cancel.is_cancelled(gen) {
            self.state = RenderState::Cancelled;
            if let Some(tx) = progress {
                let _ = tx.send(ProgressEvent::Cancelled);
            }
            return Err(ComputeError::Cancelled);
        }

        let mut tiles_done = 0usize;
        let mut mirrored = 0usize;
        for (tile, data) in worker_results.into_iter().flatten() {
            field.blit_tile(&tile, &data);
            tiles_done += 1;
            if let Some(tx) = progress {
                let _ = tx.send(ProgressEvent::TileComplete { tile, tiles_done, tiles_total: tiles.len() });
            }
            if let Some(classified) = &symmetry {
                if let Some(ct) = classified.iter().find(|ct| ct.tile.x == tile.x && ct.tile.y == tile.y) {
                    if let TileKind::Primary { mirror_index } = ct.kind {
                        let mirror_tile = classified[mirror_index].tile;
                        field.blit_tile_mirrored(&mirror_tile, &data);
                        mirrored += 1;
                        self.cancel.inc_progress();
                    }
                }
            }
        }
        if mirrored > 0 {
            debug!(mirrored, "filled tiles via real-axis symmetry");
        }
        if let Some(tx) = progress {
            let _ = tx.send(ProgressEvent::PassComplete { pass: RenderPass::Rendering });
        }

        let mut stats = RenderStats::new(tiles.len(), precision_mode);
        stats.tiles_completed = tiles_done + mirrored;

        let (glitches_detected, glitches_corrected, glitches_uncorrected) = if request.glitch_correction {
            self.state = RenderState::GlitchPass;
            if self.cancel.is_cancelled(gen) {
                self.state = RenderState::Cancelled;
                return Err(ComputeError::Cancelled);
            }
            match self.run_glitch_passes(&request.fractal, &request.viewport, &shared, &mut field, gen) {
                Ok(result) => {
                    if let Some(tx) = progress {
                        let _ = tx.send(ProgressEvent::GlitchPassComplete {
                            clusters_found: result.0,
                            clusters_corrected: result.1,
                        });
                    }
                    result
                }
                Err(e) => {
                    // Only cancellation reaches this arm now — GlitchUncorrectable
                    // no longer aborts the render (spec.md §7).
                    self.state = RenderState::Failed(e.clone());
                    if let Some(tx) = progress {
                        let _ = tx.send(ProgressEvent::Error { message: e.to_string() });
                    }
                    return Err(e);
                }
            }
        } else {
            (0, 0, 0)
        };
        stats.glitches_detected = glitches_detected;
        stats.glitches_corrected = glitches_corrected;
        stats.glitches_uncorrected = glitches_uncorrected;

        if request.antialiasing {
            self.state = RenderState::Supersampling;
            if self.cancel.is_cancelled(gen) {
                self.state = RenderState::Cancelled;
                return Err(ComputeError::Cancelled);
            }
            let ok = match request.supersample_level {
                SupersampleLevel::Fixed(level) => {
                    apply_fixed_supersample(&mut field, &request.viewport, &shared, level, request.ss_pattern, &self.cancel)
                }
                SupersampleLevel::Adaptive => {
                    apply_adaptive_supersample(&mut field, &request.viewport, &shared, &self.config, &self.cancel)
                }
            };
            if !ok {
                self.state = RenderState::Cancelled;
                return Err(ComputeError::Cancelled);
            }
            stats.ss_passes = 1;
            if let Some(tx) = progress {
                let _ = tx.send(ProgressEvent::PassComplete { pass: RenderPass::Supersampling });
            }
        }

        let elapsed = started.elapsed();
        let escaped_iterations: Vec<f64> = field
            .iterations
            .iter()
            .zip(field.escaped.iter())
            .filter(|(_, &escaped)| escaped != 0)
            .map(|(&v, _)| v as f64)
            .collect();

        stats.total_pixels = request.width as u64 * request.height as u64;
        stats.max_iterations_used = max_iterations;
        stats.avg_iterations = if escaped_iterations.is_empty() {
            0.0
        } else {
            escaped_iterations.iter().sum::<f64>() / escaped_iterations.len() as f64
        };
        stats.render_time_ms = elapsed.as_millis() as u64;
        stats.pixels_per_second = if elapsed.as_secs_f64() > 0.0 {
            stats.total_pixels as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };

        self.state = RenderState::Complete;
        if let Some(tx) = progress {
            let _ = tx.send(ProgressEvent::Complete { stats });
        }
        Ok((field, stats))
    }

    /// Runs up to `config.max_correction_passes` detect→classify→correct
    /// rounds (§4.9), actually executing whichever strategy each cluster
    /// was classified with, rather than leaving the selection unexecuted.
    ///
    /// Returns `(detected, corrected, uncorrected)`. A cluster still flagged
    /// after `max_correction_passes` is `GlitchUncorrectable` per spec.md §7,
    /// but that is not a render-aborting error — "the render still
    /// completes"; the count is surfaced in `RenderStats` instead and the
    /// flagged pixels are left as-is. Only cooperative cancellation returns
    /// `Err` here.
    fn run_glitch_passes(
        &mut self,
        kind: &FractalKind,
        viewport: &Viewport,
        shared: &Arc<SharedRenderData>,
        field: &mut PixelField,
        gen: u64,
    ) -> Result<(usize, usize, usize), ComputeError> {
        let mut shared = Arc::clone(shared);
        let mut total_detected = 0usize;
        let mut total_corrected = 0usize;
        let mut attempts = 0u32;

        for _ in 0..self.config.max_correction_passes {
            if self.cancel.is_cancelled(gen) {
                self.state = RenderState::Cancelled;
                return Err(ComputeError::Cancelled);
            }
            let (map, clusters) = glitch::detect_and_classify(field, &self.config);
            if clusters.is_empty() {
                return Ok((total_detected, total_corrected, 0));
            }
            attempts += 1;
            total_detected += clusters.len();
            debug!(pass = attempts, clusters = clusters.len(), "glitch correction pass");

            for cluster in &clusters {
                let mut corrected = match cluster.strategy {
                    CorrectionStrategy::Interpolate => glitch::apply_interpolate(field, &map, cluster),
                    CorrectionStrategy::IncreaseIter => {
                        correct_increase_iter(kind, viewport, &shared, field, cluster)
                    }
                    CorrectionStrategy::HighPrecision | CorrectionStrategy::Rebase => {
                        match correct_rebase(&self.config, kind, viewport, &shared, field, cluster, cluster.strategy) {
                            Some(new_shared) => {
                                shared = new_shared;
                                true
                            }
                            None => false,
                        }
                    }
                };
                if !corrected && cluster.strategy == CorrectionStrategy::Interpolate {
                    // Some pixels had no non-glitch neighbor to average —
                    // escalate those straggling clusters rather than give up.
                    corrected = correct_increase_iter(kind, viewport, &shared, field, cluster);
                }
                if corrected {
                    total_corrected += 1;
                }
            }
        }

        let (_, remaining) = glitch::detect_and_classify(field, &self.config);
        if remaining.is_empty() {
            Ok((total_detected, total_corrected, 0))
        } else {
            warn!(remaining = remaining.len(), attempts, "glitch clusters uncorrectable after max passes, leaving flagged");
            Ok((total_detected, total_corrected, remaining.len()))
        }
    }
}

/// Widens a `ComplexBig` to `target_bits` via an identity add against a
/// zero at the target precision — `add`/`sub`/`mul` widen to
/// `max(self.precision_bits, other.precision_bits)`, so this promotes
/// without discarding any digits the original value carried.
fn widen(c: &ComplexBig, target_bits: usize) -> ComplexBig {
    c.add(&ComplexBig::zero(target_bits))
}

fn build_reference_orbit(
    kind: &FractalKind,
    viewport: &Viewport,
    precision_bits: usize,
    params: &FractalParams,
    config: &CoreConfig,
) -> Result<ReferenceOrbit, ComputeError> {
    let (c, z0) = if kind.pixel_seeds_z0() {
        let fixed = kind.fixed_c().expect("pixel_seeds_z0 kinds always carry a fixed c");
        (ComplexBig::from_complex(fixed, precision_bits), widen(&viewport.center, precision_bits))
    } else {
        (widen(&viewport.center, precision_bits), ComplexBig::zero(precision_bits))
    };
    ReferenceOrbit::build(*kind, c, z0, params.max_iterations, params.escape_radius, config.checkpoint_interval, false)
        .map_err(ComputeError::Core)
}

fn build_series(kind: &FractalKind, orbit: &ReferenceOrbit, viewport: &Viewport, config: &CoreConfig) -> SeriesApproximation {
    if !kind.is_degree_two_analytic() {
        return SeriesApproximation::trivial();
    }
    let disk_radius = viewport.complex_width().max(viewport.complex_height()) / 2.0;
    SeriesApproximation::build(&orbit.z, config.series_terms, disk_radius, config.series_tolerance, config.series_overflow_bound)
}

/// The cluster's centroid pixel, expressed as a delta from the viewport
/// center — safe to difference against another nearby delta in `f64`
/// (§4.6: "per-pixel deltas stay representable regardless of zoom depth"),
/// unlike the absolute complex coordinates they're offset from.
fn cluster_centroid_delta(viewport: &Viewport, cluster: &GlitchCluster) -> Complex {
    let n = cluster.pixels.len().max(1) as f64;
    let (sum_x, sum_y) = cluster
        .pixels
        .iter()
        .fold((0f64, 0f64), |(sx, sy), &(x, y)| (sx + x as f64, sy + y as f64));
    viewport.subpixel_to_delta(sum_x / n, sum_y / n)
}

/// `IncreaseIter` (§4.9): recompute the cluster directly at a higher
/// iteration budget, bypassing perturbation entirely. Bailout-artifact
/// clusters are small and near the escape boundary, so a direct per-pixel
/// recompute is cheap and avoids threading a reference-orbit rebuild
/// through a strategy that doesn't need one.
fn correct_increase_iter(
    kind: &FractalKind,
    viewport: &Viewport,
    shared: &SharedRenderData,
    field: &mut PixelField,
    cluster: &GlitchCluster,
) -> bool {
    let boosted_iter = shared.params.max_iterations.saturating_mul(2);
    let boosted_params = match FractalParams::new(boosted_iter, shared.params.escape_radius) {
        Ok(p) => p,
        Err(_) => return false,
    };
    for &(x, y) in &cluster.pixels {
        let point = viewport.pixel_to_complex(x, y);
        let result = iterate_direct(kind, point, &boosted_params, shared.periodicity_interval);
        field.set_pixel(x, y, boosted_params.escape_radius, result, boosted_params.max_iterations, point.re, point.im, false);
    }
    true
}

/// `HighPrecision`/`Rebase` (§4.9): both pick a new reference point at the
/// cluster's centroid and rebuild the orbit/series there; `HighPrecision`
/// additionally doubles `precision_bits` first. Returns the rebuilt shared
/// data so the caller's next pass (and any later cluster sharing this
/// reference) reuses it, or `None` if the rebuild itself failed.
fn correct_rebase(
    config: &CoreConfig,
    kind: &FractalKind,
    viewport: &Viewport,
    shared: &SharedRenderData,
    field: &mut PixelField,
    cluster: &GlitchCluster,
    strategy: CorrectionStrategy,
) -> Option<Arc<SharedRenderData>> {
    let orbit = shared.orbit.as_ref()?;
    let base_bits = orbit.checkpoints.first().map(|(_, c)| c.precision_bits()).unwrap_or(64);
    let precision_bits = match strategy {
        CorrectionStrategy::HighPrecision => base_bits * 2,
        _ => base_bits,
    };

    let delta_ref = cluster_centroid_delta(viewport, cluster);
    let new_reference = viewport.center.add(&ComplexBig::from_complex(delta_ref, precision_bits));

    let (c, z0) = if kind.pixel_seeds_z0() {
        let fixed = kind.fixed_c()?;
        (ComplexBig::from_complex(fixed, precision_bits), new_reference)
    } else {
        (new_reference, ComplexBig::zero(precision_bits))
    };

    let new_orbit = ReferenceOrbit::build(
        *kind,
        c,
        z0,
        shared.params.max_iterations,
        shared.params.escape_radius,
        config.checkpoint_interval,
        false,
    )
    .ok()?;
    let new_series = build_series(kind, &new_orbit, viewport, config);

    for &(x, y) in &cluster.pixels {
        let pixel_delta = viewport.pixel_to_delta(x, y);
        let delta_c = pixel_delta - delta_ref;
        let outcome = iterate_perturbation(kind, &new_orbit, delta_c, Complex::ZERO, 0, &shared.params, shared.glitch_alpha);
        let ref_tail = new_orbit.z.last().copied().unwrap_or(Complex::ZERO);
        let final_point = ref_tail + delta_c;
        field.set_pixel(
            x,
            y,
            shared.params.escape_radius,
            outcome.result,
            shared.params.max_iterations,
            final_point.re,
            final_point.im,
            outcome.glitch_candidate,
        );
    }

    Some(Arc::new(SharedRenderData {
        kind: *kind,
        params: shared.params,
        precision_mode: shared.precision_mode,
        periodicity_interval: shared.periodicity_interval,
        glitch_alpha: shared.glitch_alpha,
        orbit: Some(new_orbit),
        series: Some(new_series),
    }))
}
