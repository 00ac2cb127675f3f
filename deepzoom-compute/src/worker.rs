//! Worker protocol (§6.3) and per-tile pixel compute.
//!
//! Workers never share mutable memory with each other — each `render-tile`
//! message carries (or references, via `Arc`) everything a worker needs:
//! the fractal kind, the viewport, the precision mode and, for
//! perturbation/arbitrary renders, a read-only handle to the shared
//! reference orbit and series coefficients. A worker's reply is a whole
//! `tile-complete` message carrying the computed pixel arrays; there is no
//! other channel between workers and the coordinator.

use std::sync::Arc;

use deepzoom_core::{
    iterate_direct, iterate_perturbation, Complex, FractalKind, FractalParams, IterationResult,
    ReferenceOrbit, SeriesApproximation, Viewport,
};

use crate::dispatch::PrecisionMode;
use crate::pixelfield::PixelFieldTileData;
use crate::tile::Tile;

/// Read-only data shared by every worker for one render (§5: "Reference
/// orbit: read-only to workers after construction").
pub struct SharedRenderData {
    pub kind: FractalKind,
    pub params: FractalParams,
    pub precision_mode: PrecisionMode,
    pub periodicity_interval: u32,
    pub glitch_alpha: f64,
    pub orbit: Option<ReferenceOrbit>,
    pub series: Option<SeriesApproximation>,
}

/// Messages exchanged between the coordinator and workers (§6.3).
pub enum WorkerMessage {
    /// Dispatch one tile's worth of pixel work.
    RenderTile {
        tile: Tile,
        shared: Arc<SharedRenderData>,
    },
    /// A completed tile's packed per-pixel arrays.
    TileComplete { tile: Tile, data: PixelFieldTileData },
    /// Cooperative cancellation, no payload.
    Cancel,
    Ping,
    Pong,
}

/// Computes one pixel's [`IterationResult`] plus glitch-candidate flag and
/// an approximate final orbit position, dispatching on `precision_mode`.
///
/// For `Double`, the final position is not tracked by the direct iterator
/// (it only returns escape class + norm) — the external coloring
/// collaborator's distance-estimate/potential fields are best-effort for
/// this mode and `orbit_final_re/im` report the pixel's own coordinate.
pub fn compute_pixel(
    viewport: &Viewport,
    shared: &SharedRenderData,
    x: u32,
    y: u32,
) -> (IterationResult, bool, f64, f64) {
    compute_point(viewport, shared, x as f64, y as f64)
}

/// Like [`compute_pixel`] but accepts fractional pixel coordinates, so the
/// supersampling accumulator (§4.10) can reuse the same dispatch for
/// sub-pixel samples.
pub fn compute_point(
    viewport: &Viewport,
    shared: &SharedRenderData,
    px: f64,
    py: f64,
) -> (IterationResult, bool, f64, f64) {
    match shared.precision_mode {
        PrecisionMode::Double => {
            let point = viewport.subpixel_to_complex(px, py);
            let result = iterate_direct(&shared.kind, point, &shared.params, shared.periodicity_interval);
            (result, false, point.re, point.im)
        }
        PrecisionMode::Perturbation | PrecisionMode::Arbitrary => {
            let orbit = shared
                .orbit
                .as_ref()
                .expect("perturbation/arbitrary render requires a reference orbit");

            let (delta_c, delta_z_seed, skip_from) = if shared.kind.pixel_seeds_z0() {
                // Julia: the pixel varies z_0, not c. No series skip — the
                // coefficients are fit for the c-varying case.
                (Complex::ZERO, viewport.subpixel_to_delta(px, py), 0)
            } else {
                let delta_c = viewport.subpixel_to_delta(px, py);
                match &shared.series {
                    Some(series) if series.skip_iter > 0 => {
                        (delta_c, series.predict(delta_c), series.skip_iter)
                    }
                    _ => (delta_c, Complex::ZERO, 0),
                }
            };

            let outcome = iterate_perturbation(
                &shared.kind,
                orbit,
                delta_c,
                delta_z_seed,
                skip_from,
                &shared.params,
                shared.glitch_alpha,
            );

            let ref_tail = orbit.z.last().copied().unwrap_or(Complex::ZERO);
            let final_point = ref_tail + delta_c;
            (
                outcome.result,
                outcome.glitch_candidate,
                final_point.re,
                final_point.im,
            )
        }
    }
}

/// Computes a whole tile's pixel data — the unit a worker exchanges with
/// the coordinator via `tile-complete` (§6.3).
pub fn render_tile(viewport: &Viewport, shared: &SharedRenderData, tile: &Tile) -> PixelFieldTileData {
    let mut data = PixelFieldTileData::new(tile.pixel_count());
    let escape_radius = shared.params.escape_radius;

    for row in 0..tile.height {
        let y = tile.y + row;
        for col in 0..tile.width {
            let x = tile.x + col;
            let idx = (row * tile.width + col) as usize;
            let (result, glitch, final_re, final_im) = compute_pixel(viewport, shared, x, y);
            data.set(idx, escape_radius, result, shared.params.max_iterations, final_re, final_im, glitch);
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use deepzoom_core::FractalParams;

    fn double_shared(kind: FractalKind) -> SharedRenderData {
        SharedRenderData {
            kind,
            params: FractalParams::default(),
            precision_mode: PrecisionMode::Double,
            periodicity_interval: 20,
            glitch_alpha: 1e-3,
            orbit: None,
            series: None,
        }
    }

    #[test]
    fn double_mode_computes_interior_at_origin() {
        let viewport = Viewport::default_mandelbrot(16, 16);
        let shared = double_shared(FractalKind::Mandelbrot);
        let (result, glitch, ..) = compute_pixel(&viewport, &shared, 8, 8);
        assert!(!glitch);
        assert!(!result.escaped() || matches!(result, IterationResult::Interior));
    }

    #[test]
    fn render_tile_fills_every_pixel() {
        let viewport = Viewport::default_mandelbrot(32, 32);
        let shared = double_shared(FractalKind::Mandelbrot);
        let tile = Tile {
            x: 0,
            y: 0,
            width: 16,
            height: 16,
            priority: 0,
        };
        let data = render_tile(&viewport, &shared, &tile);
        assert_eq!(data.iterations.len(), 256);
    }
}
