//! Supersampling accumulator (§4.10): edge-aware multi-sample refinement
//! of a completed pass's [`PixelField`].
//!
//! The compute core has no RGB to accumulate (coloring is out of scope,
//! §1), so the "iteration-derived scalar" the spec allows in place of RGB
//! is the field's own per-pixel arrays: `iterations`, `escaped`, and the
//! distance/potential/angle channels. Every pattern's first sample is the
//! pixel's existing single-sample result, reused rather than recomputed,
//! matching "the center sample reuses the existing pass to avoid
//! duplicate work".

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use deepzoom_core::{smoothed_iterations, Viewport};

use crate::config::CoreConfig;
use crate::pixelfield::PixelField;
use crate::renderer::RenderCancel;
use crate::worker::{compute_point, SharedRenderData};

/// Supersampling level (§6.1 `supersampleLevel`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupersampleLevel {
    Fixed(u32),
    Adaptive,
}

/// Sub-pixel sampling pattern (§6.1 `ssPattern`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SsPattern {
    Grid,
    RotatedGrid,
    Quincunx,
    Poisson16,
    Jittered,
}

/// Offset of a rotated-grid sample rotated by `atan(1/2)`, the standard
/// 2:1 rotated-grid angle used by graphics MSAA resolve patterns, scaled
/// to stay within the pixel's `[-0.5, 0.5]` box.
const ROTATED_GRID_ANGLE_TAN: f64 = 0.5;

/// Deterministic bit-mixing hash (the public-domain `fmix64` finalizer),
/// used instead of a `rand` dependency so jittered/Poisson offsets stay a
/// pure function of pixel coordinates — required by the determinism
/// invariant (§8): two runs of the same render must agree bit-for-bit.
fn mix64(mut x: u64) -> u64 {
    x ^= x >> 33;
    x = x.wrapping_mul(0xff51afd7ed558ccd);
    x ^= x >> 33;
    x = x.wrapping_mul(0xc4ceb9fe1a85ec53);
    x ^= x >> 33;
    x
}

/// Maps a hash to `[-0.5, 0.5)`.
fn hash_offset(seed: u64) -> f64 {
    let unit = (mix64(seed) >> 11) as f64 / (1u64 << 53) as f64;
    unit - 0.5
}

/// 16 fixed, pairwise well-spread offsets inside the unit pixel box,
/// reused verbatim by every pixel that uses the `Poisson16` pattern —
/// "poisson" in the informal graphics sense of irregular-but-even
/// coverage, not a sampled Poisson-disk process (which would need a
/// nondeterministic generator).
const POISSON16: [(f64, f64); 16] = [
    (-0.40, -0.45),
    (0.44, -0.38),
    (-0.10, 0.42),
    (0.32, 0.18),
    (-0.45, 0.05),
    (0.05, -0.48),
    (0.22, 0.45),
    (-0.28, -0.12),
    (0.48, 0.30),
    (-0.18, -0.30),
    (0.12, -0.05),
    (-0.48, 0.38),
    (0.38, -0.12),
    (-0.02, 0.15),
    (0.20, -0.42),
    (-0.35, 0.28),
];

/// Returns `(dx, dy, weight)` offsets for `pattern` at `level`, in pixel
/// units relative to the pixel center, with weights summing to 1. The
/// first entry is always `(0.0, 0.0, _)` — the reused center sample.
fn pattern_offsets(pattern: SsPattern, level: u32, seed: u64) -> Vec<(f64, f64, f64)> {
    match pattern {
        SsPattern::Quincunx => {
            // Classic quincunx weighting: center carries half the weight,
            // the four corners share the other half.
            vec![
                (0.0, 0.0, 0.5),
                (-0.25, -0.25, 0.125),
                (0.25, -0.25, 0.125),
                (-0.25, 0.25, 0.125),
                (0.25, 0.25, 0.125),
            ]
        }
        SsPattern::Poisson16 => {
            let n = POISSON16.len() as f64;
            let extra_weight = 1.0 / (n + 1.0);
            let mut offsets = vec![(0.0, 0.0, extra_weight)];
            offsets.extend(POISSON16.iter().map(|&(dx, dy)| (dx, dy, extra_weight)));
            offsets
        }
        SsPattern::Grid => {
            let extra = level.saturating_sub(1).max(1);
            let weight = 1.0 / (extra as f64 + 1.0);
            let mut offsets = vec![(0.0, 0.0, weight)];
            let side = (extra as f64).sqrt().ceil().max(1.0) as u32;
            for i in 0..extra {
                let row = i / side;
                let col = i % side;
                let dx = (col as f64 + 0.5) / side as f64 - 0.5;
                let dy = (row as f64 + 0.5) / side as f64 - 0.5;
                offsets.push((dx, dy, weight));
            }
            offsets
        }
        SsPattern::RotatedGrid => {
            let extra = level.saturating_sub(1).max(1);
            let weight = 1.0 / (extra as f64 + 1.0);
            let mut offsets = vec![(0.0, 0.0, weight)];
            let side = (extra as f64).sqrt().ceil().max(1.0) as u32;
            let (sin, cos) = ROTATED_GRID_ANGLE_TAN.atan().sin_cos();
            for i in 0..extra {
                let row = i / side;
                let col = i % side;
                let gx = (col as f64 + 0.5) / side as f64 - 0.5;
                let gy = (row as f64 + 0.5) / side as f64 - 0.5;
                let dx = (gx * cos - gy * sin) * 0.9;
                let dy = (gx * sin + gy * cos) * 0.9;
                offsets.push((dx, dy, weight));
            }
            offsets
        }
        SsPattern::Jittered => {
            let extra = level.saturating_sub(1).max(1);
            let weight = 1.0 / (extra as f64 + 1.0);
            let mut offsets = vec![(0.0, 0.0, weight)];
            for i in 0..extra {
                let dx = hash_offset(seed.wrapping_mul(2).wrapping_add(i as u64 * 2));
                let dy = hash_offset(seed.wrapping_mul(2).wrapping_add(i as u64 * 2 + 1));
                offsets.push((dx * 0.9, dy * 0.9, weight));
            }
            offsets
        }
    }
}

/// Deterministic per-pixel seed for jittered sampling.
#[inline]
fn pixel_seed(x: u32, y: u32) -> u64 {
    (x as u64) << 32 | y as u64
}

/// Weighted-average accumulation into one pixel's field entries, reusing
/// `field`'s current values for the `(0, 0)` sample.
#[allow(clippy::too_many_arguments)]
fn accumulate_pixel(
    field: &PixelField,
    viewport: &Viewport,
    shared: &SharedRenderData,
    x: u32,
    y: u32,
    offsets: &[(f64, f64, f64)],
) -> (f32, u8, f64, f64, f32, f32, f32) {
    let idx = field.index(x, y);
    let max_iter = shared.params.max_iterations as f64;

    let mut acc_iter = 0f64;
    let mut acc_escaped = 0f64;
    let mut acc_re = 0f64;
    let mut acc_im = 0f64;
    let mut acc_de = 0f64;
    let mut acc_pot = 0f64;
    let mut acc_angle = 0f64;

    for &(dx, dy, w) in offsets {
        if dx == 0.0 && dy == 0.0 {
            acc_iter += w * field.iterations[idx] as f64;
            acc_escaped += w * field.escaped[idx] as f64;
            acc_re += w * field.orbit_final_re[idx];
            acc_im += w * field.orbit_final_im[idx];
            acc_de += w * field.distance_estimate[idx] as f64;
            acc_pot += w * field.potential[idx] as f64;
            acc_angle += w * field.final_angle[idx] as f64;
            continue;
        }

        let (result, _glitch, re, im) =
            compute_point(viewport, shared, x as f64 + dx, y as f64 + dy);
        acc_re += w * re;
        acc_im += w * im;

        match result {
            deepzoom_core::IterationResult::Escaped { iterations, norm_sq } => {
                let scalar = smoothed_iterations(iterations, norm_sq, shared.params.escape_radius);
                acc_iter += w * scalar;
                acc_escaped += w;
                let z = norm_sq.sqrt();
                acc_de += w * (0.5 * z * z.ln() / z);
                acc_pot += w * z.ln();
                acc_angle += w * im.atan2(re);
            }
            deepzoom_core::IterationResult::Interior => {
                acc_iter += w * max_iter;
            }
        }
    }

    let coverage = acc_escaped.clamp(0.0, 1.0);
    let escaped = if coverage >= 0.5 { 1u8 } else { 0u8 };
    (
        acc_iter as f32,
        escaped,
        acc_re,
        acc_im,
        acc_de as f32,
        acc_pot as f32,
        acc_angle as f32,
    )
}

/// Detects edges for the adaptive level: iteration discontinuity in a
/// 4-/8-neighborhood (threshold `ITER_DIFF/2`) plus any escaped-flag
/// disagreement.
fn detect_edges(field: &PixelField, config: &CoreConfig) -> Vec<bool> {
    let (w, h) = (field.width, field.height);
    let threshold = config.iter_diff / 2.0;
    let mut mask = vec![false; (w * h) as usize];

    for y in 0..h {
        for x in 0..w {
            let idx = field.index(x, y);
            let mut is_edge = false;
            'neighbors: for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let nx = x as i64 + dx;
                    let ny = y as i64 + dy;
                    if nx < 0 || ny < 0 || nx >= w as i64 || ny >= h as i64 {
                        continue;
                    }
                    let nidx = field.index(nx as u32, ny as u32);
                    if field.escaped[nidx] != field.escaped[idx] {
                        is_edge = true;
                        break 'neighbors;
                    }
                    if field.escaped[idx] != 0
                        && (field.iterations[nidx] - field.iterations[idx]).abs() as f64 > threshold
                    {
                        is_edge = true;
                        break 'neighbors;
                    }
                }
            }
            mask[idx as usize] = is_edge;
        }
    }
    mask
}

/// Applies a fixed-level supersampling pass to every pixel of `field`.
pub fn apply_fixed_supersample(
    field: &mut PixelField,
    viewport: &Viewport,
    shared: &SharedRenderData,
    level: u32,
    pattern: SsPattern,
    cancel: &RenderCancel,
) -> bool {
    if level <= 1 {
        return true;
    }
    let gen = cancel.generation();
    let (w, h) = (field.width, field.height);

    debug!(level, ?pattern, "Starting fixed supersampling pass");

    let updates: Vec<Option<(u32, u32, f32, u8, f64, f64, f32, f32, f32)>> = (0..h)
        .into_par_iter()
        .flat_map_iter(|y| {
            (0..w).map(move |x| {
                if cancel.generation() != gen {
                    return None;
                }
                let seed = pixel_seed(x, y);
                let offsets = pattern_offsets(pattern, level, seed);
                let (iter, escaped, re, im, de, pot, angle) =
                    accumulate_pixel(field, viewport, shared, x, y, &offsets);
                Some((x, y, iter, escaped, re, im, de, pot, angle))
            })
        })
        .collect();

    if cancel.generation() != gen {
        return false;
    }

    for update in updates.into_iter().flatten() {
        let (x, y, iter, escaped, re, im, de, pot, angle) = update;
        let idx = field.index(x, y);
        field.iterations[idx] = iter;
        field.escaped[idx] = escaped;
        field.orbit_final_re[idx] = re;
        field.orbit_final_im[idx] = im;
        field.distance_estimate[idx] = de;
        field.potential[idx] = pot;
        field.final_angle[idx] = angle;
    }
    true
}

/// Applies the adaptive supersampling pass: a 4-sample rotated grid,
/// restricted to pixels the edge detector flags.
pub fn apply_adaptive_supersample(
    field: &mut PixelField,
    viewport: &Viewport,
    shared: &SharedRenderData,
    config: &CoreConfig,
    cancel: &RenderCancel,
) -> bool {
    let gen = cancel.generation();
    let mask = detect_edges(field, config);
    let flagged_count = mask.iter().filter(|&&f| f).count();
    if flagged_count == 0 {
        return true;
    }
    debug!(flagged_count, "Starting adaptive supersampling pass");

    let (w, _h) = (field.width, field.height);
    let updates: Vec<Option<(u32, u32, f32, u8, f64, f64, f32, f32, f32)>> = mask
        .par_iter()
        .enumerate()
        .filter(|(_, &flagged)| flagged)
        .map(|(idx, _)| {
            if cancel.generation() != gen {
                return None;
            }
            let x = (idx as u32) % w;
            let y = (idx as u32) / w;
            let seed = pixel_seed(x, y);
            let offsets = pattern_offsets(SsPattern::RotatedGrid, 4, seed);
            let (iter, escaped, re, im, de, pot, angle) =
                accumulate_pixel(field, viewport, shared, x, y, &offsets);
            Some((x, y, iter, escaped, re, im, de, pot, angle))
        })
        .collect();

    if cancel.generation() != gen {
        return false;
    }

    for update in updates.into_iter().flatten() {
        let (x, y, iter, escaped, re, im, de, pot, angle) = update;
        let idx = field.index(x, y);
        field.iterations[idx] = iter;
        field.escaped[idx] = escaped;
        field.orbit_final_re[idx] = re;
        field.orbit_final_im[idx] = im;
        field.distance_estimate[idx] = de;
        field.potential[idx] = pot;
        field.final_angle[idx] = angle;
    }
    true
}
