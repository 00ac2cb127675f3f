use crate::complex::Complex;
use crate::fractal::{FractalParams, IterationResult};
use crate::kind::FractalKind;

/// Default periodicity snapshot period (`periodicityInterval`), used when
/// the caller has not overridden it in `CoreConfig`.
pub const DEFAULT_PERIODICITY_INTERVAL: u32 = 20;

/// Periodicity-match distance: orbit values closer than this to the last
/// snapshot are considered to have entered a cycle.
const PERIODICITY_TOLERANCE: f64 = 1e-12;

/// Double-precision iteration for a single pixel, used below the
/// perturbation threshold.
///
/// Implements the periodicity check described for the direct iterator:
/// every `periodicity_interval` iterations the current `z` is snapshotted;
/// every iteration thereafter is compared to that snapshot, and a match
/// within [`PERIODICITY_TOLERANCE`] declares the point interior.
pub fn iterate_direct(
    kind: &FractalKind,
    point: Complex,
    params: &FractalParams,
    periodicity_interval: u32,
) -> IterationResult {
    let (z0, c) = seed(kind, point);

    if kind.fast_reject_interior(c) {
        return IterationResult::Interior;
    }

    let escape_radius_sq = params.escape_radius_sq();
    let max_iter = params.max_iterations;
    let interval = periodicity_interval.max(1);

    let mut z = z0;
    let mut snapshot = z0;

    for n in 0..max_iter {
        z = kind.step(z, c);

        let norm_sq = z.norm_sq();
        if norm_sq > escape_radius_sq {
            return IterationResult::Escaped {
                iterations: n,
                norm_sq,
            };
        }

        if n > 0 && n % interval == 0 {
            snapshot = z;
        } else if n % interval != 0
            && (z.re - snapshot.re).abs() < PERIODICITY_TOLERANCE
            && (z.im - snapshot.im).abs() < PERIODICITY_TOLERANCE
        {
            return IterationResult::Interior;
        }
    }

    IterationResult::Interior
}

/// Derives `(z_0, c)` for a pixel coordinate given the fractal kind: for
/// Mandelbrot-family kinds the pixel seeds `c` and `z_0 = 0`; for Julia the
/// pixel seeds `z_0` and `c` is the kind's fixed constant.
fn seed(kind: &FractalKind, point: Complex) -> (Complex, Complex) {
    match kind.fixed_c() {
        Some(c) => (point, c),
        None => (Complex::ZERO, point),
    }
}
