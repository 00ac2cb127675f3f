use crate::complex::Complex;
use crate::fractal::{FractalParams, IterationResult};
use crate::kind::FractalKind;
use crate::orbit::ReferenceOrbit;

/// Default underflow ratio `α` used to flag a pixel as a glitch candidate
/// when `|z_n|² < α·|δz_n|²`.
pub const DEFAULT_GLITCH_ALPHA: f64 = 1e-3;

/// Outcome of a single pixel's perturbation iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerturbationResult {
    pub result: IterationResult,
    /// `true` if the reference-relative-smallness check tripped at any
    /// point during iteration — a glitch candidate for the detector.
    pub glitch_candidate: bool,
}

/// Iterates a single pixel's perturbation delta against a reference orbit.
///
/// `delta_c` is the pixel's offset from the reference point (for
/// Mandelbrot-family kinds, where `c` varies per pixel); `delta_z_seed` is
/// either the series-approximation-predicted `δz` at `skip_from`
/// (perturbation-with-series), zero (cold start), or — for Julia kinds,
/// where the pixel varies `z_0` rather than `c` — the pixel's own offset
/// from the reference `z_0` with `delta_c` left at zero.
///
/// Recurrence: `δz_{n+1} = 2·Z_n·δz_n + δz_n² + δc` for the degree-two
/// kinds, generalized per kind by [`FractalKind::step_delta`].
pub fn iterate_perturbation(
    kind: &FractalKind,
    orbit: &ReferenceOrbit,
    delta_c: Complex,
    delta_z_seed: Complex,
    skip_from: usize,
    params: &FractalParams,
    glitch_alpha: f64,
) -> PerturbationResult {
    debug_assert!(
        kind.is_degree_two_analytic() || (skip_from == 0 && delta_z_seed == Complex::ZERO),
        "non-analytic kinds must start from iteration 0 with no series seed"
    );

    let escape_radius_sq = params.escape_radius_sq();
    let max_iter = params.max_iterations as usize;
    let orbit_len = orbit.z.len();

    let mut delta_z = delta_z_seed;
    let mut glitch_candidate = false;

    for n in skip_from..max_iter {
        if n >= orbit_len {
            // Reference orbit is shorter than maxIter (it escaped earlier);
            // the pixel's true orbit has diverged too far to trust further
            // perturbation steps against this reference — treat remaining
            // budget as interior-indeterminate and leave to the corrector.
            return PerturbationResult {
                result: IterationResult::Interior,
                glitch_candidate: true,
            };
        }

        let z_ref = orbit.z[n];
        delta_z = kind.step_delta(z_ref, delta_z, delta_c);

        let z_full = z_ref + delta_z;
        let z_full_norm_sq = z_full.norm_sq();
        let delta_z_norm_sq = delta_z.norm_sq();

        if delta_z_norm_sq > 0.0 && z_full_norm_sq < glitch_alpha * delta_z_norm_sq {
            glitch_candidate = true;
        }

        if z_full_norm_sq > escape_radius_sq {
            return PerturbationResult {
                result: IterationResult::Escaped {
                    iterations: n as u32,
                    norm_sq: z_full_norm_sq,
                },
                glitch_candidate,
            };
        }
    }

    PerturbationResult {
        result: IterationResult::Interior,
        glitch_candidate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bigfloat::BigFloat;
    use crate::complex_big::ComplexBig;
    use crate::direct::iterate_direct;

    fn reference_orbit_at(re: f64, im: f64, max_iter: u32) -> ReferenceOrbit {
        let c = ComplexBig::new(BigFloat::with_precision(re, 128), BigFloat::with_precision(im, 128));
        ReferenceOrbit::build(
            FractalKind::Mandelbrot,
            c,
            ComplexBig::zero(128),
            max_iter,
            2.0,
            10,
            false,
        )
        .unwrap()
    }

    #[test]
    fn perturbation_matches_direct_iteration_at_reference_point() {
        let params = FractalParams::new(500, 2.0).unwrap();
        let orbit = reference_orbit_at(-0.75, 0.1, params.max_iterations);
        let result = iterate_perturbation(
            &FractalKind::Mandelbrot,
            &orbit,
            Complex::ZERO,
            Complex::ZERO,
            0,
            &params,
            DEFAULT_GLITCH_ALPHA,
        );
        let direct = iterate_direct(&FractalKind::Mandelbrot, Complex::new(-0.75, 0.1), &params, 20);
        assert_eq!(result.result.class(), direct.class());
    }

    #[test]
    fn perturbation_matches_direct_iteration_nearby_pixel() {
        let params = FractalParams::new(500, 2.0).unwrap();
        let orbit = reference_orbit_at(-0.75, 0.1, params.max_iterations);
        let delta_c = Complex::new(1e-6, -2e-6);
        let result = iterate_perturbation(
            &FractalKind::Mandelbrot,
            &orbit,
            delta_c,
            Complex::ZERO,
            0,
            &params,
            DEFAULT_GLITCH_ALPHA,
        );
        let point = Complex::new(-0.75 + 1e-6, 0.1 - 2e-6);
        let direct = iterate_direct(&FractalKind::Mandelbrot, point, &params, 20);
        assert_eq!(result.result.class(), direct.class());
    }

    #[test]
    fn resuming_from_series_skip_matches_cold_start() {
        let params = FractalParams::new(500, 2.0).unwrap();
        let orbit = reference_orbit_at(-0.75, 0.1, params.max_iterations);
        let delta_c = Complex::new(1e-7, 1e-7);

        let cold = iterate_perturbation(
            &FractalKind::Mandelbrot,
            &orbit,
            delta_c,
            Complex::ZERO,
            0,
            &params,
            DEFAULT_GLITCH_ALPHA,
        );

        // Manually advance delta_z to iteration 10 the same way the
        // recurrence would, then resume from there — should match cold start.
        let mut delta_z = Complex::ZERO;
        for n in 0..10 {
            let z_ref = orbit.z[n];
            delta_z = FractalKind::Mandelbrot.step_delta(z_ref, delta_z, delta_c);
        }
        let warm = iterate_perturbation(
            &FractalKind::Mandelbrot,
            &orbit,
            delta_c,
            delta_z,
            10,
            &params,
            DEFAULT_GLITCH_ALPHA,
        );
        assert_eq!(cold.result, warm.result);
    }

    #[test]
    fn glitch_candidate_flagged_when_reference_much_smaller_than_delta() {
        let params = FractalParams::new(50, 2.0).unwrap();
        // A reference orbit at the origin stays near zero for a while,
        // making it trivial for a large delta_z to dominate |z_full|.
        let orbit = reference_orbit_at(0.0, 0.0, params.max_iterations);
        let result = iterate_perturbation(
            &FractalKind::Mandelbrot,
            &orbit,
            Complex::new(0.0, 0.0),
            Complex::new(1.5, 0.0),
            0,
            &params,
            DEFAULT_GLITCH_ALPHA,
        );
        assert!(result.glitch_candidate);
    }

    #[test]
    fn multibrot_perturbation_matches_direct_iteration() {
        let kind = FractalKind::Multibrot { power: 3 };
        let params = FractalParams::new(200, 2.0).unwrap();
        let c = ComplexBig::new(BigFloat::with_precision(-0.2, 128), BigFloat::with_precision(0.6, 128));
        let orbit = ReferenceOrbit::build(kind, c, ComplexBig::zero(128), params.max_iterations, 2.0, 10, false)
            .unwrap();
        let delta_c = Complex::new(2e-6, -1e-6);
        let result = iterate_perturbation(
            &kind,
            &orbit,
            delta_c,
            Complex::ZERO,
            0,
            &params,
            DEFAULT_GLITCH_ALPHA,
        );
        let point = Complex::new(-0.2 + 2e-6, 0.6 - 1e-6);
        let direct = iterate_direct(&kind, point, &params, 20);
        assert_eq!(result.result.class(), direct.class());
    }
}
