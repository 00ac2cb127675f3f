use crate::complex::Complex;
use crate::complex_big::ComplexBig;
use crate::error::CoreError;
use crate::kind::FractalKind;

/// Default checkpoint interval `K`: every `K` iterations a high-precision
/// snapshot of `Z` is retained, for rebasing and fidelity checks.
pub const DEFAULT_CHECKPOINT_INTERVAL: usize = 100;

/// A high-precision orbit `Z[0..N]` computed once at a chosen reference
/// point, plus sparse checkpoints for rebasing and an optional derivative
/// sequence for distance estimation.
///
/// For Mandelbrot-family kinds the reference point is the pixel-varying
/// parameter `c`; for Julia kinds it is the pixel-varying initial value
/// `z_0` (the kind's `c` is fixed and supplied separately). Either way
/// `step_big`/`step` on [`FractalKind`] is kind-agnostic from here on.
#[derive(Debug, Clone)]
pub struct ReferenceOrbit {
    /// `Z[n]` projected to `f64`, one entry per retained iteration.
    pub z: Vec<Complex>,
    /// Derivative sequence `dZ[n] = 2·Z_{n-1}·dZ_{n-1} + 1`, if requested.
    pub dz: Option<Vec<Complex>>,
    /// Sparse high-precision checkpoints `(iteration, Z_hp)` every
    /// `checkpoint_interval` iterations.
    pub checkpoints: Vec<(usize, ComplexBig)>,
    pub escaped: bool,
    pub escape_iteration: Option<usize>,
    reference_point: ComplexBig,
    max_iterations: u32,
    checkpoint_interval: usize,
    kind: FractalKind,
}

impl ReferenceOrbit {
    /// Builds a reference orbit for `kind` from the fixed iteration
    /// constant `c` (BigFloat precision) and initial value `z0`.
    pub fn build(
        kind: FractalKind,
        c: ComplexBig,
        z0: ComplexBig,
        max_iterations: u32,
        escape_radius: f64,
        checkpoint_interval: usize,
        track_derivative: bool,
    ) -> Result<Self, CoreError> {
        let checkpoint_interval = checkpoint_interval.max(1);
        let escape_radius_sq = escape_radius * escape_radius;

        let mut z_big = z0.clone();
        let mut z = Vec::with_capacity(max_iterations as usize + 1);
        let mut checkpoints = Vec::new();
        let mut dz = track_derivative.then(|| Vec::with_capacity(max_iterations as usize + 1));
        let mut dz_f64 = Complex::ZERO;

        let mut escaped = false;
        let mut escape_iteration = None;

        for n in 0..=max_iterations as usize {
            z.push(z_big.to_complex());
            if n % checkpoint_interval == 0 {
                checkpoints.push((n, z_big.clone()));
            }
            if let Some(seq) = dz.as_mut() {
                seq.push(dz_f64);
                dz_f64 = z[n] * dz_f64 * 2.0 + Complex::new(1.0, 0.0);
            }

            let norm_sq = z_big.norm_sq().to_f64();
            if !norm_sq.is_finite() {
                return Err(CoreError::PrecisionOverflow);
            }
            if norm_sq > escape_radius_sq {
                escaped = true;
                escape_iteration = Some(n);
                break;
            }
            if n == max_iterations as usize {
                break;
            }

            z_big = kind.step_big(&z_big, &c);
        }

        Ok(Self {
            z,
            dz,
            checkpoints,
            escaped,
            escape_iteration,
            reference_point: c,
            max_iterations,
            checkpoint_interval,
            kind,
        })
    }

    /// `true` if this orbit may be reused as-is (or extended) for a new
    /// request against the same reference point / checkpoint interval /
    /// fractal kind, where only `max_iterations` differs.
    pub fn reusable_for(
        &self,
        kind: FractalKind,
        c: &ComplexBig,
        checkpoint_interval: usize,
    ) -> bool {
        self.kind == kind
            && self.checkpoint_interval == checkpoint_interval.max(1)
            && *c == self.reference_point
    }

    /// Reuses `existing` unchanged, extends its `z`/`dz` prefix, or
    /// rebuilds from scratch, whichever is cheapest for the requested
    /// `(kind, c, max_iterations, checkpoint_interval)`.
    ///
    /// Reuse requires an exact match on reference point, kind and
    /// checkpoint interval; extension additionally requires the existing
    /// orbit to not have already escaped and to track `dz` if the caller
    /// now wants it (an orbit built without derivative tracking can't
    /// retroactively grow one — that falls back to a full rebuild).
    pub fn reuse_or_rebuild(
        existing: Option<&ReferenceOrbit>,
        kind: FractalKind,
        c: ComplexBig,
        z0: ComplexBig,
        max_iterations: u32,
        escape_radius: f64,
        checkpoint_interval: usize,
        track_derivative: bool,
    ) -> Result<Self, CoreError> {
        let checkpoint_interval = checkpoint_interval.max(1);
        if let Some(prev) = existing {
            if prev.reusable_for(kind, &c, checkpoint_interval) && (!track_derivative || prev.dz.is_some()) {
                if prev.escaped || prev.max_iterations >= max_iterations {
                    return Ok(prev.clone());
                }
                return prev.extend(max_iterations, escape_radius);
            }
        }
        Self::build(kind, c, z0, max_iterations, escape_radius, checkpoint_interval, track_derivative)
    }

    /// Resumes BigFloat iteration from the last checkpoint rather than
    /// iteration 0 — the checkpoint is at most `checkpoint_interval` steps
    /// behind the old tail, so the expensive high-precision work done to
    /// reach it is never redone.
    fn extend(&self, max_iterations: u32, escape_radius: f64) -> Result<Self, CoreError> {
        let escape_radius_sq = escape_radius * escape_radius;
        let &(ckpt_n, ref ckpt_z) = self
            .checkpoints
            .last()
            .expect("build() always records a checkpoint at n=0");

        let mut z = self.z[..=ckpt_n].to_vec();
        let mut checkpoints = self.checkpoints.clone();
        let dz: Option<Vec<Complex>> = self.dz.as_ref().map(|d| d[..=ckpt_n].to_vec());
        let mut dz_f64 = dz
            .as_ref()
            .map_or(Complex::ZERO, |resumed| z[ckpt_n] * resumed[ckpt_n] * 2.0 + Complex::new(1.0, 0.0));
        let mut dz = dz;

        let mut z_big = ckpt_z.clone();
        let mut escaped = false;
        let mut escape_iteration = None;

        for n in (ckpt_n + 1)..=max_iterations as usize {
            z_big = self.kind.step_big(&z_big, &self.reference_point);
            z.push(z_big.to_complex());
            if n % self.checkpoint_interval == 0 {
                checkpoints.push((n, z_big.clone()));
            }
            if let Some(seq) = dz.as_mut() {
                seq.push(dz_f64);
                dz_f64 = z[n] * dz_f64 * 2.0 + Complex::new(1.0, 0.0);
            }

            let norm_sq = z_big.norm_sq().to_f64();
            if !norm_sq.is_finite() {
                return Err(CoreError::PrecisionOverflow);
            }
            if norm_sq > escape_radius_sq {
                escaped = true;
                escape_iteration = Some(n);
                break;
            }
        }

        Ok(Self {
            z,
            dz,
            checkpoints,
            escaped,
            escape_iteration,
            reference_point: self.reference_point.clone(),
            max_iterations,
            checkpoint_interval: self.checkpoint_interval,
            kind: self.kind,
        })
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Nearest checkpoint at or before iteration `n`, for rebasing.
    pub fn checkpoint_at_or_before(&self, n: usize) -> Option<&(usize, ComplexBig)> {
        self.checkpoints.iter().rev().find(|(i, _)| *i <= n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bigfloat::BigFloat;

    fn big(re: f64, im: f64, bits: usize) -> ComplexBig {
        ComplexBig::new(BigFloat::with_precision(re, bits), BigFloat::with_precision(im, bits))
    }

    #[test]
    fn orbit_at_origin_never_escapes_within_bound() {
        let orbit = ReferenceOrbit::build(
            FractalKind::Mandelbrot,
            big(0.0, 0.0, 64),
            ComplexBig::zero(64),
            100,
            2.0,
            10,
            false,
        )
        .unwrap();
        assert!(!orbit.escaped);
        assert_eq!(orbit.z.len(), 101);
    }

    #[test]
    fn orbit_escapes_and_truncates_sequence() {
        let orbit = ReferenceOrbit::build(
            FractalKind::Mandelbrot,
            big(5.0, 0.0, 64),
            ComplexBig::zero(64),
            1000,
            2.0,
            10,
            false,
        )
        .unwrap();
        assert!(orbit.escaped);
        let esc = orbit.escape_iteration.unwrap();
        assert_eq!(orbit.z.len(), esc + 1);
    }

    #[test]
    fn fidelity_f64_projection_matches_bigfloat_within_ulp() {
        let c = big(-0.75, 0.1, 256);
        let orbit = ReferenceOrbit::build(
            FractalKind::Mandelbrot,
            c.clone(),
            ComplexBig::zero(256),
            50,
            2.0,
            5,
            false,
        )
        .unwrap();
        for (n, z_hp) in &orbit.checkpoints {
            let projected = z_hp.to_complex();
            let stored = orbit.z[*n];
            assert!((projected.re - stored.re).abs() < 1e-9);
            assert!((projected.im - stored.im).abs() < 1e-9);
        }
    }

    #[test]
    fn checkpoints_are_sparse() {
        let orbit = ReferenceOrbit::build(
            FractalKind::Mandelbrot,
            big(0.0, 0.0, 64),
            ComplexBig::zero(64),
            100,
            2.0,
            25,
            false,
        )
        .unwrap();
        assert_eq!(orbit.checkpoints.len(), 5); // n = 0, 25, 50, 75, 100
    }

    #[test]
    fn derivative_sequence_tracked_when_requested() {
        let orbit = ReferenceOrbit::build(
            FractalKind::Mandelbrot,
            big(-0.75, 0.1, 64),
            ComplexBig::zero(64),
            30,
            2.0,
            10,
            true,
        )
        .unwrap();
        assert_eq!(orbit.dz.as_ref().unwrap().len(), orbit.z.len());
    }

    #[test]
    fn reusable_for_same_reference_point() {
        let c = big(-0.5, 0.2, 64);
        let orbit =
            ReferenceOrbit::build(FractalKind::Mandelbrot, c.clone(), ComplexBig::zero(64), 50, 2.0, 10, false)
                .unwrap();
        assert!(orbit.reusable_for(FractalKind::Mandelbrot, &c, 10));
        assert!(!orbit.reusable_for(FractalKind::BurningShip, &c, 10));
    }

    #[test]
    fn julia_orbit_uses_pixel_as_z0_and_fixed_c() {
        let kind = FractalKind::Julia { c_re: -0.7, c_im: 0.27015 };
        let c = ComplexBig::from_complex(kind.fixed_c().unwrap(), 64);
        let z0 = big(0.0, 0.0, 64);
        let orbit = ReferenceOrbit::build(kind, c, z0, 200, 2.0, 10, false).unwrap();
        assert!(orbit.z.len() > 1);
    }
}
