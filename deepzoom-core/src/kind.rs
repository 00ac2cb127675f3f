use serde::{Deserialize, Serialize};

use crate::complex::Complex;
use crate::complex_big::ComplexBig;

/// The 2D fractal formula families the compute core iterates directly.
///
/// 3D kinds (Mandelbulb, Mandelbox, Kleinian, ...) are part of the wider
/// fractal taxonomy but are forwarded whole to the external raymarching
/// collaborator; the compute core never iterates them and this enum does
/// not carry variants for them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FractalKind {
    /// `z_{n+1} = z_n² + c`, `z_0 = 0`, `c` is the pixel's coordinate.
    Mandelbrot,
    /// `z_{n+1} = z_n² + c`, `c` fixed, `z_0` is the pixel's coordinate.
    Julia { c_re: f64, c_im: f64 },
    /// `z_{n+1} = (|Re z_n| + i|Im z_n|)² + c`, `z_0 = 0`.
    BurningShip,
    /// `z_{n+1} = z_n^power + c`, `z_0 = 0`, `power` an integer ≥ 2.
    Multibrot { power: i32 },
}

impl FractalKind {
    /// The fixed `c` parameter for kinds whose iteration constant does not
    /// depend on the pixel (`Julia`); `None` for kinds where `c` varies per
    /// pixel (`Mandelbrot`, `BurningShip`, `Multibrot`).
    pub fn fixed_c(&self) -> Option<Complex> {
        match self {
            FractalKind::Julia { c_re, c_im } => Some(Complex::new(*c_re, *c_im)),
            _ => None,
        }
    }

    /// `true` for kinds where the pixel coordinate seeds `z_0` rather than `c`.
    pub fn pixel_seeds_z0(&self) -> bool {
        matches!(self, FractalKind::Julia { .. })
    }

    /// One iteration step in `f64`, used by the direct iterator and by the
    /// perturbation delta recurrence's reference term.
    #[inline]
    pub fn step(&self, z: Complex, c: Complex) -> Complex {
        match self {
            FractalKind::Mandelbrot | FractalKind::Julia { .. } => {
                Complex::new(z.re * z.re - z.im * z.im + c.re, 2.0 * z.re * z.im + c.im)
            }
            FractalKind::BurningShip => {
                let folded = Complex::new(z.re.abs(), z.im.abs());
                Complex::new(
                    folded.re * folded.re - folded.im * folded.im + c.re,
                    2.0 * folded.re * folded.im + c.im,
                )
            }
            FractalKind::Multibrot { power } => complex_powi(z, *power) + c,
        }
    }

    /// One iteration step at arbitrary precision, used by the reference
    /// orbit engine.
    pub fn step_big(&self, z: &ComplexBig, c: &ComplexBig) -> ComplexBig {
        match self {
            FractalKind::Mandelbrot | FractalKind::Julia { .. } => z.mul(z).add(c),
            FractalKind::BurningShip => {
                let folded = ComplexBig::new(z.re.abs(), z.im.abs());
                folded.mul(&folded).add(c)
            }
            FractalKind::Multibrot { power } => complex_powi_big(z, *power).add(c),
        }
    }

    /// `true` when this kind's step function is the plain degree-2
    /// Mandelbrot recurrence the series-approximation recurrences in
    /// `series.rs` are derived for.
    pub fn is_degree_two_analytic(&self) -> bool {
        matches!(
            self,
            FractalKind::Mandelbrot | FractalKind::Julia { .. } | FractalKind::Multibrot { power: 2 }
        )
    }

    /// Closed-form "definitely interior" fast rejection, where available.
    /// Only defined for the plain Mandelbrot kind (main cardioid + period-2 bulb).
    pub fn fast_reject_interior(&self, c: Complex) -> bool {
        match self {
            FractalKind::Mandelbrot => in_cardioid(c.re, c.im) || in_period2_bulb(c.re, c.im),
            _ => false,
        }
    }

    /// Advances a pixel's perturbation delta one step against the reference
    /// orbit term `z_ref = Z_n`, the kind-specific generalization of
    /// `δz_{n+1} = 2·Z_n·δz_n + δz_n² + δc`.
    ///
    /// `Mandelbrot`/`Julia` use the recurrence unchanged. `Multibrot`
    /// generalizes it via the binomial expansion of `(Z_n + δz_n)^power`
    /// with the `Z_n^power` term dropped (absorbed by the reference orbit
    /// itself); at `power == 2` this reduces exactly to the quadratic
    /// formula above. `BurningShip` folds both the reference term and the
    /// delta by the reference's own per-component sign before applying the
    /// quadratic recurrence to the folded pair — exact as long as the true
    /// orbit `Z_n + δz_n` does not cross a fold axis that `Z_n` alone did
    /// not, which is the same approximation the fold makes for any other
    /// perturbation-based Burning Ship renderer.
    #[inline]
    pub fn step_delta(&self, z_ref: Complex, delta_z: Complex, delta_c: Complex) -> Complex {
        match self {
            FractalKind::Mandelbrot | FractalKind::Julia { .. } => {
                z_ref * delta_z * 2.0 + delta_z * delta_z + delta_c
            }
            FractalKind::BurningShip => {
                let sign = Complex::new(z_ref.re.signum(), z_ref.im.signum());
                let folded_ref = Complex::new(z_ref.re.abs(), z_ref.im.abs());
                let folded_delta = Complex::new(delta_z.re * sign.re, delta_z.im * sign.im);
                folded_ref * folded_delta * 2.0 + folded_delta * folded_delta + delta_c
            }
            FractalKind::Multibrot { power } => step_delta_multibrot(z_ref, delta_z, delta_c, *power),
        }
    }
}

/// Binomial expansion of `(Z_n + δz_n)^power - Z_n^power`, the term the
/// `power`-th degree perturbation recurrence needs: `Σ_{k=1}^{power}
/// C(power,k)·Z_n^{power-k}·δz_n^k`. Expanded term by term rather than
/// computed as `(Z_n+δz_n)^power - Z_n^power` directly — that subtraction
/// would cancel back out the precision perturbation exists to preserve
/// whenever `δz_n` is tiny relative to `Z_n`.
fn step_delta_multibrot(z_ref: Complex, delta_z: Complex, delta_c: Complex, power: i32) -> Complex {
    debug_assert!(power >= 2);
    let mut sum = Complex::ZERO;
    let mut delta_pow = Complex::new(1.0, 0.0);
    let mut coeff = 1.0_f64;
    for k in 1..=power {
        coeff = coeff * (power - k + 1) as f64 / k as f64;
        delta_pow = delta_pow * delta_z;
        let z_pow = complex_powi_nonneg(z_ref, power - k);
        sum = sum + z_pow * delta_pow * coeff;
    }
    sum + delta_c
}

/// Non-negative integer power of a complex number, including the `0`
/// (identity) and `1` cases `complex_powi` does not handle.
fn complex_powi_nonneg(z: Complex, power: i32) -> Complex {
    debug_assert!(power >= 0);
    match power {
        0 => Complex::new(1.0, 0.0),
        1 => z,
        _ => complex_powi(z, power),
    }
}

#[inline]
fn in_cardioid(re: f64, im: f64) -> bool {
    let im2 = im * im;
    let q = (re - 0.25) * (re - 0.25) + im2;
    q * (q + (re - 0.25)) <= 0.25 * im2
}

#[inline]
fn in_period2_bulb(re: f64, im: f64) -> bool {
    (re + 1.0) * (re + 1.0) + im * im <= 0.0625
}

/// Integer power of a complex number by repeated multiplication.
/// `power` is expected to be small (2–8 in practice); a general binary
/// exponentiation would only pay off for much larger exponents.
fn complex_powi(z: Complex, power: i32) -> Complex {
    debug_assert!(power >= 2);
    let mut acc = z;
    for _ in 1..power {
        acc = acc * z;
    }
    acc
}

fn complex_powi_big(z: &ComplexBig, power: i32) -> ComplexBig {
    debug_assert!(power >= 2);
    let mut acc = z.clone();
    for _ in 1..power {
        acc = acc.mul(z);
    }
    acc
}
