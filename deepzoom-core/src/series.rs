use crate::complex::Complex;

/// Default number of Taylor terms tracked per coefficient sequence.
pub const DEFAULT_TERMS: usize = 5;

/// Default overflow bound past which a coefficient is treated as diverged.
pub const DEFAULT_OVERFLOW_BOUND: f64 = 1e100;

/// A fitted series approximation: coefficients `A_1(S)..A_T(S)` at the
/// iteration `S` up to which perturbation may safely be skipped.
///
/// Only degree-2 analytic kinds ([`FractalKind::is_degree_two_analytic`])
/// get a non-trivial series; other kinds always report `skip_iter = 0`
/// with a single unit coefficient, meaning "do not skip".
///
/// [`FractalKind::is_degree_two_analytic`]: crate::kind::FractalKind::is_degree_two_analytic
#[derive(Debug, Clone)]
pub struct SeriesApproximation {
    /// `A_1(S), …, A_T(S)`.
    pub coefficients: Vec<Complex>,
    /// Largest iteration index whose predicted `δz` is within tolerance
    /// for every pixel within `disk_radius` of the reference point.
    pub skip_iter: usize,
    /// Set when the coefficients diverged (became non-finite or exceeded
    /// the overflow bound) before any useful skip point was found. The
    /// caller always recovers by using `skip_iter = 0`; this flag is
    /// surfaced only for logging/stats, never as a hard error.
    pub diverged: bool,
}

impl SeriesApproximation {
    /// A trivial approximation that skips nothing — used for fractal kinds
    /// with no closed-form series, and as the fallback on divergence.
    pub fn trivial() -> Self {
        Self {
            coefficients: vec![Complex::new(1.0, 0.0)],
            skip_iter: 0,
            diverged: false,
        }
    }

    /// Evolves the Mandelbrot-family series coefficients alongside a
    /// reference orbit `z` (the `f64` projection `Z[0..N]`), stopping at
    /// the largest iteration whose truncation error is bounded for every
    /// pixel within `disk_radius` of the reference point.
    ///
    /// Recurrence:
    ///   `A_1(n+1) = 2·Z(n)·A_1(n) + 1`
    ///   `A_k(n+1) = 2·Z(n)·A_k(n) + Σ_{j=1..k-1} A_j(n)·A_{k-j}(n)`, k ≥ 2.
    pub fn build(
        z: &[Complex],
        terms: usize,
        disk_radius: f64,
        tolerance: f64,
        overflow_bound: f64,
    ) -> Self {
        let t = terms.max(1);
        let mut a = vec![Complex::ZERO; t];
        a[0] = Complex::new(1.0, 0.0);

        let mut skip_iter = 0usize;
        let mut best = a.clone();
        let mut diverged = false;

        for n in 0..z.len().saturating_sub(1) {
            if a.iter().any(|c| !c.re.is_finite() || !c.im.is_finite() || c.norm() > overflow_bound) {
                diverged = true;
                break;
            }

            let truncation_term = a[t - 1].norm() * disk_radius.powi(t as i32);
            let bound = tolerance * a[0].norm() * disk_radius;
            if !truncation_term.is_finite() || truncation_term > bound {
                break;
            }

            skip_iter = n;
            best = a.clone();

            let zn = z[n];
            let mut next = vec![Complex::ZERO; t];
            next[0] = zn * a[0] * 2.0 + Complex::new(1.0, 0.0);
            for k in 2..=t {
                let mut convolution = Complex::ZERO;
                for j in 1..k {
                    convolution += a[j - 1] * a[k - j - 1];
                }
                next[k - 1] = zn * a[k - 1] * 2.0 + convolution;
            }
            a = next;
        }

        Self {
            coefficients: best,
            skip_iter,
            diverged,
        }
    }

    /// Predicted `δz` at iteration `skip_iter` for a pixel offset `δc`
    /// from the reference point.
    pub fn predict(&self, delta_c: Complex) -> Complex {
        let mut power = Complex::new(1.0, 0.0);
        let mut sum = Complex::ZERO;
        for &a_k in &self.coefficients {
            power = power * delta_c;
            sum += a_k * power;
        }
        sum
    }
}
