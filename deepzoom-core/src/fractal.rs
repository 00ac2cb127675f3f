use crate::error::CoreError;

/// The result of iterating a single point.
///
/// The core engine stores only raw escape data. Smoothing and coloring are
/// deferred to `smoothed_iterations` / the external coloring stage, keeping
/// the hot loop lean.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IterationResult {
    /// The orbit escaped after `iterations` steps.
    /// `norm_sq` is `|z|²` at the moment of escape.
    Escaped { iterations: u32, norm_sq: f64 },

    /// The point is (likely) inside the set — it did not escape within
    /// `max_iterations`, or was detected as periodic.
    Interior,
}

impl IterationResult {
    /// Integer classification for comparing neighbouring pixels (border
    /// tracing, AA boundary detection, glitch detectors).
    #[inline]
    pub fn class(&self) -> u64 {
        match self {
            Self::Escaped { iterations, .. } => *iterations as u64,
            Self::Interior => u64::MAX,
        }
    }

    #[inline]
    pub fn escaped(&self) -> bool {
        matches!(self, Self::Escaped { .. })
    }
}

/// Continuous extension of the integer escape time:
/// `ν = n + 1 − log₂(ln|z| / ln(R))`.
///
/// Lies in `[n, n+1]` for the integer escape iteration `n` by construction
/// (the fractional correction term is in `[0, 1)` for any `|z| > R > 1`).
#[inline]
pub fn smoothed_iterations(iterations: u32, norm_sq: f64, escape_radius: f64) -> f64 {
    let ln_z = 0.5 * norm_sq.ln();
    let ln_r = escape_radius.ln();
    if ln_z <= 0.0 || ln_r <= 0.0 {
        return iterations as f64;
    }
    iterations as f64 + 1.0 - (ln_z / ln_r).log2()
}

/// Parameters controlling fractal iteration.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FractalParams {
    /// Maximum number of iterations before declaring a point interior.
    pub max_iterations: u32,

    /// Bailout radius — if `|z|` exceeds this, the orbit has escaped.
    /// Stored directly; the iteration loop compares against `escape_radius²`.
    pub escape_radius: f64,
}

impl FractalParams {
    pub const DEFAULT_MAX_ITERATIONS: u32 = 256;
    pub const DEFAULT_ESCAPE_RADIUS: f64 = 2.0;

    pub fn new(max_iterations: u32, escape_radius: f64) -> crate::Result<Self> {
        if max_iterations < 1 {
            return Err(CoreError::InvalidMaxIterations(max_iterations));
        }
        if escape_radius <= 0.0 || !escape_radius.is_finite() {
            return Err(CoreError::InvalidEscapeRadius(escape_radius));
        }
        Ok(Self {
            max_iterations,
            escape_radius,
        })
    }

    /// Pre-computed squared escape radius for the inner loop.
    #[inline]
    pub fn escape_radius_sq(&self) -> f64 {
        self.escape_radius * self.escape_radius
    }
}

impl Default for FractalParams {
    fn default() -> Self {
        Self {
            max_iterations: Self::DEFAULT_MAX_ITERATIONS,
            escape_radius: Self::DEFAULT_ESCAPE_RADIUS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params() {
        let p = FractalParams::default();
        assert_eq!(p.max_iterations, 256);
        assert!((p.escape_radius - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn valid_params() {
        let p = FractalParams::new(1000, 4.0).unwrap();
        assert_eq!(p.max_iterations, 1000);
        assert!((p.escape_radius_sq() - 16.0).abs() < f64::EPSILON);
    }

    #[test]
    fn invalid_max_iterations() {
        assert!(FractalParams::new(0, 2.0).is_err());
    }

    #[test]
    fn invalid_escape_radius() {
        assert!(FractalParams::new(256, 0.0).is_err());
        assert!(FractalParams::new(256, -1.0).is_err());
        assert!(FractalParams::new(256, f64::NAN).is_err());
        assert!(FractalParams::new(256, f64::INFINITY).is_err());
    }

    #[test]
    fn smoothed_iterations_bounded_in_unit_interval_above_n() {
        // n = 5, a point that just escaped with |z| somewhat above R.
        let escape_radius = 2.0;
        let norm_sq = 4.2 * 4.2;
        let smooth = smoothed_iterations(5, norm_sq, escape_radius);
        assert!(smooth >= 5.0 && smooth < 6.0, "smooth = {smooth}");
    }

    #[test]
    fn interior_class_is_max() {
        assert_eq!(IterationResult::Interior.class(), u64::MAX);
        assert_eq!(
            IterationResult::Escaped { iterations: 7, norm_sq: 10.0 }.class(),
            7
        );
    }
}
