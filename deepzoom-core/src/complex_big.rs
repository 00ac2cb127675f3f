use serde::{Deserialize, Serialize};

use crate::bigfloat::BigFloat;
use crate::complex::Complex;

/// A complex number using [`BigFloat`] components.
///
/// Mirrors [`Complex`], but at the arbitrary precision carried by each
/// component's `precision_bits`. This is the representation used for
/// viewport centers and reference-orbit points; the hot per-pixel loops
/// work in `f64` deltas from these, never in `ComplexBig` directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplexBig {
    pub re: BigFloat,
    pub im: BigFloat,
}

impl ComplexBig {
    pub fn new(re: BigFloat, im: BigFloat) -> Self {
        Self { re, im }
    }

    pub fn zero(precision_bits: usize) -> Self {
        Self {
            re: BigFloat::zero(precision_bits),
            im: BigFloat::zero(precision_bits),
        }
    }

    pub fn precision_bits(&self) -> usize {
        self.re.precision_bits().max(self.im.precision_bits())
    }

    /// `re² + im²`, at this value's precision.
    pub fn norm_sq(&self) -> BigFloat {
        self.re.mul(&self.re).add(&self.im.mul(&self.im))
    }

    /// Downcasts to `f64` complex (lossy, used to seed the delta-coordinate loop).
    pub fn to_complex(&self) -> Complex {
        Complex::new(self.re.to_f64(), self.im.to_f64())
    }

    pub fn add(&self, other: &Self) -> Self {
        Self {
            re: self.re.add(&other.re),
            im: self.im.add(&other.im),
        }
    }

    pub fn sub(&self, other: &Self) -> Self {
        Self {
            re: self.re.sub(&other.re),
            im: self.im.sub(&other.im),
        }
    }

    pub fn mul(&self, other: &Self) -> Self {
        Self {
            re: self.re.mul(&other.re).sub(&self.im.mul(&other.im)),
            im: self.re.mul(&other.im).add(&self.im.mul(&other.re)),
        }
    }

    pub fn neg(&self) -> Self {
        Self {
            re: self.re.neg(),
            im: self.im.neg(),
        }
    }

    /// Builds a `ComplexBig` from an `f64` complex at the given precision.
    pub fn from_complex(c: Complex, precision_bits: usize) -> Self {
        Self {
            re: BigFloat::with_precision(c.re, precision_bits),
            im: BigFloat::with_precision(c.im, precision_bits),
        }
    }
}

impl PartialEq for ComplexBig {
    fn eq(&self, other: &Self) -> bool {
        self.re == other.re && self.im == other.im
    }
}

impl std::fmt::Display for ComplexBig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} + {}i", self.re, self.im)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cbig(re: f64, im: f64, bits: usize) -> ComplexBig {
        ComplexBig::new(
            BigFloat::with_precision(re, bits),
            BigFloat::with_precision(im, bits),
        )
    }

    #[test]
    fn from_complex_roundtrip() {
        let c = Complex::new(3.14, -2.71);
        let big = ComplexBig::from_complex(c, 256);
        let back = big.to_complex();
        assert!((back.re - c.re).abs() < 1e-12);
        assert!((back.im - c.im).abs() < 1e-12);
    }

    #[test]
    fn addition() {
        let a = cbig(1.0, 2.0, 64);
        let b = cbig(3.0, 4.0, 64);
        let c = a.add(&b);
        assert_eq!(c.re.to_f64(), 4.0);
        assert_eq!(c.im.to_f64(), 6.0);
    }

    #[test]
    fn multiplication_matches_complex() {
        // (1 + 2i)(3 + 4i) = -5 + 10i
        let a = cbig(1.0, 2.0, 64);
        let b = cbig(3.0, 4.0, 64);
        let c = a.mul(&b);
        assert_eq!(c.re.to_f64(), -5.0);
        assert_eq!(c.im.to_f64(), 10.0);
    }

    #[test]
    fn norm_sq() {
        let a = cbig(3.0, 4.0, 64);
        assert_eq!(a.norm_sq().to_f64(), 25.0);
    }

    #[test]
    fn deep_precision_multiplication_stays_exact() {
        // At 4096 bits, (1 + i)² should be exactly 0 + 2i with no drift.
        let z = cbig(1.0, 1.0, 4096);
        let z2 = z.mul(&z);
        assert_eq!(z2.re.to_f64(), 0.0);
        assert_eq!(z2.im.to_f64(), 2.0);
    }

    #[test]
    fn precision_bits_is_the_max_of_components() {
        let big = ComplexBig::new(BigFloat::with_precision(1.0, 64), BigFloat::with_precision(1.0, 512));
        assert_eq!(big.precision_bits(), 512);
    }
}
