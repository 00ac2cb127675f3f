use dashu_base::{Abs, Approximation};
use dashu_float::{DBig, FBig};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Arbitrary-precision real number with an explicit, caller-chosen precision.
///
/// Below 64 bits of precision arithmetic runs entirely on `f64` (the common
/// case: overview zoom levels, UI-scale viewports). Above that threshold
/// values are backed by [`dashu_float::FBig`], whose cost scales with the
/// requested precision rather than being paid everywhere. The two
/// representations are interchangeable from the caller's point of view;
/// mixing precisions in a binary op widens to the larger of the two.
#[derive(Clone, Debug)]
pub struct BigFloat {
    value: BigFloatValue,
    precision_bits: usize,
}

#[derive(Clone, Debug)]
enum BigFloatValue {
    F64(f64),
    Arbitrary(FBig),
}

/// Precision below which [`BigFloat`] stores values as a plain `f64`.
pub const F64_FAST_PATH_BITS: usize = 64;

impl BigFloat {
    /// Builds a value from an `f64` at the given precision.
    pub fn with_precision(val: f64, precision_bits: usize) -> Self {
        let value = if precision_bits <= F64_FAST_PATH_BITS {
            BigFloatValue::F64(val)
        } else {
            let fbig = if val == 0.0 {
                FBig::ZERO.with_precision(precision_bits).unwrap()
            } else {
                FBig::try_from(val)
                    .unwrap()
                    .with_precision(precision_bits)
                    .unwrap()
            };
            BigFloatValue::Arbitrary(fbig)
        };

        Self {
            value,
            precision_bits,
        }
    }

    pub fn zero(precision_bits: usize) -> Self {
        Self::with_precision(0.0, precision_bits)
    }

    pub fn one(precision_bits: usize) -> Self {
        Self::with_precision(1.0, precision_bits)
    }

    pub fn precision_bits(&self) -> usize {
        self.precision_bits
    }

    /// Lossy projection to `f64`, for display and as the seed of the
    /// delta-coordinate iteration loops that run entirely in `f64`.
    pub fn to_f64(&self) -> f64 {
        match &self.value {
            BigFloatValue::F64(v) => *v,
            BigFloatValue::Arbitrary(v) => v.to_f64().value(),
        }
    }

    /// Parses a decimal string (e.g. `"-1.25e-600"`) at the given precision.
    ///
    /// Values outside `f64`'s range are only reachable through this path;
    /// `with_precision` requires an `f64` to start from.
    pub fn from_str_with_precision(val: &str, precision_bits: usize) -> crate::Result<Self> {
        if precision_bits <= F64_FAST_PATH_BITS {
            let f = val
                .parse::<f64>()
                .map_err(|_| CoreError::InvalidInput(format!("not a valid number: {val}")))?;
            return Ok(Self::with_precision(f, precision_bits));
        }

        let dbig = val
            .parse::<DBig>()
            .map_err(|_| CoreError::InvalidInput(format!("not a valid decimal: {val}")))?;

        let fbig_halfaway = match dbig.with_base_and_precision::<2>(precision_bits) {
            Approximation::Exact(v) => v,
            Approximation::Inexact(v, _) => v,
        };
        let fbig = fbig_halfaway.with_rounding::<dashu_float::round::mode::Zero>();

        Ok(Self {
            value: BigFloatValue::Arbitrary(fbig),
            precision_bits,
        })
    }

    pub fn add(&self, other: &Self) -> Self {
        let precision_bits = self.precision_bits.max(other.precision_bits);
        let value = match (&self.value, &other.value) {
            (BigFloatValue::F64(a), BigFloatValue::F64(b)) if precision_bits <= F64_FAST_PATH_BITS => {
                BigFloatValue::F64(a + b)
            }
            _ => BigFloatValue::Arbitrary(&self.to_fbig() + &other.to_fbig()),
        };
        Self {
            value,
            precision_bits,
        }
    }

    pub fn sub(&self, other: &Self) -> Self {
        let precision_bits = self.precision_bits.max(other.precision_bits);
        let value = match (&self.value, &other.value) {
            (BigFloatValue::F64(a), BigFloatValue::F64(b)) if precision_bits <= F64_FAST_PATH_BITS => {
                BigFloatValue::F64(a - b)
            }
            _ => BigFloatValue::Arbitrary(&self.to_fbig() - &other.to_fbig()),
        };
        Self {
            value,
            precision_bits,
        }
    }

    pub fn mul(&self, other: &Self) -> Self {
        let precision_bits = self.precision_bits.max(other.precision_bits);
        let value = match (&self.value, &other.value) {
            (BigFloatValue::F64(a), BigFloatValue::F64(b)) if precision_bits <= F64_FAST_PATH_BITS => {
                BigFloatValue::F64(a * b)
            }
            _ => BigFloatValue::Arbitrary(&self.to_fbig() * &other.to_fbig()),
        };
        Self {
            value,
            precision_bits,
        }
    }

    pub fn neg(&self) -> Self {
        match &self.value {
            BigFloatValue::F64(v) => Self {
                value: BigFloatValue::F64(-v),
                precision_bits: self.precision_bits,
            },
            BigFloatValue::Arbitrary(v) => Self {
                value: BigFloatValue::Arbitrary(-v.clone()),
                precision_bits: self.precision_bits,
            },
        }
    }

    pub fn abs(&self) -> Self {
        match &self.value {
            BigFloatValue::F64(v) => Self {
                value: BigFloatValue::F64(v.abs()),
                precision_bits: self.precision_bits,
            },
            BigFloatValue::Arbitrary(v) => Self {
                value: BigFloatValue::Arbitrary(v.clone().abs()),
                precision_bits: self.precision_bits,
            },
        }
    }

    /// `-1`, `0`, or `1` without the precision of a full `PartialOrd`.
    pub fn sign(&self) -> i32 {
        match &self.value {
            BigFloatValue::F64(v) => {
                if *v > 0.0 {
                    1
                } else if *v < 0.0 {
                    -1
                } else {
                    0
                }
            }
            BigFloatValue::Arbitrary(v) => {
                if v.is_zero() {
                    0
                } else if v < &FBig::ZERO {
                    -1
                } else {
                    1
                }
            }
        }
    }

    fn to_fbig(&self) -> FBig {
        match &self.value {
            BigFloatValue::F64(v) => {
                if *v == 0.0 {
                    FBig::ZERO.with_precision(self.precision_bits).unwrap()
                } else {
                    FBig::try_from(*v)
                        .unwrap()
                        .with_precision(self.precision_bits)
                        .unwrap()
                }
            }
            BigFloatValue::Arbitrary(v) => v.clone(),
        }
    }
}

impl PartialEq for BigFloat {
    fn eq(&self, other: &Self) -> bool {
        match (&self.value, &other.value) {
            (BigFloatValue::F64(a), BigFloatValue::F64(b)) => a == b,
            _ => self.to_fbig() == other.to_fbig(),
        }
    }
}

impl PartialOrd for BigFloat {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        match (&self.value, &other.value) {
            (BigFloatValue::F64(a), BigFloatValue::F64(b)) => a.partial_cmp(b),
            _ => self.to_fbig().partial_cmp(&other.to_fbig()),
        }
    }
}

impl std::fmt::Display for BigFloat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.value {
            BigFloatValue::F64(v) => write!(f, "{v}"),
            BigFloatValue::Arbitrary(v) => write!(f, "{v}"),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct BigFloatSerde {
    value: String,
    precision_bits: usize,
}

impl Serialize for BigFloat {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let value = match &self.value {
            BigFloatValue::F64(v) => v.to_string(),
            BigFloatValue::Arbitrary(v) => v.to_string(),
        };
        BigFloatSerde {
            value,
            precision_bits: self.precision_bits,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for BigFloat {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = BigFloatSerde::deserialize(deserializer)?;
        BigFloat::from_str_with_precision(&raw.value, raw.precision_bits)
            .map_err(|e| serde::de::Error::custom(e.to_string()))
    }
}
