use serde::{Deserialize, Serialize};

use crate::config::CoreConfig;

/// The precision tier selected for a render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrecisionMode {
    Double,
    Perturbation,
    Arbitrary,
}

/// Forces a particular [`PrecisionMode`], bypassing the zoom-threshold table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrecisionOverride {
    Double,
    Perturbation,
    Arbitrary,
}

/// Selects a precision mode and the BigFloat precision (in bits) needed to
/// represent the viewport at `zoom`, per spec.md §4.6's threshold table.
///
/// `zoom` is the `f64` projection of the viewport's zoom (pixels per unit);
/// callers at precision beyond `f64`'s range should prefer `zoom.to_f64()`
/// is still meaningful here because only its base-10 magnitude is used.
pub fn select_precision_mode(zoom: f64, config: &CoreConfig, precision_override: Option<PrecisionOverride>) -> PrecisionMode {
    if let Some(over) = precision_override {
        return match over {
            PrecisionOverride::Double => PrecisionMode::Double,
            PrecisionOverride::Perturbation => PrecisionMode::Perturbation,
            PrecisionOverride::Arbitrary => PrecisionMode::Arbitrary,
        };
    }

    if zoom < config.perturbation_threshold {
        PrecisionMode::Double
    } else if zoom < config.arbitrary_threshold {
        PrecisionMode::Perturbation
    } else {
        PrecisionMode::Arbitrary
    }
}

/// Required BigFloat precision in bits for a render at `zoom`, given the
/// configured safety margin. `P ≥ ceil(log10(zoom)) + safety_margin`
/// decimal digits, converted to bits (`digits × log2(10)`).
pub fn required_precision_bits(zoom: f64, config: &CoreConfig) -> usize {
    let digits = zoom.abs().max(1.0).log10().ceil().max(0.0) as u32 + config.precision_safety_margin;
    let bits = (digits as f64 * std::f64::consts::LOG2_10).ceil() as usize;
    bits.max(deepzoom_core::bigfloat::F64_FAST_PATH_BITS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shallow_zoom_selects_double() {
        let config = CoreConfig::default();
        assert_eq!(select_precision_mode(1000.0, &config, None), PrecisionMode::Double);
    }

    #[test]
    fn mid_zoom_selects_perturbation() {
        let config = CoreConfig::default();
        assert_eq!(select_precision_mode(1e14, &config, None), PrecisionMode::Perturbation);
    }

    #[test]
    fn deep_zoom_selects_arbitrary() {
        let config = CoreConfig::default();
        assert_eq!(select_precision_mode(1e16, &config, None), PrecisionMode::Arbitrary);
    }

    #[test]
    fn override_bypasses_threshold_table() {
        let config = CoreConfig::default();
        assert_eq!(
            select_precision_mode(10.0, &config, Some(PrecisionOverride::Arbitrary)),
            PrecisionMode::Arbitrary
        );
    }

    #[test]
    fn required_precision_grows_with_zoom() {
        let config = CoreConfig::default();
        let low = required_precision_bits(1e13, &config);
        let high = required_precision_bits(1e15, &config);
        assert!(high > low);
    }

    #[test]
    fn required_precision_respects_safety_margin() {
        let mut config = CoreConfig::default();
        config.precision_safety_margin = 0;
        let no_margin = required_precision_bits(1e20, &config);
        config.precision_safety_margin = 20;
        let with_margin = required_precision_bits(1e20, &config);
        assert!(with_margin > no_margin);
    }
}
