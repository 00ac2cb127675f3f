use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::pixelfield::ComplexityMap;

/// Growth law applied to `log10(zoom)` when deriving a recommended
/// `maxIterations`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalingLaw {
    Linear,
    Logarithmic,
    Exponential,
    Sqrt,
}

impl ScalingLaw {
    fn f(&self, x: f64) -> f64 {
        match self {
            ScalingLaw::Linear => x,
            ScalingLaw::Logarithmic => x * (x + 2.0).log2(),
            ScalingLaw::Exponential => 1.1f64.powf(x),
            ScalingLaw::Sqrt => x.max(0.0).sqrt() * x,
        }
    }
}

/// Named quality presets, each carrying default (base, factor, max,
/// scaling law, periodicity interval).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdaptivePreset {
    Fast,
    Balanced,
    Quality,
    Extreme,
}

#[derive(Debug, Clone, Copy)]
pub struct PresetParams {
    pub base: u32,
    pub factor: f64,
    pub max: u32,
    pub scaling_law: ScalingLaw,
    pub periodicity_interval: u32,
}

impl AdaptivePreset {
    pub fn params(&self) -> PresetParams {
        match self {
            AdaptivePreset::Fast => PresetParams {
                base: 128,
                factor: 40.0,
                max: 2_000,
                scaling_law: ScalingLaw::Linear,
                periodicity_interval: 20,
            },
            AdaptivePreset::Balanced => PresetParams {
                base: 256,
                factor: 80.0,
                max: 10_000,
                scaling_law: ScalingLaw::Logarithmic,
                periodicity_interval: 20,
            },
            AdaptivePreset::Quality => PresetParams {
                base: 512,
                factor: 150.0,
                max: 50_000,
                scaling_law: ScalingLaw::Logarithmic,
                periodicity_interval: 30,
            },
            AdaptivePreset::Extreme => PresetParams {
                base: 1_024,
                factor: 300.0,
                max: 500_000,
                scaling_law: ScalingLaw::Exponential,
                periodicity_interval: 50,
            },
        }
    }
}

/// Target-frame-rate scaling window size (frames).
pub const FRAME_HISTORY_WINDOW: usize = 10;

/// Derives a recommended `maxIterations` from zoom, a preset, optional
/// frame-rate history, and an optional [`ComplexityMap`].
#[derive(Debug, Clone)]
pub struct AdaptiveController {
    preset: AdaptivePreset,
    scaling_law: ScalingLaw,
    target_frame_ms: f64,
    frame_history: VecDeque<f64>,
}

impl AdaptiveController {
    pub fn new(preset: AdaptivePreset) -> Self {
        Self {
            preset,
            scaling_law: preset.params().scaling_law,
            target_frame_ms: 1000.0 / 30.0,
            frame_history: VecDeque::with_capacity(FRAME_HISTORY_WINDOW),
        }
    }

    pub fn with_scaling_law(mut self, law: ScalingLaw) -> Self {
        self.scaling_law = law;
        self
    }

    pub fn with_target_frame_ms(mut self, target_frame_ms: f64) -> Self {
        self.target_frame_ms = target_frame_ms;
        self
    }

    /// Record a completed frame's wall-clock time, keeping the most recent
    /// [`FRAME_HISTORY_WINDOW`] samples.
    pub fn record_frame_time(&mut self, elapsed_ms: f64) {
        if self.frame_history.len() == FRAME_HISTORY_WINDOW {
            self.frame_history.pop_front();
        }
        self.frame_history.push_back(elapsed_ms);
    }

    /// `iters_base(Z) = base + factor · f(log10(Z))`, clamped to `[base, max]`.
    pub fn base_iterations(&self, zoom: f64) -> u32 {
        let params = self.preset.params();
        let log_zoom = zoom.abs().max(1.0).log10();
        let raw = params.base as f64 + params.factor * self.scaling_law.f(log_zoom);
        raw.clamp(params.base as f64, params.max as f64) as u32
    }

    /// Frame-time-history scaling factor. `frame_history`/`target_frame_ms`
    /// are frame *times* in ms (lower is faster), the inverse of spec.md
    /// §4.7's frame-*rate* formulation (higher is faster) — so a frame time
    /// above 1.5·target (the render is running slow) scales down (floor
    /// 0.5), and a frame time below 0.8·target (running fast) scales up
    /// (ceiling 1.5), each via the inverted ratio `target/avg`; otherwise 1.0.
    fn frame_rate_factor(&self) -> f64 {
        if self.frame_history.is_empty() {
            return 1.0;
        }
        let avg: f64 = self.frame_history.iter().sum::<f64>() / self.frame_history.len() as f64;
        let ratio = self.target_frame_ms / avg;
        if avg > 1.5 * self.target_frame_ms {
            ratio.max(0.5)
        } else if avg < 0.8 * self.target_frame_ms {
            ratio.min(1.5)
        } else {
            1.0
        }
    }

    /// Final recommended iteration count at `zoom`, optionally biased at a
    /// specific pixel by a [`ComplexityMap`].
    pub fn recommend(&self, zoom: f64) -> u32 {
        let params = self.preset.params();
        let base = self.base_iterations(zoom) as f64 * self.frame_rate_factor();
        base.clamp(params.base as f64, params.max as f64) as u32
    }

    /// Like [`recommend`](Self::recommend) but biased by a complexity cell.
    pub fn recommend_at(&self, zoom: f64, complexity: &ComplexityMap, x: u32, y: u32) -> u32 {
        let params = self.preset.params();
        let base = self.recommend(zoom) as f64 * complexity.multiplier_at(x, y) as f64;
        base.clamp(params.base as f64, params.max as f64) as u32
    }

    pub fn periodicity_interval(&self) -> u32 {
        self.preset.params().periodicity_interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixelfield::PixelField;

    #[test]
    fn base_iterations_clamped_to_preset_bounds() {
        let controller = AdaptiveController::new(AdaptivePreset::Balanced);
        let low = controller.base_iterations(1.0);
        let params = AdaptivePreset::Balanced.params();
        assert_eq!(low, params.base);
        let high = controller.base_iterations(1e300);
        assert!(high <= params.max);
    }

    #[test]
    fn deeper_zoom_yields_more_iterations_for_logarithmic_law() {
        let controller = AdaptiveController::new(AdaptivePreset::Balanced);
        let shallow = controller.base_iterations(1e3);
        let deep = controller.base_iterations(1e100);
        assert!(deep >= shallow);
    }

    #[test]
    fn frame_rate_history_scales_down_when_slow() {
        let mut controller = AdaptiveController::new(AdaptivePreset::Balanced).with_target_frame_ms(33.0);
        for _ in 0..FRAME_HISTORY_WINDOW {
            controller.record_frame_time(200.0);
        }
        let scaled = controller.recommend(1e10);
        let unscaled = controller.base_iterations(1e10);
        assert!(scaled <= unscaled);
    }

    #[test]
    fn frame_rate_history_scales_up_when_fast() {
        let mut controller = AdaptiveController::new(AdaptivePreset::Balanced).with_target_frame_ms(33.0);
        for _ in 0..FRAME_HISTORY_WINDOW {
            controller.record_frame_time(5.0);
        }
        let scaled = controller.recommend(1e10);
        let unscaled = controller.base_iterations(1e10);
        assert!(scaled >= unscaled);
    }

    #[test]
    fn complexity_bias_increases_recommendation_in_busy_cells() {
        let controller = AdaptiveController::new(AdaptivePreset::Balanced);
        let mut field = PixelField::new(64, 64);
        for i in 0..field.iterations.len() {
            field.iterations[i] = if i % 2 == 0 { 10.0 } else { 500.0 };
            field.escaped[i] = (i % 2) as u8;
        }
        let complexity = ComplexityMap::build(&field);
        let plain = controller.recommend(1e5);
        let biased = controller.recommend_at(1e5, &complexity, 10, 10);
        assert!(biased >= plain);
    }

    #[test]
    fn presets_have_increasing_max() {
        assert!(AdaptivePreset::Fast.params().max < AdaptivePreset::Balanced.params().max);
        assert!(AdaptivePreset::Balanced.params().max < AdaptivePreset::Quality.params().max);
        assert!(AdaptivePreset::Quality.params().max < AdaptivePreset::Extreme.params().max);
    }
}
