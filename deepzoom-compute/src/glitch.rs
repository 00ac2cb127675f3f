use crate::config::CoreConfig;
use crate::pixelfield::{GlitchMap, PixelField};

/// Three-way classification of a surviving glitch cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlitchClass {
    BailoutArtifact,
    PerturbationUnderflow,
    ReferenceOrbitGlitch,
}

/// Correction strategy selected for a classified cluster. `HighPrecision`
/// and `Rebase` route through the same recompute path per spec.md's Open
/// Questions resolution (Rebase subsumes HighPrecision): both pick a new
/// reference point and rebuild the orbit/series, `HighPrecision`
/// additionally raising `precision_bits` first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrectionStrategy {
    Interpolate,
    IncreaseIter,
    HighPrecision,
    Rebase,
}

#[derive(Debug, Clone)]
pub struct GlitchCluster {
    pub pixels: Vec<(u32, u32)>,
    pub class: GlitchClass,
    pub strategy: CorrectionStrategy,
}

impl GlitchCluster {
    pub fn bounding_box(&self) -> (u32, u32, u32, u32) {
        let mut min_x = u32::MAX;
        let mut min_y = u32::MAX;
        let mut max_x = 0;
        let mut max_y = 0;
        for &(x, y) in &self.pixels {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        (min_x, min_y, max_x, max_y)
    }
}

// ---------------------------------------------------------------------------
// Detectors
// ---------------------------------------------------------------------------

/// Detector 1: iteration discontinuity. For each escaped pixel with all 4
/// (axis) neighbors also escaped, count neighbors whose smoothed-iter
/// differs by more than `config.iter_diff`; flag if ≥ 3.
fn detect_iteration_discontinuity(field: &PixelField, config: &CoreConfig, map: &mut GlitchMap) {
    let (w, h) = (field.width, field.height);
    for y in 0..h {
        for x in 0..w {
            let idx = field.index(x, y);
            if field.escaped[idx] == 0 {
                continue;
            }
            let neighbors = [
                (x as i64 - 1, y as i64),
                (x as i64 + 1, y as i64),
                (x as i64, y as i64 - 1),
                (x as i64, y as i64 + 1),
            ];
            let mut valid = 0;
            let mut disagree = 0;
            for (nx, ny) in neighbors {
                if nx < 0 || ny < 0 || nx >= w as i64 || ny >= h as i64 {
                    continue;
                }
                let nidx = field.index(nx as u32, ny as u32);
                if field.escaped[nidx] == 0 {
                    continue;
                }
                valid += 1;
                if (field.iterations[nidx] - field.iterations[idx]).abs() as f64 > config.iter_diff {
                    disagree += 1;
                }
            }
            if valid == 4 && disagree >= 3 {
                map.flag(x, y);
            }
        }
    }
}

/// Detector 2: isolated pixel. 8-neighborhood disagreement on the escaped
/// flag — all 8 differ, or 7 differ and the pixel itself escaped.
fn detect_isolated_pixel(field: &PixelField, map: &mut GlitchMap) {
    let (w, h) = (field.width, field.height);
    for y in 0..h {
        for x in 0..w {
            let idx = field.index(x, y);
            let center_escaped = field.escaped[idx] != 0;
            let mut disagree = 0;
            let mut total = 0;
            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let nx = x as i64 + dx;
                    let ny = y as i64 + dy;
                    if nx < 0 || ny < 0 || nx >= w as i64 || ny >= h as i64 {
                        continue;
                    }
                    let nidx = field.index(nx as u32, ny as u32);
                    total += 1;
                    if (field.escaped[nidx] != 0) != center_escaped {
                        disagree += 1;
                    }
                }
            }
            if total == 8 && (disagree == 8 || (disagree == 7 && center_escaped)) {
                map.flag(x, y);
            }
        }
    }
}

/// Detector 3: statistical outlier. In a 5×5 window, compute mean/stddev
/// of escaped-neighbor iterations; flag the center if it deviates by more
/// than `config.outlier_sigma` standard deviations.
fn detect_statistical_outlier(field: &PixelField, config: &CoreConfig, map: &mut GlitchMap) {
    let (w, h) = (field.width, field.height);
    for y in 0..h {
        for x in 0..w {
            let idx = field.index(x, y);
            if field.escaped[idx] == 0 {
                continue;
            }
            let mut sum = 0f64;
            let mut sum_sq = 0f64;
            let mut n = 0usize;
            for dy in -2i64..=2 {
                for dx in -2i64..=2 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let nx = x as i64 + dx;
                    let ny = y as i64 + dy;
                    if nx < 0 || ny < 0 || nx >= w as i64 || ny >= h as i64 {
                        continue;
                    }
                    let nidx = field.index(nx as u32, ny as u32);
                    if field.escaped[nidx] == 0 {
                        continue;
                    }
                    let v = field.iterations[nidx] as f64;
                    sum += v;
                    sum_sq += v * v;
                    n += 1;
                }
            }
            if n < 2 {
                continue;
            }
            let mean = sum / n as f64;
            let variance = (sum_sq / n as f64 - mean * mean).max(0.0);
            let stddev = variance.sqrt();
            if stddev > 0.0 && (field.iterations[idx] as f64 - mean).abs() > config.outlier_sigma * stddev {
                map.flag(x, y);
            }
        }
    }
}

/// Runs all three detectors, ORing their results into a single [`GlitchMap`]
/// that is seeded from the perturbation iterator's own glitch-candidate
/// flag (§4.4), so per-pixel underflow signals survive into clustering
/// even where none of the three post-pass detectors would have tripped.
pub fn detect(field: &PixelField, config: &CoreConfig) -> GlitchMap {
    let mut map = GlitchMap::new(field.width, field.height);
    for y in 0..field.height {
        for x in 0..field.width {
            if field.glitch_candidate[field.index(x, y)] != 0 {
                map.flag(x, y);
            }
        }
    }
    detect_iteration_discontinuity(field, config, &mut map);
    detect_isolated_pixel(field, &mut map);
    detect_statistical_outlier(field, config, &mut map);
    map
}

// ---------------------------------------------------------------------------
// Clustering
// ---------------------------------------------------------------------------

/// 4-neighborhood flood-fill clustering of flagged pixels; clusters smaller
/// than `config.min_cluster` are discarded as noise.
pub fn cluster(map: &GlitchMap, config: &CoreConfig) -> Vec<Vec<(u32, u32)>> {
    let (w, h) = (map.width, map.height);
    let mut visited = vec![false; (w * h) as usize];
    let mut clusters = Vec::new();

    for y in 0..h {
        for x in 0..w {
            let idx = map.index(x, y);
            if visited[idx] || !map.is_flagged(x, y) {
                continue;
            }
            let mut stack = vec![(x, y)];
            let mut component = Vec::new();
            visited[idx] = true;
            while let Some((cx, cy)) = stack.pop() {
                component.push((cx, cy));
                let neighbors = [
                    (cx as i64 - 1, cy as i64),
                    (cx as i64 + 1, cy as i64),
                    (cx as i64, cy as i64 - 1),
                    (cx as i64, cy as i64 + 1),
                ];
                for (nx, ny) in neighbors {
                    if nx < 0 || ny < 0 || nx >= w as i64 || ny >= h as i64 {
                        continue;
                    }
                    let (nx, ny) = (nx as u32, ny as u32);
                    let nidx = map.index(nx, ny);
                    if !visited[nidx] && map.is_flagged(nx, ny) {
                        visited[nidx] = true;
                        stack.push((nx, ny));
                    }
                }
            }
            if component.len() >= config.min_cluster {
                clusters.push(component);
            }
        }
    }
    clusters
}

/// Classifies a cluster and selects its correction strategy.
pub fn classify(pixels: Vec<(u32, u32)>, field: &PixelField, config: &CoreConfig) -> GlitchCluster {
    let n = pixels.len();
    let escaped_count = pixels.iter().filter(|&&(x, y)| field.escaped[field.index(x, y)] != 0).count();
    let all_escaped = escaped_count == n;
    let interior_fraction = (n - escaped_count) as f64 / n as f64;

    let class = if n <= config.max_isolated && all_escaped {
        GlitchClass::BailoutArtifact
    } else if interior_fraction > 0.8 {
        GlitchClass::PerturbationUnderflow
    } else {
        GlitchClass::ReferenceOrbitGlitch
    };

    let strategy = match class {
        GlitchClass::BailoutArtifact if n <= config.max_isolated => CorrectionStrategy::Interpolate,
        GlitchClass::BailoutArtifact => CorrectionStrategy::IncreaseIter,
        GlitchClass::PerturbationUnderflow => CorrectionStrategy::HighPrecision,
        GlitchClass::ReferenceOrbitGlitch => CorrectionStrategy::Rebase,
    };

    GlitchCluster { pixels, class, strategy }
}

/// Builds the surviving, classified clusters for a completed pass.
pub fn detect_and_classify(field: &PixelField, config: &CoreConfig) -> (GlitchMap, Vec<GlitchCluster>) {
    let map = detect(field, config);
    let clusters = cluster(&map, config)
        .into_iter()
        .map(|pixels| classify(pixels, field, config))
        .collect();
    (map, clusters)
}

// ---------------------------------------------------------------------------
// Interpolate correction
// ---------------------------------------------------------------------------

/// Averages each flagged pixel's non-glitch 8-neighbors across every field.
/// Pixels with no non-glitch neighbor are left untouched (handled upstream
/// by escalating to `IncreaseIter`).
pub fn apply_interpolate(field: &mut PixelField, map: &GlitchMap, cluster: &GlitchCluster) -> bool {
    let (w, h) = (field.width, field.height);
    let mut updates = Vec::with_capacity(cluster.pixels.len());

    for &(x, y) in &cluster.pixels {
        let mut sum_iter = 0f64;
        let mut sum_re = 0f64;
        let mut sum_im = 0f64;
        let mut sum_de = 0f64;
        let mut sum_pot = 0f64;
        let mut sum_angle = 0f64;
        let mut sum_escaped = 0f64;
        let mut n = 0usize;

        for dy in -1i64..=1 {
            for dx in -1i64..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let nx = x as i64 + dx;
                let ny = y as i64 + dy;
                if nx < 0 || ny < 0 || nx >= w as i64 || ny >= h as i64 {
                    continue;
                }
                let (nx, ny) = (nx as u32, ny as u32);
                if map.is_flagged(nx, ny) {
                    continue;
                }
                let nidx = field.index(nx, ny);
                sum_iter += field.iterations[nidx] as f64;
                sum_re += field.orbit_final_re[nidx];
                sum_im += field.orbit_final_im[nidx];
                sum_de += field.distance_estimate[nidx] as f64;
                sum_pot += field.potential[nidx] as f64;
                sum_angle += field.final_angle[nidx] as f64;
                sum_escaped += field.escaped[nidx] as f64;
                n += 1;
            }
        }

        if n == 0 {
            continue;
        }
        updates.push((
            x,
            y,
            sum_iter / n as f64,
            sum_re / n as f64,
            sum_im / n as f64,
            sum_de / n as f64,
            sum_pot / n as f64,
            sum_angle / n as f64,
            (sum_escaped / n as f64).round() as u8,
        ));
    }

    let corrected_all = updates.len() == cluster.pixels.len();
    for (x, y, iter, re, im, de, pot, angle, escaped) in updates {
        let idx = field.index(x, y);
        field.iterations[idx] = iter as f32;
        field.orbit_final_re[idx] = re;
        field.orbit_final_im[idx] = im;
        field.distance_estimate[idx] = de as f32;
        field.potential[idx] = pot as f32;
        field.final_angle[idx] = angle as f32;
        field.escaped[idx] = escaped;
    }
    corrected_all
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_field(w: u32, h: u32, iter: f32, escaped: u8) -> PixelField {
        let mut field = PixelField::new(w, h);
        for i in 0..field.iterations.len() {
            field.iterations[i] = iter;
            field.escaped[i] = escaped;
        }
        field
    }

    #[test]
    fn uniform_field_has_no_glitches() {
        let field = uniform_field(16, 16, 50.0, 1);
        let config = CoreConfig::default();
        let map = detect(&field, &config);
        assert_eq!(map.flagged_count(), 0);
    }

    #[test]
    fn isolated_pixel_detected() {
        let mut field = uniform_field(10, 10, 50.0, 1);
        let idx = field.index(5, 5);
        field.escaped[idx] = 0; // lone interior pixel amid escaped pixels
        let config = CoreConfig::default();
        let map = detect(&field, &config);
        assert!(map.is_flagged(5, 5));
    }

    #[test]
    fn small_cluster_discarded_as_noise() {
        let mut map = GlitchMap::new(10, 10);
        map.flag(1, 1);
        let mut config = CoreConfig::default();
        config.min_cluster = 4;
        let clusters = cluster(&map, &config);
        assert!(clusters.is_empty());
    }

    #[test]
    fn cluster_survives_above_min_size() {
        let mut map = GlitchMap::new(10, 10);
        for (x, y) in [(1, 1), (1, 2), (2, 1), (2, 2)] {
            map.flag(x, y);
        }
        let mut config = CoreConfig::default();
        config.min_cluster = 4;
        let clusters = cluster(&map, &config);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].len(), 4);
    }

    #[test]
    fn small_all_escaped_cluster_classified_as_bailout_artifact() {
        let field = uniform_field(10, 10, 50.0, 1);
        let config = CoreConfig::default();
        let pixels = vec![(1, 1), (1, 2), (2, 1), (2, 2)];
        let cl = classify(pixels, &field, &config);
        assert_eq!(cl.class, GlitchClass::BailoutArtifact);
        assert_eq!(cl.strategy, CorrectionStrategy::Interpolate);
    }

    #[test]
    fn mostly_interior_cluster_classified_as_perturbation_underflow() {
        let mut field = uniform_field(10, 10, 50.0, 0);
        let idx = field.index(5, 5);
        field.escaped[idx] = 1;
        let config = CoreConfig::default();
        let pixels = vec![(4, 4), (4, 5), (5, 4), (5, 5), (6, 6)];
        let cl = classify(pixels, &field, &config);
        assert_eq!(cl.class, GlitchClass::PerturbationUnderflow);
        assert_eq!(cl.strategy, CorrectionStrategy::HighPrecision);
    }

    #[test]
    fn interpolate_fixes_isolated_pixel() {
        let mut field = uniform_field(10, 10, 50.0, 1);
        let idx = field.index(5, 5);
        field.iterations[idx] = 5.0;
        field.escaped[idx] = 0;
        let config = CoreConfig::default();
        let (map, clusters) = detect_and_classify(&field, &config);
        assert_eq!(clusters.len(), 1);
        let corrected = apply_interpolate(&mut field, &map, &clusters[0]);
        assert!(corrected);
        let idx = field.index(5, 5);
        assert!((field.iterations[idx] - 50.0).abs() < 1e-5);
    }
}
