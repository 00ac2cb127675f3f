use deepzoom_core::{smoothed_iterations, IterationResult};

use crate::tile::Tile;

/// Struct-of-arrays per-pixel output, replacing the teacher's single
/// `Vec<IterationResult>` buffer: the compute core publishes distance
/// estimate, potential, and final angle in addition to the escape data an
/// `IterationResult` carries.
#[derive(Debug, Clone)]
pub struct PixelField {
    pub width: u32,
    pub height: u32,
    pub iterations: Vec<f32>,
    pub escaped: Vec<u8>,
    pub orbit_final_re: Vec<f64>,
    pub orbit_final_im: Vec<f64>,
    pub distance_estimate: Vec<f32>,
    pub potential: Vec<f32>,
    pub final_angle: Vec<f32>,
    /// Perturbation-iterator glitch-candidate flag (§4.4), seeded before
    /// the post-pass detectors (§4.9) run and OR'd into their output.
    pub glitch_candidate: Vec<u8>,
}

impl PixelField {
    pub fn new(width: u32, height: u32) -> Self {
        let n = width as usize * height as usize;
        Self {
            width,
            height,
            iterations: vec![0.0; n],
            escaped: vec![0; n],
            orbit_final_re: vec![0.0; n],
            orbit_final_im: vec![0.0; n],
            distance_estimate: vec![0.0; n],
            potential: vec![0.0; n],
            final_angle: vec![0.0; n],
            glitch_candidate: vec![0; n],
        }
    }

    #[inline]
    pub fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Write one pixel's output atomically (all seven fields, or — for the
    /// caller — none at all, preserving the tile-publish invariant).
    ///
    /// `max_iterations` is the render's configured cap (§4.5: "The produced
    /// `iterations` field is `maxIter` for interior, smoothed iteration for
    /// escaped") — `IterationResult::Interior` carries no iteration count of
    /// its own, since an interior pixel ran the full budget without escaping.
    pub fn set_pixel(
        &mut self,
        x: u32,
        y: u32,
        escape_radius: f64,
        result: IterationResult,
        max_iterations: u32,
        orbit_final_re: f64,
        orbit_final_im: f64,
        glitch_candidate: bool,
    ) {
        let idx = self.index(x, y);
        self.glitch_candidate[idx] = glitch_candidate as u8;
        match result {
            IterationResult::Escaped { iterations, norm_sq } => {
                self.iterations[idx] = smoothed_iterations(iterations, norm_sq, escape_radius) as f32;
                self.escaped[idx] = 1;
                let z = norm_sq.sqrt();
                self.distance_estimate[idx] = (0.5 * z * z.ln() / z) as f32;
                self.potential[idx] = (z.ln()) as f32;
                self.final_angle[idx] = orbit_final_im.atan2(orbit_final_re) as f32;
            }
            IterationResult::Interior => {
                self.iterations[idx] = max_iterations as f32;
                self.escaped[idx] = 0;
                self.distance_estimate[idx] = 0.0;
                self.potential[idx] = 0.0;
                self.final_angle[idx] = 0.0;
            }
        }
        self.orbit_final_re[idx] = orbit_final_re;
        self.orbit_final_im[idx] = orbit_final_im;
    }

    /// Blit a tile's worth of per-pixel rows into this field.
    pub fn blit_tile(&mut self, tile: &Tile, data: &PixelFieldTileData) {
        for row in 0..tile.height {
            let y = tile.y + row;
            if y >= self.height {
                break;
            }
            let src_start = row as usize * tile.width as usize;
            let src_end = src_start + tile.width as usize;
            let dst_start = self.index(tile.x, y);
            let dst_end = dst_start + tile.width as usize;
            self.iterations[dst_start..dst_end].copy_from_slice(&data.iterations[src_start..src_end]);
            self.escaped[dst_start..dst_end].copy_from_slice(&data.escaped[src_start..src_end]);
            self.orbit_final_re[dst_start..dst_end]
                .copy_from_slice(&data.orbit_final_re[src_start..src_end]);
            self.orbit_final_im[dst_start..dst_end]
                .copy_from_slice(&data.orbit_final_im[src_start..src_end]);
            self.distance_estimate[dst_start..dst_end]
                .copy_from_slice(&data.distance_estimate[src_start..src_end]);
            self.potential[dst_start..dst_end].copy_from_slice(&data.potential[src_start..src_end]);
            self.final_angle[dst_start..dst_end]
                .copy_from_slice(&data.final_angle[src_start..src_end]);
            self.glitch_candidate[dst_start..dst_end]
                .copy_from_slice(&data.glitch_candidate[src_start..src_end]);
        }
    }

    /// Copies a primary tile's data into its real-axis mirror tile (§4.8),
    /// flipping row order and negating the components a reflection across
    /// `im = 0` inverts. Ported from the teacher's
    /// `blit_tile_mirrored`/`assemble_symmetric` pairing.
    pub fn blit_tile_mirrored(&mut self, mirror_tile: &Tile, primary_data: &PixelFieldTileData) {
        for row in 0..mirror_tile.height {
            let y = mirror_tile.y + row;
            if y >= self.height {
                break;
            }
            let src_row = mirror_tile.height - 1 - row;
            let src_start = src_row as usize * mirror_tile.width as usize;
            let src_end = src_start + mirror_tile.width as usize;
            let dst_start = self.index(mirror_tile.x, y);
            let dst_end = dst_start + mirror_tile.width as usize;

            self.iterations[dst_start..dst_end].copy_from_slice(&primary_data.iterations[src_start..src_end]);
            self.escaped[dst_start..dst_end].copy_from_slice(&primary_data.escaped[src_start..src_end]);
            self.orbit_final_re[dst_start..dst_end]
                .copy_from_slice(&primary_data.orbit_final_re[src_start..src_end]);
            self.distance_estimate[dst_start..dst_end]
                .copy_from_slice(&primary_data.distance_estimate[src_start..src_end]);
            self.potential[dst_start..dst_end].copy_from_slice(&primary_data.potential[src_start..src_end]);
            self.glitch_candidate[dst_start..dst_end]
                .copy_from_slice(&primary_data.glitch_candidate[src_start..src_end]);
            for (offset, dst) in (dst_start..dst_end).enumerate() {
                self.orbit_final_im[dst] = -primary_data.orbit_final_im[src_start + offset];
                self.final_angle[dst] = -primary_data.final_angle[src_start + offset];
            }
        }
    }
}

/// A single tile's worth of [`PixelField`] columns, as produced by a worker
/// and transferred whole into the coordinator (§6.3 `tile-complete`
/// payload: "seven per-pixel arrays packed").
#[derive(Debug, Clone)]
pub struct PixelFieldTileData {
    pub iterations: Vec<f32>,
    pub escaped: Vec<u8>,
    pub orbit_final_re: Vec<f64>,
    pub orbit_final_im: Vec<f64>,
    pub distance_estimate: Vec<f32>,
    pub potential: Vec<f32>,
    pub final_angle: Vec<f32>,
    pub glitch_candidate: Vec<u8>,
}

impl PixelFieldTileData {
    pub fn new(pixel_count: usize) -> Self {
        Self {
            iterations: vec![0.0; pixel_count],
            escaped: vec![0; pixel_count],
            orbit_final_re: vec![0.0; pixel_count],
            orbit_final_im: vec![0.0; pixel_count],
            distance_estimate: vec![0.0; pixel_count],
            potential: vec![0.0; pixel_count],
            final_angle: vec![0.0; pixel_count],
            glitch_candidate: vec![0; pixel_count],
        }
    }

    pub fn set(
        &mut self,
        idx: usize,
        escape_radius: f64,
        result: IterationResult,
        max_iterations: u32,
        orbit_final_re: f64,
        orbit_final_im: f64,
        glitch_candidate: bool,
    ) {
        self.glitch_candidate[idx] = glitch_candidate as u8;
        match result {
            IterationResult::Escaped { iterations, norm_sq } => {
                self.iterations[idx] = smoothed_iterations(iterations, norm_sq, escape_radius) as f32;
                self.escaped[idx] = 1;
                let z = norm_sq.sqrt();
                self.distance_estimate[idx] = (0.5 * z * z.ln() / z) as f32;
                self.potential[idx] = z.ln() as f32;
                self.final_angle[idx] = orbit_final_im.atan2(orbit_final_re) as f32;
            }
            IterationResult::Interior => {
                self.iterations[idx] = max_iterations as f32;
                self.escaped[idx] = 0;
            }
        }
        self.orbit_final_re[idx] = orbit_final_re;
        self.orbit_final_im[idx] = orbit_final_im;
    }
}

/// Per-pixel suspected-artifact byte plus connected-component clustering
/// output, row-major like [`PixelField`].
#[derive(Debug, Clone)]
pub struct GlitchMap {
    pub width: u32,
    pub height: u32,
    pub flags: Vec<u8>,
}

impl GlitchMap {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            flags: vec![0; width as usize * height as usize],
        }
    }

    #[inline]
    pub fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    pub fn is_flagged(&self, x: u32, y: u32) -> bool {
        self.flags[self.index(x, y)] != 0
    }

    pub fn flag(&mut self, x: u32, y: u32) {
        let idx = self.index(x, y);
        self.flags[idx] = 1;
    }

    pub fn clear(&mut self, x: u32, y: u32) {
        let idx = self.index(x, y);
        self.flags[idx] = 0;
    }

    pub fn flagged_count(&self) -> usize {
        self.flags.iter().filter(|&&f| f != 0).count()
    }
}

/// Coarse grid derived from a completed pass, biasing iteration counts in
/// a second pass. Cell size is fixed at 32×32 per spec.md §4.7.
pub const COMPLEXITY_CELL: u32 = 32;

#[derive(Debug, Clone)]
pub struct ComplexityMap {
    pub cols: u32,
    pub rows: u32,
    pub multiplier: Vec<f32>,
}

impl ComplexityMap {
    /// Build from a completed [`PixelField`]: `variance_score =
    /// stddev/(mean+1)`, `boundary_score = 2·|escaped_fraction − 0.5|`,
    /// multiplier = `1 + min(1, variance_score + boundary_score)`.
    pub fn build(field: &PixelField) -> Self {
        let cols = field.width.div_ceil(COMPLEXITY_CELL).max(1);
        let rows = field.height.div_ceil(COMPLEXITY_CELL).max(1);
        let mut multiplier = vec![1.0f32; (cols * rows) as usize];

        for cell_y in 0..rows {
            for cell_x in 0..cols {
                let x0 = cell_x * COMPLEXITY_CELL;
                let y0 = cell_y * COMPLEXITY_CELL;
                let x1 = (x0 + COMPLEXITY_CELL).min(field.width);
                let y1 = (y0 + COMPLEXITY_CELL).min(field.height);

                let mut sum = 0f64;
                let mut sum_sq = 0f64;
                let mut escaped_count = 0usize;
                let mut n = 0usize;

                for y in y0..y1 {
                    for x in x0..x1 {
                        let idx = field.index(x, y);
                        let iter = field.iterations[idx] as f64;
                        sum += iter;
                        sum_sq += iter * iter;
                        if field.escaped[idx] != 0 {
                            escaped_count += 1;
                        }
                        n += 1;
                    }
                }

                if n == 0 {
                    continue;
                }
                let mean = sum / n as f64;
                let variance = (sum_sq / n as f64 - mean * mean).max(0.0);
                let stddev = variance.sqrt();
                let variance_score = stddev / (mean + 1.0);
                let escaped_fraction = escaped_count as f64 / n as f64;
                let boundary_score = 2.0 * (escaped_fraction - 0.5).abs();

                let cell_idx = (cell_y * cols + cell_x) as usize;
                multiplier[cell_idx] = (1.0 + (variance_score + boundary_score).min(1.0)) as f32;
            }
        }

        Self { cols, rows, multiplier }
    }

    /// The multiplier applicable at pixel `(x, y)`.
    pub fn multiplier_at(&self, x: u32, y: u32) -> f32 {
        let cell_x = (x / COMPLEXITY_CELL).min(self.cols - 1);
        let cell_y = (y / COMPLEXITY_CELL).min(self.rows - 1);
        self.multiplier[(cell_y * self.cols + cell_x) as usize]
    }
}
