/// Tile-size bounds (`MIN_TILE`/`MAX_TILE`).
pub const MIN_TILE: u32 = 32;
pub const MAX_TILE: u32 = 256;
/// Default tile size in pixels. 64×64 fits comfortably in L1/L2 cache.
pub const DEFAULT_TILE_SIZE: u32 = 64;
/// Default bound on tiles dispatched per scheduling tick in progressive mode.
pub const DEFAULT_MAX_TILES_PER_FRAME: usize = 4;

/// A rectangular tile within the viewport, with a scheduling priority.
///
/// `priority` is the tile's index in spiral order — lower dispatches first.
#[derive(Debug, Clone, Copy)]
pub struct Tile {
    pub x: u32,
    pub y: u32,
    /// Tile width in pixels (may be smaller than the nominal size at the
    /// right edge).
    pub width: u32,
    /// Tile height in pixels (may be smaller at the bottom edge).
    pub height: u32,
    pub priority: u32,
}

impl Tile {
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Rounds `requested` to the nearest power of two and clamps to
/// `[MIN_TILE, MAX_TILE]`, per the tile-size contract.
pub fn normalize_tile_size(requested: u32) -> u32 {
    let clamped = requested.clamp(MIN_TILE, MAX_TILE);
    clamped.next_power_of_two().min(MAX_TILE).max(MIN_TILE)
}

/// Builds a row-major grid of tiles covering `width × height` exactly, then
/// assigns `priority` in spiral-outward-from-center order (§4.8). Tiles
/// tessellate exactly: no overlap, no gap.
pub fn build_tile_grid(width: u32, height: u32, tile_size: u32) -> Vec<Tile> {
    let t = normalize_tile_size(tile_size);
    let mut tiles = Vec::new();
    let mut y = 0;
    while y < height {
        let th = t.min(height - y);
        let mut x = 0;
        while x < width {
            let tw = t.min(width - x);
            tiles.push(Tile {
                x,
                y,
                width: tw,
                height: th,
                priority: 0,
            });
            x += tw;
        }
        y += th;
    }

    let order = spiral_order(&tiles, width, height);
    for (priority, &tile_idx) in order.iter().enumerate() {
        tiles[tile_idx].priority = priority as u32;
    }
    tiles
}

/// Orders tile indices in a spiral outward from the image center, so that
/// progressive refinement shows the most perceptually relevant content
/// first. Ties (equal Chebyshev distance from the center) are broken by
/// raster order, for determinism — the coordinator must not assume this
/// order survives into completion order (§5: tiles complete in an
/// arbitrary order within one pass), only that it is the dispatch order.
pub fn spiral_order(tiles: &[Tile], image_width: u32, image_height: u32) -> Vec<usize> {
    let center_x = image_width as f64 / 2.0;
    let center_y = image_height as f64 / 2.0;

    let mut order: Vec<usize> = (0..tiles.len()).collect();
    order.sort_by(|&a, &b| {
        let da = chebyshev_distance(&tiles[a], center_x, center_y);
        let db = chebyshev_distance(&tiles[b], center_x, center_y);
        da.partial_cmp(&db)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.cmp(&b))
    });
    order
}

fn chebyshev_distance(tile: &Tile, center_x: f64, center_y: f64) -> f64 {
    let tile_center_x = tile.x as f64 + tile.width as f64 / 2.0;
    let tile_center_y = tile.y as f64 + tile.height as f64 / 2.0;
    (tile_center_x - center_x).abs().max((tile_center_y - center_y).abs())
}

/// How a tile relates to the real-axis symmetry optimization (§4.8),
/// layered on top of spiral ordering rather than replacing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileKind {
    Normal,
    /// Entirely in the upper half; render it, then fill `mirror_index` for free.
    Primary { mirror_index: usize },
    /// Entirely in the lower half; filled by copying `primary_index`'s data.
    Mirror { primary_index: usize },
}

#[derive(Debug, Clone, Copy)]
pub struct ClassifiedTile {
    pub tile: Tile,
    pub kind: TileKind,
}

/// Classifies tiles for real-axis symmetry when the viewport is centred
/// exactly on `im = 0` and unrotated. Mandelbrot-family kinds are
/// symmetric about the real axis; Julia kinds are not and must not use
/// this (callers gate on [`deepzoom_core::FractalKind::pixel_seeds_z0`]).
/// Returns `None` when symmetry doesn't apply.
pub fn classify_tiles_for_symmetry(
    tiles: &[Tile],
    viewport_height: u32,
    center_im: f64,
    rotation: f64,
) -> Option<Vec<ClassifiedTile>> {
    if center_im.abs() > f64::EPSILON || rotation != 0.0 {
        return None;
    }

    let half_h = viewport_height as f64 / 2.0;
    let mut classified: Vec<ClassifiedTile> = tiles
        .iter()
        .map(|&tile| ClassifiedTile { tile, kind: TileKind::Normal })
        .collect();

    let tile_count = classified.len();
    for i in 0..tile_count {
        let tile = classified[i].tile;
        let tile_top = tile.y as f64;
        let tile_bottom = (tile.y + tile.height) as f64;

        if tile_top < half_h && tile_bottom > half_h {
            continue;
        }
        if tile_bottom <= half_h {
            let mirror_y = viewport_height - tile.y - tile.height;
            if let Some(j) = find_tile_at(&classified, tile.x, mirror_y, tile.width, tile.height) {
                if i != j {
                    classified[i].kind = TileKind::Primary { mirror_index: j };
                    classified[j].kind = TileKind::Mirror { primary_index: i };
                }
            }
        }
    }

    Some(classified)
}

fn find_tile_at(tiles: &[ClassifiedTile], x: u32, y: u32, width: u32, height: u32) -> Option<usize> {
    tiles
        .iter()
        .position(|ct| ct.tile.x == x && ct.tile.y == y && ct.tile.width == width && ct.tile.height == height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_grid_covers_viewport_exactly() {
        let tiles = build_tile_grid(200, 150, DEFAULT_TILE_SIZE);
        let total_pixels: usize = tiles.iter().map(|t| t.pixel_count()).sum();
        assert_eq!(total_pixels, 200 * 150);
    }

    #[test]
    fn tile_grid_no_overlap() {
        let tiles = build_tile_grid(200, 150, DEFAULT_TILE_SIZE);
        let mut covered = vec![false; 200 * 150];
        for tile in &tiles {
            for py in tile.y..tile.y + tile.height {
                for px in tile.x..tile.x + tile.width {
                    let idx = py as usize * 200 + px as usize;
                    assert!(!covered[idx], "pixel ({px}, {py}) covered twice");
                    covered[idx] = true;
                }
            }
        }
        assert!(covered.iter().all(|&c| c));
    }

    #[test]
    fn normalize_tile_size_rounds_to_power_of_two_and_clamps() {
        assert_eq!(normalize_tile_size(50), 64);
        assert_eq!(normalize_tile_size(10), MIN_TILE);
        assert_eq!(normalize_tile_size(1000), MAX_TILE);
        assert_eq!(normalize_tile_size(128), 128);
    }

    #[test]
    fn spiral_order_starts_near_center() {
        let tiles = build_tile_grid(256, 256, 64);
        let order = spiral_order(&tiles, 256, 256);
        let first = tiles[order[0]];
        let last = tiles[*order.last().unwrap()];
        let center_dist = |t: &Tile| {
            let cx = t.x as f64 + t.width as f64 / 2.0 - 128.0;
            let cy = t.y as f64 + t.height as f64 / 2.0 - 128.0;
            cx.abs().max(cy.abs())
        };
        assert!(center_dist(&first) <= center_dist(&last));
    }

    #[test]
    fn spiral_order_is_a_permutation() {
        let tiles = build_tile_grid(200, 150, 64);
        let order = spiral_order(&tiles, 200, 150);
        let mut seen = vec![false; tiles.len()];
        for idx in order {
            assert!(!seen[idx]);
            seen[idx] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn symmetry_classification_pairs_every_off_axis_tile() {
        let tiles = build_tile_grid(128, 128, 64);
        let classified = classify_tiles_for_symmetry(&tiles, 128, 0.0, 0.0).unwrap();
        let primaries = classified.iter().filter(|ct| matches!(ct.kind, TileKind::Primary { .. })).count();
        let mirrors = classified.iter().filter(|ct| matches!(ct.kind, TileKind::Mirror { .. })).count();
        assert_eq!(primaries, mirrors);
        assert!(primaries > 0, "128×128 centred at im=0 should have mirror pairs");
    }

    #[test]
    fn symmetry_classification_declines_off_axis_viewports() {
        let tiles = build_tile_grid(128, 128, 64);
        assert!(classify_tiles_for_symmetry(&tiles, 128, 0.5, 0.0).is_none());
        assert!(classify_tiles_for_symmetry(&tiles, 128, 0.0, 0.3).is_none());
    }

    #[test]
    fn grid_assigns_priority_in_spiral_order() {
        let tiles = build_tile_grid(256, 256, 64);
        let mut by_priority = tiles.clone();
        by_priority.sort_by_key(|t| t.priority);
        let center_dist = |t: &Tile| {
            let cx = t.x as f64 + t.width as f64 / 2.0 - 128.0;
            let cy = t.y as f64 + t.height as f64 / 2.0 - 128.0;
            cx.abs().max(cy.abs())
        };
        for pair in by_priority.windows(2) {
            assert!(center_dist(&pair[0]) <= center_dist(&pair[1]));
        }
    }
}
