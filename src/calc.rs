//! Tile size calculator.
//!
//! Picks a tile size for slicing a source image so that common viewports are
//! covered with as little overhang as possible. Candidates are the divisors
//! of the primary viewport sizes at 2x density (at least 200 px per side);
//! each is scored by its average pixel waste over every known viewport.
//!
//! Pixel waste for one viewport is the area of the whole-tile cover that
//! falls outside the viewport:
//!
//! ```text
//!   ┌────────────────────┬──┐
//!   │                    │  │ waste_x · h
//!   │      viewport      │  │
//!   │        w × h       │  │
//!   ├────────────────────┼──┤
//!   │   waste_y · w      │  │ (corner counted once)
//!   └────────────────────┴──┘
//! ```

use std::collections::BTreeSet;

use serde::Serialize;

/// Viewports that candidate tile sizes are derived from.
pub const PRIMARY_VIEWPORTS: [(u32, u32); 5] =
    [(1920, 1080), (1366, 768), (768, 1024), (412, 915), (360, 800)];

/// Additional viewports used when scoring.
pub const SECONDARY_VIEWPORTS: [(u32, u32); 16] = [
    (1536, 864),
    (390, 844),
    (393, 873),
    (414, 896),
    (1280, 720),
    (360, 780),
    (1440, 900),
    (375, 812),
    (385, 854),
    (428, 926),
    (360, 640),
    (393, 852),
    (430, 932),
    (360, 760),
    (375, 667),
    (393, 851),
];

/// Device pixel ratio assumed when choosing candidates.
pub const DENSITY_FACTOR: u32 = 2;

/// Smallest tile side considered.
pub const MIN_TILE_SIDE: u32 = 200;

/// Grids with more tiles than this are rescaled.
pub const MAX_TILES: u32 = 100;

/// Recommended slicing for an image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TileLayout {
    pub image_width: u32,
    pub image_height: u32,
    pub columns: u32,
    pub rows: u32,
    pub total_tiles: u32,

    /// Exact tile width (`image_width / columns`)
    pub tile_width: f64,

    /// Exact tile height (`image_height / rows`)
    pub tile_height: f64,

    /// Waste over all viewports as a percentage of their total area
    pub waste_percent: f64,
}

/// All divisors of `n` in ascending order.
pub fn divisors(n: u32) -> Vec<u32> {
    let mut found = BTreeSet::new();
    let mut i = 1u32;
    while (i as u64) * (i as u64) <= n as u64 {
        if n % i == 0 {
            found.insert(i);
            found.insert(n / i);
        }
        i += 1;
    }
    found.into_iter().collect()
}

/// Pixel waste of covering a viewport with whole tiles.
pub fn pixel_waste(viewport_width: u32, viewport_height: u32, tile_width: u32, tile_height: u32) -> u64 {
    let (vw, vh) = (viewport_width as u64, viewport_height as u64);
    let (tw, th) = (tile_width.max(1) as u64, tile_height.max(1) as u64);

    let waste_x = vw.div_ceil(tw) * tw - vw;
    let waste_y = vh.div_ceil(th) * th - vh;

    (waste_x * vh + waste_y * vw).saturating_sub(waste_x * waste_y)
}

/// [`pixel_waste`] for fractional tile sizes.
fn pixel_waste_exact(viewport_width: f64, viewport_height: f64, tile_width: f64, tile_height: f64) -> f64 {
    let waste_x = ((viewport_width / tile_width).ceil() * tile_width - viewport_width).max(0.0);
    let waste_y = ((viewport_height / tile_height).ceil() * tile_height - viewport_height).max(0.0);

    waste_x * viewport_height + waste_y * viewport_width - waste_x * waste_y
}

/// Candidate tile size with the least average waste, and that average.
///
/// Ties go to the smallest width, then the smallest height.
pub fn optimal_tile_size(primary: &[(u32, u32)], secondary: &[(u32, u32)]) -> Option<((u32, u32), f64)> {
    let candidates: BTreeSet<(u32, u32)> = primary
        .iter()
        .flat_map(|&(w, h)| {
            let heights = divisors(h * DENSITY_FACTOR);
            divisors(w * DENSITY_FACTOR)
                .into_iter()
                .flat_map(move |tw| heights.clone().into_iter().map(move |th| (tw, th)))
        })
        .filter(|&(tw, th)| tw >= MIN_TILE_SIDE && th >= MIN_TILE_SIDE)
        .collect();

    let viewports: Vec<(u32, u32)> = primary.iter().chain(secondary).copied().collect();
    if viewports.is_empty() {
        return None;
    }

    let mut best: Option<((u32, u32), f64)> = None;
    for (tw, th) in candidates {
        let total: u64 = viewports
            .iter()
            .map(|&(w, h)| pixel_waste(w * DENSITY_FACTOR, h * DENSITY_FACTOR, tw, th))
            .sum();
        let average = total as f64 / viewports.len() as f64;

        if best.map_or(true, |(_, min)| average < min) {
            best = Some(((tw, th), average));
        }
    }
    best
}

/// Recommend a slicing for an image of the given size.
///
/// Returns `None` when the image is empty or no candidate tile size exists.
pub fn calculate(image_width: u32, image_height: u32) -> Option<TileLayout> {
    if image_width == 0 || image_height == 0 {
        return None;
    }

    let ((mut tw, mut th), _) = optimal_tile_size(&PRIMARY_VIEWPORTS, &SECONDARY_VIEWPORTS)?;

    let mut columns = image_width.div_ceil(tw);
    let mut rows = image_height.div_ceil(th);

    if columns * rows > MAX_TILES {
        // Grow tiles so the grid lands near MAX_TILES.
        let scale = ((columns * rows) as f64 / MAX_TILES as f64).sqrt();
        tw = ((tw as f64 * scale).round() as u32).max(1);
        th = ((th as f64 * scale).round() as u32).max(1);
        columns = image_width.div_ceil(tw);
        rows = image_height.div_ceil(th);
    }

    let tile_width = image_width as f64 / columns as f64;
    let tile_height = image_height as f64 / rows as f64;

    let viewports = PRIMARY_VIEWPORTS.iter().chain(SECONDARY_VIEWPORTS.iter());
    let (waste, area) = viewports.fold((0.0, 0.0), |(waste, area), &(w, h)| {
        let (w, h) = (w as f64, h as f64);
        (
            waste + pixel_waste_exact(w, h, tile_width, tile_height),
            area + w * h,
        )
    });

    Some(TileLayout {
        image_width,
        image_height,
        columns,
        rows,
        total_tiles: columns * rows,
        tile_width,
        tile_height,
        waste_percent: waste / area * 100.0,
    })
}
