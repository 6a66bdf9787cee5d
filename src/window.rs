//! Tile window resolution.
//!
//! Given the geometry of a tile grid, an optional region of interest and the
//! current viewport, [`resolve`] computes the smallest rectangle of grid cells
//! that fills the viewport. The result is always clamped to the grid, so it
//! never names a tile that does not exist.
//!
//! # Algorithm
//!
//! ```text
//!  grid (cols x rows)                 viewport
//! ┌──┬──┬──┬──┬──┬──┬──┐            ┌─────────┐
//! │  │  │  │  │  │  │  │            │         │
//! ├──┼──╔══╪══╪══╗──┼──┤            │         │
//! │  │  ║  │  │  ║  │  │   ◄─────   └─────────┘
//! ├──┼──╫──┼──┼──╫──┼──┤
//! │  │  ║  │R │  ║  │  │   visible = ceil(viewport / effective tile)
//! ├──┼──╚══╪══╪══╝──┼──┤   start   = center(R or grid) - visible / 2
//! │  │  │  │  │  │  │  │   start   = clamp(start, 0, grid - visible)
//! └──┴──┴──┴──┴──┴──┴──┘
//! ```
//!
//! The effective tile size is the declared tile size, multiplied by the
//! mobile scale factor when the viewport is at or below the breakpoint.

use serde::{Deserialize, Serialize};

/// Breakpoint used when a descriptor declares a mobile scale but no breakpoint.
pub const DEFAULT_MOBILE_BREAKPOINT: u32 = 768;

// =============================================================================
// Geometry Types
// =============================================================================

/// Number of columns and rows a mosaic is cut into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridSize {
    pub cols: u32,
    pub rows: u32,
}

impl GridSize {
    pub fn new(cols: u32, rows: u32) -> Self {
        Self { cols, rows }
    }

    /// Total number of tiles in the grid.
    pub fn tile_count(&self) -> u64 {
        u64::from(self.cols) * u64::from(self.rows)
    }

    /// Convert a 1-based row-major index into zero-based `(row, col)`.
    pub fn position_of(&self, index: u32) -> (u32, u32) {
        let zero_based = index.saturating_sub(1);
        (zero_based / self.cols, zero_based % self.cols)
    }

    /// Convert zero-based `(row, col)` into the 1-based row-major index.
    pub fn index_of(&self, row: u32, col: u32) -> u32 {
        row * self.cols + col + 1
    }
}

/// Pixel size of a single tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileSize {
    pub width: u32,
    pub height: u32,
}

impl TileSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Viewport dimensions in pixels, sampled once per render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Tile scale applied on narrow viewports.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MobileScale {
    /// Multiplier applied to the tile size (positive, finite)
    pub factor: f64,

    /// The factor applies when `viewport.width <= breakpoint`
    pub breakpoint: u32,
}

impl MobileScale {
    pub fn new(factor: f64, breakpoint: u32) -> Self {
        Self { factor, breakpoint }
    }

    /// Scale factor in effect for the given viewport.
    pub fn factor_for(&self, viewport: Viewport) -> f64 {
        if viewport.width <= self.breakpoint {
            self.factor
        } else {
            1.0
        }
    }
}

// =============================================================================
// Tile Window
// =============================================================================

/// The rectangle of grid cells needed to fill a viewport.
///
/// Invariants: `start_row + rows_visible <= grid.rows`,
/// `start_col + cols_visible <= grid.cols`, and both visible counts are at
/// least 1. `tile_width`/`tile_height` are the effective (scaled) cell sizes
/// used by the compositor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileWindow {
    pub start_row: u32,
    pub start_col: u32,
    pub rows_visible: u32,
    pub cols_visible: u32,
    pub tile_width: u32,
    pub tile_height: u32,
}

impl TileWindow {
    /// Number of cells in the window.
    pub fn cell_count(&self) -> usize {
        self.rows_visible as usize * self.cols_visible as usize
    }

    /// Pixel dimensions of the composited output, in `u64` so they cannot
    /// overflow.
    pub fn output_dimensions(&self) -> (u64, u64) {
        (
            u64::from(self.cols_visible) * u64::from(self.tile_width),
            u64::from(self.rows_visible) * u64::from(self.tile_height),
        )
    }

    /// Pixel count of the composited output, saturating at `u64::MAX`.
    pub fn output_pixels(&self) -> u64 {
        let (width, height) = self.output_dimensions();
        width.saturating_mul(height)
    }

    /// Pixel dimensions of the composited output, or `None` when a side does
    /// not fit an image buffer dimension.
    pub fn output_size(&self) -> Option<(u32, u32)> {
        let (width, height) = self.output_dimensions();
        Some((u32::try_from(width).ok()?, u32::try_from(height).ok()?))
    }

    /// Window-relative cells in row-major order, as `(row, col)`.
    pub fn cells(&self) -> impl Iterator<Item = (u32, u32)> {
        let cols = self.cols_visible;
        (0..self.rows_visible).flat_map(move |row| (0..cols).map(move |col| (row, col)))
    }

    /// Absolute grid position of a window-relative cell.
    pub fn grid_position(&self, row: u32, col: u32) -> (u32, u32) {
        (self.start_row + row, self.start_col + col)
    }

    /// Whether the window lies entirely inside the grid.
    pub fn fits(&self, grid: GridSize) -> bool {
        self.rows_visible >= 1
            && self.cols_visible >= 1
            && self.start_row + self.rows_visible <= grid.rows
            && self.start_col + self.cols_visible <= grid.cols
    }

    /// Compact `row,col,rows,cols` form used in response headers.
    pub fn header_value(&self) -> String {
        format!(
            "{},{},{},{}",
            self.start_row, self.start_col, self.rows_visible, self.cols_visible
        )
    }
}

// =============================================================================
// Resolver
// =============================================================================

/// Resolve the window of tiles needed to fill `viewport`.
///
/// Pure and deterministic. Inputs are expected to be validated (non-zero grid,
/// `roi` within `1..=cols*rows`); a zero tile size or viewport dimension is
/// tolerated by clamping to 1 pixel rather than dividing by zero.
pub fn resolve(
    grid: GridSize,
    tile_size: TileSize,
    roi: Option<u32>,
    viewport: Viewport,
    scale: Option<MobileScale>,
) -> TileWindow {
    let factor = scale.map(|s| s.factor_for(viewport)).unwrap_or(1.0);
    let tile_width = effective_dimension(tile_size.width, factor);
    let tile_height = effective_dimension(tile_size.height, factor);

    let cols = grid.cols.max(1);
    let rows = grid.rows.max(1);

    let cols_visible = viewport.width.max(1).div_ceil(tile_width).min(cols);
    let rows_visible = viewport.height.max(1).div_ceil(tile_height).min(rows);

    let (center_row, center_col) = match roi {
        Some(index) => {
            let grid = GridSize::new(cols, rows);
            // Bounded by `index`, so the narrowing cannot truncate.
            let last = u64::from(index).min(grid.tile_count()) as u32;
            grid.position_of(last)
        }
        None => (rows / 2, cols / 2),
    };

    let start_row = center_row as i64 - (rows_visible / 2) as i64;
    let start_col = center_col as i64 - (cols_visible / 2) as i64;

    TileWindow {
        start_row: start_row.clamp(0, (rows - rows_visible) as i64) as u32,
        start_col: start_col.clamp(0, (cols - cols_visible) as i64) as u32,
        rows_visible,
        cols_visible,
        tile_width,
        tile_height,
    }
}

/// Scale a tile dimension, rounding to the nearest whole pixel (at least 1).
fn effective_dimension(size: u32, factor: f64) -> u32 {
    let scaled = (size as f64 * factor).round();
    if scaled.is_finite() && scaled >= 1.0 {
        scaled.min(u32::MAX as f64) as u32
    } else {
        1
    }
}

// =============================================================================
// Tests
// =============================================================================
