//! Mosaic compositor.
//!
//! Draws the tiles of a window onto one transparent RGBA surface. Each tile
//! occupies exactly one cell at `(col * tile_width, row * tile_height)`.
//! Tiles whose decoded size already matches the cell are copied pixel for
//! pixel; anything else (a scaled window, an odd edge tile) is resampled with
//! nearest-neighbour so adjacent tiles never blur into each other at the
//! seams. Blank cells are left transparent.

use image::imageops::{self, FilterType};
use image::RgbaImage;
use tracing::trace;

use super::loader::TileGrid;
use crate::error::RenderError;
use crate::window::TileWindow;

/// Composite the loaded tiles of `window` into a single surface.
///
/// The returned surface is complete: every cell has been drawn (or left
/// blank) before it is handed back. A window whose sides overflow an image
/// dimension is refused before anything is allocated; callers enforce their
/// own pixel limit first.
pub fn compose(window: &TileWindow, tiles: &TileGrid) -> Result<RgbaImage, RenderError> {
    let Some((width, height)) = window.output_size() else {
        let (width, height) = window.output_dimensions();
        return Err(RenderError::CompositeTooLarge { width, height });
    };
    let mut surface = RgbaImage::new(width, height);

    for (row, col, tile) in tiles.iter() {
        if row >= window.rows_visible || col >= window.cols_visible {
            continue;
        }
        let Some(tile) = tile else {
            continue;
        };

        let x = i64::from(col) * i64::from(window.tile_width);
        let y = i64::from(row) * i64::from(window.tile_height);

        if tile.dimensions() == (window.tile_width, window.tile_height) {
            imageops::replace(&mut surface, tile.as_ref(), x, y);
        } else {
            trace!(
                row,
                col,
                from_w = tile.width(),
                from_h = tile.height(),
                to_w = window.tile_width,
                to_h = window.tile_height,
                "resampling tile to cell"
            );
            let cell = imageops::resize(
                tile.as_ref(),
                window.tile_width,
                window.tile_height,
                FilterType::Nearest,
            );
            imageops::replace(&mut surface, &cell, x, y);
        }
    }

    Ok(surface)
}

// =============================================================================
// Tests
// =============================================================================
