//! Tile set loader.
//!
//! Given a resolved [`TileWindow`], the loader requests every tile of the
//! window through the shared [`ImageCache`] and joins the results into a
//! [`TileGrid`]. All requests are issued before any is awaited.
//!
//! A tile that fails to load becomes a blank cell. A partial mosaic is more
//! useful than none, so a tile failure never fails the window.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};

use super::cache::{DecodedTile, ImageCache};
use crate::descriptor::TileSetDescriptor;
use crate::io::TileFetcher;
use crate::window::TileWindow;

// =============================================================================
// Tile Grid
// =============================================================================

/// Loaded tiles of one window, row-major, window-relative.
#[derive(Debug, Clone)]
pub struct TileGrid {
    rows: u32,
    cols: u32,
    cells: Vec<Option<DecodedTile>>,
}

impl TileGrid {
    /// Build a grid from row-major cells.
    ///
    /// Returns `None` if the cell count does not match `rows * cols`.
    pub fn from_cells(rows: u32, cols: u32, cells: Vec<Option<DecodedTile>>) -> Option<Self> {
        if cells.len() != rows as usize * cols as usize {
            return None;
        }
        Some(Self { rows, cols, cells })
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    /// Tile at a window-relative cell, `None` when blank or out of range.
    pub fn get(&self, row: u32, col: u32) -> Option<&DecodedTile> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.cells[(row * self.cols + col) as usize].as_ref()
    }

    /// Number of cells that hold a tile.
    pub fn loaded_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    /// Number of blank cells.
    pub fn blank_count(&self) -> usize {
        self.cells.len() - self.loaded_count()
    }

    /// Iterate `(row, col, tile)` over every cell.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u32, Option<&DecodedTile>)> {
        let cols = self.cols;
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, cell)| (i as u32 / cols, i as u32 % cols, cell.as_ref()))
    }
}

// =============================================================================
// Loader
// =============================================================================

/// Loads the tiles of a window through a shared image cache.
pub struct TileSetLoader<F: TileFetcher> {
    cache: Arc<ImageCache<F>>,
}

impl<F: TileFetcher> Clone for TileSetLoader<F> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
        }
    }
}

impl<F: TileFetcher> TileSetLoader<F> {
    /// Create a loader over a shared cache.
    pub fn new(cache: Arc<ImageCache<F>>) -> Self {
        Self { cache }
    }

    /// Load every tile of `window`.
    ///
    /// Failed tiles come back as blank cells; this never fails.
    pub async fn load_window(&self, descriptor: &TileSetDescriptor, window: &TileWindow) -> TileGrid {
        let requests = window.cells().map(|(row, col)| {
            let (grid_row, grid_col) = window.grid_position(row, col);
            let source_id = descriptor.source_id_at(grid_row, grid_col);
            async move {
                match self.cache.load(&source_id).await {
                    Ok(tile) => Some(tile),
                    Err(e) => {
                        warn!(
                            tile = %source_id,
                            row = grid_row,
                            col = grid_col,
                            error = %e,
                            "tile unavailable, leaving cell blank"
                        );
                        None
                    }
                }
            }
        });

        let cells = join_all(requests).await;

        let grid = TileGrid {
            rows: window.rows_visible,
            cols: window.cols_visible,
            cells,
        };

        debug!(
            name = %descriptor.name,
            loaded = grid.loaded_count(),
            blank = grid.blank_count(),
            "window loaded"
        );

        grid
    }

    /// Get the shared cache.
    pub fn cache(&self) -> &Arc<ImageCache<F>> {
        &self.cache
    }
}

// =============================================================================
// Tests
// =============================================================================
