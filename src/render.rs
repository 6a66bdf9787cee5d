//! Mosaic render pass.
//!
//! A pass is one resolve, load and compose cycle for a descriptor at a
//! viewport:
//!
//! ```text
//!   descriptor + viewport
//!          │
//!          ▼
//!   tile size (explicit, or read from tile 1 through the cache)
//!          │
//!          ▼
//!   resolve window ──► load tiles (join_all) ──► compose ──► RenderOutput
//! ```
//!
//! Encoding is a separate step so callers that only need pixels (or only the
//! window) do not pay for it.

use std::sync::Arc;

use image::RgbaImage;
use tracing::{debug, warn};

use crate::descriptor::TileSetDescriptor;
use crate::error::RenderError;
use crate::io::TileFetcher;
use crate::tile::{compose, EncodedImage, ImageCache, OutputFormat, SurfaceEncoder, TileSetLoader};
use crate::window::{TileSize, TileWindow, Viewport};

/// Pixel limit for one composite: 2^25 pixels (128 MiB of RGBA), enough for
/// a 7680x4320 viewport.
pub const DEFAULT_MAX_COMPOSITE_PIXELS: u64 = 1 << 25;

// =============================================================================
// Output Types
// =============================================================================

/// Result of one render pass.
#[derive(Debug, Clone)]
pub struct RenderOutput {
    /// Window that was rendered
    pub window: TileWindow,

    /// Composited surface, `window.output_size()` pixels
    pub surface: RgbaImage,

    /// Cells left blank because their tile failed to load
    pub blank_cells: usize,
}

impl RenderOutput {
    /// Encode the surface into a publishable image.
    pub fn encode(
        &self,
        encoder: &SurfaceEncoder,
        format: OutputFormat,
    ) -> Result<PublishedImage, RenderError> {
        let image = encoder.encode(&self.surface, format)?;
        Ok(PublishedImage {
            image,
            window: self.window,
            blank_cells: self.blank_cells,
        })
    }
}

/// The encoded composite handed to an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedImage {
    pub image: EncodedImage,
    pub window: TileWindow,
    pub blank_cells: usize,
}

impl PublishedImage {
    /// MIME type of the encoded bytes.
    pub fn mime_type(&self) -> &'static str {
        self.image.format.mime_type()
    }

    /// `data:` URL for the element's image source.
    pub fn data_url(&self) -> String {
        self.image.data_url()
    }
}

// =============================================================================
// Renderer
// =============================================================================

/// Runs render passes against a shared image cache.
///
/// Windows that would composite into more than
/// [`max_composite_pixels`](Self::max_composite_pixels) are refused with
/// [`RenderError::CompositeTooLarge`] before any tile is loaded.
pub struct MosaicRenderer<F: TileFetcher> {
    loader: TileSetLoader<F>,
    max_composite_pixels: u64,
}

impl<F: TileFetcher> Clone for MosaicRenderer<F> {
    fn clone(&self) -> Self {
        Self {
            loader: self.loader.clone(),
            max_composite_pixels: self.max_composite_pixels,
        }
    }
}

impl<F: TileFetcher> MosaicRenderer<F> {
    /// Create a renderer over a shared cache.
    pub fn new(cache: Arc<ImageCache<F>>) -> Self {
        Self {
            loader: TileSetLoader::new(cache),
            max_composite_pixels: DEFAULT_MAX_COMPOSITE_PIXELS,
        }
    }

    /// Set the largest composite, in pixels, a pass may produce.
    pub fn with_max_composite_pixels(mut self, max_pixels: u64) -> Self {
        self.max_composite_pixels = max_pixels;
        self
    }

    pub fn max_composite_pixels(&self) -> u64 {
        self.max_composite_pixels
    }

    /// Get the shared image cache.
    pub fn cache(&self) -> &Arc<ImageCache<F>> {
        self.loader.cache()
    }

    /// Tile size for a descriptor.
    ///
    /// Uses the declared size when present. Otherwise tile 1 is loaded
    /// through the cache and its decoded dimensions are used; the tile stays
    /// cached for the pass that follows.
    pub async fn tile_size(&self, descriptor: &TileSetDescriptor) -> Result<TileSize, RenderError> {
        if let Some(size) = descriptor.tile_size {
            return Ok(size);
        }

        let first = descriptor.source_id(1);
        let tile = self
            .cache()
            .load(&first)
            .await
            .map_err(RenderError::TileSizeUnavailable)?;

        debug!(
            name = %descriptor.name,
            width = tile.width(),
            height = tile.height(),
            "inferred tile size from first tile"
        );

        Ok(TileSize::new(tile.width(), tile.height()))
    }

    /// Resolve the window for a viewport without loading the window's tiles.
    pub async fn resolve_window(
        &self,
        descriptor: &TileSetDescriptor,
        viewport: Viewport,
    ) -> Result<TileWindow, RenderError> {
        let tile_size = self.tile_size(descriptor).await?;
        let window = descriptor.resolve_window(tile_size, viewport);

        if window.output_pixels() > self.max_composite_pixels || window.output_size().is_none() {
            let (width, height) = window.output_dimensions();
            warn!(
                name = %descriptor.name,
                width,
                height,
                limit = self.max_composite_pixels,
                "composite over pixel limit"
            );
            return Err(RenderError::CompositeTooLarge { width, height });
        }

        Ok(window)
    }

    /// Run one full pass: resolve, load and compose.
    pub async fn render(
        &self,
        descriptor: &TileSetDescriptor,
        viewport: Viewport,
    ) -> Result<RenderOutput, RenderError> {
        let window = self.resolve_window(descriptor, viewport).await?;

        debug!(
            name = %descriptor.name,
            start_row = window.start_row,
            start_col = window.start_col,
            rows = window.rows_visible,
            cols = window.cols_visible,
            "window resolved"
        );

        let tiles = self.loader.load_window(descriptor, &window).await;
        let surface = compose(&window, &tiles)?;

        Ok(RenderOutput {
            window,
            surface,
            blank_cells: tiles.blank_count(),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
