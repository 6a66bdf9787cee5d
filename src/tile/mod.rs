//! Tile loading and compositing.
//!
//! This module turns a resolved [`TileWindow`](crate::window::TileWindow) into
//! pixels: it loads the window's tiles through a shared cache, draws them onto
//! one surface and encodes the result.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │             MosaicRenderer              │
//! └────────────────────┬────────────────────┘
//!                      │ window
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │             TileSetLoader               │
//! │   join_all(load(id) for id in window)   │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │              ImageCache                 │
//! │  ┌──────────────┐  ┌─────────────────┐  │
//! │  │ singleflight │  │  TileDecoder    │  │
//! │  │  + entries   │  │  (bytes → RGBA) │  │
//! │  └──────────────┘  └─────────────────┘  │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │          TileFetcher (fs/http/s3)       │
//! └─────────────────────────────────────────┘
//! ```
//!
//! The loaded [`TileGrid`] is handed to [`compose`], and the surface to
//! [`SurfaceEncoder`].
//!
//! # Components
//!
//! - [`ImageCache`]: deduplicating cache of decoded tiles, never evicted
//! - [`TileSetLoader`]: concurrent loading of every tile in a window
//! - [`TileGrid`]: loaded tiles, with blank cells for failures
//! - [`compose`]: draws a grid onto a transparent surface
//! - [`SurfaceEncoder`]: encodes the surface as WebP, JPEG or PNG

mod cache;
mod compositor;
mod decoder;
mod encoder;
mod loader;

pub use cache::{CacheStats, DecodedTile, ImageCache};
pub use compositor::compose;
pub use decoder::TileDecoder;
pub use encoder::{
    clamp_quality, EncodedImage, OutputFormat, SurfaceEncoder, DEFAULT_JPEG_QUALITY,
    MAX_JPEG_QUALITY, MIN_JPEG_QUALITY,
};
pub use loader::{TileGrid, TileSetLoader};
