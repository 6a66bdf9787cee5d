//! # Tile Pruner
//!
//! Responsive mosaic rendering for large images that have been sliced into a
//! grid of tiles.
//!
//! A host element carries a small JSON descriptor naming the tile grid. When
//! the element becomes visible, and again after the viewport settles from a
//! resize, the library works out which contiguous block of tiles is needed to
//! fill the viewport, loads only those tiles, composites them onto one
//! surface and publishes the encoded result back to the element.
//!
//! ## Features
//!
//! - **Windowed loading**: only the tiles covering the viewport are fetched
//! - **Shared image cache**: each tile is fetched and decoded at most once,
//!   with concurrent requests for the same tile joined onto one fetch
//! - **Debounced resizes**: bursts of resize events produce one recompute
//! - **Stale-pass suppression**: a slow render never overwrites a newer one
//! - **Pluggable sources**: filesystem, HTTP(S) and S3 tile locations
//! - **Render service**: an Axum server exposing window resolution and
//!   server-side compositing
//!
//! ## Architecture
//!
//! - [`window`] - pure window resolution
//! - [`descriptor`] - element descriptor parsing and tile naming
//! - [`io`] - tile fetchers for each storage backend
//! - [`tile`] - image cache, loader, compositor and encoder
//! - [`render`] - the resolve → load → compose pipeline
//! - [`binding`] - element lifecycle, debouncing and publication
//! - [`server`] - Axum-based HTTP render service
//! - [`calc`] - tile size recommendation for slicing new images
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tile_pruner::{FsFetcher, ImageCache, MosaicRenderer, TileSetDescriptor, Viewport};
//!
//! #[tokio::main]
//! async fn main() {
//!     let descriptor = TileSetDescriptor::parse(
//!         r#"{"imagePath":"tiles/","imageName":"img","cols":14,"rows":8,"roi":15,"tileWidth":100,"tileHeight":100}"#,
//!     )
//!     .unwrap();
//!
//!     let renderer = MosaicRenderer::new(Arc::new(ImageCache::new(FsFetcher::new("./public"))));
//!     let output = renderer.render(&descriptor, Viewport::new(1280, 720)).await.unwrap();
//!     println!("{:?} with {} blank cells", output.window, output.blank_cells);
//! }
//! ```

pub mod binding;
pub mod calc;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod io;
pub mod render;
pub mod server;
pub mod tile;
pub mod window;

// Re-export commonly used types
pub use binding::{
    bind_elements, read_descriptor, BindReport, BindingPhase, HostElement, HostEvent, HtmlPage,
    PageElement, PassReport, PassStatus, RunSummary, Scheduler, SchedulerConfig, SkippedElement,
    DEFAULT_RESIZE_DEBOUNCE,
};
pub use calc::{calculate, optimal_tile_size, TileLayout};
pub use config::{CalcConfig, Cli, Command, RenderConfig, ServeConfig, SourceConfig, WindowConfig};
pub use descriptor::{TileSetDescriptor, DEFAULT_IMAGE_EXTENSION, DESCRIPTOR_ATTRIBUTE};
pub use error::{DescriptorError, IoError, RenderError, TileLoadError, TileLoadReason};
pub use io::{
    create_s3_client, parse_s3_uri, FsFetcher, HttpFetcher, S3Fetcher, SourceRouter, TileFetcher,
};
pub use render::{MosaicRenderer, PublishedImage, RenderOutput, DEFAULT_MAX_COMPOSITE_PIXELS};
pub use server::{create_router, AppState, RouterConfig};
pub use tile::{
    compose, CacheStats, DecodedTile, EncodedImage, ImageCache, OutputFormat, SurfaceEncoder,
    TileDecoder, TileGrid, TileSetLoader,
};
pub use window::{
    resolve, GridSize, MobileScale, TileSize, TileWindow, Viewport, DEFAULT_MOBILE_BREAKPOINT,
};
