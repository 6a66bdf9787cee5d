//! Command-line configuration for the `pruner` binary.
//!
//! Every option can also be set through an environment variable with the
//! `PRUNER_` prefix.
//!
//! # Commands
//!
//! - `render <page.html> --width --height`: render every mosaic of a page
//! - `window --descriptor --width --height`: print the resolved window
//! - `serve`: run the HTTP render service
//! - `calc --width --height`: recommend a tile size for slicing an image
//!
//! # Environment Variables
//!
//! - `PRUNER_TILES_ROOT` - Directory that relative tile paths resolve against
//! - `PRUNER_S3_ENDPOINT` - Custom S3 endpoint for S3-compatible services
//! - `PRUNER_S3_REGION` - AWS region (default: us-east-1)
//! - `PRUNER_OUT_DIR` - Output directory for `render` (default: .)
//! - `PRUNER_QUALITY` - JPEG quality for composites (default: 80)
//! - `PRUNER_RESIZE_DEBOUNCE_MS` - Resize quiet period (default: 200)
//! - `PRUNER_MAX_COMPOSITE_PIXELS` - Largest composite in pixels (default: 33554432)
//! - `PRUNER_HOST` - Server bind address (default: 0.0.0.0)
//! - `PRUNER_PORT` - Server port (default: 3000)
//! - `PRUNER_CACHE_MAX_AGE` - HTTP cache max-age seconds (default: 3600)
//! - `PRUNER_CORS_ORIGINS` - Allowed CORS origins, comma-separated

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::descriptor::TileSetDescriptor;
use crate::render::DEFAULT_MAX_COMPOSITE_PIXELS;
use crate::tile::{DEFAULT_JPEG_QUALITY, MAX_JPEG_QUALITY, MIN_JPEG_QUALITY};
use crate::window::TileSize;

// =============================================================================
// Default Values
// =============================================================================

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_REGION: &str = "us-east-1";

/// One hour.
pub const DEFAULT_CACHE_MAX_AGE: u32 = 3600;

/// Default resize quiet period in milliseconds.
pub const DEFAULT_RESIZE_DEBOUNCE_MS: u64 = 200;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Tile Pruner - responsive mosaic renderer.
///
/// Resolves which part of a pre-sliced tile grid fills a viewport, fetches
/// only those tiles and composites them into one image.
#[derive(Parser, Debug, Clone)]
#[command(name = "pruner")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Render every mosaic element of an HTML page to image files.
    Render(RenderConfig),

    /// Resolve the tile window for a descriptor and print it as JSON.
    Window(WindowConfig),

    /// Run the HTTP render service.
    Serve(ServeConfig),

    /// Recommend a tile size for slicing an image.
    Calc(CalcConfig),
}

/// Where tiles are fetched from.
#[derive(Args, Debug, Clone)]
pub struct SourceConfig {
    /// Directory that relative tile paths resolve against.
    #[arg(long, env = "PRUNER_TILES_ROOT")]
    pub tiles_root: Option<PathBuf>,

    /// Endpoint of an S3-compatible store (MinIO, Ceph, R2) for `s3://` tiles.
    ///
    /// AWS itself is used when unset.
    #[arg(long, env = "PRUNER_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// AWS region for `s3://` tile paths.
    #[arg(long, default_value = DEFAULT_REGION, env = "PRUNER_S3_REGION")]
    pub s3_region: String,
}

impl SourceConfig {
    /// Tiles root, falling back to `default` when not configured.
    pub fn tiles_root_or(&self, default: &Path) -> PathBuf {
        self.tiles_root
            .clone()
            .unwrap_or_else(|| default.to_path_buf())
    }
}

// =============================================================================
// Render Command
// =============================================================================

/// Render all mosaics of a page at one viewport.
#[derive(Args, Debug, Clone)]
pub struct RenderConfig {
    /// HTML page containing `data-pruner` elements.
    pub page: PathBuf,

    /// Viewport width in pixels.
    #[arg(long)]
    pub width: u32,

    /// Viewport height in pixels.
    #[arg(long)]
    pub height: u32,

    /// Directory to write `{element id}.{ext}` files to.
    #[arg(long, default_value = ".", env = "PRUNER_OUT_DIR")]
    pub out_dir: PathBuf,

    /// JPEG quality for composites of JPEG tile sets (1-100).
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, env = "PRUNER_QUALITY")]
    pub quality: u8,

    /// Quiet period applied to resize bursts, in milliseconds.
    #[arg(long, default_value_t = DEFAULT_RESIZE_DEBOUNCE_MS, env = "PRUNER_RESIZE_DEBOUNCE_MS")]
    pub resize_debounce_ms: u64,

    /// Largest composite a pass may produce, in pixels.
    #[arg(long, default_value_t = DEFAULT_MAX_COMPOSITE_PIXELS, env = "PRUNER_MAX_COMPOSITE_PIXELS")]
    pub max_composite_pixels: u64,

    #[command(flatten)]
    pub source: SourceConfig,

    /// Log at debug level.
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl RenderConfig {
    /// Reject values clap cannot rule out on its own.
    pub fn validate(&self) -> Result<(), String> {
        validate_viewport(self.width, self.height)?;
        validate_quality(self.quality)?;
        validate_pixel_limit(self.max_composite_pixels)?;
        Ok(())
    }

    /// Tiles root: the configured one, else the page's directory.
    pub fn tiles_root(&self) -> PathBuf {
        let page_dir = self
            .page
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        self.source.tiles_root_or(page_dir)
    }

    pub fn resize_debounce(&self) -> Duration {
        Duration::from_millis(self.resize_debounce_ms)
    }
}

// =============================================================================
// Window Command
// =============================================================================

/// Resolve a window without fetching anything.
#[derive(Args, Debug, Clone)]
pub struct WindowConfig {
    /// Descriptor JSON, as in a `data-pruner` attribute.
    #[arg(long)]
    pub descriptor: String,

    /// Viewport width in pixels.
    #[arg(long)]
    pub width: u32,

    /// Viewport height in pixels.
    #[arg(long)]
    pub height: u32,

    /// Tile width, when the descriptor does not declare one.
    #[arg(long)]
    pub tile_width: Option<u32>,

    /// Tile height, when the descriptor does not declare one.
    #[arg(long)]
    pub tile_height: Option<u32>,
}

impl WindowConfig {
    /// Reject values clap cannot rule out on its own.
    pub fn validate(&self) -> Result<(), String> {
        validate_viewport(self.width, self.height)?;
        match (self.tile_width, self.tile_height) {
            (Some(0), _) | (_, Some(0)) => {
                Err("tile_width and tile_height must be greater than 0".to_string())
            }
            (Some(_), None) | (None, Some(_)) => {
                Err("tile_width and tile_height must be given together".to_string())
            }
            _ => Ok(()),
        }
    }

    /// Tile size from the flags, if both were given.
    pub fn tile_size(&self) -> Option<TileSize> {
        match (self.tile_width, self.tile_height) {
            (Some(w), Some(h)) => Some(TileSize::new(w, h)),
            _ => None,
        }
    }

    /// Tile size to resolve with: the flags win over the descriptor.
    pub fn resolve_tile_size(&self, descriptor: &TileSetDescriptor) -> Result<TileSize, String> {
        self.tile_size().or(descriptor.tile_size).ok_or_else(|| {
            "descriptor has no tileWidth/tileHeight; pass --tile-width and --tile-height"
                .to_string()
        })
    }
}

// =============================================================================
// Serve Command
// =============================================================================

/// Run the HTTP render service.
#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    /// Interface to listen on.
    #[arg(long, default_value = DEFAULT_HOST, env = "PRUNER_HOST")]
    pub host: String,

    /// TCP port.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "PRUNER_PORT")]
    pub port: u16,

    #[command(flatten)]
    pub source: SourceConfig,

    /// `max-age` sent with rendered composites.
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_AGE, env = "PRUNER_CACHE_MAX_AGE")]
    pub cache_max_age: u32,

    /// Largest composite one request may produce, in pixels.
    #[arg(long, default_value_t = DEFAULT_MAX_COMPOSITE_PIXELS, env = "PRUNER_MAX_COMPOSITE_PIXELS")]
    pub max_composite_pixels: u64,

    /// Origins allowed to read composites, comma-separated.
    ///
    /// Any origin when unset.
    #[arg(long, env = "PRUNER_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    /// Log at debug level.
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Skip per-request tracing spans.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl ServeConfig {
    /// Reject values clap cannot rule out on its own.
    pub fn validate(&self) -> Result<(), String> {
        if self.host.is_empty() {
            return Err("host must not be empty".to_string());
        }
        if let Some(root) = &self.source.tiles_root {
            if root.as_os_str().is_empty() {
                return Err("tiles_root must not be empty".to_string());
            }
        }
        validate_pixel_limit(self.max_composite_pixels)?;
        Ok(())
    }

    /// `host:port` for the listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// =============================================================================
// Calc Command
// =============================================================================

/// Tile size calculator input.
#[derive(Args, Debug, Clone)]
pub struct CalcConfig {
    /// Largest width the image will be exported at, in pixels.
    #[arg(long)]
    pub width: u32,

    /// Largest height the image will be exported at, in pixels.
    #[arg(long)]
    pub height: u32,

    /// Print the result as JSON.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

impl CalcConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.width == 0 || self.height == 0 {
            return Err("image width and height must be greater than 0".to_string());
        }
        Ok(())
    }
}

// =============================================================================
// Shared Validation
// =============================================================================

fn validate_viewport(width: u32, height: u32) -> Result<(), String> {
    if width == 0 || height == 0 {
        return Err("viewport width and height must be greater than 0".to_string());
    }
    Ok(())
}

fn validate_pixel_limit(max_pixels: u64) -> Result<(), String> {
    if max_pixels == 0 {
        return Err("max_composite_pixels must be greater than 0".to_string());
    }
    Ok(())
}

fn validate_quality(quality: u8) -> Result<(), String> {
    if !(MIN_JPEG_QUALITY..=MAX_JPEG_QUALITY).contains(&quality) {
        return Err("quality must be between 1 and 100".to_string());
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
