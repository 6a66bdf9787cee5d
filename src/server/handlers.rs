//! Handlers behind the render service routes.
//!
//! Every request carries the descriptor JSON verbatim in its query string,
//! so the service holds no per-mosaic state beyond the shared image cache.

use axum::{
    extract::{Query, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::config::DEFAULT_CACHE_MAX_AGE;
use crate::descriptor::TileSetDescriptor;
use crate::error::{DescriptorError, RenderError};
use crate::io::TileFetcher;
use crate::render::MosaicRenderer;
use crate::tile::{OutputFormat, SurfaceEncoder, DEFAULT_JPEG_QUALITY};
use crate::window::{TileWindow, Viewport};

/// Response header carrying the rendered window as `row,col,rows,cols`.
pub const WINDOW_HEADER: HeaderName = HeaderName::from_static("x-pruner-window");

/// Response header carrying the number of blank cells.
pub const BLANK_CELLS_HEADER: HeaderName = HeaderName::from_static("x-pruner-blank-cells");

// =============================================================================
// Application State
// =============================================================================

/// State handed to every handler.
pub struct AppState<F: TileFetcher> {
    /// Renderer over the process-wide image cache
    pub renderer: MosaicRenderer<F>,

    /// `max-age` attached to rendered composites
    pub cache_max_age: u32,
}

impl<F: TileFetcher> AppState<F> {
    pub fn new(renderer: MosaicRenderer<F>) -> Self {
        Self::with_cache_max_age(renderer, DEFAULT_CACHE_MAX_AGE)
    }

    pub fn with_cache_max_age(renderer: MosaicRenderer<F>, cache_max_age: u32) -> Self {
        Self {
            renderer,
            cache_max_age,
        }
    }
}

impl<F: TileFetcher> Clone for AppState<F> {
    fn clone(&self) -> Self {
        Self {
            renderer: self.renderer.clone(),
            cache_max_age: self.cache_max_age,
        }
    }
}

// =============================================================================
// Request Parameters
// =============================================================================

/// `GET /window` query: the `data-pruner` JSON and the viewport in pixels.
#[derive(Debug, Deserialize)]
pub struct WindowQueryParams {
    pub descriptor: String,
    pub width: u32,
    pub height: u32,
}

/// `GET /render` query. `quality` only affects JPEG tile sets.
#[derive(Debug, Deserialize)]
pub struct RenderQueryParams {
    pub descriptor: String,
    pub width: u32,
    pub height: u32,
    #[serde(default = "jpeg_quality_default")]
    pub quality: u8,
}

fn jpeg_quality_default() -> u8 {
    DEFAULT_JPEG_QUALITY
}

fn viewport(width: u32, height: u32) -> Result<Viewport, HandlerError> {
    if width == 0 || height == 0 {
        return Err(HandlerError::InvalidViewport { width, height });
    }
    Ok(Viewport::new(width, height))
}

// =============================================================================
// Response Types
// =============================================================================

/// Body of every non-2xx response.
///
/// `error` is a stable machine-readable code such as `invalid_descriptor`;
/// `message` is for humans and may change.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    pub message: String,
    pub status: u16,
}

impl ErrorResponse {
    pub fn new(error: &'static str, message: impl Into<String>, status: StatusCode) -> Self {
        Self {
            error,
            message: message.into(),
            status: status.as_u16(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Response from the window endpoint.
#[derive(Debug, Serialize)]
pub struct WindowResponse {
    #[serde(flatten)]
    pub window: TileWindow,

    /// Source ids of the window's tiles, row-major
    pub tiles: Vec<String>,
}

impl WindowResponse {
    pub fn new(descriptor: &TileSetDescriptor, window: TileWindow) -> Self {
        let tiles = window
            .cells()
            .map(|(row, col)| {
                let (grid_row, grid_col) = window.grid_position(row, col);
                descriptor.source_id_at(grid_row, grid_col)
            })
            .collect();
        Self { window, tiles }
    }
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Errors returned by handlers.
#[derive(Debug)]
pub enum HandlerError {
    Render(RenderError),
    InvalidViewport { width: u32, height: u32 },
}

impl From<RenderError> for HandlerError {
    fn from(err: RenderError) -> Self {
        HandlerError::Render(err)
    }
}

impl From<DescriptorError> for HandlerError {
    fn from(err: DescriptorError) -> Self {
        HandlerError::Render(RenderError::Descriptor(err))
    }
}

/// Client mistakes log at WARN, failures on our side at ERROR.
impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            HandlerError::InvalidViewport { width, height } => (
                StatusCode::BAD_REQUEST,
                "invalid_viewport",
                format!(
                    "Invalid viewport {}x{} (both dimensions must be at least 1)",
                    width, height
                ),
            ),
            HandlerError::Render(RenderError::Descriptor(err)) => (
                StatusCode::BAD_REQUEST,
                "invalid_descriptor",
                err.to_string(),
            ),
            HandlerError::Render(err @ RenderError::CompositeTooLarge { .. }) => (
                StatusCode::BAD_REQUEST,
                "composite_too_large",
                err.to_string(),
            ),
            HandlerError::Render(RenderError::TileSizeUnavailable(err)) => (
                StatusCode::BAD_GATEWAY,
                "tile_unavailable",
                err.to_string(),
            ),
            HandlerError::Render(RenderError::Encode { message }) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "encode_error",
                format!("Failed to encode composite: {}", message),
            ),
        };

        if status.is_server_error() {
            error!(code, status = status.as_u16(), "request failed: {}", message);
        } else {
            warn!(code, status = status.as_u16(), "request rejected: {}", message);
        }

        (status, Json(ErrorResponse::new(code, message, status))).into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// `GET /health`: always `{"status": "healthy", "version": ...}`.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `GET /window`: the window and its tile ids, without loading the tiles.
///
/// A descriptor without a tile size still costs one load of tile 1. Bad
/// descriptors, zero viewports and windows over the renderer's pixel limit
/// are 400; a tile 1 that cannot be loaded for inference is 502.
pub async fn window_handler<F: TileFetcher>(
    State(state): State<AppState<F>>,
    Query(query): Query<WindowQueryParams>,
) -> Result<Json<WindowResponse>, HandlerError> {
    let descriptor = TileSetDescriptor::parse(&query.descriptor)?;
    let viewport = viewport(query.width, query.height)?;

    let window = state.renderer.resolve_window(&descriptor, viewport).await?;

    debug!(
        name = %descriptor.name,
        window = %window.header_value(),
        "window resolved"
    );

    Ok(Json(WindowResponse::new(&descriptor, window)))
}

/// `GET /render`: the encoded composite, typed after the tile extension.
///
/// Besides `Content-Type` and `Cache-Control`, the response names the window
/// it covers in `X-Pruner-Window` (`row,col,rows,cols`) and the number of
/// cells left empty by failed tiles in `X-Pruner-Blank-Cells`. Errors map as
/// for `/window`, plus 500 when encoding fails.
pub async fn render_handler<F: TileFetcher>(
    State(state): State<AppState<F>>,
    Query(query): Query<RenderQueryParams>,
) -> Result<Response, HandlerError> {
    let descriptor = TileSetDescriptor::parse(&query.descriptor)?;
    let viewport = viewport(query.width, query.height)?;

    let output = state.renderer.render(&descriptor, viewport).await?;
    let published = output.encode(
        &SurfaceEncoder::with_quality(query.quality),
        OutputFormat::from_extension(&descriptor.image_extension),
    )?;

    let cache_control = format!("public, max-age={}", state.cache_max_age);
    let headers = [
        (header::CONTENT_TYPE, published.mime_type().to_string()),
        (header::CACHE_CONTROL, cache_control),
        (WINDOW_HEADER, published.window.header_value()),
        (BLANK_CELLS_HEADER, published.blank_cells.to_string()),
    ];

    Ok((StatusCode::OK, headers, published.image.data).into_response())
}

// =============================================================================
// Tests
// =============================================================================
