//! Router configuration for the render service.
//!
//! # Route Structure
//!
//! ```text
//! /health                                       - Health check
//! /window?descriptor=&width=&height=            - Resolve a window (JSON)
//! /render?descriptor=&width=&height=&quality=   - Render a composite (image)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tile_pruner::io::FsFetcher;
//! use tile_pruner::render::MosaicRenderer;
//! use tile_pruner::server::{create_router, RouterConfig};
//! use tile_pruner::tile::ImageCache;
//!
//! let renderer = MosaicRenderer::new(Arc::new(ImageCache::new(FsFetcher::new("./public"))));
//! let config = RouterConfig::new()
//!     .with_cors_origins(vec!["https://example.com".to_string()]);
//!
//! let router = create_router(renderer, config);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::time::Duration;

use axum::{routing::get, Router};
use http::header::CONTENT_TYPE;
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    health_handler, render_handler, window_handler, AppState, BLANK_CELLS_HEADER, WINDOW_HEADER,
};
use crate::config::DEFAULT_CACHE_MAX_AGE;
use crate::io::TileFetcher;
use crate::render::MosaicRenderer;

// =============================================================================
// Router Configuration
// =============================================================================

/// Settings for [`create_router`].
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Origins allowed to read render responses; `None` allows every origin
    pub cors_origins: Option<Vec<String>>,

    /// `max-age` sent with rendered composites
    pub cache_max_age: u32,

    /// Wrap the router in a `TraceLayer`
    pub enable_tracing: bool,
}

impl RouterConfig {
    /// Any origin, one hour of caching, tracing on.
    pub fn new() -> Self {
        Self {
            cors_origins: None,
            cache_max_age: DEFAULT_CACHE_MAX_AGE,
            enable_tracing: true,
        }
    }

    /// Restrict CORS to these origins. An empty list blocks cross-origin reads.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Lift any CORS restriction.
    pub fn with_cors_any_origin(mut self) -> Self {
        self.cors_origins = None;
        self
    }

    /// Set the `max-age` of rendered composites, in seconds.
    pub fn with_cache_max_age(mut self, seconds: u32) -> Self {
        self.cache_max_age = seconds;
        self
    }

    /// Toggle per-request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Build the render service router around a shared renderer.
pub fn create_router<F>(renderer: MosaicRenderer<F>, config: RouterConfig) -> Router
where
    F: TileFetcher + 'static,
{
    let app_state = AppState::with_cache_max_age(renderer, config.cache_max_age);
    let cors = build_cors_layer(&config);

    let router = Router::new()
        .route("/health", get(health_handler))
        .route("/window", get(window_handler::<F>))
        .route("/render", get(render_handler::<F>))
        .with_state(app_state)
        .layer(cors);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// CORS for read-only image endpoints. The window and blank-cell headers are
/// exposed so browser callers can read them.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .expose_headers([WINDOW_HEADER, BLANK_CELLS_HEADER])
        .max_age(Duration::from_secs(86400));

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
