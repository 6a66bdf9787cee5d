//! HTTP render service.
//!
//! Resolves and composites mosaics server-side, for hosts that cannot run
//! the pipeline themselves.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │       GET /window?descriptor=...   GET /render?descriptor=...   │
//! │                                                                 │
//! │  ┌──────────────────────────┐  ┌─────────────────────────────┐  │
//! │  │        handlers          │  │          routes             │  │
//! │  │ (query → MosaicRenderer) │  │  (router config, CORS)      │  │
//! │  └──────────────────────────┘  └─────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod routes;

pub use handlers::{
    health_handler, render_handler, window_handler, AppState, ErrorResponse, HandlerError,
    HealthResponse, RenderQueryParams, WindowQueryParams, WindowResponse, BLANK_CELLS_HEADER,
    WINDOW_HEADER,
};
pub use routes::{create_router, RouterConfig};
