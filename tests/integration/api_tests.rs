//! API integration tests for the render service.
//!
//! Tests verify:
//! - Window resolution and composite rendering over HTTP
//! - Response headers (content type, caching, window, blank cells)
//! - Error cases (bad descriptor, bad viewport, unavailable first tile)

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use tile_pruner::{create_router, FsFetcher, ImageCache, MosaicRenderer, RouterConfig};

use super::test_utils::{decode, png_descriptor, solid_png, MockTileFetcher};

const RED: [u8; 4] = [255, 0, 0, 255];

fn router(fetcher: MockTileFetcher) -> Router {
    let renderer = MosaicRenderer::new(Arc::new(ImageCache::new(fetcher)));
    create_router(renderer, RouterConfig::new().with_tracing(false))
}

fn uri(endpoint: &str, descriptor: &str, width: u32, height: u32) -> String {
    format!(
        "/{}?descriptor={}&width={}&height={}",
        endpoint,
        urlencoding::encode(descriptor),
        width,
        height
    )
}

async fn get(router: Router, uri: &str) -> axum::response::Response {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    router.oneshot(request).await.unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health() {
    let response = get(router(MockTileFetcher::new()), "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

// =============================================================================
// Window
// =============================================================================

#[tokio::test]
async fn test_window_lists_visible_tiles() {
    let fetcher = MockTileFetcher::new();
    let descriptor = png_descriptor("harbour", 14, 8, Some(15));

    let response = get(router(fetcher.clone()), &uri("window", &descriptor, 300, 300)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["start_row"], 0);
    assert_eq!(json["start_col"], 0);
    assert_eq!(json["rows_visible"], 3);
    assert_eq!(json["cols_visible"], 3);
    assert_eq!(json["tile_width"], 100);

    let tiles: Vec<&str> = json["tiles"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t.as_str().unwrap())
        .collect();
    assert_eq!(tiles.len(), 9);
    assert_eq!(tiles[0], "harbour-1.png");
    assert_eq!(tiles[3], "harbour-15.png");
    assert_eq!(tiles[8], "harbour-31.png");

    // Explicit tile size: nothing needs fetching
    assert_eq!(fetcher.request_count(), 0);
}

// =============================================================================
// Render
// =============================================================================

#[tokio::test]
async fn test_render_returns_composite_with_headers() {
    let fetcher = MockTileFetcher::new().with_grid("", "harbour", 14 * 8, 100, RED);
    let descriptor = png_descriptor("harbour", 14, 8, Some(15));

    let response = get(router(fetcher), &uri("render", &descriptor, 300, 300)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let headers = response.headers();
    assert_eq!(headers.get("content-type").unwrap(), "image/png");
    assert_eq!(headers.get("cache-control").unwrap(), "public, max-age=3600");
    assert_eq!(headers.get("x-pruner-window").unwrap(), "0,0,3,3");
    assert_eq!(headers.get("x-pruner-blank-cells").unwrap(), "0");

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let pixels = decode(&body);
    assert_eq!(pixels.dimensions(), (300, 300));
    assert_eq!(pixels.get_pixel(0, 0).0, RED);
}

#[tokio::test]
async fn test_render_reports_blank_cells() {
    let fetcher = MockTileFetcher::new()
        .with_grid("", "m", 6, 100, RED)
        .without_tile("m-4.png");
    let descriptor = png_descriptor("m", 3, 2, None);

    let response = get(router(fetcher), &uri("render", &descriptor, 300, 200)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("x-pruner-blank-cells").unwrap(), "1");
}

#[tokio::test]
async fn test_render_jpeg_tile_set() {
    let data = solid_png(100, 100, RED);
    let fetcher = MockTileFetcher::new()
        .with_tile("m-1.jpg", data.clone())
        .with_tile("m-2.jpg", data);
    let descriptor = r#"{"name": "m", "cols": 2, "rows": 1, "path": "", "imageExtension": "jpg"}"#;

    let uri = format!("{}&quality=60", uri("render", descriptor, 200, 100));
    let response = get(router(fetcher), &uri).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("content-type").unwrap(), "image/jpeg");

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..2], &[0xFF, 0xD8]);
}

#[tokio::test]
async fn test_custom_cache_max_age() {
    let fetcher = MockTileFetcher::new().with_grid("", "m", 1, 100, RED);
    let renderer = MosaicRenderer::new(Arc::new(ImageCache::new(fetcher)));
    let router = create_router(renderer, RouterConfig::new().with_cache_max_age(60));

    let response = get(router, &uri("render", &png_descriptor("m", 1, 1, None), 50, 50)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("cache-control").unwrap(),
        "public, max-age=60"
    );
}

// =============================================================================
// Errors
// =============================================================================

#[tokio::test]
async fn test_invalid_descriptor_is_bad_request() {
    let response = get(
        router(MockTileFetcher::new()),
        &uri("render", r#"{"name": "m", "cols": 0, "rows": 2, "path": ""}"#, 100, 100),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = json_body(response).await;
    assert_eq!(json["error"], "invalid_descriptor");
    assert_eq!(json["status"], 400);
    assert!(json["message"].as_str().unwrap().contains("cols"));
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let response = get(
        router(MockTileFetcher::new()),
        &uri("window", "{not json", 100, 100),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "invalid_descriptor");
}

#[tokio::test]
async fn test_zero_viewport_is_bad_request() {
    let descriptor = png_descriptor("m", 2, 2, None);
    let response = get(router(MockTileFetcher::new()), &uri("window", &descriptor, 0, 100)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "invalid_viewport");
}

#[tokio::test]
async fn test_missing_query_parameter_is_bad_request() {
    let response = get(router(MockTileFetcher::new()), "/render?width=10&height=10").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_oversized_tile_size_is_refused() {
    let fetcher = MockTileFetcher::new();
    let descriptor = r#"{"name": "a", "cols": 1, "rows": 1, "path": "",
        "tileWidth": 4000000000, "tileHeight": 4000000000}"#;

    let response = get(router(fetcher.clone()), &uri("render", descriptor, 1, 1)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "composite_too_large");
    assert_eq!(fetcher.request_count(), 0);

    let descriptor = r#"{"name": "a", "cols": 1, "rows": 1, "path": "",
        "tileWidth": 50000, "tileHeight": 50000}"#;
    let response = get(router(fetcher.clone()), &uri("render", descriptor, 1, 1)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(fetcher.request_count(), 0);
}

#[tokio::test]
async fn test_oversized_viewport_is_refused() {
    let fetcher = MockTileFetcher::new().with_grid("", "m", 4, 100, RED);
    let descriptor = png_descriptor("m", 2000, 2000, None);

    for endpoint in ["window", "render"] {
        let response = get(
            router(fetcher.clone()),
            &uri(endpoint, &descriptor, 100_000, 100_000),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", endpoint);
        assert_eq!(json_body(response).await["error"], "composite_too_large");
    }
    assert_eq!(fetcher.request_count(), 0);
}

#[tokio::test]
async fn test_tiles_outside_root_are_not_served() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(dir.path().join("secret-1.png"), solid_png(100, 100, RED)).unwrap();
    let root = dir.path().join("site");
    std::fs::create_dir(&root).unwrap();

    let renderer = MosaicRenderer::new(Arc::new(ImageCache::new(FsFetcher::new(&root))));
    let router = create_router(renderer, RouterConfig::new().with_tracing(false));

    // Explicit size: the only fetch is the tile itself, which must be refused
    let descriptor = r#"{"name": "secret", "cols": 1, "rows": 1, "path": "../",
        "tileWidth": 100, "tileHeight": 100, "imageExtension": "png"}"#;
    let response = get(router.clone(), &uri("render", descriptor, 100, 100)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("x-pruner-blank-cells").unwrap(), "1");

    // Inferred size: loading tile 1 is itself refused
    let descriptor = r#"{"name": "secret", "cols": 1, "rows": 1, "path": "../", "imageExtension": "png"}"#;
    let response = get(router, &uri("window", descriptor, 100, 100)).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_unavailable_first_tile_is_bad_gateway() {
    let descriptor = r#"{"name": "m", "tile": "2 2", "path": "", "imageExtension": "png"}"#;
    let response = get(router(MockTileFetcher::new()), &uri("window", descriptor, 100, 100)).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(json_body(response).await["error"], "tile_unavailable");
}
