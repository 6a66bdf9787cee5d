//! Test utilities for integration tests.
//!
//! This module provides a mock tile fetcher with request tracking, a host
//! element that records what it is given, and helpers for building tile
//! images.

use async_trait::async_trait;
use bytes::Bytes;
use image::codecs::png::PngEncoder;
use image::{ImageEncoder, Rgba, RgbaImage};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

use tile_pruner::error::IoError;
use tile_pruner::{HostElement, PublishedImage, TileFetcher, DESCRIPTOR_ATTRIBUTE};

// =============================================================================
// Tile Images
// =============================================================================

/// Encode a solid-colour tile as PNG.
pub fn solid_png(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba(color));
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgba8)
        .unwrap();
    buf
}

/// Decode published bytes back into pixels.
pub fn decode(data: &[u8]) -> RgbaImage {
    image::load_from_memory(data).unwrap().into_rgba8()
}

// =============================================================================
// Mock Tile Fetcher
// =============================================================================

/// An in-memory tile fetcher that tracks every request.
///
/// Tiles not registered are reported as not found. Ids registered with
/// [`with_gated`](MockTileFetcher::with_gated) block until [`open_gate`]
/// is called.
///
/// [`open_gate`]: MockTileFetcher::open_gate
#[derive(Clone)]
pub struct MockTileFetcher {
    tiles: Arc<HashMap<String, Bytes>>,
    gated: Arc<HashSet<String>>,
    gate: Arc<Semaphore>,
    request_count: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockTileFetcher {
    pub fn new() -> Self {
        Self {
            tiles: Arc::new(HashMap::new()),
            gated: Arc::new(HashSet::new()),
            gate: Arc::new(Semaphore::new(0)),
            request_count: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Register a tile.
    pub fn with_tile(mut self, source_id: impl Into<String>, data: Vec<u8>) -> Self {
        Arc::make_mut(&mut self.tiles).insert(source_id.into(), Bytes::from(data));
        self
    }

    /// Register the full `{path}{name}-{index}.png` grid in one colour.
    pub fn with_grid(mut self, path: &str, name: &str, count: u32, size: u32, color: [u8; 4]) -> Self {
        let data = solid_png(size, size, color);
        for index in 1..=count {
            self = self.with_tile(format!("{}{}-{}.png", path, name, index), data.clone());
        }
        self
    }

    /// Drop a tile so it is reported as not found.
    pub fn without_tile(mut self, source_id: &str) -> Self {
        Arc::make_mut(&mut self.tiles).remove(source_id);
        self
    }

    /// Make fetches of a tile wait for the gate.
    pub fn with_gated(mut self, source_id: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.gated).insert(source_id.into());
        self
    }

    /// Release every gated fetch, now and later.
    pub fn open_gate(&self) {
        self.gate.close();
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Number of requests for one tile.
    pub fn requests_for(&self, source_id: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|id| id.as_str() == source_id)
            .count()
    }
}

#[async_trait]
impl TileFetcher for MockTileFetcher {
    async fn fetch(&self, source_id: &str) -> Result<Bytes, IoError> {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(source_id.to_string());

        if self.gated.contains(source_id) {
            // Closing the semaphore is what releases waiters.
            let _ = self.gate.acquire().await;
        }

        self.tiles
            .get(source_id)
            .cloned()
            .ok_or_else(|| IoError::NotFound(source_id.to_string()))
    }
}

// =============================================================================
// Recording Host Element
// =============================================================================

/// A host element whose descriptor can be swapped and which keeps every
/// image published to it.
pub struct RecordingElement {
    id: String,
    descriptor: Mutex<Option<String>>,
    published: Mutex<Vec<PublishedImage>>,
}

impl RecordingElement {
    pub fn new(id: &str, descriptor: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            descriptor: Mutex::new(Some(descriptor.to_string())),
            published: Mutex::new(Vec::new()),
        })
    }

    pub fn set_descriptor(&self, descriptor: &str) {
        *self.descriptor.lock().unwrap() = Some(descriptor.to_string());
    }

    pub fn published(&self) -> Vec<PublishedImage> {
        self.published.lock().unwrap().clone()
    }

    pub fn publish_count(&self) -> usize {
        self.published.lock().unwrap().len()
    }
}

impl HostElement for RecordingElement {
    fn id(&self) -> &str {
        &self.id
    }

    fn attribute(&self, name: &str) -> Option<String> {
        if name == DESCRIPTOR_ATTRIBUTE {
            self.descriptor.lock().unwrap().clone()
        } else {
            None
        }
    }

    fn publish(&self, image: PublishedImage) {
        self.published.lock().unwrap().push(image);
    }
}

/// Descriptor for a `cols x rows` grid of 100px PNG tiles with no path.
pub fn png_descriptor(name: &str, cols: u32, rows: u32, roi: Option<u32>) -> String {
    let roi = roi.map(|r| format!(r#", "roi": {}"#, r)).unwrap_or_default();
    format!(
        r#"{{"name": "{}", "cols": {}, "rows": {}, "path": "", "tileWidth": 100, "tileHeight": 100, "imageExtension": "png"{}}}"#,
        name, cols, rows, roi
    )
}
