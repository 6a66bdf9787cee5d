//! Process-wide cache of decoded tiles.
//!
//! The image cache sits between the tile loader and the fetchers. Every tile
//! is fetched and decoded at most once per process: concurrent requests for
//! the same source share a single flight, and completed results are kept for
//! the lifetime of the cache.
//!
//! # Singleflight
//!
//! ```text
//!   load("a-1")  ──► leader ──► fetch + decode ──► entries["a-1"]
//!   load("a-1")  ──► waiter ─┐                         │
//!   load("a-1")  ──► waiter ─┴──── notified ◄──────────┘
//! ```
//!
//! Failures are handed to everyone waiting on that flight but are not
//! remembered, so the next call retries. If a leader is dropped before it
//! finishes, its waiters start over instead of waiting forever.
//!
//! # Eviction
//!
//! There is none. The tile namespace of a page is small and bounded, so
//! entries live as long as the cache does.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use image::RgbaImage;
use tokio::sync::Notify;
use tracing::{debug, warn};

use super::decoder::{extension_of, TileDecoder};
use crate::error::TileLoadError;
use crate::io::TileFetcher;

/// A decoded tile, shared by every requester.
pub type DecodedTile = Arc<RgbaImage>;

type LoadResult = Result<DecodedTile, TileLoadError>;

// =============================================================================
// Cache Statistics
// =============================================================================

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of decoded tiles held
    pub entries: usize,

    /// Fetches actually issued to the fetcher
    pub fetches: u64,

    /// Loads answered from a completed entry
    pub hits: u64,

    /// Loads that joined another caller's flight
    pub shared: u64,
}

// =============================================================================
// In-flight State
// =============================================================================

/// State for an in-flight load operation.
struct InFlightLoad {
    /// Notification for waiters
    notify: Notify,
    /// Result of the load (set when complete)
    result: Mutex<Option<LoadResult>>,
}

impl InFlightLoad {
    fn new() -> Self {
        Self {
            notify: Notify::new(),
            result: Mutex::new(None),
        }
    }

    fn result(&self) -> Option<LoadResult> {
        self.result.lock().ok().and_then(|guard| guard.clone())
    }
}

/// Unregisters a flight when the leader finishes or is dropped mid-load.
struct FlightGuard<'a> {
    in_flight: &'a Mutex<HashMap<String, Arc<InFlightLoad>>>,
    source_id: &'a str,
    state: Arc<InFlightLoad>,
}

impl FlightGuard<'_> {
    fn complete(self, result: LoadResult) {
        if let Ok(mut slot) = self.state.result.lock() {
            *slot = Some(result);
        }
        // Drop unregisters and wakes the waiters.
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut in_flight) = self.in_flight.lock() {
            if in_flight
                .get(self.source_id)
                .is_some_and(|s| Arc::ptr_eq(s, &self.state))
            {
                in_flight.remove(self.source_id);
            }
        }
        self.state.notify.notify_waiters();
    }
}

enum Role {
    Leader(Arc<InFlightLoad>),
    Waiter(Arc<InFlightLoad>),
}

// =============================================================================
// Image Cache
// =============================================================================

/// Deduplicating, append-only cache of decoded tiles.
///
/// # Thread Safety
///
/// The cache is thread-safe and is meant to be shared across tasks via `Arc`.
/// Locks are only held for map lookups and inserts, never across an await.
///
/// # Example
///
/// ```ignore
/// use tile_pruner::io::FsFetcher;
/// use tile_pruner::tile::ImageCache;
///
/// let cache = ImageCache::new(FsFetcher::new("./public"));
/// let tile = cache.load("/tiles/harbour-15.webp").await?;
/// println!("{}x{}", tile.width(), tile.height());
/// ```
pub struct ImageCache<F: TileFetcher> {
    /// The fetcher for raw tile bytes
    fetcher: F,

    /// Decoder for fetched bytes
    decoder: TileDecoder,

    /// Completed tiles indexed by source id
    entries: RwLock<HashMap<String, DecodedTile>>,

    /// In-flight loads for singleflight pattern
    in_flight: Mutex<HashMap<String, Arc<InFlightLoad>>>,

    fetches: AtomicU64,
    hits: AtomicU64,
    shared: AtomicU64,
}

impl<F: TileFetcher> ImageCache<F> {
    /// Create an empty cache over the given fetcher.
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            decoder: TileDecoder::new(),
            entries: RwLock::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
            fetches: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            shared: AtomicU64::new(0),
        }
    }

    /// Load a decoded tile, fetching it if no one has yet.
    ///
    /// Concurrent calls with the same `source_id` share one fetch and decode
    /// and all observe the same outcome.
    pub async fn load(&self, source_id: &str) -> LoadResult {
        loop {
            // Fast path: completed entry
            if let Some(tile) = self.get(source_id) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(tile);
            }

            let role = {
                let mut in_flight = match self.in_flight.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };

                // A leader may have finished between the fast path and here.
                if let Some(tile) = self.get(source_id) {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(tile);
                }

                match in_flight.get(source_id) {
                    Some(state) => Role::Waiter(state.clone()),
                    None => {
                        let state = Arc::new(InFlightLoad::new());
                        in_flight.insert(source_id.to_string(), state.clone());
                        Role::Leader(state)
                    }
                }
            };

            match role {
                Role::Leader(state) => {
                    let guard = FlightGuard {
                        in_flight: &self.in_flight,
                        source_id,
                        state,
                    };

                    let result = self.fetch_and_decode(source_id).await;

                    if let Ok(ref tile) = result {
                        if let Ok(mut entries) = self.entries.write() {
                            entries.insert(source_id.to_string(), tile.clone());
                        }
                    }

                    guard.complete(result.clone());
                    return result;
                }
                Role::Waiter(state) => {
                    self.shared.fetch_add(1, Ordering::Relaxed);

                    let notified = state.notify.notified();
                    tokio::pin!(notified);
                    // Register before checking so a completion in between is not missed.
                    notified.as_mut().enable();

                    if let Some(result) = state.result() {
                        return result;
                    }
                    notified.await;
                    if let Some(result) = state.result() {
                        return result;
                    }

                    debug!(source_id, "tile load leader abandoned, retrying");
                }
            }
        }
    }

    /// Fetch and decode a tile without consulting or updating the cache.
    async fn fetch_and_decode(&self, source_id: &str) -> LoadResult {
        self.fetches.fetch_add(1, Ordering::Relaxed);

        let data = self.fetcher.fetch(source_id).await.map_err(|e| {
            warn!(source_id, error = %e, "tile fetch failed");
            TileLoadError::fetch(source_id, e)
        })?;

        let image = self
            .decoder
            .decode(&data, extension_of(source_id))
            .map_err(|message| {
                warn!(source_id, error = %message, "tile decode failed");
                TileLoadError::decode(source_id, message)
            })?;

        debug!(
            source_id,
            width = image.width(),
            height = image.height(),
            bytes = data.len(),
            "tile decoded"
        );

        Ok(Arc::new(image))
    }

    /// Get a completed tile without loading it.
    pub fn get(&self, source_id: &str) -> Option<DecodedTile> {
        self.entries
            .read()
            .ok()
            .and_then(|entries| entries.get(source_id).cloned())
    }

    /// Check whether a tile has completed loading.
    pub fn contains(&self, source_id: &str) -> bool {
        self.get(source_id).is_some()
    }

    /// Number of decoded tiles held.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the cache counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            fetches: self.fetches.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            shared: self.shared.load(Ordering::Relaxed),
        }
    }

    /// Get a reference to the underlying fetcher.
    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }
}

// =============================================================================
// Tests
// =============================================================================
