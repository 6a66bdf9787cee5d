use async_trait::async_trait;
use bytes::Bytes;

use super::{FsFetcher, HttpFetcher, S3Fetcher};
use crate::error::IoError;

/// Trait for fetching the raw bytes of a tile.
///
/// This abstraction lets the image cache and loader work with any storage
/// backend (local files, HTTP origins, S3) and lets tests substitute a fake.
#[async_trait]
pub trait TileFetcher: Send + Sync {
    /// Fetch the complete contents of the tile named by `source_id`.
    ///
    /// Implementations must return [`IoError::NotFound`] when the tile does
    /// not exist so callers can tell "missing" apart from "broken".
    async fn fetch(&self, source_id: &str) -> Result<Bytes, IoError>;
}

#[async_trait]
impl<T: TileFetcher + ?Sized> TileFetcher for std::sync::Arc<T> {
    async fn fetch(&self, source_id: &str) -> Result<Bytes, IoError> {
        (**self).fetch(source_id).await
    }
}

// =============================================================================
// Source Router
// =============================================================================

/// Dispatches a source identifier to the backend matching its scheme.
///
/// - `http://` and `https://` go to the HTTP fetcher
/// - `s3://bucket/key` goes to the S3 fetcher (when configured)
/// - anything else is a filesystem path
pub struct SourceRouter {
    fs: FsFetcher,
    http: HttpFetcher,
    s3: Option<S3Fetcher>,
}

impl SourceRouter {
    /// Create a router without S3 support.
    pub fn new(fs: FsFetcher, http: HttpFetcher) -> Self {
        Self { fs, http, s3: None }
    }

    /// Enable `s3://` identifiers.
    pub fn with_s3(mut self, s3: S3Fetcher) -> Self {
        self.s3 = Some(s3);
        self
    }
}

#[async_trait]
impl TileFetcher for SourceRouter {
    async fn fetch(&self, source_id: &str) -> Result<Bytes, IoError> {
        let lower = source_id.get(..8).unwrap_or(source_id).to_ascii_lowercase();

        if lower.starts_with("http://") || lower.starts_with("https://") {
            self.http.fetch(source_id).await
        } else if lower.starts_with("s3://") {
            match &self.s3 {
                Some(s3) => s3.fetch(source_id).await,
                None => Err(IoError::UnsupportedSource(format!(
                    "{} (S3 access is not configured)",
                    source_id
                ))),
            }
        } else {
            self.fs.fetch(source_id).await
        }
    }
}
