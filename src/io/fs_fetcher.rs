use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;

use super::TileFetcher;
use crate::error::IoError;

/// Filesystem-backed implementation of `TileFetcher`.
///
/// Relative identifiers are resolved against `root`. A leading `/` is also
/// treated as relative to the root, mirroring how a page-absolute path like
/// `/tiles/harbour-1.webp` maps onto a document root. Identifiers that could
/// step outside the root (`..`, drive prefixes) are refused.
#[derive(Debug, Clone)]
pub struct FsFetcher {
    root: PathBuf,
}

impl FsFetcher {
    /// Create a fetcher rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Get the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a source identifier onto a path below the root.
    pub fn resolve_path(&self, source_id: &str) -> Result<PathBuf, IoError> {
        let relative = Path::new(source_id.trim_start_matches(['/', '\\']));
        let contained = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !contained {
            return Err(IoError::UnsupportedSource(format!(
                "{} escapes the tiles root",
                source_id
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl TileFetcher for FsFetcher {
    async fn fetch(&self, source_id: &str) -> Result<Bytes, IoError> {
        let path = self.resolve_path(source_id)?;

        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(IoError::NotFound(path.display().to_string()))
            }
            Err(e) => Err(IoError::Filesystem(format!("{}: {}", path.display(), e))),
        }
    }
}
