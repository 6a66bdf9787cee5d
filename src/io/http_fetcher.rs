use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode};

use super::TileFetcher;
use crate::error::IoError;

/// HTTP-backed implementation of `TileFetcher`.
///
/// Requests are anonymous: the client keeps no cookie store and sends no
/// credentials, so tiles from any origin can be composited freely.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a fetcher with a default client.
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// Create a fetcher that reuses an existing client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TileFetcher for HttpFetcher {
    async fn fetch(&self, source_id: &str) -> Result<Bytes, IoError> {
        let response = self
            .client
            .get(source_id)
            .send()
            .await
            .map_err(|e| IoError::Connection(format!("{}: {}", source_id, e)))?;

        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::GONE => {
                return Err(IoError::NotFound(source_id.to_string()))
            }
            status if !status.is_success() => {
                return Err(IoError::Http(format!("{} returned {}", source_id, status)))
            }
            _ => {}
        }

        response
            .bytes()
            .await
            .map_err(|e| IoError::Connection(format!("{}: {}", source_id, e)))
    }
}
