use async_trait::async_trait;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::Client;
use bytes::Bytes;

use super::TileFetcher;
use crate::error::IoError;

/// S3-backed implementation of `TileFetcher`.
///
/// Source identifiers take the form `s3://bucket/key`. Each tile is one
/// whole-object GET.
#[derive(Clone)]
pub struct S3Fetcher {
    client: Client,
}

impl S3Fetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TileFetcher for S3Fetcher {
    async fn fetch(&self, source_id: &str) -> Result<Bytes, IoError> {
        let (bucket, key) = parse_s3_uri(source_id)
            .ok_or_else(|| IoError::UnsupportedSource(source_id.to_string()))?;

        let object = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify_get_error(source_id, e))?;

        let body = object
            .body
            .collect()
            .await
            .map_err(|e| IoError::Connection(format!("{}: {}", source_id, e)))?;

        Ok(body.into_bytes())
    }
}

/// Missing keys surface either as a modelled `NoSuchKey` or as a bare 404
/// (custom endpoints often skip the error body).
fn classify_get_error(source_id: &str, err: SdkError<GetObjectError, HttpResponse>) -> IoError {
    let missing_key = err
        .as_service_error()
        .is_some_and(GetObjectError::is_no_such_key);
    let bare_404 = err.raw_response().is_some_and(|r| r.status().as_u16() == 404);

    if missing_key || bare_404 {
        IoError::NotFound(source_id.to_string())
    } else {
        IoError::S3(format!("{}: {}", source_id, DisplayErrorContext(&err)))
    }
}

/// Split `s3://bucket/key` into `(bucket, key)`.
///
/// Returns `None` when the scheme is wrong or either part is empty.
pub fn parse_s3_uri(uri: &str) -> Option<(&str, &str)> {
    let rest = uri
        .strip_prefix("s3://")
        .or_else(|| uri.strip_prefix("S3://"))?;
    let (bucket, key) = rest.split_once('/')?;
    if bucket.is_empty() || key.is_empty() {
        return None;
    }
    Some((bucket, key))
}

/// Build a client for tile buckets.
///
/// With `endpoint_url` set (MinIO and other S3-compatible stores), requests
/// use path-style addressing.
pub async fn create_s3_client(endpoint_url: Option<&str>, region: &str) -> Client {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new(region.to_string()));
    if let Some(endpoint) = endpoint_url {
        loader = loader.endpoint_url(endpoint);
    }
    let shared = loader.load().await;

    let conf = aws_sdk_s3::config::Builder::from(&shared)
        .force_path_style(endpoint_url.is_some())
        .build();
    Client::from_conf(conf)
}
