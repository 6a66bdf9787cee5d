//! Tile fetching layer.
//!
//! A [`TileFetcher`] turns a tile source identifier into raw bytes. The engine
//! never cares where tiles live: the [`SourceRouter`] picks a backend from the
//! shape of the identifier.
//!
//! ```text
//!   "https://cdn.example.com/t/harbour-15.webp" ──► HttpFetcher
//!   "s3://bucket/tiles/harbour-15.webp"         ──► S3Fetcher
//!   "tiles/harbour-15.webp"                     ──► FsFetcher (relative to root)
//! ```

mod fetcher;
mod fs_fetcher;
mod http_fetcher;
mod s3_fetcher;

pub use fetcher::{SourceRouter, TileFetcher};
pub use fs_fetcher::FsFetcher;
pub use http_fetcher::HttpFetcher;
pub use s3_fetcher::{create_s3_client, parse_s3_uri, S3Fetcher};
