//! Source image fetching.
//!
//! The [`SourceFetcher`] trait is the seam between request handling and
//! the network. [`HttpFetcher`] is the production implementation; tests
//! substitute in-memory fetchers.

mod client;

use async_trait::async_trait;
use bytes::Bytes;
use http::HeaderMap;
use url::Url;

use crate::error::ProxyError;

pub use client::HttpFetcher;

/// Body and headers of a successful upstream response.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub body: Bytes,
    pub headers: HeaderMap,
    /// Upstream `Content-Type`, if any
    pub content_type: Option<String>,
}

/// Fetches source (and watermark) images.
///
/// Implementations must be thread-safe; one instance serves every request.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Fetch `url` with a single GET.
    ///
    /// Any transport failure, timeout or non-2xx status is a
    /// [`ProxyError::Fetch`]; nothing is retried.
    async fn fetch(&self, url: &str) -> Result<FetchResult, ProxyError>;
}

/// Resolve a source URL, joining root-relative paths onto `base`.
///
/// Returns `None` when the URL cannot be parsed or is relative without a
/// usable base.
pub fn resolve_url(url: &str, base: Option<&str>) -> Option<Url> {
    match Url::parse(url) {
        Ok(parsed) => Some(parsed),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let base = Url::parse(base?).ok()?;
            base.join(url).ok()
        }
        Err(_) => None,
    }
}
