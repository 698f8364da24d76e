//! Per-resource-kind strategy.
//!
//! One loader engine serves many resource kinds (tiles, attribution text,
//! legends, ...) without inheritance: each kind supplies a strategy object
//! describing where the resource lives, how it is keyed in the cache, and
//! which responses count as loadable or as cacheable-empty.

use bytes::Bytes;
use http::HeaderMap;
use reqwest::Url;

use crate::cache::entry::CacheKey;

/// Capability set a resource kind plugs into the loader.
pub trait ResourceStrategy: Send + Sync {
    /// Resolved fetch locator. `None` when the resource cannot be resolved
    /// yet (for example attribution metadata that has not loaded).
    fn locator(&self) -> Option<Url>;

    /// Key under which the resource is stored in the cache.
    fn cache_key(&self) -> CacheKey;

    /// Whether this response body should be parsed, cached and reported as a
    /// successful retrieval. The default rejects empty bodies and client or
    /// server errors.
    fn is_response_loadable(&self, _headers: &HeaderMap, response_code: u16, body: &[u8]) -> bool {
        !body.is_empty() && response_code < 400
    }

    /// Whether an empty placeholder should be cached for this response even
    /// though it is not loadable (negative caching, e.g. sea tiles that the
    /// server 404s). `recorded_code` is the response code recorded in the
    /// entry attributes.
    fn cache_as_empty(&self, _headers: &HeaderMap, recorded_code: u16) -> bool {
        recorded_code < 500
    }

    /// Hook for resource kinds that normalize raw bytes before caching.
    /// The default caches the bytes as received.
    fn process_content(&self, raw: Bytes) -> Bytes {
        raw
    }
}

/// Plain URL-addressed resource: the URL doubles as the cache key and all
/// policy defaults apply. Sufficient for most tile sources.
#[derive(Debug, Clone)]
pub struct UrlResource {
    url: Url,
}

impl UrlResource {
    pub fn new(url: Url) -> Self {
        Self { url }
    }
}

impl ResourceStrategy for UrlResource {
    fn locator(&self) -> Option<Url> {
        Some(self.url.clone())
    }

    fn cache_key(&self) -> CacheKey {
        CacheKey::new(self.url.as_str())
    }
}
