//! Cache key, attribute and entry types
//!
//! This module defines the core cache structures:
//! - `CacheKey`: Stable, hashable identifier for a cached resource
//! - `CacheAttributes`: Per-entry HTTP metadata driving freshness decisions
//! - `CacheEntry`: Cached content plus its attributes

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Sentinel response code recorded when a fetch failed without producing a
/// real HTTP status. Chosen >= 500 so the entry is never treated as a
/// cacheable negative result.
pub const ERROR_RESPONSE_SENTINEL: u16 = 599;

/// Current wall-clock time as milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Cache key identifying a resource inside the cache store.
///
/// Opaque to the loader: callers decide the format (tile coordinates,
/// attribution ids, ...) as long as it is stable for a given resource.
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// HTTP metadata attached to every cache entry.
///
/// All timestamps are milliseconds since the Unix epoch.
/// `expiration_time == 0` means "no server-provided expiry, use age-based
/// fallback". `response_code >= 500` marks the entry as a failed population
/// that must never be counted as a valid cached value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheAttributes {
    /// When this entry was first successfully populated. Set once, never
    /// changed by later refreshes of the same entry.
    pub create_time: u64,
    /// When the content was last fetched (not the Last-Modified header).
    /// Used for age-based freshness fallback.
    pub last_modification: u64,
    /// Absolute expiration computed from server cache directives.
    pub expiration_time: u64,
    /// ETag returned by the server, verbatim.
    pub etag: Option<String>,
    /// HTTP status of the last fetch attempt.
    pub response_code: u16,
    /// Human-readable error message extracted from a server error page.
    pub error_message: Option<String>,
    /// Raw error recorded when the last fetch attempt failed.
    pub error: Option<String>,
}

impl CacheAttributes {
    /// Attributes for a freshly populated entry with no server metadata.
    pub fn populated_at(now: u64) -> Self {
        Self {
            create_time: now,
            last_modification: now,
            ..Self::default()
        }
    }

    /// True if the recorded response code still allows caching this entry
    /// as a valid population.
    pub fn is_valid_population(&self) -> bool {
        self.response_code < 500
    }

    /// Record a failed attempt: the error text plus the sentinel response
    /// code so the entry cannot pass for a cacheable negative result.
    pub fn record_error(&mut self, error: impl std::fmt::Display) {
        self.error = Some(error.to_string());
        self.response_code = ERROR_RESPONSE_SENTINEL;
    }
}

/// A cached resource: raw content plus attributes.
///
/// Empty content is a meaningful value: it denotes "confirmed absent,
/// cached as a negative result" and is distinct from "not yet fetched"
/// (which is the absence of an entry altogether).
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub content: Bytes,
    pub attributes: CacheAttributes,
}

impl CacheEntry {
    pub fn new(content: Bytes, attributes: CacheAttributes) -> Self {
        Self {
            content,
            attributes,
        }
    }

    /// Whether the entry carries enough data to be returned to a listener.
    pub fn is_loadable(&self) -> bool {
        !self.content.is_empty()
    }
}
