//! Cache store abstraction and the bundled in-memory implementation.
//!
//! The loader treats the store as an injected collaborator: anything that can
//! get and put `(content, attributes)` pairs by key works. The store must be
//! internally thread-safe for concurrent get/put across arbitrary keys;
//! last-write-wins on the same key is acceptable.

use bytes::Bytes;

use crate::cache::entry::{CacheAttributes, CacheEntry, CacheKey};

/// Key/attribute store the loader persists fetched resources into.
///
/// Eviction policy and durability are the store's own business.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<CacheEntry>;
    fn put(&self, key: &CacheKey, content: Bytes, attributes: CacheAttributes);
}

/// Size-bounded in-memory store backed by moka.
pub struct MemoryStore {
    cache: moka::sync::Cache<CacheKey, CacheEntry>,
}

impl MemoryStore {
    /// Create a store bounded to roughly `max_size_bytes` of cached content.
    pub fn new(max_size_bytes: u64) -> Self {
        let cache = moka::sync::Cache::builder()
            .max_capacity(max_size_bytes)
            .weigher(|key: &CacheKey, entry: &CacheEntry| {
                (key.as_str().len() + entry.content.len()).min(u32::MAX as usize) as u32
            })
            .build();
        Self { cache }
    }

    /// Number of entries currently held. Runs pending maintenance first so
    /// the count is accurate in tests.
    pub fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.cache.get(key)
    }

    fn put(&self, key: &CacheKey, content: Bytes, attributes: CacheAttributes) {
        self.cache
            .insert(key.clone(), CacheEntry::new(content, attributes));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_returns_none_for_missing_key() {
        let store = MemoryStore::new(1024 * 1024);
        assert!(store.get(&CacheKey::from("absent")).is_none());
    }

    #[test]
    fn test_put_then_get_roundtrips() {
        let store = MemoryStore::new(1024 * 1024);
        let key = CacheKey::from("tile/1/0/0");
        store.put(
            &key,
            Bytes::from_static(b"content"),
            CacheAttributes::populated_at(42),
        );

        let entry = store.get(&key).expect("entry should exist");
        assert_eq!(entry.content, Bytes::from_static(b"content"));
        assert_eq!(entry.attributes.create_time, 42);
    }

    #[test]
    fn test_put_overwrites_previous_entry() {
        let store = MemoryStore::new(1024 * 1024);
        let key = CacheKey::from("tile/1/0/0");
        store.put(&key, Bytes::from_static(b"old"), CacheAttributes::default());
        store.put(&key, Bytes::from_static(b"new"), CacheAttributes::default());

        let entry = store.get(&key).unwrap();
        assert_eq!(entry.content, Bytes::from_static(b"new"));
    }

    #[test]
    fn test_empty_content_is_stored_as_negative_result() {
        let store = MemoryStore::new(1024 * 1024);
        let key = CacheKey::from("tile/9/9/9");
        let mut attrs = CacheAttributes::populated_at(1);
        attrs.response_code = 404;
        store.put(&key, Bytes::new(), attrs);

        // Cached-negative is distinguishable from "never fetched".
        let entry = store.get(&key).expect("negative entry should exist");
        assert!(!entry.is_loadable());
        assert_eq!(entry.attributes.response_code, 404);
    }
}
