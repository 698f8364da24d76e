// Cache module

pub mod control;
pub mod entry;
pub mod freshness;
pub mod store;

pub use control::parse_response_attributes;
pub use entry::{CacheAttributes, CacheEntry, CacheKey, ERROR_RESPONSE_SENTINEL};
pub use freshness::FreshnessPolicy;
pub use store::{CacheStore, MemoryStore};
