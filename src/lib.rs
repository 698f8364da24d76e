// Tilefetch cached resource loader library

pub mod cache;
pub mod config;
pub mod error;
pub mod loader;
pub mod logging;
pub mod retry;
pub mod stats;
pub mod transport;

pub use cache::{CacheAttributes, CacheEntry, CacheKey, CacheStore, MemoryStore};
pub use config::LoaderConfig;
pub use error::{LoadError, TransportError};
pub use loader::{
    Listener, LoadResult, ResourceLoader, ResourceStrategy, SubmitError, UrlResource,
};
