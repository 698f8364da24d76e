//! The resource loader engine.
//!
//! A [`ResourceLoader`] owns everything its jobs share: the cache store, the
//! HTTP transport, the deduplication registry, the host capability tracker
//! and the worker pool. Engines are fully independent of each other, so
//! tests (or multiple tile layers) can run their own without
//! cross-contamination.

pub mod dispatcher;
pub mod hostcaps;
pub mod job;
pub mod registry;
pub mod strategy;

pub use dispatcher::JobDispatcher;
pub use hostcaps::HostCapabilityTracker;
pub use job::CompletionHook;
pub use registry::{DeduplicationRegistry, Listener, LoadResult};
pub use strategy::{ResourceStrategy, UrlResource};

use std::sync::Arc;
use thiserror::Error;

use crate::cache::entry::{CacheEntry, CacheKey};
use crate::cache::store::{CacheStore, MemoryStore};
use crate::config::LoaderConfig;
use crate::loader::job::LoadJob;
use crate::stats::{LoaderStats, StatsSnapshot};
use crate::transport::{ReqwestTransport, Transport};

/// Errors from submitting a resource to the loader.
#[derive(Error, Debug)]
pub enum SubmitError {
    /// The strategy could not resolve a locator, e.g. attribution metadata
    /// that has not loaded yet.
    #[error("no locator resolved for resource")]
    NoLocator,
}

/// Internals shared by every job of one engine.
pub(crate) struct EngineShared {
    pub store: Arc<dyn CacheStore>,
    pub transport: Arc<dyn Transport>,
    pub registry: DeduplicationRegistry,
    pub host_caps: HostCapabilityTracker,
    pub stats: LoaderStats,
    pub config: LoaderConfig,
}

/// Protocol-aware cached resource loader.
pub struct ResourceLoader {
    shared: Arc<EngineShared>,
    dispatcher: JobDispatcher,
}

impl ResourceLoader {
    /// Build an engine over an injected store and transport.
    pub fn new(
        config: LoaderConfig,
        store: Arc<dyn CacheStore>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, String> {
        config.validate()?;
        let dispatcher = JobDispatcher::new(config.worker_threads, config.keep_alive());
        let shared = Arc::new(EngineShared {
            store,
            transport,
            registry: DeduplicationRegistry::new(),
            host_caps: HostCapabilityTracker::new(),
            stats: LoaderStats::new(),
            config,
        });
        Ok(Self { shared, dispatcher })
    }

    /// Convenience constructor: bundled in-memory store and reqwest
    /// transport, sized to `max_cache_bytes`.
    pub fn with_memory_store(config: LoaderConfig, max_cache_bytes: u64) -> Result<Self, String> {
        let transport = ReqwestTransport::new(config.connect_timeout(), config.read_timeout())
            .map_err(|e| e.to_string())?;
        Self::new(
            config,
            Arc::new(MemoryStore::new(max_cache_bytes)),
            Arc::new(transport),
        )
    }

    /// Submit a load request. The listener is notified exactly once when
    /// the fetch it was coalesced into finishes.
    ///
    /// Submission never blocks on I/O: if this is the first pending request
    /// for the resolved locator (or `force` is set) a job is queued for the
    /// worker pool, otherwise the listener simply joins the pending set.
    pub fn submit(
        &self,
        strategy: Arc<dyn ResourceStrategy>,
        listener: Listener,
        force: bool,
    ) -> Result<(), SubmitError> {
        self.submit_with_completion(strategy, listener, force, None)
    }

    /// [`submit`](Self::submit) with a best-effort completion hook that runs
    /// after the result has been delivered.
    pub fn submit_with_completion(
        &self,
        strategy: Arc<dyn ResourceStrategy>,
        listener: Listener,
        force: bool,
        completion: Option<CompletionHook>,
    ) -> Result<(), SubmitError> {
        let Some(url) = strategy.locator() else {
            tracing::warn!(key = %strategy.cache_key(), "no locator resolved, skipping");
            return Err(SubmitError::NoLocator);
        };

        let first = self.shared.registry.submit(url.as_str(), listener);
        if first || force {
            tracing::debug!(url = %url, force = force, "submitting job for execution");
            let job = LoadJob::new(
                Arc::clone(&self.shared),
                strategy,
                url,
                force,
                self.dispatcher.shutdown_signal(),
                completion,
            );
            self.dispatcher.execute(Box::new(job));
        }
        Ok(())
    }

    /// Current cache entry for a key, without scheduling any work.
    pub fn cached(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.shared.store.get(key)
    }

    /// Cancel every job still sitting in the queue. Running jobs are left
    /// to finish; their results are cached and delivered regardless.
    pub fn cancel_queued(&self) {
        self.dispatcher.cancel_queued();
    }

    /// Shut the engine down: cancel queued jobs and interrupt retry
    /// backoffs in running ones.
    pub fn shutdown(&self) {
        self.dispatcher.shutdown();
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Jobs waiting in the queue, for monitoring.
    pub fn queued_count(&self) -> usize {
        self.dispatcher.queued_count()
    }
}
