//! Listener deduplication registry.
//!
//! Coalesces concurrent requests for the same resource: listeners accumulate
//! under a dedup key (the resolved fetch locator) and only the first
//! submission triggers an actual job. When the job finishes, the whole
//! listener set is removed atomically and every member is notified exactly
//! once.
//!
//! A forced resubmission while a job is already running deliberately starts
//! a second fetch sharing the same listener set. Both fetches eventually call
//! [`DeduplicationRegistry::finish`], but only the first call finds the set;
//! the second is a logged no-op. Client code relies on the force path being
//! immediate, so this is preserved rather than serialized away.

use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;

use crate::cache::entry::CacheAttributes;

/// Final outcome of a load job, as reported to listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadResult {
    Success,
    Failure,
    Canceled,
}

/// Callback invoked exactly once when the fetch a submission was coalesced
/// into completes.
pub type Listener = Box<dyn FnOnce(Option<Bytes>, CacheAttributes, LoadResult) + Send>;

/// Process-wide (per engine) map from dedup key to the listeners awaiting
/// that fetch.
#[derive(Default)]
pub struct DeduplicationRegistry {
    pending: Mutex<HashMap<String, Vec<Listener>>>,
}

impl DeduplicationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener under `dedup_key`. Returns `true` if this is the
    /// first pending submission for the key, i.e. the caller should dispatch
    /// a job. The check and the insert happen under one lock so no two
    /// submitters can both observe "first".
    pub fn submit(&self, dedup_key: &str, listener: Listener) -> bool {
        let mut pending = self.pending.lock();
        let first = !pending.contains_key(dedup_key);
        pending.entry(dedup_key.to_string()).or_default().push(listener);
        first
    }

    /// Remove the listener set for `dedup_key` and notify every member.
    /// Listeners run outside the lock. A missing set (already consumed by a
    /// concurrent forced fetch, or never registered) is logged, not an error.
    pub fn finish(
        &self,
        dedup_key: &str,
        content: Option<Bytes>,
        attributes: &CacheAttributes,
        result: LoadResult,
    ) {
        let listeners = self.pending.lock().remove(dedup_key);
        let Some(listeners) = listeners else {
            tracing::warn!(
                dedup_key = %dedup_key,
                "no listeners registered, nobody notified"
            );
            return;
        };
        for listener in listeners {
            listener(content.clone(), attributes.clone(), result);
        }
    }

    /// Number of dedup keys with pending listeners.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}
