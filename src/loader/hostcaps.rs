//! Per-host capability learning.
//!
//! Some tile servers ignore `If-None-Match`/`If-Modified-Since` and always
//! answer 200 with a full body. Once a host is observed doing that, later
//! jobs for the same host verify their cached copy with a cheap HEAD request
//! instead of a conditional GET. Purely an optimization: it only picks a
//! cheaper verification path, never skips fetching fresh data.

use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Default)]
pub struct HostCapabilityTracker {
    ineffective: Mutex<HashMap<String, bool>>,
}

impl HostCapabilityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether jobs for `host` should verify cached entries with a HEAD
    /// probe before committing to a full GET.
    pub fn should_probe_with_head(&self, host: &str) -> bool {
        self.ineffective.lock().get(host).copied().unwrap_or(false)
    }

    /// Record that `host` returned a full response despite matching
    /// validators in the conditional request.
    pub fn record_conditional_ineffective(&self, host: &str) {
        tracing::info!(
            host = %host,
            "host does not return 304 for If-Modified-Since or If-None-Match, switching to HEAD probing"
        );
        self.ineffective.lock().insert(host.to_string(), true);
    }
}
