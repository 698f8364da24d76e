//! Loader configuration.
//!
//! All knobs are supplied at construction time; the loader keeps no global
//! mutable configuration. Deserializes from YAML with per-field defaults.
//!
//! ```yaml
//! worker_threads: 10
//! connect_timeout_ms: 15000
//! read_timeout_ms: 30000
//! minimum_expiry_seconds: 0
//! headers:
//!   User-Agent: tilefetch/0.3
//! retry:
//!   max_attempts: 5
//!   base_backoff_ms: 5000
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::cache::freshness::FreshnessPolicy;
use crate::retry::RetryPolicy;

/// Configuration for a [`ResourceLoader`](crate::loader::ResourceLoader)
/// instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Maximum number of download workers started.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
    /// How long an idle worker lingers before retiring.
    #[serde(default = "default_keep_alive_seconds")]
    pub keep_alive_seconds: u64,
    /// TCP connect timeout for origin requests.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Read timeout for origin requests.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Local floor for cache lifetimes, regardless of server directives.
    #[serde(default)]
    pub minimum_expiry_seconds: u64,
    /// Extra request headers sent with every origin request.
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Retry policy for 503 responses.
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Freshness policy constants.
    #[serde(default)]
    pub freshness: FreshnessPolicy,
}

fn default_worker_threads() -> usize {
    10
}

fn default_keep_alive_seconds() -> u64 {
    30
}

fn default_connect_timeout_ms() -> u64 {
    15_000
}

fn default_read_timeout_ms() -> u64 {
    30_000
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            worker_threads: default_worker_threads(),
            keep_alive_seconds: default_keep_alive_seconds(),
            connect_timeout_ms: default_connect_timeout_ms(),
            read_timeout_ms: default_read_timeout_ms(),
            minimum_expiry_seconds: 0,
            headers: HashMap::new(),
            retry: RetryPolicy::default(),
            freshness: FreshnessPolicy::default(),
        }
    }
}

impl LoaderConfig {
    /// Validate loader configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.worker_threads == 0 {
            return Err("worker_threads must be at least 1".to_string());
        }
        if self.connect_timeout_ms == 0 {
            return Err("connect_timeout_ms must be greater than 0".to_string());
        }
        if self.read_timeout_ms == 0 {
            return Err("read_timeout_ms must be greater than 0".to_string());
        }
        if self.retry.max_attempts == 0 {
            return Err("retry.max_attempts must be at least 1".to_string());
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_seconds)
    }

    /// Minimum cache lifetime in milliseconds. Saturates, the value comes
    /// straight from user configuration.
    pub fn minimum_expiry_ms(&self) -> u64 {
        self.minimum_expiry_seconds.saturating_mul(1000)
    }
}
