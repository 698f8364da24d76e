//! The load job: one unit of work for one resource.
//!
//! A job orchestrates the whole retrieval path: cache lookup, freshness
//! check, conditional or unconditional network fetch, stale fallback and
//! listener notification. Its working copies of content and attributes are
//! private; they are published to the store only when a fetch step
//! completes.
//!
//! HTTP path, in order:
//! 1. Hosts known to ignore conditional requests get a cheap HEAD probe
//!    first; matching validators confirm the cached copy without a body
//!    transfer.
//! 2. Otherwise a GET is sent with `If-Modified-Since` (only while the entry
//!    is within the absolute expiry limit) and `If-None-Match` (if an ETag
//!    is cached).
//! 3. 304 keeps the cached content and refreshes the attributes. A full
//!    response despite matching validators flags the host for HEAD probing.
//! 4. 503 is retried with randomized backoff, bounded by the retry policy.
//! 5. Anything the strategy accepts is persisted; 404s may be cached as
//!    empty negative entries; transport failures fall back to a stale copy
//!    when one exists.

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method};
use regex::Regex;
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::cache::control::parse_response_attributes;
use crate::cache::entry::{now_millis, CacheAttributes};
use crate::error::{LoadError, TransportError};
use crate::loader::dispatcher::Dispatchable;
use crate::loader::registry::LoadResult;
use crate::loader::strategy::ResourceStrategy;
use crate::loader::EngineShared;
use crate::transport::{TransportRequest, TransportResponse};

/// Best-effort hook run after a job has reported its result, for
/// bookkeeping such as UI refreshes. A panic in here is caught and logged;
/// it can never mask the job's own result.
pub type CompletionHook = Box<dyn FnOnce() + Send>;

pub(crate) struct LoadJob {
    shared: Arc<EngineShared>,
    strategy: Arc<dyn ResourceStrategy>,
    url: Url,
    force: bool,
    /// When the job was created; the single "now" for freshness decisions.
    now: u64,
    shutdown: watch::Receiver<bool>,
    /// Working copy of the cached content, if any.
    content: Option<Bytes>,
    /// Working copy of the attributes, replaced as responses come in.
    attributes: CacheAttributes,
    /// `create_time` of the entry as first populated; survives refreshes.
    original_create_time: u64,
    completion: Option<CompletionHook>,
}

impl LoadJob {
    pub(crate) fn new(
        shared: Arc<EngineShared>,
        strategy: Arc<dyn ResourceStrategy>,
        url: Url,
        force: bool,
        shutdown: watch::Receiver<bool>,
        completion: Option<CompletionHook>,
    ) -> Self {
        Self {
            shared,
            strategy,
            url,
            force,
            now: now_millis(),
            shutdown,
            content: None,
            attributes: CacheAttributes::default(),
            original_create_time: 0,
            completion,
        }
    }

    fn ensure_cache_entry(&mut self) {
        if self.content.is_some() {
            return;
        }
        if let Some(entry) = self.shared.store.get(&self.strategy.cache_key()) {
            self.original_create_time = entry.attributes.create_time;
            self.attributes = entry.attributes;
            self.content = Some(entry.content);
        }
    }

    fn is_object_loadable(&self) -> bool {
        self.content.as_ref().is_some_and(|c| !c.is_empty())
    }

    /// Whether the cached entry can be returned without touching the
    /// network: fresh, and either non-empty or an acceptable cached
    /// negative result.
    fn cached_entry_usable(&self) -> bool {
        let Some(content) = &self.content else {
            return false;
        };
        let config = &self.shared.config;
        if !config
            .freshness
            .is_fresh(&self.attributes, self.now, config.minimum_expiry_ms())
        {
            return false;
        }
        if !content.is_empty() {
            return true;
        }
        self.attributes.is_valid_population()
            && self
                .strategy
                .cache_as_empty(&HeaderMap::new(), self.attributes.response_code)
    }

    async fn execute(&mut self) {
        self.ensure_cache_entry();

        let result = if !self.force && self.cached_entry_usable() {
            tracing::debug!(key = %self.strategy.cache_key(), "returning object from cache");
            self.shared.stats.record_cache_hit();
            LoadResult::Success
        } else if self.load_object().await {
            self.shared.stats.record_fetch();
            LoadResult::Success
        } else if self.is_object_loadable() {
            tracing::debug!(url = %self.url, "serving stale object from cache");
            self.shared.stats.record_stale_served();
            LoadResult::Success
        } else {
            self.shared.stats.record_failure();
            LoadResult::Failure
        };

        self.finish_loading(result);
    }

    async fn load_object(&mut self) -> bool {
        match self.url.scheme() {
            "http" | "https" => self.load_object_http().await,
            "file" => self.load_object_file().await,
            other => {
                tracing::warn!(url = %self.url, scheme = other, "unsupported locator scheme");
                false
            }
        }
    }

    /// Read a `file:` locator synchronously from disk. Any I/O error is a
    /// hard failure for this attempt; there is no retry.
    async fn load_object_file(&mut self) -> bool {
        let Ok(path) = self.url.to_file_path() else {
            self.attributes
                .record_error(format!("invalid file url: {}", self.url));
            return false;
        };
        match tokio::fs::read(&path).await {
            Ok(raw) => {
                self.attributes = CacheAttributes::populated_at(self.now);
                self.persist(self.strategy.process_content(Bytes::from(raw)));
                true
            }
            Err(err) => {
                tracing::error!(url = %self.url, error = %err, "failed to read file resource");
                self.attributes.record_error(err);
                false
            }
        }
    }

    async fn load_object_http(&mut self) -> bool {
        let host = self.url.host_str().unwrap_or_default().to_string();

        // If we have a cached object and the host ignores If-Modified-Since
        // and If-None-Match, verify with a cheap HEAD request instead.
        if self.is_object_loadable() && self.shared.host_caps.should_probe_with_head(&host) {
            match self.verify_with_head().await {
                Ok(true) => {
                    tracing::debug!(url = %self.url, "cache entry verified using HEAD request");
                    return true;
                }
                Ok(false) => {}
                Err(err) => return self.handle_transport_error(err),
            }
        }

        tracing::debug!(url = %self.url, "starting GET request");
        let mut request = self.base_request(Method::GET);
        let mut sent_conditional = false;
        if self.is_object_loadable() {
            if self
                .shared
                .config
                .freshness
                .may_revalidate(&self.attributes, self.now)
            {
                request.if_modified_since = Some(self.attributes.last_modification);
                sent_conditional = true;
            }
            if let Some(etag) = self.attributes.etag.clone() {
                request.if_none_match = Some(etag);
                sent_conditional = true;
            }
        }

        let retry = self.shared.config.retry;
        let mut attempt: u32 = 0;
        loop {
            let response = match self.shared.transport.fetch(request.clone()).await {
                Ok(response) => response,
                Err(err) => return self.handle_transport_error(err),
            };

            if retry.should_retry(attempt, response.status) {
                let delay = retry.backoff_duration();
                tracing::debug!(
                    url = %self.url,
                    attempt = attempt,
                    delay_ms = delay.as_millis() as u64,
                    "origin unavailable, backing off before retry"
                );
                if !self.backoff(delay).await {
                    self.attributes.record_error(LoadError::Interrupted(
                        "engine shut down during retry backoff".to_string(),
                    ));
                    return false;
                }
                attempt += 1;
                continue;
            }

            return self.handle_response(&host, sent_conditional, response);
        }
    }

    fn handle_response(
        &mut self,
        host: &str,
        sent_conditional: bool,
        response: TransportResponse,
    ) -> bool {
        if response.status == 304 {
            // Local version is up to date; keep the content and refresh the
            // attributes the server sent along.
            tracing::debug!(url = %self.url, "conditional request confirmed local version is current");
            self.refresh_attributes_from(&response);
            self.attributes.response_code = 304;
            let content = self.content.clone().unwrap_or_default();
            self.persist(content);
            return true;
        }

        if sent_conditional && self.is_object_loadable() {
            // We sent validators but got a full response. If the server's
            // validators match our cached copy, conditional requests are
            // ineffective for this host.
            let etag_matches = matches!(
                (self.attributes.etag.as_deref(), response.etag()),
                (Some(cached), Some(remote)) if cached == remote
            );
            let modified_matches = response
                .last_modified_ms()
                .is_some_and(|lm| lm == self.attributes.last_modification);
            if etag_matches || modified_matches {
                self.shared.host_caps.record_conditional_ineffective(host);
            }
        }

        self.refresh_attributes_from(&response);
        self.attributes.response_code = response.status;

        let body = if response.status == 200 {
            response.body.clone()
        } else {
            // Non-200 bodies are error pages; keep any message we can
            // extract, never the body itself.
            if let Ok(text) = std::str::from_utf8(&response.body) {
                if let Some(message) = detect_error_message(text) {
                    self.attributes.error_message = Some(message);
                }
            }
            Bytes::new()
        };

        if response.status == 404 {
            self.attributes.error =
                Some(LoadError::NotFound(self.url.to_string()).to_string());
        } else if response.status >= 500 {
            self.attributes.error = Some(
                LoadError::Server {
                    code: response.status,
                    message: self
                        .attributes
                        .error_message
                        .clone()
                        .unwrap_or_else(|| "origin failure".to_string()),
                }
                .to_string(),
            );
        }

        if self
            .strategy
            .is_response_loadable(&response.headers, response.status, &body)
        {
            let content = self.strategy.process_content(body);
            tracing::debug!(
                key = %self.strategy.cache_key(),
                length = content.len(),
                "downloaded object"
            );
            self.persist(content);
            true
        } else if self
            .strategy
            .cache_as_empty(&response.headers, self.attributes.response_code)
        {
            tracing::debug!(url = %self.url, "caching empty object");
            self.persist(Bytes::new());
            true
        } else {
            tracing::debug!(
                url = %self.url,
                status = response.status,
                "response is not loadable nor cacheable as empty"
            );
            false
        }
    }

    /// Verify the cached copy with a HEAD request: matching validators mean
    /// the entry is current and only the attributes need refreshing.
    async fn verify_with_head(&mut self) -> Result<bool, TransportError> {
        let request = self.base_request(Method::HEAD);
        let response = self.shared.transport.fetch(request).await?;

        let etag_matches = matches!(
            (self.attributes.etag.as_deref(), response.etag()),
            (Some(cached), Some(remote)) if cached == remote
        );
        let not_modified = response
            .last_modified_ms()
            .is_some_and(|lm| lm != 0 && lm <= self.attributes.last_modification);

        if etag_matches || not_modified {
            self.refresh_attributes_from(&response);
            let content = self.content.clone().unwrap_or_default();
            self.persist(content);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn handle_transport_error(&mut self, err: TransportError) -> bool {
        if matches!(err, TransportError::NotFound(_)) {
            // Transport-level not-found without an HTTP response; treat
            // like a 404.
            tracing::debug!(url = %self.url, "caching empty object, server reports not found");
            self.attributes.response_code = 404;
            self.attributes.error = Some(LoadError::from(err).to_string());
            let no_headers = HeaderMap::new();
            let do_cache = self.strategy.is_response_loadable(&no_headers, 404, &[])
                || self.strategy.cache_as_empty(&no_headers, 404);
            if do_cache {
                self.persist(Bytes::new());
            }
            return do_cache;
        }

        tracing::debug!(url = %self.url, error = %err, "error during communication with server");
        if self.is_object_loadable() {
            // A stale copy exists; record the error and let the caller fall
            // back to it.
            self.attributes.error = Some(LoadError::from(err).to_string());
        } else {
            self.attributes.record_error(LoadError::from(err));
        }
        false
    }

    fn refresh_attributes_from(&mut self, response: &TransportResponse) {
        let config = &self.shared.config;
        self.attributes = parse_response_attributes(
            &response.headers,
            self.now,
            config.minimum_expiry_ms(),
            config.freshness.default_expire_ms,
        );
    }

    /// Publish the working copies to the store. The entry's `create_time`
    /// is stamped once, at first population, and carried over afterwards.
    fn persist(&mut self, content: Bytes) {
        self.attributes.create_time = if self.original_create_time > 0 {
            self.original_create_time
        } else {
            self.now
        };
        self.original_create_time = self.attributes.create_time;
        self.shared
            .store
            .put(&self.strategy.cache_key(), content.clone(), self.attributes.clone());
        self.content = Some(content);
    }

    /// Sleep out a retry backoff, unless the engine shuts down first.
    /// Returns `false` when interrupted.
    async fn backoff(&mut self, delay: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(delay) => true,
            _ = self.shutdown.changed() => false,
        }
    }

    fn base_request(&self, method: Method) -> TransportRequest {
        let mut request = TransportRequest::new(method, self.url.clone());
        request.headers = self.shared.config.headers.clone();
        request
    }

    fn finish_loading(&mut self, result: LoadResult) {
        self.shared
            .registry
            .finish(self.url.as_str(), self.content.clone(), &self.attributes, result);
    }

    fn run_completion_hook(&mut self) {
        if let Some(hook) = self.completion.take() {
            // The result has already been delivered; a misbehaving hook can
            // only hurt itself.
            if std::panic::catch_unwind(std::panic::AssertUnwindSafe(hook)).is_err() {
                tracing::warn!(url = %self.url, "completion hook panicked");
            }
        }
    }
}

#[async_trait]
impl Dispatchable for LoadJob {
    async fn run(mut self: Box<Self>) {
        tracing::debug!(url = %self.url, "starting fetch");
        self.execute().await;
        self.run_completion_hook();
    }

    fn cancel(mut self: Box<Self>) {
        tracing::debug!(url = %self.url, "job canceled while queued");
        self.shared.stats.record_canceled();
        self.finish_loading(LoadResult::Canceled);
        self.run_completion_hook();
    }
}

/// Try to extract a human-readable message from a servlet-container error
/// page (`<h1>HTTP Status 500 - something broke</h1>`).
pub fn detect_error_message(data: &str) -> Option<String> {
    let pattern = Regex::new(r"(?s).*<h1>HTTP Status \d+ [-\x{2013}] (.+?)</h1>.*").ok()?;
    pattern
        .captures(data)
        .map(|captures| captures[1].trim().to_string())
}
