//! HTTP transport abstraction.
//!
//! The loader talks to the network through the [`Transport`] trait so tests
//! can substitute a scripted fake. [`ReqwestTransport`] is the production
//! implementation.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use http::{HeaderMap, Method};
use reqwest::Url;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::TransportError;

/// Accept header sent with every request, matching what tile servers expect.
const ACCEPT_HEADER: &str = "text/html, image/png, image/jpeg, image/gif, */*";

/// Format epoch milliseconds as an IMF-fixdate for conditional headers.
pub fn format_http_date(epoch_ms: u64) -> String {
    Utc.timestamp_millis_opt(epoch_ms as i64)
        .single()
        .map(|dt| dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string())
        .unwrap_or_default()
}

/// One origin request: method, URL, extra headers and optional conditional
/// validators.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HashMap<String, String>,
    /// Cached fetch time, sent as `If-Modified-Since`.
    pub if_modified_since: Option<u64>,
    /// Cached ETag, sent as `If-None-Match`.
    pub if_none_match: Option<String>,
}

impl TransportRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HashMap::new(),
            if_modified_since: None,
            if_none_match: None,
        }
    }
}

/// Origin response as the loader sees it. Non-2xx statuses are responses,
/// not errors; only transport-level failures surface as [`TransportError`].
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TransportResponse {
    /// The `Last-Modified` header as epoch milliseconds, if parseable.
    pub fn last_modified_ms(&self) -> Option<u64> {
        self.headers
            .get(http::header::LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .and_then(crate::cache::control::parse_http_date)
    }

    /// The `ETag` header, verbatim.
    pub fn etag(&self) -> Option<&str> {
        self.headers
            .get(http::header::ETAG)
            .and_then(|v| v.to_str().ok())
    }
}

/// Issues GET/HEAD requests with timeouts and conditional headers.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

/// Production transport backed by a shared reqwest client.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport with the given connect and read timeouts.
    pub fn new(connect_timeout: Duration, read_timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(read_timeout)
            .build()
            .map_err(|e| TransportError::Io(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn fetch(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .header(http::header::ACCEPT, ACCEPT_HEADER);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(since) = request.if_modified_since {
            builder = builder.header(http::header::IF_MODIFIED_SINCE, format_http_date(since));
        }
        if let Some(etag) = &request.if_none_match {
            builder = builder.header(http::header::IF_NONE_MATCH, etag.as_str());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(e.to_string())
            } else if e.is_connect() {
                TransportError::Connect(e.to_string())
            } else {
                TransportError::Io(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?;

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}
