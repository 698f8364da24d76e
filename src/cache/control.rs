//! Response header parsing for cache attributes.
//!
//! Turns the HTTP response metadata (`Cache-Control`, `Expires`, `ETag`)
//! into [`CacheAttributes`] for storage alongside the fetched content.
//!
//! # Expiration precedence
//!
//! Per RFC 7234, `Cache-Control` takes precedence over `Expires`:
//! - `max-age` is the private-cache lifetime, `s-maxage` the shared-cache
//!   lifetime; the larger of the two wins
//! - if neither is present, the `Expires` header is used
//! - if that is also absent, a configurable default lifetime applies
//!
//! The computed expiration is floored at `now + minimum_expiry`: a local
//! override that can force a minimum cache lifetime regardless of what the
//! server asked for. Malformed directives are skipped, never fatal.

use chrono::DateTime;
use http::HeaderMap;

use crate::cache::entry::CacheAttributes;

/// Parse an HTTP date header value (IMF-fixdate / RFC 2822 style) into
/// milliseconds since the Unix epoch. Returns `None` for malformed values.
pub fn parse_http_date(value: &str) -> Option<u64> {
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|dt| dt.timestamp_millis())
        .filter(|ms| *ms >= 0)
        .map(|ms| ms as u64)
}

/// Extract the largest `max-age`/`s-maxage` lifetime from a Cache-Control
/// header value, as an absolute expiration in epoch milliseconds.
///
/// Returns 0 when no usable directive is present. Malformed numeric values
/// are ignored.
fn directive_expiration(cache_control: &str, now: u64) -> u64 {
    let mut expiration = 0u64;

    for token in cache_control.split(',') {
        let token = token.trim().to_lowercase();
        let Some((name, value)) = token.split_once('=') else {
            continue;
        };
        let name = name.trim();
        let value = value.trim().trim_matches('"');

        // max-age is for private caches, s-maxage for shared ones.
        // We take whichever value is larger. Some servers spell the
        // shared directive "s-max-age"; accept both.
        if matches!(name, "max-age" | "s-maxage" | "s-max-age") {
            if let Ok(secs) = value.parse::<u64>() {
                // Saturate: servers have been seen sending absurd lifetimes.
                expiration = expiration.max(now.saturating_add(secs.saturating_mul(1000)));
            }
        }
    }

    expiration
}

/// Build cache attributes from response headers.
///
/// `now` is the fetch time; it becomes `last_modification` (the age-based
/// freshness fallback keys off when *we* fetched the content, not off the
/// server's `Last-Modified` header). `create_time` is left unset here, the
/// job stamps it at persist time so it survives refreshes.
pub fn parse_response_attributes(
    headers: &HeaderMap,
    now: u64,
    minimum_expiry_ms: u64,
    default_expire_ms: u64,
) -> CacheAttributes {
    let mut expiration = headers
        .get(http::header::CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
        .map(|cc| directive_expiration(cc, now))
        .unwrap_or(0);

    if expiration == 0 {
        expiration = headers
            .get(http::header::EXPIRES)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_http_date)
            .unwrap_or(0);
    }

    // Nothing usable from the server: apply the default lifetime.
    if expiration == 0 {
        expiration = now + default_expire_ms;
    }

    let etag = headers
        .get(http::header::ETAG)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());

    CacheAttributes {
        expiration_time: expiration.max(now.saturating_add(minimum_expiry_ms)),
        last_modification: now,
        etag,
        ..CacheAttributes::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::{CACHE_CONTROL, ETAG, EXPIRES};

    const NOW: u64 = 1_700_000_000_000;
    const WEEK_MS: u64 = 7 * 24 * 3600 * 1000;

    fn headers(pairs: &[(http::header::HeaderName, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(name.clone(), value.parse().unwrap());
        }
        map
    }

    #[test]
    fn test_max_age_becomes_absolute_expiration() {
        let h = headers(&[(CACHE_CONTROL, "max-age=3600")]);
        let attrs = parse_response_attributes(&h, NOW, 0, WEEK_MS);
        assert_eq!(attrs.expiration_time, NOW + 3_600_000);
    }

    #[test]
    fn test_larger_of_max_age_and_s_maxage_wins() {
        let h = headers(&[(CACHE_CONTROL, "max-age=3600, s-maxage=7200")]);
        let attrs = parse_response_attributes(&h, NOW, 0, WEEK_MS);
        assert_eq!(attrs.expiration_time, NOW + 7_200_000);

        let h = headers(&[(CACHE_CONTROL, "max-age=7200, s-maxage=3600")]);
        let attrs = parse_response_attributes(&h, NOW, 0, WEEK_MS);
        assert_eq!(attrs.expiration_time, NOW + 7_200_000);
    }

    #[test]
    fn test_legacy_s_max_age_spelling_accepted() {
        let h = headers(&[(CACHE_CONTROL, "s-max-age=7200")]);
        let attrs = parse_response_attributes(&h, NOW, 0, WEEK_MS);
        assert_eq!(attrs.expiration_time, NOW + 7_200_000);
    }

    #[test]
    fn test_expires_header_used_when_no_cache_control() {
        let h = headers(&[(EXPIRES, "Wed, 15 Nov 2023 12:00:00 GMT")]);
        let attrs = parse_response_attributes(&h, NOW, 0, WEEK_MS);
        assert_eq!(
            attrs.expiration_time,
            parse_http_date("Wed, 15 Nov 2023 12:00:00 GMT").unwrap()
        );
    }

    #[test]
    fn test_default_lifetime_when_nothing_from_server() {
        let h = HeaderMap::new();
        let attrs = parse_response_attributes(&h, NOW, 0, WEEK_MS);
        assert_eq!(attrs.expiration_time, NOW + WEEK_MS);
    }

    #[test]
    fn test_minimum_expiry_floor_overrides_server() {
        let h = headers(&[(CACHE_CONTROL, "max-age=60")]);
        let minimum = 3_600_000;
        let attrs = parse_response_attributes(&h, NOW, minimum, WEEK_MS);
        assert_eq!(attrs.expiration_time, NOW + minimum);
    }

    #[test]
    fn test_huge_max_age_saturates_instead_of_overflowing() {
        let h = headers(&[(CACHE_CONTROL, "max-age=18446744073709551615")]);
        let attrs = parse_response_attributes(&h, NOW, 0, WEEK_MS);
        assert_eq!(attrs.expiration_time, u64::MAX);

        // Still beyond any sane horizon but no panic or wraparound either.
        let h = headers(&[(CACHE_CONTROL, "s-maxage=99999999999999999")]);
        let attrs = parse_response_attributes(&h, NOW, 0, WEEK_MS);
        assert!(attrs.expiration_time > NOW);
    }

    #[test]
    fn test_malformed_max_age_is_skipped() {
        let h = headers(&[(CACHE_CONTROL, "max-age=soon, s-maxage=120")]);
        let attrs = parse_response_attributes(&h, NOW, 0, WEEK_MS);
        assert_eq!(attrs.expiration_time, NOW + 120_000);
    }

    #[test]
    fn test_fully_malformed_cache_control_falls_back_to_default() {
        let h = headers(&[(CACHE_CONTROL, "max-age=, garbage")]);
        let attrs = parse_response_attributes(&h, NOW, 0, WEEK_MS);
        assert_eq!(attrs.expiration_time, NOW + WEEK_MS);
    }

    #[test]
    fn test_etag_copied_verbatim() {
        let h = headers(&[(ETAG, "\"33a64df5\"")]);
        let attrs = parse_response_attributes(&h, NOW, 0, WEEK_MS);
        assert_eq!(attrs.etag.as_deref(), Some("\"33a64df5\""));
    }

    #[test]
    fn test_last_modification_is_fetch_time() {
        let h = headers(&[(CACHE_CONTROL, "max-age=60")]);
        let attrs = parse_response_attributes(&h, NOW, 0, WEEK_MS);
        assert_eq!(attrs.last_modification, NOW);
        assert_eq!(attrs.create_time, 0);
    }

    #[test]
    fn test_quoted_directive_value_accepted() {
        let h = headers(&[(CACHE_CONTROL, "max-age=\"3600\"")]);
        let attrs = parse_response_attributes(&h, NOW, 0, WEEK_MS);
        assert_eq!(attrs.expiration_time, NOW + 3_600_000);
    }

    #[test]
    fn test_parse_http_date_rejects_garbage() {
        assert_eq!(parse_http_date("not a date"), None);
        assert!(parse_http_date("Wed, 15 Nov 2023 12:00:00 GMT").is_some());
    }
}
