//! Permissive CORS headers.
//!
//! The caller's `Origin` is echoed back (falling back to `*`) so credentialed
//! browser requests work against any target. The same set is sent on
//! preflights, on router-generated responses, and merged over relayed
//! responses, replacing whatever the upstream set for those names.

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

pub const ALLOWED_METHODS: &str = "GET,POST,PUT,PATCH,DELETE,OPTIONS";

const TIMING_ALLOW_ORIGIN: HeaderName = HeaderName::from_static("timing-allow-origin");

/// Build the CORS header set for a request with the given `Origin`.
pub fn cors_headers(origin: Option<&HeaderValue>) -> HeaderMap {
    let origin = origin
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("*"));

    let mut headers = HeaderMap::with_capacity(6);
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
    headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("*"));
    headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(ALLOWED_METHODS));
    headers.insert(header::ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
    headers.insert(header::VARY, HeaderValue::from_static("Origin"));
    headers.insert(TIMING_ALLOW_ORIGIN, origin);
    headers
}

/// Merge the CORS set into `headers`, overriding existing values.
pub fn apply_cors(headers: &mut HeaderMap, origin: Option<&HeaderValue>) {
    for (name, value) in cors_headers(origin) {
        if let Some(name) = name {
            headers.insert(name, value);
        }
    }
}
