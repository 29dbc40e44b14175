//! Header sanitization.
//!
//! # Responsibilities
//! - Strip headers that identify the caller or the proxy hop (host, origin,
//!   referer, client-IP forwarding headers) before forwarding upstream
//! - Strip hop-by-hop headers on the HTTP relay path, in both directions,
//!   including any header named in a `Connection` value
//! - Keep handshake-owned headers out of the upstream WebSocket request
//!
//! # Design Decisions
//! - Matching is case-insensitive (`HeaderName` is already lowercase)
//! - Multi-valued headers and value bytes pass through untouched
//! - Extra names come from `proxy.strip_headers` in the config

use axum::http::{header, HeaderMap, HeaderName};

/// Headers that reveal the caller, its page, or the edge in front of us.
pub const IDENTIFYING_HEADERS: &[&str] = &[
    "host",
    "origin",
    "referer",
    "cf-connecting-ip",
    "cf-connecting-ipv6",
    "cf-ipcountry",
    "cf-ray",
    "cf-visitor",
    "x-forwarded-for",
    "x-forwarded-host",
    "x-forwarded-proto",
    "x-real-ip",
    "true-client-ip",
    "forwarded",
];

/// Connection-scoped headers (RFC 9110 §7.6.1).
pub const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Headers the WebSocket client library generates for its own handshake.
pub const WEBSOCKET_HANDSHAKE_HEADERS: &[&str] = &[
    "sec-websocket-key",
    "sec-websocket-version",
    "sec-websocket-accept",
    "sec-websocket-extensions",
];

/// Filters inbound headers before they are sent upstream.
#[derive(Debug, Clone)]
pub struct HeaderSanitizer {
    stripped: Vec<HeaderName>,
}

impl HeaderSanitizer {
    /// Sanitizer for the built-in identifying headers plus `extra` names.
    /// Names that are not valid header names are ignored.
    pub fn new<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let stripped = IDENTIFYING_HEADERS
            .iter()
            .map(|name| name.to_string())
            .chain(extra.into_iter().map(|name| name.as_ref().to_ascii_lowercase()))
            .filter_map(|name| HeaderName::from_bytes(name.as_bytes()).ok())
            .collect();
        Self { stripped }
    }

    /// Copy of `headers` without the identifying headers.
    pub fn sanitize(&self, headers: &HeaderMap) -> HeaderMap {
        filter(headers, |name| self.stripped.contains(name))
    }

    /// Sanitized copy for the HTTP relay: also drops hop-by-hop headers.
    pub fn sanitize_for_http(&self, headers: &HeaderMap) -> HeaderMap {
        let listed = connection_listed(headers);
        filter(headers, |name| {
            self.stripped.contains(name) || is_hop_by_hop(name) || listed.contains(name)
        })
    }

    /// Sanitized copy for an upstream WebSocket handshake.
    pub fn sanitize_for_websocket(&self, headers: &HeaderMap) -> HeaderMap {
        let listed = connection_listed(headers);
        filter(headers, |name| {
            self.stripped.contains(name)
                || is_hop_by_hop(name)
                || listed.contains(name)
                || WEBSOCKET_HANDSHAKE_HEADERS.contains(&name.as_str())
        })
    }
}

impl Default for HeaderSanitizer {
    fn default() -> Self {
        Self::new(std::iter::empty::<&str>())
    }
}

pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP_HEADERS.contains(&name.as_str())
}

/// Remove hop-by-hop headers from an upstream response in place.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in connection_listed(headers) {
        headers.remove(name);
    }
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(*name);
    }
}

/// Header names declared connection-scoped by the `Connection` header(s).
/// Tokens that are not valid header names are skipped.
pub fn connection_listed(headers: &HeaderMap) -> Vec<HeaderName> {
    headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .filter_map(|token| HeaderName::from_bytes(token.as_bytes()).ok())
        .collect()
}

fn filter(headers: &HeaderMap, drop: impl Fn(&HeaderName) -> bool) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers.iter() {
        if !drop(name) {
            out.append(name.clone(), value.clone());
        }
    }
    out
}
