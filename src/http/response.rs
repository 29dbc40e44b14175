//! Response handling and transformation.
//!
//! # Responsibilities
//! - Rewrite upstream `Location` headers into re-proxyable paths
//! - Build router-generated responses (health, preflight, errors)
//! - Attach CORS headers to everything the router answers
//!
//! # Design Decisions
//! - A `Location` that cannot be resolved is left untouched, silently
//! - Relative locations resolve against the target URL, not the proxy URL

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use url::Url;

use crate::error::ProxyError;
use crate::routing::encoding::proxied_path;
use crate::security::cors::{apply_cors, cors_headers};

/// Encodes redirect locations so the client keeps talking to the proxy.
#[derive(Debug, Clone)]
pub struct RedirectRewriter {
    prefix: String,
}

impl RedirectRewriter {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Resolve `location` against `base` and return `<prefix>/<encoded>`.
    ///
    /// Returns `None` when the location cannot be resolved.
    pub fn rewrite(&self, location: &str, base: &Url) -> Option<String> {
        let resolved = base.join(location).ok()?;
        Some(proxied_path(&self.prefix, resolved.as_str()))
    }

    /// Replace the `Location` header in place, if present and resolvable.
    pub fn rewrite_headers(&self, headers: &mut HeaderMap, base: &Url) {
        let Some(location) = headers.get(header::LOCATION) else {
            return;
        };

        let rewritten = location
            .to_str()
            .ok()
            .and_then(|loc| self.rewrite(loc, base))
            .and_then(|path| HeaderValue::from_str(&path).ok());

        match rewritten {
            Some(value) => {
                headers.insert(header::LOCATION, value);
            }
            None => {
                tracing::debug!(location = ?location, base = %base, "Leaving unresolvable Location as-is");
            }
        }
    }
}

/// `200 OK` with body `OK`.
pub fn health(origin: Option<&HeaderValue>) -> Response {
    with_cors((StatusCode::OK, "OK").into_response(), origin)
}

/// `204 No Content` carrying only the CORS headers.
pub fn preflight(origin: Option<&HeaderValue>) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::NO_CONTENT;
    *response.headers_mut() = cors_headers(origin);
    response
}

/// Plain-text diagnostic for a terminal error.
pub fn error(err: ProxyError, origin: Option<&HeaderValue>) -> Response {
    with_cors(err.into_response(), origin)
}

pub fn with_cors(mut response: Response, origin: Option<&HeaderValue>) -> Response {
    apply_cors(response.headers_mut(), origin);
    response
}
