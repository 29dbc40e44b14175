//! Target resolution.
//!
//! # Responsibilities
//! - Recognise proxy-bound paths (`<prefix>` or `<prefix>/...`)
//! - Take the target from the `url` query parameter when present
//! - Otherwise decode the path segment following the prefix
//! - Validate the candidate as an absolute URL with a host
//!
//! # Design Decisions
//! - `url=` wins over the path segment
//! - Prefix matching is segment-aligned: `/proxyfoo` is not proxy-bound
//! - Only http(s) and ws(s) targets are accepted

use url::Url;

use crate::error::{ProxyError, ProxyResult};
use crate::routing::encoding::EncodedPath;

/// A validated absolute upstream URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyTarget {
    url: Url,
}

impl ProxyTarget {
    /// Parse and validate a candidate target string.
    pub fn parse(candidate: &str) -> ProxyResult<Self> {
        let url = Url::parse(candidate).map_err(|_| ProxyError::InvalidTargetUrl)?;

        let supported = matches!(url.scheme(), "http" | "https" | "ws" | "wss");
        let has_host = url.host_str().map(|h| !h.is_empty()).unwrap_or(false);
        if !supported || !has_host {
            return Err(ProxyError::InvalidTargetUrl);
        }

        Ok(Self { url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The target with an `http`/`https` scheme, for plain HTTP relaying.
    pub fn http_url(&self) -> Url {
        self.with_scheme(match self.url.scheme() {
            "ws" => "http",
            "wss" => "https",
            other => other,
        })
    }

    /// The target with a `ws`/`wss` scheme, for WebSocket relaying.
    pub fn websocket_url(&self) -> Url {
        self.with_scheme(match self.url.scheme() {
            "http" => "ws",
            "https" => "wss",
            other => other,
        })
    }

    fn with_scheme(&self, scheme: &str) -> Url {
        let mut url = self.url.clone();
        // Switching between special schemes with a host always succeeds.
        let _ = url.set_scheme(scheme);
        url
    }
}

impl std::fmt::Display for ProxyTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.url.as_str())
    }
}

/// Extracts the destination URL from an inbound request.
#[derive(Debug, Clone)]
pub struct TargetResolver {
    prefix: String,
}

impl TargetResolver {
    /// Create a resolver for the given proxy prefix (e.g. `/proxy`).
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Resolve a target from the raw request path and query string.
    pub fn resolve(&self, path: &str, query: Option<&str>) -> ProxyResult<ProxyTarget> {
        let rest = path
            .strip_prefix(self.prefix.as_str())
            .filter(|rest| rest.is_empty() || rest.starts_with('/'))
            .ok_or(ProxyError::MissingTarget)?;

        if let Some(candidate) = query.and_then(url_param) {
            return ProxyTarget::parse(&candidate);
        }

        let segment = rest.trim_start_matches('/');
        if segment.is_empty() {
            return Err(ProxyError::MissingTarget);
        }

        let candidate = EncodedPath::from_segment(segment).decode().map_err(|e| {
            tracing::debug!(error = %e, "Failed to decode target segment");
            ProxyError::InvalidEncoding
        })?;

        ProxyTarget::parse(&candidate)
    }
}

/// First non-empty `url` query parameter, form-decoded.
fn url_param(query: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "url")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}
