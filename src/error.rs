//! Proxy error taxonomy.
//!
//! Every failure is terminal for the request or connection it belongs to.
//! Client input errors map to 400, upstream failures to 502. The response
//! body is a short plain-text diagnostic; upstream details stay in the logs.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Errors surfaced by the request router and the relays.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProxyError {
    /// The request carries no target (wrong prefix, no `url=`, empty segment).
    #[error("Missing target URL")]
    MissingTarget,

    /// The encoded path segment is not valid base64 or not valid UTF-8.
    #[error("Invalid encoded URL")]
    InvalidEncoding,

    /// The candidate string is not an absolute URL with a supported scheme and a host.
    #[error("Invalid target URL")]
    InvalidTargetUrl,

    /// Connecting to the upstream failed or timed out.
    #[error("Upstream unreachable")]
    UpstreamUnreachable,

    /// The upstream did not grant the WebSocket upgrade.
    #[error("WS upgrade failed")]
    UpgradeFailed,
}

impl ProxyError {
    /// HTTP status returned to the caller for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::MissingTarget
            | ProxyError::InvalidEncoding
            | ProxyError::InvalidTargetUrl => StatusCode::BAD_REQUEST,
            ProxyError::UpstreamUnreachable | ProxyError::UpgradeFailed => StatusCode::BAD_GATEWAY,
        }
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::MissingTarget => "missing_target",
            ProxyError::InvalidEncoding => "invalid_encoding",
            ProxyError::InvalidTargetUrl => "invalid_target_url",
            ProxyError::UpstreamUnreachable => "upstream_unreachable",
            ProxyError::UpgradeFailed => "upgrade_failed",
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

/// Result type for proxy operations.
pub type ProxyResult<T> = Result<T, ProxyError>;
