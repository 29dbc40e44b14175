//! Request dispatch state machine.
//!
//! # States
//! ```text
//! Idle ─┬─▶ HealthCheck                       (/ or /health, any method)
//!       ├─▶ Preflight                         (OPTIONS, any other path)
//!       └─▶ Resolving ─┬─▶ HttpProxying       (resolved, no websocket upgrade)
//!                      ├─▶ WebSocketProxying  (resolved, Upgrade: websocket)
//!                      └─▶ Failed(reason)     (resolution error)
//! ```
//!
//! The router only decides. Executing a proxying state, and any upstream
//! failure along the way, belongs to the HTTP and WebSocket relays.

use axum::http::{header, HeaderMap, Method, Uri};

use crate::error::ProxyError;
use crate::routing::target::{ProxyTarget, TargetResolver};

/// Where a request is in its dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestState {
    Idle,
    HealthCheck,
    Preflight,
    Resolving,
    HttpProxying(ProxyTarget),
    WebSocketProxying(ProxyTarget),
    Failed(ProxyError),
}

impl RequestState {
    /// True once no further routing transition applies.
    pub fn is_decided(&self) -> bool {
        !matches!(self, RequestState::Idle | RequestState::Resolving)
    }

    pub fn name(&self) -> &'static str {
        match self {
            RequestState::Idle => "idle",
            RequestState::HealthCheck => "health_check",
            RequestState::Preflight => "preflight",
            RequestState::Resolving => "resolving",
            RequestState::HttpProxying(_) => "http",
            RequestState::WebSocketProxying(_) => "websocket",
            RequestState::Failed(_) => "failed",
        }
    }
}

/// The parts of an inbound request the router looks at.
#[derive(Debug, Clone, Copy)]
pub struct RequestHead<'a> {
    pub method: &'a Method,
    pub uri: &'a Uri,
    pub headers: &'a HeaderMap,
}

/// Top-level dispatch for inbound requests.
#[derive(Debug, Clone)]
pub struct Router {
    resolver: TargetResolver,
}

impl Router {
    pub fn new(resolver: TargetResolver) -> Self {
        Self { resolver }
    }

    /// Apply a single transition.
    pub fn advance(&self, state: RequestState, head: &RequestHead<'_>) -> RequestState {
        match state {
            RequestState::Idle => {
                let path = head.uri.path();
                if path == "/" || path == "/health" {
                    RequestState::HealthCheck
                } else if *head.method == Method::OPTIONS {
                    RequestState::Preflight
                } else {
                    RequestState::Resolving
                }
            }
            RequestState::Resolving => {
                match self.resolver.resolve(head.uri.path(), head.uri.query()) {
                    Ok(target) if wants_websocket(head.headers) => {
                        RequestState::WebSocketProxying(target)
                    }
                    Ok(target) => RequestState::HttpProxying(target),
                    Err(e) => RequestState::Failed(e),
                }
            }
            decided => decided,
        }
    }

    /// Run transitions from `Idle` until a decision is reached.
    pub fn dispatch(&self, head: &RequestHead<'_>) -> RequestState {
        let mut state = RequestState::Idle;
        while !state.is_decided() {
            state = self.advance(state, head);
        }
        state
    }
}

/// Whether the `Upgrade` header asks for a WebSocket (case-insensitive).
pub fn wants_websocket(headers: &HeaderMap) -> bool {
    headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().eq_ignore_ascii_case("websocket"))
        .unwrap_or(false)
}
