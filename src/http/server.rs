//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the catch-all dispatch handler
//! - Wire up middleware (tracing, request ID)
//! - Bind server to listener with graceful shutdown
//! - Execute the routing decision: answer locally or hand off to a relay
//! - Observability (metrics, request IDs)

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{FromRequestParts, State, WebSocketUpgrade},
    http::{header, HeaderValue, Request},
    response::Response,
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::http::relay::HttpRelay;
use crate::http::request::{make_span, propagate_request_id_layer, set_request_id_layer};
use crate::http::response;
use crate::http::websocket::WebSocketRelay;
use crate::observability::metrics;
use crate::routing::{ProxyTarget, RequestHead, RequestState, Router as ProxyRouter, TargetResolver};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<ProxyRouter>,
    pub http: HttpRelay,
    pub websocket: WebSocketRelay,
}

impl AppState {
    pub fn from_config(config: &ProxyConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            router: Arc::new(ProxyRouter::new(TargetResolver::new(
                config.proxy.path_prefix.clone(),
            ))),
            http: HttpRelay::new(config)?,
            websocket: WebSocketRelay::new(config),
        })
    }
}

/// HTTP server for the forwarding proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig) -> Result<Self, reqwest::Error> {
        let state = AppState::from_config(&config)?;
        let router = Self::build_router(state);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Upstream timeouts are enforced inside the relays, not here.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(set_request_id_layer())
                    .layer(TraceLayer::new_for_http().make_span_with(make_span))
                    .layer(propagate_request_id_layer()),
            )
    }

    /// The fully layered router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            prefix = %self.config.proxy.path_prefix,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Main proxy handler.
/// Runs the routing state machine, then executes the decided state.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let method = request.method().clone();
    let origin = request.headers().get(header::ORIGIN).cloned();

    let decision = state.router.dispatch(&RequestHead {
        method: request.method(),
        uri: request.uri(),
        headers: request.headers(),
    });
    let kind = decision.name();

    tracing::debug!(state = kind, "Request routed");

    let response = match decision {
        RequestState::HealthCheck => response::health(origin.as_ref()),
        RequestState::Preflight => response::preflight(origin.as_ref()),
        RequestState::Failed(err) => {
            tracing::debug!(error = %err, path = %request.uri().path(), "Rejecting request");
            response::error(err, origin.as_ref())
        }
        RequestState::HttpProxying(target) => match state.http.forward(request, &target).await {
            Ok(response) => response,
            Err(err) => response::error(err, origin.as_ref()),
        },
        RequestState::WebSocketProxying(target) => {
            upgrade_websocket(&state, request, &target, origin.as_ref()).await
        }
        RequestState::Idle | RequestState::Resolving => {
            unreachable!("dispatch only returns decided states")
        }
    };

    metrics::record_request(method.as_str(), response.status().as_u16(), kind, start_time);
    response
}

async fn upgrade_websocket(
    state: &AppState,
    request: Request<Body>,
    target: &ProxyTarget,
    origin: Option<&HeaderValue>,
) -> Response {
    let (mut parts, _body) = request.into_parts();

    let upgrade = match WebSocketUpgrade::from_request_parts(&mut parts, state).await {
        Ok(upgrade) => upgrade,
        Err(rejection) => {
            tracing::warn!(error = %rejection, "Client handshake not upgradable");
            return response::error(ProxyError::UpgradeFailed, origin);
        }
    };

    match state.websocket.upgrade(upgrade, target, &parts.headers).await {
        Ok(response) => response,
        Err(err) => response::error(err, origin),
    }
}
