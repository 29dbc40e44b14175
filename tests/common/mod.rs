//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::response::IntoResponse;
use axum::routing::any;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{
    ErrorResponse, Request as HsRequest, Response as HsResponse,
};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

use forward_proxy::config::ProxyConfig;
use forward_proxy::{HttpServer, Shutdown};

/// A request as seen by the mock HTTP backend.
#[derive(Debug)]
pub struct Captured {
    pub method: String,
    pub uri: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Something the mock WebSocket backend observed.
#[derive(Debug)]
pub enum Observed {
    Handshake(HeaderMap),
    Message(Message),
    Closed(Option<CloseFrame>),
}

/// Start the proxy on an ephemeral port.
pub async fn start_proxy() -> (SocketAddr, Shutdown) {
    start_proxy_with(|_| {}).await
}

/// Start the proxy with test defaults adjusted by `customize`.
pub async fn start_proxy_with(customize: impl FnOnce(&mut ProxyConfig)) -> (SocketAddr, Shutdown) {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.timeouts.connect_secs = 2;
    customize(&mut config);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::new(config).unwrap();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    (addr, shutdown)
}

/// An address nothing is listening on.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Start an HTTP backend that records every request it receives.
///
/// - `/echo`: 200 `echo`, plus an upstream CORS header and `x-upstream: yes`
/// - `/redirect`: 302 to the relative `/landing`
/// - `/absolute-redirect`: 301 to `http://elsewhere.example/x`
/// - `/stream`: 200 with a body sent in several chunks
/// - `/slow`: answers after 3 seconds
pub async fn start_http_backend() -> (SocketAddr, mpsc::UnboundedReceiver<Captured>) {
    let (tx, rx) = mpsc::unbounded_channel();

    let app = Router::new()
        .route("/echo", any(echo))
        .route("/redirect", any(|| async { (StatusCode::FOUND, [(header::LOCATION, "/landing")]) }))
        .route(
            "/absolute-redirect",
            any(|| async { (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, "http://elsewhere.example/x")]) }),
        )
        .route("/stream", any(stream))
        .route(
            "/slow",
            any(|| async {
                tokio::time::sleep(std::time::Duration::from_secs(3)).await;
                "late"
            }),
        )
        .with_state(tx);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    (addr, rx)
}

async fn echo(
    State(tx): State<mpsc::UnboundedSender<Captured>>,
    request: Request<Body>,
) -> impl IntoResponse {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();
    let _ = tx.send(Captured {
        method: parts.method.to_string(),
        uri: parts.uri.to_string(),
        headers: parts.headers,
        body,
    });

    (
        [
            ("access-control-allow-origin", "https://upstream.example"),
            ("x-upstream", "yes"),
        ],
        "echo",
    )
}

async fn stream() -> impl IntoResponse {
    let chunks = vec!["chunk-1 ", "chunk-2 ", "chunk-3"]
        .into_iter()
        .map(|c| Ok::<_, std::io::Error>(Bytes::from(c)));
    Body::from_stream(futures_util::stream::iter(chunks))
}

/// Start a WebSocket backend that echoes text and binary messages.
///
/// Receiving the text `close-me` makes it close with 1000 `bye`.
pub async fn start_ws_backend() -> (SocketAddr, mpsc::UnboundedReceiver<Observed>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                let handshake_tx = tx.clone();
                let callback = move |req: &HsRequest, resp: HsResponse| -> Result<HsResponse, ErrorResponse> {
                    let _ = handshake_tx.send(Observed::Handshake(req.headers().clone()));
                    Ok(resp)
                };
                let Ok(mut ws) = tokio_tungstenite::accept_hdr_async(stream, callback).await else {
                    return;
                };

                while let Some(Ok(msg)) = ws.next().await {
                    match msg {
                        Message::Text(ref text) if text.as_str() == "close-me" => {
                            let _ = ws
                                .close(Some(CloseFrame {
                                    code: CloseCode::Normal,
                                    reason: "bye".into(),
                                }))
                                .await;
                        }
                        Message::Text(_) | Message::Binary(_) => {
                            let _ = tx.send(Observed::Message(msg.clone()));
                            if ws.send(msg).await.is_err() {
                                break;
                            }
                        }
                        Message::Close(frame) => {
                            let _ = tx.send(Observed::Closed(frame));
                            break;
                        }
                        _ => {}
                    }
                }
            });
        }
    });

    (addr, rx)
}
