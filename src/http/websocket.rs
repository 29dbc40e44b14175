//! WebSocket proxy handling.
//!
//! # Responsibilities
//! - Open the upstream WebSocket before answering the client
//! - Complete the upgrade handshake with the client
//! - Bidirectional frame forwarding
//! - Propagate close code and reason to the opposite side
//!
//! # Data Flow
//! ```text
//! Client ←──── WebSocket frames ────→ Proxy ←──── WebSocket frames ────→ Backend
//! ```
//!
//! # Design Decisions
//! - Two pumps per session, one per direction, raced in one task; each reads
//!   one socket and writes the other, so they share no state
//! - The first pump to end decides the session end; the other is dropped
//! - Ping/pong is answered per hop by the socket libraries, never relayed
//! - An abnormal end on one side still closes the other (without a code)

use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{self, WebSocket, WebSocketUpgrade};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::Response;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame as TungsteniteCloseFrame;
use tokio_tungstenite::tungstenite::Message as TungsteniteMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::config::ProxyConfig;
use crate::error::{ProxyError, ProxyResult};
use crate::observability::metrics;
use crate::routing::target::ProxyTarget;
use crate::security::headers::HeaderSanitizer;

/// Upstream side of a relayed socket pair.
pub type UpstreamSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Close code and reason carried across the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    pub code: u16,
    pub reason: String,
}

/// Library-neutral view of a relayed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Bytes),
    Close(Option<CloseReason>),
}

/// Conversion between a socket library's message type and [`Frame`].
pub trait RelayMessage: Sized {
    /// `None` for control frames that are handled per hop.
    fn into_frame(self) -> Option<Frame>;
    fn from_frame(frame: Frame) -> Self;
}

impl RelayMessage for ws::Message {
    fn into_frame(self) -> Option<Frame> {
        match self {
            ws::Message::Text(text) => Some(Frame::Text(text.as_str().to_owned())),
            ws::Message::Binary(data) => Some(Frame::Binary(data)),
            ws::Message::Close(frame) => Some(Frame::Close(frame.map(|f| CloseReason {
                code: f.code,
                reason: f.reason.as_str().to_owned(),
            }))),
            ws::Message::Ping(_) | ws::Message::Pong(_) => None,
        }
    }

    fn from_frame(frame: Frame) -> Self {
        match frame {
            Frame::Text(text) => ws::Message::Text(text.into()),
            Frame::Binary(data) => ws::Message::Binary(data),
            Frame::Close(reason) => ws::Message::Close(reason.map(|r| ws::CloseFrame {
                code: r.code,
                reason: r.reason.into(),
            })),
        }
    }
}

impl RelayMessage for TungsteniteMessage {
    fn into_frame(self) -> Option<Frame> {
        match self {
            TungsteniteMessage::Text(text) => Some(Frame::Text(text.as_str().to_owned())),
            TungsteniteMessage::Binary(data) => Some(Frame::Binary(data)),
            TungsteniteMessage::Close(frame) => Some(Frame::Close(frame.map(|f| CloseReason {
                code: f.code.into(),
                reason: f.reason.as_str().to_owned(),
            }))),
            TungsteniteMessage::Ping(_)
            | TungsteniteMessage::Pong(_)
            | TungsteniteMessage::Frame(_) => None,
        }
    }

    fn from_frame(frame: Frame) -> Self {
        match frame {
            Frame::Text(text) => TungsteniteMessage::Text(text.into()),
            Frame::Binary(data) => TungsteniteMessage::Binary(data),
            Frame::Close(reason) => TungsteniteMessage::Close(reason.map(|r| TungsteniteCloseFrame {
                code: CloseCode::from(r.code),
                reason: r.reason.into(),
            })),
        }
    }
}

/// Direction of message flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ClientToUpstream,
    UpstreamToClient,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::ClientToUpstream => "client_to_upstream",
            Direction::UpstreamToClient => "upstream_to_client",
        }
    }
}

/// Why a pump stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PumpEnd {
    /// The source sent a close frame; it was forwarded to the destination.
    Closed(Option<CloseReason>),
    /// The source ended without a close frame; the destination was closed.
    SourceLost,
    /// Writing to the destination failed.
    DestinationLost,
}

/// Forward frames from `source` to `destination` until either side ends.
pub async fn pump<R, W, In, Out, E>(
    source: &mut R,
    destination: &mut W,
    direction: Direction,
) -> PumpEnd
where
    R: Stream<Item = Result<In, E>> + Unpin,
    W: Sink<Out> + Unpin,
    W::Error: std::fmt::Display,
    In: RelayMessage,
    Out: RelayMessage,
    E: std::fmt::Display,
{
    loop {
        let message = match source.next().await {
            Some(Ok(message)) => message,
            Some(Err(e)) => {
                tracing::debug!(direction = direction.as_str(), error = %e, "Read error, closing relay");
                let _ = destination.send(Out::from_frame(Frame::Close(None))).await;
                return PumpEnd::SourceLost;
            }
            None => {
                tracing::debug!(direction = direction.as_str(), "Stream ended without close frame");
                let _ = destination.send(Out::from_frame(Frame::Close(None))).await;
                return PumpEnd::SourceLost;
            }
        };

        let Some(frame) = message.into_frame() else {
            continue;
        };

        if let Frame::Close(reason) = frame {
            let _ = destination
                .send(Out::from_frame(Frame::Close(reason.clone())))
                .await;
            return PumpEnd::Closed(reason);
        }

        if let Err(e) = destination.send(Out::from_frame(frame)).await {
            tracing::debug!(direction = direction.as_str(), error = %e, "Write error, closing relay");
            return PumpEnd::DestinationLost;
        }
        metrics::record_websocket_message(direction.as_str());
    }
}

/// Relay frames between a client socket and an upstream socket until one
/// side closes, then close the other.
pub async fn relay<C, U, CM, UM, CE, UE>(
    client: C,
    upstream: U,
    close_grace: Duration,
) -> (Direction, PumpEnd)
where
    C: Stream<Item = Result<CM, CE>> + Sink<CM> + Unpin,
    U: Stream<Item = Result<UM, UE>> + Sink<UM> + Unpin,
    <C as Sink<CM>>::Error: std::fmt::Display,
    <U as Sink<UM>>::Error: std::fmt::Display,
    CM: RelayMessage + Unpin,
    UM: RelayMessage + Unpin,
    CE: std::fmt::Display,
    UE: std::fmt::Display,
{
    let (mut client_tx, mut client_rx) = client.split::<CM>();
    let (mut upstream_tx, mut upstream_rx) = upstream.split::<UM>();

    let (direction, end) = tokio::select! {
        end = pump(&mut client_rx, &mut upstream_tx, Direction::ClientToUpstream) => {
            (Direction::ClientToUpstream, end)
        }
        end = pump(&mut upstream_rx, &mut client_tx, Direction::UpstreamToClient) => {
            (Direction::UpstreamToClient, end)
        }
    };

    // Finish the handshake with the side that stopped: acknowledge its close
    // frame, or close it when its peer went away.
    if end != PumpEnd::SourceLost {
        let finished = match direction {
            Direction::ClientToUpstream => tokio::time::timeout(close_grace, client_tx.close()).await.map(drop),
            Direction::UpstreamToClient => tokio::time::timeout(close_grace, upstream_tx.close()).await.map(drop),
        };
        if finished.is_err() {
            tracing::debug!(direction = direction.as_str(), "Close handshake timed out");
        }
    }

    (direction, end)
}

/// Establishes paired sockets and runs the relay.
#[derive(Debug, Clone)]
pub struct WebSocketRelay {
    sanitizer: HeaderSanitizer,
    connect_timeout: Duration,
    close_grace: Duration,
}

impl WebSocketRelay {
    pub fn new(config: &ProxyConfig) -> Self {
        Self {
            sanitizer: HeaderSanitizer::new(&config.proxy.strip_headers),
            connect_timeout: Duration::from_secs(config.timeouts.connect_secs),
            close_grace: Duration::from_millis(config.timeouts.close_grace_ms),
        }
    }

    /// Open the upstream socket. Fails with `UpgradeFailed` if the upstream
    /// does not switch protocols.
    pub async fn connect(
        &self,
        target: &ProxyTarget,
        headers: &HeaderMap,
    ) -> ProxyResult<(UpstreamSocket, Option<HeaderValue>)> {
        let url = target.websocket_url();
        let mut request = url.as_str().into_client_request().map_err(|e| {
            tracing::warn!(target_url = %url, error = %e, "Cannot build upstream handshake");
            ProxyError::UpgradeFailed
        })?;
        for (name, value) in self.sanitizer.sanitize_for_websocket(headers).iter() {
            request.headers_mut().append(name.clone(), value.clone());
        }

        let connected = tokio::time::timeout(
            self.connect_timeout,
            tokio_tungstenite::connect_async(request),
        )
        .await;

        match connected {
            Ok(Ok((socket, response))) => {
                let protocol = response.headers().get(header::SEC_WEBSOCKET_PROTOCOL).cloned();
                tracing::debug!(target_url = %url, status = %response.status(), "Upstream socket open");
                Ok((socket, protocol))
            }
            Ok(Err(e)) => {
                tracing::warn!(target_url = %url, error = %e, "Upstream refused upgrade");
                metrics::record_upstream_error("websocket");
                Err(ProxyError::UpgradeFailed)
            }
            Err(_) => {
                tracing::warn!(target_url = %url, "Upstream upgrade timed out");
                metrics::record_upstream_error("websocket");
                Err(ProxyError::UpgradeFailed)
            }
        }
    }

    /// Connect upstream, then answer the client with `101` and relay.
    pub async fn upgrade(
        &self,
        client: WebSocketUpgrade,
        target: &ProxyTarget,
        headers: &HeaderMap,
    ) -> ProxyResult<Response> {
        let (upstream, protocol) = self.connect(target, headers).await?;

        let client = match protocol.as_ref().and_then(|p| p.to_str().ok()) {
            Some(protocol) => client.protocols([protocol.to_owned()]),
            None => client,
        };

        let session_id = uuid::Uuid::new_v4();
        let close_grace = self.close_grace;
        let target_url = target.to_string();

        Ok(client
            .on_failed_upgrade(move |e| {
                tracing::warn!(%session_id, error = %e, "Client upgrade failed");
            })
            .on_upgrade(move |socket: WebSocket| async move {
                tracing::info!(%session_id, target_url = %target_url, "WebSocket session open");
                metrics::record_websocket_opened();

                let (direction, end) = relay(socket, upstream, close_grace).await;

                metrics::record_websocket_closed();
                tracing::info!(
                    %session_id,
                    ended_by = direction.as_str(),
                    end = ?end,
                    "WebSocket session closed"
                );
            }))
    }
}
