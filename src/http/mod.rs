//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, dispatch)
//!     → request.rs (request ID)
//!     → routing::Router decides the request state
//!     → relay.rs (HTTP) or websocket.rs (WebSocket upgrade)
//!     → response.rs (redirect rewriting, CORS, router responses)
//!     → Send to client
//! ```

pub mod relay;
pub mod request;
pub mod response;
pub mod server;
pub mod websocket;

pub use relay::HttpRelay;
pub use request::X_REQUEST_ID;
pub use response::RedirectRewriter;
pub use server::{AppState, HttpServer};
pub use websocket::WebSocketRelay;
