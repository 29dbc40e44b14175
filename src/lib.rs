//! Forwarding HTTP/WebSocket proxy library.
//!
//! Requests to `/proxy?url=<target>` or `/proxy/<url-safe-base64(target)>`
//! are relayed to the target with identifying headers removed, redirects
//! rewritten to stay proxied, and permissive CORS headers merged in.
//! WebSocket upgrades are relayed frame by frame.

pub mod cli;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod security;

pub use config::schema::ProxyConfig;
pub use error::ProxyError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
