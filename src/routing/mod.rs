//! Request routing subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request head
//!     → router.rs (health / preflight / resolve state machine)
//!     → target.rs (url= parameter or encoded path segment)
//!     → encoding.rs (url-safe base64 ⇄ absolute URL)
//!     → RequestState::{HttpProxying, WebSocketProxying} handed to the relays
//! ```

pub mod encoding;
pub mod router;
pub mod target;

pub use encoding::{proxied_path, EncodedPath};
pub use router::{RequestHead, RequestState, Router};
pub use target::{ProxyTarget, TargetResolver};
