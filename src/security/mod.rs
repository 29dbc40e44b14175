//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request headers:
//!     → headers.rs (strip identifying + hop-by-hop headers)
//!     → forwarded upstream
//!
//! Outbound response headers:
//!     → headers.rs (strip hop-by-hop)
//!     → cors.rs (merge permissive CORS, overriding upstream values)
//! ```
//!
//! # Design Decisions
//! - No trust in client input: nothing identifying the caller leaves the proxy
//! - CORS is permissive by purpose; access control belongs to the host

pub mod cors;
pub mod headers;

pub use cors::{apply_cors, cors_headers};
pub use headers::HeaderSanitizer;
