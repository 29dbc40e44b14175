//! HTTP relaying to the resolved target.
//!
//! # Responsibilities
//! - Forward method, sanitized headers and body to the target
//! - Never follow upstream redirects; rewrite any `Location` instead
//! - Stream the upstream body back without buffering
//! - Merge CORS headers over the upstream response headers
//!
//! # Design Decisions
//! - GET and HEAD are always sent without a body, and without the framing
//!   headers that described the dropped one
//! - `request_secs` bounds the wait for the response head only; a slow
//!   upstream is `UpstreamUnreachable`, like a refused connection
//! - Dropping the returned response (client gone) drops the upstream body
//!   stream, which aborts the outbound request

use std::time::Duration;

use axum::body::{Body, HttpBody};
use axum::http::{header, HeaderMap, HeaderValue, Method, Request, Response};

use crate::config::ProxyConfig;
use crate::error::{ProxyError, ProxyResult};
use crate::http::response::RedirectRewriter;
use crate::observability::metrics;
use crate::routing::target::ProxyTarget;
use crate::security::cors::apply_cors;
use crate::security::headers::{strip_hop_by_hop, HeaderSanitizer};

/// Performs outbound HTTP requests on behalf of callers.
#[derive(Debug, Clone)]
pub struct HttpRelay {
    client: reqwest::Client,
    sanitizer: HeaderSanitizer,
    rewriter: RedirectRewriter,
    request_timeout: Duration,
}

impl HttpRelay {
    /// Build a relay whose client never follows redirects.
    pub fn new(config: &ProxyConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()?;

        Ok(Self::with_client(
            client,
            HeaderSanitizer::new(&config.proxy.strip_headers),
            RedirectRewriter::new(config.proxy.path_prefix.clone()),
            Duration::from_secs(config.timeouts.request_secs),
        ))
    }

    pub fn with_client(
        client: reqwest::Client,
        sanitizer: HeaderSanitizer,
        rewriter: RedirectRewriter,
        request_timeout: Duration,
    ) -> Self {
        Self {
            client,
            sanitizer,
            rewriter,
            request_timeout,
        }
    }

    /// Headers sent upstream. A dropped body takes its `Content-Length`
    /// and `Content-Type` with it.
    pub fn outbound_headers(&self, inbound: &HeaderMap, bodiless: bool) -> HeaderMap {
        let mut headers = self.sanitizer.sanitize_for_http(inbound);
        if bodiless {
            headers.remove(header::CONTENT_LENGTH);
            headers.remove(header::CONTENT_TYPE);
        }
        headers
    }

    /// Relay `request` to `target` and rebuild the response for the caller.
    pub async fn forward(
        &self,
        request: Request<Body>,
        target: &ProxyTarget,
    ) -> ProxyResult<Response<Body>> {
        let (parts, body) = request.into_parts();
        let origin: Option<HeaderValue> = parts.headers.get("origin").cloned();
        let url = target.http_url();

        let bodiless = parts.method == Method::GET
            || parts.method == Method::HEAD
            || body.size_hint().exact() == Some(0);

        let mut outbound = self
            .client
            .request(parts.method.clone(), url.clone())
            .headers(self.outbound_headers(&parts.headers, bodiless));
        if !bodiless {
            outbound = outbound.body(reqwest::Body::wrap_stream(body.into_data_stream()));
        }

        let upstream = match tokio::time::timeout(self.request_timeout, outbound.send()).await {
            Ok(Ok(upstream)) => upstream,
            Ok(Err(e)) => {
                tracing::warn!(target_url = %url, error = %e, "Upstream request failed");
                metrics::record_upstream_error("http");
                return Err(ProxyError::UpstreamUnreachable);
            }
            Err(_) => {
                tracing::warn!(
                    target_url = %url,
                    timeout_secs = self.request_timeout.as_secs(),
                    "Upstream response timed out"
                );
                metrics::record_upstream_error("http");
                return Err(ProxyError::UpstreamUnreachable);
            }
        };

        let status = upstream.status();
        let mut headers = upstream.headers().clone();
        strip_hop_by_hop(&mut headers);
        self.rewriter.rewrite_headers(&mut headers, &url);
        apply_cors(&mut headers, origin.as_ref());

        tracing::debug!(target_url = %url, status = %status, "Upstream responded");

        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}
