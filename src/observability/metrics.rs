//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by method, status, kind
//! - `proxy_request_duration_seconds` (histogram): time to response head
//! - `proxy_upstream_errors_total` (counter): relay failures by kind
//! - `proxy_websocket_sessions_active` (gauge): relayed socket pairs
//! - `proxy_websocket_messages_total` (counter): relayed frames by direction
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a finished routing decision or relayed response head.
pub fn record_request(method: &str, status: u16, kind: &'static str, start: Instant) {
    counter!(
        "proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "kind" => kind
    )
    .increment(1);
    histogram!("proxy_request_duration_seconds", "kind" => kind)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_upstream_error(kind: &'static str) {
    counter!("proxy_upstream_errors_total", "kind" => kind).increment(1);
}

pub fn record_websocket_opened() {
    gauge!("proxy_websocket_sessions_active").increment(1.0);
}

pub fn record_websocket_closed() {
    gauge!("proxy_websocket_sessions_active").decrement(1.0);
}

pub fn record_websocket_message(direction: &'static str) {
    counter!("proxy_websocket_messages_total", "direction" => direction).increment(1);
}
