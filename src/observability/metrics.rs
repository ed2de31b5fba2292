//! Metrics collection and exposition.
//!
//! # Metrics
//! - `stick_requests_total` (counter): dispatched requests by verb, status
//! - `stick_request_duration_seconds` (histogram): dispatch latency
//! - `stick_cache_events_total` (counter): page cache hit, miss,
//!   not_modified and store events
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, so the kernel records unconditionally
//! - The Prometheus exporter is installed once, on demand

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Page cache outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEvent {
    Hit,
    Miss,
    NotModified,
    Store,
}

impl CacheEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheEvent::Hit => "hit",
            CacheEvent::Miss => "miss",
            CacheEvent::NotModified => "not_modified",
            CacheEvent::Store => "store",
        }
    }
}

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            describe();
            tracing::info!(address = %addr, "Metrics exporter started");
        }
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

fn describe() {
    metrics::describe_counter!("stick_requests_total", "Dispatched requests by verb and status");
    metrics::describe_histogram!(
        "stick_request_duration_seconds",
        metrics::Unit::Seconds,
        "Time spent dispatching a request"
    );
    metrics::describe_counter!("stick_cache_events_total", "Page cache events");
}

/// Record a dispatched request.
pub fn record_request(verb: &str, status: u16, start: Instant) {
    let labels = [("verb", verb.to_string()), ("status", status.to_string())];
    metrics::counter!("stick_requests_total", &labels).increment(1);
    metrics::histogram!("stick_request_duration_seconds", &labels).record(start.elapsed().as_secs_f64());
}

/// Record a page cache event.
pub fn record_cache(event: CacheEvent) {
    metrics::counter!("stick_cache_events_total", "event" => event.as_str()).increment(1);
}
