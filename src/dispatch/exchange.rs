//! Per-request state.
//!
//! # Responsibilities
//! - Hold the request context and the response being built
//! - Apply freshness and security headers (`expire`)
//! - Emit the response exactly once, optionally throttled
//!
//! # Design Decisions
//! - `send` is idempotent; headers and body each go out at most once
//! - Throttling sleeps between 1 KiB chunks and stops sleeping as soon as
//!   the sink reports the client is gone
//! - CLI requests never emit headers

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use axum::http::header::{self, HeaderName, HeaderValue};
use axum::http::HeaderMap;

use crate::cache::Clock;
use crate::config::schema::KernelConfig;
use crate::dispatch::sink::ResponseSink;
use crate::error::{DispatchError, DispatchResult};
use crate::http::request::RequestContext;
use crate::http::response::http_date;
use crate::routing::params::Params;
use crate::status::reason_phrase;

const CHUNK_SIZE: usize = 1024;

/// Route data of the current dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteInfo {
    /// Matched path template.
    pub pattern: String,
    pub alias: Option<String>,
    pub params: Params,
}

/// Request plus the response under construction.
pub struct Exchange {
    request: RequestContext,
    code: u16,
    reason: &'static str,
    headers: HeaderMap,
    body: Option<String>,
    quiet: bool,
    kbps: u32,
    sent: bool,
    headers_sent: bool,
    error: bool,
    route: Option<RouteInfo>,
    sink: Box<dyn ResponseSink>,
    settings: Arc<KernelConfig>,
    clock: Arc<dyn Clock>,
    depth: u8,
}

impl Exchange {
    pub fn new(
        request: RequestContext,
        sink: Box<dyn ResponseSink>,
        settings: Arc<KernelConfig>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let quiet = request.verb == "HEAD";
        Self {
            request,
            code: 200,
            reason: "OK",
            headers: HeaderMap::new(),
            body: None,
            quiet,
            kbps: 0,
            sent: false,
            headers_sent: false,
            error: false,
            route: None,
            sink,
            settings,
            clock,
            depth: 0,
        }
    }

    pub fn request(&self) -> &RequestContext {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut RequestContext {
        &mut self.request
    }

    pub fn settings(&self) -> &KernelConfig {
        &self.settings
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn reason(&self) -> &'static str {
        self.reason
    }

    /// Set the response status.
    pub fn status(&mut self, code: u16) -> DispatchResult<&mut Self> {
        let reason = reason_phrase(code).ok_or(DispatchError::UnsupportedStatus(code))?;
        self.code = code;
        self.reason = reason;
        Ok(self)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Set a header, replacing earlier values. Invalid names or values are ignored.
    pub fn header(&mut self, name: &str, value: &str) -> &mut Self {
        match (HeaderName::try_from(name), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => tracing::debug!(header = %name, "Ignoring invalid header"),
        }
        self
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn set_body(&mut self, body: impl Into<String>) -> &mut Self {
        self.body = Some(body.into());
        self
    }

    pub fn clear_body(&mut self) -> &mut Self {
        self.body = None;
        self
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    /// Suppress the body on send.
    pub fn set_quiet(&mut self, quiet: bool) -> &mut Self {
        self.quiet = quiet;
        self
    }

    pub fn kbps(&self) -> u32 {
        self.kbps
    }

    pub fn set_kbps(&mut self, kbps: u32) -> &mut Self {
        self.kbps = kbps;
        self
    }

    pub fn is_sent(&self) -> bool {
        self.sent
    }

    pub fn is_error(&self) -> bool {
        self.error
    }

    /// Enter the error state; returns whether it was already entered.
    pub(crate) fn enter_error(&mut self) -> bool {
        std::mem::replace(&mut self.error, true)
    }

    pub fn route(&self) -> Option<&RouteInfo> {
        self.route.as_ref()
    }

    pub(crate) fn set_route(&mut self, route: RouteInfo) {
        self.route = Some(route);
    }

    /// Number of internal reroutes performed so far.
    pub fn depth(&self) -> u8 {
        self.depth
    }

    /// The sink, if it is a `T`.
    pub fn sink<T: 'static>(&self) -> Option<&T> {
        self.sink.as_any().downcast_ref::<T>()
    }

    /// Security headers plus freshness headers for `secs` seconds.
    ///
    /// Only GET responses with a positive lifetime are cacheable; anything
    /// else gets no-cache headers.
    pub fn expire(&mut self, secs: i64) -> &mut Self {
        let package = self.settings.package.clone();
        let xframe = self.settings.xframe.clone();
        self.header("X-Powered-By", &package)
            .header("X-Frame-Options", &xframe)
            .header("X-XSS-Protection", "1; mode=block")
            .header("X-Content-Type-Options", "nosniff");

        if self.request.verb == "GET" && secs > 0 {
            let now = self.now();
            self.headers.remove(header::PRAGMA);
            self.header("Cache-Control", &format!("max-age={}", secs))
                .header("Expires", &http_date(now + secs))
                .header("Last-Modified", &http_date(now));
        } else {
            self.header("Pragma", "no-cache")
                .header("Cache-Control", "no-cache, no-store, must-revalidate")
                .header("Expires", &http_date(0));
        }
        self
    }

    /// Headers as name/value pairs, for caching.
    pub fn header_pairs(&self) -> Vec<(String, String)> {
        self.headers
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect()
    }

    /// Replace headers and body with a cached response.
    pub fn restore(&mut self, headers: &[(String, String)], body: &str) -> &mut Self {
        self.headers.clear();
        for (name, value) in headers {
            if let (Ok(name), Ok(value)) = (HeaderName::try_from(name.as_str()), HeaderValue::from_str(value)) {
                self.headers.append(name, value);
            }
        }
        self.body = Some(body.to_string());
        self
    }

    /// Start over with a new request on the same sink (internal reroute).
    pub(crate) fn restart(&mut self, request: RequestContext) {
        self.quiet = request.verb == "HEAD";
        self.request = request;
        self.code = 200;
        self.reason = "OK";
        self.headers.clear();
        self.body = None;
        self.kbps = 0;
        self.sent = false;
        self.headers_sent = false;
        self.error = false;
        self.route = None;
        self.depth = self.depth.saturating_add(1);
    }

    /// Send headers and body. Calling it again does nothing.
    pub fn send(&mut self) -> &mut Self {
        if self.sent {
            return self;
        }
        self.sent = true;
        self.send_headers();
        self.send_content();
        self
    }

    /// Emit the status line and headers once. Skipped for CLI requests.
    pub fn send_headers(&mut self) -> &mut Self {
        if self.request.is_cli() || self.headers_sent {
            return self;
        }
        self.headers_sent = true;
        if let Err(e) = self.sink.write_head(self.code, self.reason, &self.headers) {
            tracing::debug!(request_id = %self.request.request_id, error = %e, "Failed to write response head");
        }
        self
    }

    /// Emit the body, honouring quiet mode and the throttle rate.
    pub fn send_content(&mut self) -> &mut Self {
        let Some(body) = self.body.as_deref().filter(|b| !b.is_empty()) else {
            return self;
        };
        if self.quiet {
            return self;
        }

        let sink = &mut self.sink;
        if self.kbps == 0 {
            if let Err(e) = sink.write_body(body.as_bytes()) {
                tracing::debug!(request_id = %self.request.request_id, error = %e, "Failed to write response body");
            }
            return self;
        }

        let kbps = f64::from(self.kbps);
        let started = Instant::now();
        for (i, chunk) in body.as_bytes().chunks(CHUNK_SIZE).enumerate() {
            if sink.is_closed() {
                tracing::debug!(request_id = %self.request.request_id, sent_chunks = i, "Client disconnected, throttled send cancelled");
                break;
            }
            let due = (i + 1) as f64 / kbps;
            let elapsed = started.elapsed().as_secs_f64();
            if due > elapsed {
                thread::sleep(Duration::from_secs_f64(due - elapsed));
            }
            if let Err(e) = sink.write_body(chunk) {
                tracing::debug!(request_id = %self.request.request_id, error = %e, "Client went away during throttled send");
                break;
            }
        }
        self
    }
}

impl std::fmt::Debug for Exchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exchange")
            .field("verb", &self.request.verb)
            .field("path", &self.request.path)
            .field("code", &self.code)
            .field("sent", &self.sent)
            .field("error", &self.error)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::sink::BufferedSink;
    use crate::testing::exchange;

    #[test]
    fn test_status() {
        let mut ex = exchange("GET /", BufferedSink::new());
        ex.status(404).unwrap();
        assert_eq!((ex.code(), ex.reason()), (404, "Not Found"));
        assert!(matches!(ex.status(999), Err(DispatchError::UnsupportedStatus(999))));
        assert_eq!(ex.code(), 404);
    }

    #[test]
    fn test_expire_cacheable_get() {
        let mut ex = exchange("GET /", BufferedSink::new());
        ex.expire(60);
        assert_eq!(ex.header_value("cache-control"), Some("max-age=60"));
        assert!(ex.header_value("pragma").is_none());
        assert!(ex.header_value("last-modified").is_some());
        assert_eq!(ex.header_value("x-frame-options"), Some("SAMEORIGIN"));
        assert_eq!(ex.header_value("x-content-type-options"), Some("nosniff"));
    }

    #[test]
    fn test_expire_no_cache() {
        for (target, secs) in [("GET /", 0), ("GET /", -1), ("POST /", 60)] {
            let mut ex = exchange(target, BufferedSink::new());
            ex.expire(secs);
            assert_eq!(ex.header_value("pragma"), Some("no-cache"));
            assert_eq!(
                ex.header_value("cache-control"),
                Some("no-cache, no-store, must-revalidate")
            );
            assert_eq!(ex.header_value("expires"), Some("Thu, 01 Jan 1970 00:00:00 GMT"));
        }
    }

    #[test]
    fn test_send_is_idempotent() {
        let mut ex = exchange("GET /", BufferedSink::new());
        ex.set_body("hello");
        ex.send();
        ex.send();
        ex.send_headers();

        let sink = ex.sink::<BufferedSink>().unwrap();
        assert_eq!(sink.heads_written(), 1);
        assert_eq!(sink.body_text(), "hello");
    }

    #[test]
    fn test_head_is_quiet() {
        let mut ex = exchange("HEAD /", BufferedSink::new());
        ex.set_body("hidden");
        ex.send();
        let sink = ex.sink::<BufferedSink>().unwrap();
        assert_eq!(sink.heads_written(), 1);
        assert!(sink.body().is_empty());
    }

    #[test]
    fn test_cli_skips_headers() {
        let mut ex = exchange("GET / cli", BufferedSink::new());
        ex.set_body("out");
        ex.send();
        let sink = ex.sink::<BufferedSink>().unwrap();
        assert_eq!(sink.heads_written(), 0);
        assert_eq!(sink.body_text(), "out");
    }

    #[test]
    fn test_throttled_send() {
        let mut ex = exchange("GET /", BufferedSink::new());
        ex.set_body("x".repeat(3 * 1024)).set_kbps(20);

        let started = Instant::now();
        ex.send();
        // Three chunks at 20 KiB/s are due at 50, 100 and 150 ms.
        assert!(started.elapsed() >= Duration::from_millis(140));
        assert_eq!(ex.sink::<BufferedSink>().unwrap().body().len(), 3 * 1024);
    }

    #[test]
    fn test_throttle_cancelled_for_closed_client() {
        let mut ex = exchange("GET /", BufferedSink::closed());
        ex.set_body("x".repeat(10 * 1024)).set_kbps(1);

        let started = Instant::now();
        ex.send();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(ex.sink::<BufferedSink>().unwrap().body().is_empty());
    }

    #[test]
    fn test_restore_and_restart() {
        let mut ex = exchange("GET /a", BufferedSink::new());
        ex.restore(&[("content-type".into(), "text/plain".into())], "cached");
        assert_eq!(ex.body(), Some("cached"));
        assert_eq!(ex.header_value("content-type"), Some("text/plain"));

        ex.status(500).unwrap();
        ex.restart(RequestContext::new("GET", "/b"));
        assert_eq!(ex.code(), 200);
        assert!(ex.body().is_none());
        assert_eq!(ex.depth(), 1);
        assert_eq!(ex.request().path, "/b");
    }
}
