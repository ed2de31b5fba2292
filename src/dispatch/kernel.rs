//! The dispatch kernel.
//!
//! # Responsibilities
//! - Own the route table, named controllers, services, hive, hooks and cache
//! - Drive a request through boot, pre-route, matching, resolution, the
//!   cache check, invocation, post-route and sending
//! - Funnel every per-request failure into the error pipeline
//! - Mock requests and reroute
//!
//! # Design Decisions
//! - Registration takes `&mut self`; dispatch takes `&self` so one kernel
//!   serves concurrent requests behind an `Arc`
//! - Pages are cached only for GET/HEAD on routes with a ttl, and only when
//!   the handler produced a non-empty body
//! - A cached page is fresh for `If-Modified-Since` while `ims + ttl > now`
//! - CLI reroutes re-dispatch on the same exchange, bounded by a depth limit
//!
//! # Data Flow
//! ```text
//! RequestContext ──► Boot ─► PreRoute ─► RouteMatcher ─► ControllerResolver
//!                                              │ 404          │ 405 / 404
//!                                              ▼              ▼
//!                         cache check ─► ControllerArgs ─► ArgumentBinder ─► handler
//!                          │ 304 / hit                                         │
//!                          ▼                                                   ▼
//!                        send ◄──────────── store page ◄── reply ◄──── PostRoute
//! ```

use std::any::Any;
use std::backtrace::Backtrace;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

use axum::http::HeaderMap;

use crate::cache::{page_key, ResponseCache};
use crate::config::schema::KernelConfig;
use crate::container::{Hive, ServiceRegistry};
use crate::dispatch::binder::ArgumentBinder;
use crate::dispatch::events::{Event, EventArgs, EventHub};
use crate::dispatch::exchange::{Exchange, RouteInfo};
use crate::dispatch::handler::{Arg, Handler, HandlerRef, Reply};
use crate::dispatch::resolver::{ControllerResolver, Controllers, Resolution};
use crate::dispatch::sink::{BufferedSink, ResponseSink};
use crate::error::{DispatchError, DispatchResult, RouteResult};
use crate::http::request::{split_target, RequestContext};
use crate::http::response::{error_body, parse_http_date};
use crate::observability::metrics::{record_cache, record_request, CacheEvent};
use crate::routing::matcher::RouteMatcher;
use crate::routing::params::Params;
use crate::routing::table::{parse_pairs, render_query, RouteTable};
use crate::routing::template::Mode;

/// Maximum number of internal (CLI) reroutes within one dispatch.
const MAX_REROUTE_DEPTH: u8 = 8;

/// Routing and dispatch core.
#[derive(Debug)]
pub struct Kernel {
    routes: RouteTable,
    controllers: Controllers,
    services: ServiceRegistry,
    hive: Hive,
    events: EventHub,
    cache: ResponseCache,
}

impl Kernel {
    /// Kernel with an in-memory page cache seeded from the settings.
    pub fn new(settings: KernelConfig) -> Self {
        let cache = ResponseCache::in_memory(settings.seed.clone());
        Self::with_hive(Hive::new(settings), cache)
    }

    pub fn with_hive(hive: Hive, cache: ResponseCache) -> Self {
        Self {
            routes: RouteTable::new(hive.settings().caseless),
            controllers: Controllers::new(),
            services: ServiceRegistry::new(),
            hive,
            events: EventHub::new(),
            cache,
        }
    }

    /// Register a handler under a route template.
    pub fn route(&mut self, template: &str, handler: impl Into<HandlerRef>) -> RouteResult<&mut Self> {
        self.route_with(template, handler, 0, 0)
    }

    /// Register a handler with a cache ttl (seconds) and throttle rate (KiB/s).
    pub fn route_with(
        &mut self,
        template: &str,
        handler: impl Into<HandlerRef>,
        ttl: u64,
        kbps: u32,
    ) -> RouteResult<&mut Self> {
        self.routes.register(template, handler, ttl, kbps)?;
        Ok(self)
    }

    /// Register `controller->method` routes.
    pub fn map(&mut self, controller: &str, routes: &[(&str, &str, u64, u32)]) -> RouteResult<&mut Self> {
        self.routes.map(controller, routes)?;
        Ok(self)
    }

    pub fn redirect(&mut self, template: &str, target: &str, permanent: bool) -> RouteResult<&mut Self> {
        self.routes.redirect(template, target, permanent)?;
        Ok(self)
    }

    /// Make `handler` reachable as `controller->method`.
    pub fn controller(&mut self, controller: &str, method: &str, handler: Handler) -> &mut Self {
        self.controllers.method(controller, method, handler);
        self
    }

    /// Make `handler` reachable by a bare name.
    pub fn function(&mut self, name: &str, handler: Handler) -> &mut Self {
        self.controllers.function(name, handler);
        self
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn services(&self) -> &ServiceRegistry {
        &self.services
    }

    pub fn services_mut(&mut self) -> &mut ServiceRegistry {
        &mut self.services
    }

    pub fn hive(&self) -> &Hive {
        &self.hive
    }

    pub fn hive_mut(&mut self) -> &mut Hive {
        &mut self.hive
    }

    pub fn settings(&self) -> &KernelConfig {
        self.hive.settings()
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn events(&self) -> &EventHub {
        &self.events
    }

    /// Register a hook, replacing the previous one for `event`.
    pub fn on<F>(&self, event: Event, func: F) -> &Self
    where
        F: Fn(&mut Exchange, &mut EventArgs<'_>) -> bool + Send + Sync + 'static,
    {
        self.events.on(event, func);
        self
    }

    /// Register a hook that fires once.
    pub fn one<F>(&self, event: Event, func: F) -> &Self
    where
        F: Fn(&mut Exchange, &mut EventArgs<'_>) -> bool + Send + Sync + 'static,
    {
        self.events.one(event, func);
        self
    }

    pub fn off(&self, event: Event) -> &Self {
        self.events.off(event);
        self
    }

    /// Render a path from an alias and its parameters.
    pub fn alias(&self, alias: &str, params: &Params, query: &[(String, String)]) -> String {
        self.routes.resolve_alias(alias, params, query)
    }

    /// Alias path prefixed with the base path.
    pub fn path(&self, alias: &str, params: &Params, query: &[(String, String)]) -> String {
        format!("{}{}", self.settings().base, self.alias(alias, params, query))
    }

    /// Dispatch a request and send the response into `sink`.
    pub fn dispatch(&self, request: RequestContext, sink: Box<dyn ResponseSink>) -> Exchange {
        let mut ex = Exchange::new(
            request,
            sink,
            self.hive.settings().clone(),
            self.cache.clock().clone(),
        );
        self.run(&mut ex);
        ex
    }

    /// Dispatch an emulated request; the response is buffered.
    ///
    /// `expr` is `VERB target [mode]` where target is a path, an alias or
    /// `alias(k=v,...)`, optionally followed by a query and a fragment.
    /// For GET and HEAD `args` join the query; otherwise they are the form
    /// values and, unless `body` is given, the encoded body.
    pub fn mock(
        &self,
        expr: &str,
        args: &[(&str, &str)],
        headers: &[(&str, &str)],
        body: Option<&str>,
    ) -> DispatchResult<Exchange> {
        self.mock_with(expr, args, headers, body, Box::new(BufferedSink::new()))
    }

    /// Like [`Kernel::mock`], writing into `sink`.
    pub fn mock_with(
        &self,
        expr: &str,
        args: &[(&str, &str)],
        headers: &[(&str, &str)],
        body: Option<&str>,
        sink: Box<dyn ResponseSink>,
    ) -> DispatchResult<Exchange> {
        let request = self.mock_request(expr, args, headers, body)?;
        Ok(self.dispatch(request, sink))
    }

    fn mock_request(
        &self,
        expr: &str,
        args: &[(&str, &str)],
        headers: &[(&str, &str)],
        body: Option<&str>,
    ) -> DispatchResult<RequestContext> {
        let mut parts = expr.split_whitespace();
        let (Some(verb), Some(target)) = (parts.next(), parts.next()) else {
            return Err(DispatchError::MalformedMock(expr.to_string()));
        };
        let mode = match parts.next() {
            Some(mode) => mode
                .parse::<Mode>()
                .map_err(|_| DispatchError::MalformedMock(expr.to_string()))?,
            None => Mode::Sync,
        };

        let verb = verb.to_ascii_uppercase();
        let (path, query, fragment) = split_target(target);
        let path = self.routes.resolve_target(path);
        let mut query = parse_pairs(query);
        let args: Vec<(String, String)> = args
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        let mut form = Vec::new();
        let mut payload = body.map(str::to_string);
        if matches!(verb.as_str(), "GET" | "HEAD") {
            query.extend(args);
        } else {
            if payload.is_none() {
                payload = Some(render_query(&args).trim_start_matches('?').to_string());
            }
            form = args;
        }

        let mut request = RequestContext::new(&verb, &format!("{}{}", path, render_query(&query))).with_mode(mode);
        request.fragment = fragment.map(str::to_string);
        for (name, value) in headers {
            request = request.with_header(name, value);
        }
        if let Some(payload) = payload {
            request = request.with_body(payload);
        }
        if !form.is_empty() {
            request.form = form;
        }
        Ok(request)
    }

    fn run(&self, ex: &mut Exchange) {
        let started = Instant::now();
        let span = tracing::info_span!(
            "dispatch",
            request_id = %ex.request().request_id,
            verb = %ex.request().verb,
            path = %ex.request().path,
        );
        let _guard = span.enter();

        if self.settings().method_override {
            ex.request_mut().override_method();
        }

        if let Err(err) = self.handle(ex) {
            self.fail(ex, err);
        }
        ex.send();

        record_request(&ex.request().verb, ex.code(), started);
        tracing::debug!(status = ex.code(), elapsed_ms = started.elapsed().as_millis() as u64, "Request dispatched");
    }

    fn handle(&self, ex: &mut Exchange) -> DispatchResult<()> {
        self.events.trigger(Event::Boot, ex, &mut EventArgs::None, true);
        if self.events.trigger(Event::PreRoute, ex, &mut EventArgs::None, false) {
            return Ok(());
        }

        let verb = ex.request().verb.clone();
        let path = ex.request().path.clone();

        let Some(found) = RouteMatcher::new(&self.routes).find(&path) else {
            tracing::debug!(verb = %verb, path = %path, "No route matched");
            return Err(DispatchError::NoMatch { verb, path });
        };

        let resolved = match ControllerResolver::new(&self.routes, &self.controllers).resolve(&found, &verb, ex.request().mode) {
            Resolution::Found(resolved) => resolved,
            Resolution::NotAllowed => {
                tracing::debug!(verb = %verb, path = %path, pattern = %found.pattern, "Verb not allowed");
                return Err(DispatchError::MethodNotAllowed { verb, path });
            }
            Resolution::NotInvocable => {
                tracing::debug!(verb = %verb, path = %path, pattern = %found.pattern, "Handler not invocable");
                return Err(DispatchError::NoMatch { verb, path });
            }
        };

        let pattern = found.pattern.to_string();
        let mut params = found.params;
        ex.set_kbps(resolved.kbps);

        let ttl = resolved.ttl;
        let cache_key = (ttl > 0 && matches!(verb.as_str(), "GET" | "HEAD"))
            .then(|| page_key(&verb, &ex.request().uri));
        match &cache_key {
            Some(key) => {
                if let Some(record) = self.cache.get(key) {
                    let now = ex.now();
                    let fresh = ex
                        .request()
                        .header("if-modified-since")
                        .and_then(parse_http_date)
                        .is_some_and(|since| since + ttl as i64 > now);
                    ex.set_route(RouteInfo {
                        pattern,
                        alias: resolved.alias,
                        params,
                    });
                    if fresh {
                        tracing::debug!(key = %key, "Page not modified");
                        record_cache(CacheEvent::NotModified);
                        ex.status(304)?;
                        return Ok(());
                    }
                    tracing::debug!(key = %key, "Page cache hit");
                    record_cache(CacheEvent::Hit);
                    ex.restore(&record.headers, &record.body);
                    ex.expire(record.created_at + ttl as i64 - now);
                    return Ok(());
                }
                record_cache(CacheEvent::Miss);
                ex.expire(ttl as i64);
            }
            None => {
                ex.expire(0);
            }
        }

        self.events.trigger(
            Event::ControllerArgs,
            ex,
            &mut EventArgs::ControllerArgs {
                handler: &resolved.handler,
                params: &mut params,
            },
            false,
        );
        ex.set_route(RouteInfo {
            pattern,
            alias: resolved.alias.clone(),
            params: params.clone(),
        });

        let available = params.into_iter().map(|(k, v)| (k, Arg::Text(v))).collect();
        let args = ArgumentBinder::new(&self.services, &self.hive).bind(
            resolved.handler.signature(),
            available,
            ex.request(),
        )?;

        let depth = ex.depth();
        let mut reply = catch_unwind(AssertUnwindSafe(|| resolved.handler.call(ex, args)))
            .map_err(|payload| {
                let message = panic_message(payload.as_ref());
                tracing::error!(error = %message, "Handler panicked");
                DispatchError::HandlerInvocation {
                    code: 500,
                    message,
                    headers: HeaderMap::new(),
                }
            })??;

        let handled = self.events.trigger(
            Event::PostRoute,
            ex,
            &mut EventArgs::PostRoute { reply: &mut reply },
            false,
        );
        if !handled {
            self.apply(ex, reply)?;
        }

        if ex.depth() != depth || ex.is_error() {
            return Ok(());
        }
        if let Some(key) = cache_key {
            if let Some(body) = ex.body().filter(|b| !b.is_empty()) {
                self.cache.put(&key, ex.header_pairs(), body.to_string(), ttl);
                record_cache(CacheEvent::Store);
                tracing::debug!(key = %key, ttl, "Page stored");
            }
        }
        Ok(())
    }

    fn apply(&self, ex: &mut Exchange, reply: Reply) -> DispatchResult<()> {
        match reply {
            Reply::Empty => {}
            Reply::Text(text) => {
                ex.set_body(text);
            }
            Reply::Json(value) => {
                ex.header("Content-Type", "application/json");
                ex.set_body(value.to_string());
            }
            Reply::Callback(callback) => callback(ex),
            Reply::Reroute { target, permanent } => self.reroute(ex, &target, permanent)?,
        }
        Ok(())
    }

    /// Redirect to an alias, `alias(k=v,...)` expression or path.
    ///
    /// The reroute hook sees the final URL and may take over. CLI requests
    /// are re-dispatched internally as `GET path`; anything else gets a
    /// 302 (301 when permanent) with `Location`.
    pub fn reroute(&self, ex: &mut Exchange, target: &str, permanent: bool) -> DispatchResult<()> {
        let path = self.routes.resolve_target(target);
        let url = if path.starts_with('/') && !path.starts_with("//") {
            format!("{}{}{}", ex.request().base_url, self.settings().base, path)
        } else {
            path.clone()
        };

        if self.events.trigger(
            Event::Reroute,
            ex,
            &mut EventArgs::Reroute {
                url: &url,
                permanent,
            },
            false,
        ) {
            return Ok(());
        }

        if ex.request().is_cli() {
            if ex.depth() >= MAX_REROUTE_DEPTH {
                return Err(DispatchError::HandlerInvocation {
                    code: 500,
                    message: format!("Too many reroutes while resolving {}", path),
                    headers: HeaderMap::new(),
                });
            }
            tracing::debug!(target = %path, "Internal reroute");
            let mut request = RequestContext::new("GET", &path).with_mode(Mode::Cli);
            request.request_id = ex.request().request_id.clone();
            ex.restart(request);
            return self.handle(ex);
        }

        tracing::debug!(location = %url, permanent, "Redirecting");
        ex.status(if permanent { 301 } else { 302 })?;
        ex.header("Location", &url);
        ex.clear_body();
        ex.send();
        Ok(())
    }

    /// Enter the error state and render the default error body.
    ///
    /// Only the first error of a request is rendered. `message` defaults to
    /// `HTTP <code> (<VERB> <PATH>)`; `trace` is shown only in debug mode.
    pub fn error(
        &self,
        ex: &mut Exchange,
        code: u16,
        message: Option<&str>,
        headers: HeaderMap,
        trace: Option<String>,
    ) {
        if ex.status(code).is_err() {
            tracing::warn!(code, "Unsupported error status, using 500");
            let _ = ex.status(500);
        }
        let code = ex.code();

        let text = match message {
            Some(message) if !message.is_empty() => message.to_string(),
            _ => format!("HTTP {} ({} {})", code, ex.request().verb, ex.request().path),
        };
        let trace = trace.filter(|_| ex.settings().debug > 0);

        if ex.enter_error() {
            return;
        }

        *ex.headers_mut() = headers;
        ex.clear_body();
        ex.expire(-1);

        if code >= 500 {
            tracing::error!(status = code, text = %text, trace = trace.as_deref().unwrap_or(""), "Request failed");
        } else {
            tracing::warn!(status = code, text = %text, "Request failed");
        }

        if self.events.trigger(
            Event::Error,
            ex,
            &mut EventArgs::Error {
                code,
                text: &text,
                trace: trace.as_deref().unwrap_or(""),
            },
            false,
        ) {
            return;
        }

        let rendered = error_body(
            ex.request().mode,
            code,
            ex.reason(),
            &text,
            trace.as_deref(),
            &ex.settings().encoding,
        );
        if let Some(content_type) = rendered.content_type {
            ex.header("Content-Type", content_type);
        }
        ex.set_body(rendered.body);
        ex.send();
    }

    fn fail(&self, ex: &mut Exchange, err: DispatchError) {
        let trace = (self.settings().debug > 0)
            .then(|| format!("{:?}\n{}", err, Backtrace::force_capture()));
        let code = err.status();
        let message = err.public_message();
        let headers = match err {
            DispatchError::HandlerInvocation { headers, .. } => headers,
            _ => HeaderMap::new(),
        };
        self.error(ex, code, message.as_deref(), headers, trace);
    }
}

/// Text carried by a panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::handler::Signature;
    use crate::error::HandlerError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn kernel() -> Kernel {
        let mut kernel = Kernel::new(KernelConfig::default());
        kernel
            .route("GET home /", Handler::from_fn(|_, _| Ok("home".into())))
            .unwrap()
            .route(
                "GET user /user/@id",
                Handler::new(Signature::new().value("id"), |_, args| {
                    Ok(format!("user {}", args.require_text(0)?).into())
                }),
            )
            .unwrap();
        kernel
    }

    fn body(ex: &Exchange) -> String {
        ex.sink::<BufferedSink>().map(BufferedSink::body_text).unwrap_or_default()
    }

    #[test]
    fn test_dispatch_text() {
        let ex = kernel().mock("GET /user/9", &[], &[], None).unwrap();
        assert_eq!(ex.code(), 200);
        assert_eq!(body(&ex), "user 9");
        assert_eq!(ex.route().unwrap().pattern, "/user/@id");
        assert_eq!(ex.route().unwrap().alias.as_deref(), Some("user"));
    }

    #[test]
    fn test_mock_alias_target() {
        let kernel = kernel();
        let ex = kernel.mock("GET user(id=4)", &[], &[], None).unwrap();
        assert_eq!(body(&ex), "user 4");

        let ex = kernel.mock("GET home", &[], &[], None).unwrap();
        assert_eq!(body(&ex), "home");
    }

    #[test]
    fn test_mock_args() {
        let mut kernel = Kernel::new(KernelConfig::default());
        kernel
            .route(
                "GET|POST /echo",
                Handler::from_fn(|ex, _| {
                    let req = ex.request();
                    Ok(format!("{}:{}", req.uri, req.form_value("a").unwrap_or("-")).into())
                }),
            )
            .unwrap();

        let ex = kernel.mock("GET /echo?x=1", &[("a", "2")], &[], None).unwrap();
        assert_eq!(body(&ex), "/echo?x=1&a=2:-");

        let ex = kernel.mock("POST /echo", &[("a", "2")], &[], None).unwrap();
        assert_eq!(body(&ex), "/echo:2");
        assert_eq!(&ex.request().body[..], b"a=2");
    }

    #[test]
    fn test_malformed_mock() {
        assert!(matches!(
            kernel().mock("GET", &[], &[], None),
            Err(DispatchError::MalformedMock(_))
        ));
        assert!(matches!(
            kernel().mock("GET / sideways", &[], &[], None),
            Err(DispatchError::MalformedMock(_))
        ));
    }

    #[test]
    fn test_json_reply() {
        let mut kernel = Kernel::new(KernelConfig::default());
        kernel
            .route(
                "GET /data",
                Handler::from_fn(|_, _| Ok(serde_json::json!({ "ok": true }).into())),
            )
            .unwrap();
        let ex = kernel.mock("GET /data", &[], &[], None).unwrap();
        assert_eq!(ex.header_value("content-type"), Some("application/json"));
        assert_eq!(body(&ex), r#"{"ok":true}"#);
    }

    #[test]
    fn test_callback_reply() {
        let mut kernel = Kernel::new(KernelConfig::default());
        kernel
            .route(
                "GET /made",
                Handler::from_fn(|_, _| {
                    Ok(Reply::callback(|ex| {
                        ex.header("X-Made", "yes").set_body("custom");
                        let _ = ex.status(201);
                    }))
                }),
            )
            .unwrap();
        let ex = kernel.mock("GET /made", &[], &[], None).unwrap();
        assert_eq!(ex.code(), 201);
        assert_eq!(ex.header_value("x-made"), Some("yes"));
        assert_eq!(body(&ex), "custom");
    }

    #[test]
    fn test_handler_http_error() {
        let mut kernel = Kernel::new(KernelConfig::default());
        kernel
            .route(
                "GET /secret",
                Handler::from_fn(|_, _| Err(HandlerError::http(403, "Keep out"))),
            )
            .unwrap();
        let ex = kernel.mock("GET /secret ajax", &[], &[], None).unwrap();
        assert_eq!(ex.code(), 403);
        let value: serde_json::Value = serde_json::from_str(&body(&ex)).unwrap();
        assert_eq!(value["status"], "Forbidden");
        assert_eq!(value["text"], "Keep out");
        assert!(value.get("trace").is_none());
    }

    #[test]
    fn test_debug_trace_in_error() {
        let mut settings = KernelConfig::default();
        settings.debug = 1;
        let mut kernel = Kernel::new(settings);
        kernel
            .route("GET /boom", Handler::from_fn(|_, _| Err(HandlerError::Failed("boom".into()))))
            .unwrap();
        let ex = kernel.mock("GET /boom ajax", &[], &[], None).unwrap();
        assert_eq!(ex.code(), 500);
        let value: serde_json::Value = serde_json::from_str(&body(&ex)).unwrap();
        assert!(value["trace"].as_str().is_some_and(|t| t.contains("boom")));
    }

    #[test]
    fn test_error_hook_takes_over() {
        let kernel = kernel();
        kernel.on(Event::Error, |ex, args| {
            if let EventArgs::Error { code, .. } = args {
                ex.set_body(format!("custom {}", code));
            }
            true
        });
        let ex = kernel.mock("GET /nowhere", &[], &[], None).unwrap();
        assert_eq!(ex.code(), 404);
        assert_eq!(body(&ex), "custom 404");
    }

    #[test]
    fn test_pre_route_short_circuit() {
        let kernel = kernel();
        kernel.on(Event::PreRoute, |ex, _| {
            ex.set_body("maintenance");
            true
        });
        let ex = kernel.mock("GET /user/1", &[], &[], None).unwrap();
        assert_eq!(body(&ex), "maintenance");
    }

    #[test]
    fn test_boot_fires_once() {
        let kernel = kernel();
        let boots = Arc::new(AtomicUsize::new(0));
        let counter = boots.clone();
        kernel.on(Event::Boot, move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            false
        });
        kernel.mock("GET /", &[], &[], None).unwrap();
        kernel.mock("GET /", &[], &[], None).unwrap();
        assert_eq!(boots.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_post_route_can_rewrite_reply() {
        let kernel = kernel();
        kernel.on(Event::PostRoute, |_, args| {
            if let EventArgs::PostRoute { reply } = args {
                **reply = Reply::from("rewritten");
            }
            false
        });
        let ex = kernel.mock("GET /", &[], &[], None).unwrap();
        assert_eq!(body(&ex), "rewritten");
    }

    #[test]
    fn test_redirect_route() {
        let mut kernel = kernel();
        kernel.redirect("GET /old", "user(id=3)", false).unwrap();
        kernel.redirect("GET /gone", "home", true).unwrap();

        let ex = kernel.mock("GET /old", &[], &[], None).unwrap();
        assert_eq!(ex.code(), 302);
        assert_eq!(ex.header_value("location"), Some("http://localhost/user/3"));
        assert!(body(&ex).is_empty());

        let ex = kernel.mock("GET /gone", &[], &[], None).unwrap();
        assert_eq!(ex.code(), 301);
    }

    #[test]
    fn test_cli_reroute_dispatches_internally() {
        let mut kernel = kernel();
        kernel.redirect("GET /old", "user(id=3)", false).unwrap();
        let ex = kernel.mock("GET /old cli", &[], &[], None).unwrap();
        assert_eq!(ex.code(), 200);
        assert_eq!(ex.depth(), 1);
        assert_eq!(body(&ex), "user 3");
        assert_eq!(ex.sink::<BufferedSink>().unwrap().heads_written(), 0);
    }

    #[test]
    fn test_cli_reroute_loop_is_bounded() {
        let mut kernel = Kernel::new(KernelConfig::default());
        kernel.redirect("GET /a", "/b", false).unwrap();
        kernel.redirect("GET /b", "/a", false).unwrap();
        let ex = kernel.mock("GET /a cli", &[], &[], None).unwrap();
        assert_eq!(ex.code(), 500);
        assert!(body(&ex).starts_with("Status : Internal Server Error\n"));
    }

    #[test]
    fn test_reroute_hook_cancels_redirect() {
        let mut kernel = kernel();
        kernel.redirect("GET /old", "/new", false).unwrap();
        kernel.on(Event::Reroute, |ex, args| {
            if let EventArgs::Reroute { url, .. } = args {
                ex.set_body(format!("to {}", url));
            }
            true
        });
        let ex = kernel.mock("GET /old", &[], &[], None).unwrap();
        assert_eq!(ex.code(), 200);
        assert_eq!(body(&ex), "to http://localhost/new");
    }

    #[test]
    fn test_missing_service_is_500() {
        struct Database;
        let mut kernel = Kernel::new(KernelConfig::default());
        kernel
            .route(
                "GET /db",
                Handler::new(Signature::new().service::<Database>("db"), |_, _| Ok(Reply::Empty)),
            )
            .unwrap();
        let ex = kernel.mock("GET /db cli", &[], &[], None).unwrap();
        assert_eq!(ex.code(), 500);
        assert!(body(&ex).contains("Unable to resolve service"));
    }

    #[test]
    fn test_panicking_handler_becomes_500() {
        let mut kernel = Kernel::new(KernelConfig::default());
        kernel
            .route("GET /boom all", Handler::from_fn(|_, _| panic!("disk on fire")))
            .unwrap();
        let hooked = Arc::new(AtomicUsize::new(0));
        let seen = hooked.clone();
        kernel.on(Event::Error, move |_, args| {
            if let EventArgs::Error { code: 500, .. } = args {
                seen.fetch_add(1, Ordering::SeqCst);
            }
            false
        });

        let ex = kernel.mock("GET /boom cli", &[], &[], None).unwrap();
        assert_eq!(ex.code(), 500);
        assert!(body(&ex).starts_with("Status : Internal Server Error\nText   : disk on fire\n"));

        let ex = kernel.mock("GET /boom ajax", &[], &[], None).unwrap();
        let json: serde_json::Value = serde_json::from_str(&body(&ex)).unwrap();
        assert_eq!(json["text"], "disk on fire");
        assert_eq!(hooked.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_alias_and_path_helpers() {
        let mut settings = KernelConfig::default();
        settings.base = "/app".into();
        let mut kernel = Kernel::new(settings);
        kernel
            .route("GET user /user/@id", Handler::from_fn(|_, _| Ok(Reply::Empty)))
            .unwrap();
        let params: Params = [("id", "5")].into_iter().collect();
        assert_eq!(kernel.alias("user", &params, &[]), "/user/5");
        assert_eq!(kernel.path("user", &params, &[]), "/app/user/5");
    }
}
