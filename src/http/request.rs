//! Request context.
//!
//! # Responsibilities
//! - Carry everything the kernel reads from a request (verb, path, query,
//!   form values, headers, mode, request ID)
//! - Build it from an HTTP request, from a mock expression or from CLI argv
//! - Apply method override when enabled
//!
//! # Design Decisions
//! - Request ID assigned as early as possible for tracing
//! - `path` is decoded and stripped of the base prefix; `uri` keeps the raw
//!   form and is what cache keys are derived from

use axum::body::Bytes;
use axum::http::header::{CONTENT_TYPE, HOST};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use url::form_urlencoded;
use uuid::Uuid;

use crate::routing::table::{parse_pairs, render_query};
use crate::routing::template::Mode;

/// Request ID header name.
pub const X_REQUEST_ID: &str = "x-request-id";

const X_REQUESTED_WITH: &str = "x-requested-with";
const X_HTTP_METHOD_OVERRIDE: &str = "x-http-method-override";

/// What the kernel knows about the current request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    /// Uppercased HTTP method.
    pub verb: String,
    /// Decoded path relative to the base.
    pub path: String,
    /// Base + path + query, as requested.
    pub uri: String,
    pub query: Vec<(String, String)>,
    /// Parsed `application/x-www-form-urlencoded` body.
    pub form: Vec<(String, String)>,
    pub body: Bytes,
    pub headers: HeaderMap,
    /// `Ajax`, `Cli` or `Sync`; never `All`.
    pub mode: Mode,
    /// Scheme and authority, e.g. `http://example.com`.
    pub base_url: String,
    pub fragment: Option<String>,
}

impl RequestContext {
    /// Request for `verb` on `target` (`path[?query][#fragment]`).
    pub fn new(verb: &str, target: &str) -> Self {
        let (path, query, fragment) = split_target(target);
        let query = parse_pairs(query);
        Self {
            request_id: Uuid::new_v4().to_string(),
            verb: verb.to_ascii_uppercase(),
            uri: format!("{}{}", path, render_query(&query)),
            path: decode_path(path),
            query,
            form: Vec::new(),
            body: Bytes::new(),
            headers: HeaderMap::new(),
            mode: Mode::Sync,
            base_url: "http://localhost".to_string(),
            fragment: fragment.map(str::to_string),
        }
    }

    /// Build from an HTTP request. `base` is the mount prefix removed from the path.
    pub fn from_http(parts: &Parts, body: Bytes, base: &str) -> Self {
        let raw_path = parts.uri.path();
        let path = raw_path.strip_prefix(base).filter(|p| p.is_empty() || p.starts_with('/')).unwrap_or(raw_path);
        let query = parts.uri.query().map(parse_pairs).unwrap_or_default();

        let is_form = parts
            .headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));
        let form = if is_form {
            form_urlencoded::parse(&body)
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect()
        } else {
            Vec::new()
        };

        let ajax = parts
            .headers
            .get(X_REQUESTED_WITH)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == "XMLHttpRequest");

        let request_id = parts
            .headers
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let host = parts
            .headers
            .get(HOST)
            .and_then(|v| v.to_str().ok())
            .or_else(|| parts.uri.authority().map(|a| a.as_str()))
            .unwrap_or("localhost");
        let scheme = parts.uri.scheme_str().unwrap_or("http");

        Self {
            request_id,
            verb: parts.method.as_str().to_ascii_uppercase(),
            path: decode_path(path),
            uri: parts
                .uri
                .path_and_query()
                .map(|pq| pq.as_str().to_string())
                .unwrap_or_else(|| raw_path.to_string()),
            query,
            form,
            body,
            headers: parts.headers.clone(),
            mode: if ajax { Mode::Ajax } else { Mode::Sync },
            base_url: format!("{}://{}", scheme, host),
            fragment: None,
        }
    }

    /// Emulated request from command-line arguments, dispatched in `cli` mode.
    ///
    /// Positional arguments become path segments, `--name=value` and `--flag`
    /// become query values, `-abc` sets `a`, `b` and `c`. A first argument
    /// starting with `/` is taken as the path (and query) verbatim.
    pub fn from_cli_args<S: AsRef<str>>(args: &[S]) -> Self {
        let mut segments: Vec<String> = Vec::new();
        let mut options: Vec<(String, String)> = Vec::new();
        let mut args = args.iter().map(AsRef::as_ref).peekable();

        let mut target = String::new();
        if let Some(first) = args.peek().filter(|a| a.starts_with('/')) {
            target = first.to_string();
            args.next();
        }

        for arg in args {
            if let Some(long) = arg.strip_prefix("--") {
                let (name, value) = long.split_once('=').unwrap_or((long, ""));
                if !name.is_empty() {
                    options.push((name.to_string(), value.to_string()));
                }
            } else if let Some(short) = arg.strip_prefix('-').filter(|s| !s.is_empty()) {
                options.extend(short.chars().map(|c| (c.to_string(), String::new())));
            } else {
                segments.push(arg.to_string());
            }
        }

        let (path, query, fragment) = split_target(&target);
        let mut path = path.trim_end_matches('/').to_string();
        for segment in &segments {
            path.push('/');
            path.push_str(segment);
        }
        if path.is_empty() {
            path.push('/');
        }

        let mut query = parse_pairs(query);
        query.extend(options);

        let mut request = Self::new("GET", &format!("{}{}", path, render_query(&query)));
        request.fragment = fragment.map(str::to_string);
        request.mode = Mode::Cli;
        request
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = if mode == Mode::All { Mode::Sync } else { mode };
        self
    }

    /// Add a header; invalid names or values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (HeaderName::try_from(name), HeaderValue::from_str(value)) {
            self.headers.append(name, value);
        }
        self
    }

    /// Set the raw body and parse it as form values.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self.form = form_urlencoded::parse(&self.body)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        self
    }

    /// Rewrite the verb from `X-HTTP-Method-Override` or a POSTed `_method` field.
    pub fn override_method(&mut self) {
        if let Some(verb) = self.header(X_HTTP_METHOD_OVERRIDE) {
            self.verb = verb.trim().to_ascii_uppercase();
        }
        if self.verb == "POST" {
            if let Some(verb) = self.form_value("_method") {
                self.verb = verb.trim().to_ascii_uppercase();
            }
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn query_value(&self, name: &str) -> Option<&str> {
        lookup(&self.query, name)
    }

    pub fn form_value(&self, name: &str) -> Option<&str> {
        lookup(&self.form, name)
    }

    /// Query value, falling back to the form value.
    pub fn input(&self, name: &str) -> Option<&str> {
        self.query_value(name).or_else(|| self.form_value(name))
    }

    pub fn is_ajax(&self) -> bool {
        self.mode == Mode::Ajax
    }

    pub fn is_cli(&self) -> bool {
        self.mode == Mode::Cli
    }
}

fn lookup<'a>(pairs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    pairs.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
}

/// Split `path?query#fragment`.
pub fn split_target(target: &str) -> (&str, &str, Option<&str>) {
    let (rest, fragment) = match target.split_once('#') {
        Some((rest, fragment)) => (rest, Some(fragment)),
        None => (target, None),
    };
    let (path, query) = rest.split_once('?').unwrap_or((rest, ""));
    (path, query, fragment)
}

fn decode_path(path: &str) -> String {
    let path = if path.is_empty() { "/" } else { path };
    urlencoding::decode(path)
        .map(|p| p.into_owned())
        .unwrap_or_else(|_| path.to_string())
}
