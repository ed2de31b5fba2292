//! Startup orchestration.
//!
//! # Responsibilities
//! - Turn a validated [`StickConfig`] into a ready [`Kernel`]
//! - Pick the cache engine and derive the cache seed
//! - Register config-defined routes and redirects
//!
//! # Design Decisions
//! - Fail fast: any route or cache error is fatal at startup
//! - The same function serves hot reload; a failed rebuild keeps the old kernel

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::cache::{
    hash, CacheError, CacheStore, Clock, FolderStore, MemoryStore, NullStore, ResponseCache, SystemClock,
};
use crate::config::schema::{CacheEngine, RouteConfig, StickConfig};
use crate::container::Hive;
use crate::dispatch::{Handler, Kernel, Reply};
use crate::error::RouteError;
use crate::routing::table::substitute_placeholders;

/// Errors raised while building a kernel.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Route(#[from] RouteError),

    #[error("Cache setup failed: {0}")]
    Cache(#[from] CacheError),

    #[error("Invalid [hive] table: {0}")]
    Hive(String),
}

/// Build a kernel on the system clock.
pub fn build_kernel(config: &StickConfig) -> Result<Kernel, StartupError> {
    build_kernel_with_clock(config, Arc::new(SystemClock))
}

/// Build a kernel whose cache reads time from `clock`.
pub fn build_kernel_with_clock(config: &StickConfig, clock: Arc<dyn Clock>) -> Result<Kernel, StartupError> {
    let mut settings = config.kernel.clone();
    if settings.seed.is_empty() {
        settings.seed = hash(&format!("{}{}", config.listener.bind_address, settings.base));
    }

    let store: Arc<dyn CacheStore> = match config.cache.engine {
        CacheEngine::Memory => Arc::new(MemoryStore::new()),
        CacheEngine::Folder => {
            let dir = config.cache.dir.as_deref().unwrap_or("tmp/cache");
            Arc::new(FolderStore::new(dir)?)
        }
        CacheEngine::None => Arc::new(NullStore),
    };
    let cache = ResponseCache::new(store, settings.seed.clone(), clock);

    let extras = match serde_json::to_value(&config.hive).map_err(|e| StartupError::Hive(e.to_string()))? {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };

    let mut kernel = Kernel::with_hive(Hive::with_extras(settings, extras), cache);

    for route in &config.routes {
        kernel.route_with(&route.route, static_handler(route), route.ttl, route.kbps)?;
    }
    for redirect in &config.redirects {
        kernel.redirect(&redirect.route, &redirect.target, redirect.permanent)?;
    }

    tracing::info!(
        routes = config.routes.len(),
        redirects = config.redirects.len(),
        cache = ?config.cache.engine,
        seed = %kernel.settings().seed,
        "Kernel built"
    );
    Ok(kernel)
}

/// Handler answering with the static content of a config route.
fn static_handler(route: &RouteConfig) -> Handler {
    let body = route.body.clone().unwrap_or_default();
    let json = route.json.clone();
    let content_type = route.content_type.clone();

    Handler::from_fn(move |ex, _| {
        if let Some(json) = &json {
            return Ok(Reply::Json(json.clone()));
        }
        if let Some(content_type) = &content_type {
            ex.header("Content-Type", content_type);
        }
        let text = match ex.route() {
            Some(route) => substitute_placeholders(&body, |name| {
                route
                    .params
                    .get(name)
                    .or_else(|| route.params.get_index(name.parse().ok()?))
                    .map(str::to_string)
            }),
            None => body.clone(),
        };
        Ok(Reply::Text(text))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::config::parse_config;
    use crate::dispatch::BufferedSink;

    const CONFIG: &str = r#"
        [kernel]
        package = "Test"

        [[routes]]
        route = "GET hello /hello/@name"
        body = "Hello @name"
        content_type = "text/plain"

        [[routes]]
        route = "GET /status"
        json = { ok = true }

        [[redirects]]
        route = "GET /hi"
        target = "hello(name=you)"

        [hive]
        site = { name = "Stick" }
    "#;

    fn body(ex: &crate::dispatch::Exchange) -> String {
        ex.sink::<BufferedSink>().unwrap().body_text()
    }

    #[test]
    fn test_build_from_config() {
        let config = parse_config(CONFIG).unwrap();
        let kernel = build_kernel_with_clock(&config, Arc::new(ManualClock::new(0))).unwrap();

        assert_eq!(kernel.routes().len(), 3);
        assert_eq!(kernel.hive().get("site.name").as_deref(), Some("Stick"));
        assert_eq!(kernel.settings().seed, hash("0.0.0.0:8080"));

        let ex = kernel.mock("GET /hello/bob", &[], &[], None).unwrap();
        assert_eq!(body(&ex), "Hello bob");
        assert_eq!(ex.header_value("content-type"), Some("text/plain"));
        assert_eq!(ex.header_value("x-powered-by"), Some("Test"));

        let ex = kernel.mock("GET /status", &[], &[], None).unwrap();
        assert_eq!(body(&ex), r#"{"ok":true}"#);

        let ex = kernel.mock("GET /hi", &[], &[], None).unwrap();
        assert_eq!(ex.code(), 302);
        assert_eq!(ex.header_value("location"), Some("http://localhost/hello/you"));
    }

    #[test]
    fn test_bad_route_fails() {
        let mut config = StickConfig::default();
        config.routes.push(RouteConfig {
            route: "GET".into(),
            ..RouteConfig::default()
        });
        assert!(matches!(build_kernel(&config), Err(StartupError::Route(_))));
    }

    #[test]
    fn test_folder_engine() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = parse_config(CONFIG).unwrap();
        config.cache.engine = CacheEngine::Folder;
        config.cache.dir = Some(dir.path().join("pages").display().to_string());

        let kernel = build_kernel(&config).unwrap();
        kernel.cache().put("k.url", Vec::new(), "v".into(), 0);
        assert_eq!(kernel.cache().get("k.url").unwrap().body, "v");
    }
}
