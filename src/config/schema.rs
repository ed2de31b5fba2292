//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the kernel.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StickConfig {
    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// Dispatch kernel settings.
    pub kernel: KernelConfig,

    /// Response cache engine.
    pub cache: CacheConfig,

    pub timeouts: TimeoutConfig,

    pub observability: ObservabilityConfig,

    /// Routes answered with static content.
    pub routes: Vec<RouteConfig>,

    /// Routes answered with a redirect.
    pub redirects: Vec<RedirectConfig>,

    /// Free-form values reachable through `%key%` references.
    pub hive: toml::Table,
}

/// Where the HTTP front end listens and how much it buffers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Socket address, e.g. "127.0.0.1:8080". Also feeds the default cache seed.
    pub bind_address: String,

    /// Request bodies are read whole before dispatch; larger ones get a 413.
    pub max_body_size: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_size: 2 * 1024 * 1024,
        }
    }
}

/// Settings consulted by the kernel on every request.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct KernelConfig {
    /// Match route patterns case-insensitively.
    pub caseless: bool,

    /// Debug level; anything above 0 adds traces to error output.
    pub debug: u8,

    /// `X-Powered-By` header value.
    pub package: String,

    /// `X-Frame-Options` header value.
    pub xframe: String,

    /// Charset declared by HTML error pages.
    pub encoding: String,

    /// Honour `X-HTTP-Method-Override` and the `_method` form field.
    pub method_override: bool,

    /// Path prefix the application is mounted under.
    pub base: String,

    /// Cache key namespace. Empty derives one from the bind address and base.
    pub seed: String,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            caseless: false,
            debug: 0,
            package: "Stick-Kernel".to_string(),
            xframe: "SAMEORIGIN".to_string(),
            encoding: "UTF-8".to_string(),
            method_override: false,
            base: String::new(),
            seed: String::new(),
        }
    }
}

/// Response cache backend.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheEngine {
    #[default]
    Memory,
    Folder,
    None,
}

/// Response cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    pub engine: CacheEngine,

    /// Directory used by the folder engine.
    pub dir: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            engine: CacheEngine::Memory,
            dir: None,
        }
    }
}

/// Limits enforced around the kernel by the HTTP layer.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Whole-request budget in seconds, throttled sends included.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging and metrics.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default filter level; `RUST_LOG` overrides it.
    pub log_level: String,

    pub log_format: LogFormat,

    /// Install the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Scrape address of the exporter.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// A route answered with static content.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RouteConfig {
    /// Route template, e.g. `GET home /`.
    pub route: String,

    /// Text body. `@name` tokens take the matched path parameters.
    pub body: Option<String>,

    /// JSON body, sent with `Content-Type: application/json`.
    pub json: Option<serde_json::Value>,

    /// Response cache lifetime in seconds.
    pub ttl: u64,

    /// Output throttle in kilobytes per second.
    pub kbps: u32,

    /// Overrides the content type of a text body.
    pub content_type: Option<String>,
}

/// A route answered with a redirect.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RedirectConfig {
    /// Route template.
    pub route: String,

    /// Alias, `alias(k=v,...)` expression or path.
    pub target: String,

    /// 301 instead of 302.
    pub permanent: bool,
}
