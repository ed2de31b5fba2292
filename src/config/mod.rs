//! Kernel and server configuration.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → StickConfig (validated, immutable)
//!     → lifecycle::startup builds a Kernel from it
//!
//! On file change:
//!     watcher.rs sees new content (fingerprint differs)
//!     → loader.rs parses it
//!     → validation.rs validates
//!     → server rebuilds the Kernel and swaps it atomically
//! ```
//!
//! # Design Decisions
//! - A loaded config is never patched; a change builds a new kernel
//! - Every field is defaulted, an empty file serves nothing but 404s
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    CacheConfig, CacheEngine, KernelConfig, ListenerConfig, LogFormat, ObservabilityConfig,
    RedirectConfig, RouteConfig, StickConfig, TimeoutConfig,
};
