//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Kernel, cache, server produce:
//!     → logging.rs (structured log events, request_id span field)
//!     → metrics.rs (request and cache counters, latency histogram)
//!
//! Consumers:
//!     → stdout (text or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through the dispatch span
//! - Metrics are cheap and recorded unconditionally

pub mod logging;
pub mod metrics;
