//! Stick Kernel: HTTP routing and dispatch core.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌────────────────────────────────────────────────────┐
//!                      │                    STICK KERNEL                    │
//!                      │                                                    │
//!   HTTP request  ─────┼─▶ http::server ──┐                                 │
//!   CLI argv      ─────┼─▶ RequestContext ├─▶ dispatch::Kernel              │
//!   mock()        ─────┼──────────────────┘      │                          │
//!                      │                         ▼                          │
//!                      │   routing (template → pattern → table → matcher)   │
//!                      │                         │                          │
//!                      │                         ▼                          │
//!                      │   resolver → binder (container: services, hive)    │
//!                      │                         │                          │
//!                      │           cache ◀──────▶│ handler → Reply          │
//!                      │                         ▼                          │
//!   response      ◀────┼──────────── Exchange::send → ResponseSink          │
//!                      │                                                    │
//!                      │   config · observability · lifecycle               │
//!                      └────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod config;
pub mod container;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod status;

pub use config::schema::StickConfig;
pub use dispatch::{Event, EventArgs, Exchange, Handler, Kernel, Reply, Signature};
pub use error::{BindError, DispatchError, HandlerError, RouteError};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
