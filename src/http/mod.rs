//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, body buffering)
//!     → request.rs (RequestContext: path, query, form, mode, request ID)
//!     → dispatch::Kernel (blocking pool)
//!     → server.rs ChannelSink (status, headers, streamed body)
//!     → Send to client
//! ```
//!
//! response.rs holds the helpers shared by the kernel: HTTP dates and the
//! mode-dependent error bodies.

pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestContext, X_REQUEST_ID};
pub use server::{ChannelSink, HttpServer};
