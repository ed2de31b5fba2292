//! Dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! RequestContext + ResponseSink
//!     → kernel.rs (state machine, error pipeline)
//!     → resolver.rs (mode bucket, verb, handler reference)
//!     → binder.rs (signature → positional arguments)
//!     → handler.rs (invocation, Reply)
//!     → exchange.rs (expire, send, throttle)
//!     → sink.rs (HTTP stream | stdout | buffer)
//! ```
//!
//! Hooks registered in events.rs run at fixed points of the kernel loop.

pub mod binder;
pub mod events;
pub mod exchange;
pub mod handler;
pub mod kernel;
pub mod resolver;
pub mod sink;

pub use binder::ArgumentBinder;
pub use events::{Event, EventArgs, EventHub};
pub use exchange::{Exchange, RouteInfo};
pub use handler::{Arg, Args, Handler, HandlerRef, ParamKind, ParamSpec, Reply, Service, Signature};
pub use kernel::Kernel;
pub use resolver::{ControllerResolver, Controllers, Resolution, ResolvedHandler};
pub use sink::{BufferedSink, ResponseSink, WriterSink};
