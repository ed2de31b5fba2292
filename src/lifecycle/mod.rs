//! Process lifecycle: building the kernel, stopping the server.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Build kernel (cache, hive, routes) → Start listener
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain in-flight requests → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger → server drains
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then the kernel, then the listener
//! - Hot reload rebuilds the kernel through the same startup path

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
pub use startup::{build_kernel, build_kernel_with_clock, StartupError};
