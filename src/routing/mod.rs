//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Registration (at startup):
//!     "VERBS [ALIAS] [PATH] [MODE]"
//!     → template.rs (parse DSL)
//!     → pattern.rs (compile PATH to anchored regex)
//!     → table.rs (bucket by path → mode → verb, record alias)
//!
//! Incoming Request (path):
//!     → matcher.rs (first structural match in registration order)
//!     → Return: MatchResult (template, buckets, params) or no match
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Deterministic: same input always matches same route
//! - First match wins (registration order)

pub mod matcher;
pub mod params;
pub mod pattern;
pub mod table;
pub mod template;

pub use matcher::{MatchResult, RouteMatcher};
pub use params::{ParamKey, Params};
pub use pattern::CompiledPattern;
pub use table::{RouteEntry, RouteTable};
pub use template::{Mode, RouteTemplate};
