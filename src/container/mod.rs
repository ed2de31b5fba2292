//! Dependency container.
//!
//! - `services.rs`: type-keyed service registry used by argument binding
//! - `hive.rs`: typed settings plus the extension map behind `%key%` references

pub mod hive;
pub mod services;

pub use hive::Hive;
pub use services::ServiceRegistry;
