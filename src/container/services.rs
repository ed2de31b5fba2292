//! Service registry.
//!
//! # Responsibilities
//! - Map type identifiers and aliases to factories
//! - Build services on demand and share them afterwards
//!
//! # Design Decisions
//! - Rules are registered at startup through `&mut self`; resolution works
//!   through `&self` so a shared kernel can build services lazily
//! - Shared instances live in a `DashMap`; racing builders are harmless
//!   because the last write wins and every build is equivalent

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use crate::dispatch::handler::Service;
use crate::error::BindError;

type Factory = dyn Fn(&ServiceRegistry) -> Result<Service, BindError> + Send + Sync;

struct Rule {
    factory: Arc<Factory>,
    shared: bool,
}

/// Registry of services keyed by type name, with optional string aliases.
#[derive(Default)]
pub struct ServiceRegistry {
    rules: HashMap<String, Rule>,
    aliases: HashMap<String, String>,
    shared: Arc<DashMap<String, Service>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a shared service built by `factory` on first use.
    pub fn register<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Any + Send + Sync,
        F: Fn(&ServiceRegistry) -> Result<T, BindError> + Send + Sync + 'static,
    {
        self.insert_rule::<T, F>(factory, true)
    }

    /// Register a service built anew on every resolution.
    pub fn register_transient<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Any + Send + Sync,
        F: Fn(&ServiceRegistry) -> Result<T, BindError> + Send + Sync + 'static,
    {
        self.insert_rule::<T, F>(factory, false)
    }

    /// Register an already built shared instance.
    pub fn instance<T: Any + Send + Sync>(&mut self, value: T) -> &mut Self {
        let service = Service::new(Arc::new(value));
        let id = type_name::<T>().to_string();
        self.shared.insert(id.clone(), service.clone());
        self.rules.insert(
            id.clone(),
            Rule {
                factory: Arc::new(move |_: &ServiceRegistry| -> Result<Service, BindError> {
                    Ok(service.clone())
                }),
                shared: true,
            },
        );
        self.add_short_alias(&id);
        self
    }

    /// Make `T` reachable under `id`.
    pub fn alias<T: Any>(&mut self, id: impl Into<String>) -> &mut Self {
        self.aliases.insert(id.into(), type_name::<T>().to_string());
        self
    }

    /// Whether `id` names a registered service or alias.
    pub fn contains(&self, id: &str) -> bool {
        self.rules.contains_key(self.canonical(id))
    }

    /// Resolve a service by type name or alias.
    pub fn get(&self, id: &str) -> Result<Service, BindError> {
        let key = self.canonical(id);

        if let Some(service) = self.shared.get(key) {
            return Ok(service.value().clone());
        }

        let rule = self
            .rules
            .get(key)
            .ok_or_else(|| BindError::ServiceResolution(id.to_string()))?;
        let service = (rule.factory)(self)?;

        if rule.shared {
            self.shared.insert(key.to_string(), service.clone());
        }
        tracing::debug!(service = %key, shared = rule.shared, "Service built");
        Ok(service)
    }

    /// Resolve a service of type `T`.
    pub fn resolve<T: Any + Send + Sync>(&self) -> Result<Arc<T>, BindError> {
        let name = type_name::<T>();
        self.get(name)?
            .downcast::<T>()
            .ok_or_else(|| BindError::ServiceResolution(name.to_string()))
    }

    fn insert_rule<T, F>(&mut self, factory: F, shared: bool) -> &mut Self
    where
        T: Any + Send + Sync,
        F: Fn(&ServiceRegistry) -> Result<T, BindError> + Send + Sync + 'static,
    {
        let id = type_name::<T>().to_string();
        self.shared.remove(&id);
        self.rules.insert(
            id.clone(),
            Rule {
                factory: Arc::new(move |registry: &ServiceRegistry| -> Result<Service, BindError> {
                    factory(registry).map(|v| Service::new(Arc::new(v)))
                }),
                shared,
            },
        );
        self.add_short_alias(&id);
        self
    }

    /// `app::db::Database` is also reachable as `Database`.
    fn add_short_alias(&mut self, id: &str) {
        if id.contains('<') {
            return;
        }
        if let Some(short) = id.rsplit("::").next() {
            if short != id {
                self.aliases
                    .entry(short.to_string())
                    .or_insert_with(|| id.to_string());
            }
        }
    }

    fn canonical<'a>(&'a self, id: &'a str) -> &'a str {
        if self.rules.contains_key(id) {
            return id;
        }
        self.aliases.get(id).map(String::as_str).unwrap_or(id)
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("rules", &self.rules.keys().collect::<Vec<_>>())
            .field("aliases", &self.aliases)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Database {
        dsn: String,
    }

    struct Repository {
        db: Arc<Database>,
    }

    #[test]
    fn test_shared_service_built_once() {
        let builds = Arc::new(AtomicUsize::new(0));
        let counter = builds.clone();

        let mut registry = ServiceRegistry::new();
        registry.register(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Database { dsn: "mem".into() })
        });

        let a = registry.resolve::<Database>().unwrap();
        let b = registry.resolve::<Database>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert_eq!(a.dsn, "mem");
    }

    #[test]
    fn test_transient_service() {
        let mut registry = ServiceRegistry::new();
        registry.register_transient(|_| Ok(Database { dsn: "x".into() }));
        let a = registry.resolve::<Database>().unwrap();
        let b = registry.resolve::<Database>().unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_dependencies_and_aliases() {
        let mut registry = ServiceRegistry::new();
        registry.instance(Database { dsn: "pg".into() });
        registry.register(|r| {
            Ok(Repository {
                db: r.resolve::<Database>()?,
            })
        });
        registry.alias::<Repository>("repo");

        assert!(registry.contains("repo"));
        assert!(registry.contains("Database"));
        let repo = registry.get("repo").unwrap().downcast::<Repository>().unwrap();
        assert_eq!(repo.db.dsn, "pg");
    }

    #[test]
    fn test_unknown_service() {
        let registry = ServiceRegistry::new();
        assert!(!registry.contains("Mailer"));
        assert_eq!(
            registry.get("Mailer").unwrap_err(),
            BindError::ServiceResolution("Mailer".into())
        );
    }
}
