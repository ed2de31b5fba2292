//! Response cache.
//!
//! # Data Flow
//! ```text
//! Kernel (GET/HEAD on a route with ttl > 0)
//!     → key.rs (hash(VERB + " " + URI) + ".url")
//!     → ResponseCache (seed namespace, freshness check)
//!     → CacheStore (memory | folder | none)
//! ```
//!
//! # Design Decisions
//! - Stores are concurrency-safe on their own; writers race with last-write-wins
//! - Store failures are logged and treated as misses, never as request errors
//! - Time comes from an injectable `Clock`

pub mod clock;
pub mod folder;
pub mod key;
pub mod memory;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use clock::{Clock, ManualClock, SystemClock};
pub use folder::FolderStore;
pub use key::{hash, page_key, PAGE_SUFFIX};
pub use memory::MemoryStore;

/// Errors raised by cache stores.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// A cached response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub headers: Vec<(String, String)>,
    pub body: String,
    /// Unix seconds at store time.
    pub created_at: i64,
    /// Lifetime in seconds; 0 never expires by time.
    pub ttl: u64,
}

impl CacheRecord {
    /// Valid while `created_at + ttl > now`, or forever when `ttl` is 0.
    pub fn is_valid(&self, now: i64) -> bool {
        self.ttl == 0 || self.created_at.saturating_add(self.ttl as i64) > now
    }
}

/// Backing storage for cache records.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<CacheRecord>, CacheError>;
    fn put(&self, key: &str, record: CacheRecord) -> Result<(), CacheError>;
    /// Returns whether a record was removed.
    fn clear(&self, key: &str) -> Result<bool, CacheError>;
    fn keys(&self) -> Result<Vec<String>, CacheError>;
}

/// Store that keeps nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStore;

impl CacheStore for NullStore {
    fn get(&self, _key: &str) -> Result<Option<CacheRecord>, CacheError> {
        Ok(None)
    }

    fn put(&self, _key: &str, _record: CacheRecord) -> Result<(), CacheError> {
        Ok(())
    }

    fn clear(&self, _key: &str) -> Result<bool, CacheError> {
        Ok(false)
    }

    fn keys(&self) -> Result<Vec<String>, CacheError> {
        Ok(Vec::new())
    }
}

/// Seed-namespaced cache with TTL semantics.
#[derive(Clone)]
pub struct ResponseCache {
    store: Arc<dyn CacheStore>,
    seed: String,
    clock: Arc<dyn Clock>,
}

impl ResponseCache {
    pub fn new(store: Arc<dyn CacheStore>, seed: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            seed: seed.into(),
            clock,
        }
    }

    /// In-memory cache on the system clock.
    pub fn in_memory(seed: impl Into<String>) -> Self {
        Self::new(Arc::new(MemoryStore::new()), seed, Arc::new(SystemClock))
    }

    /// Cache that never stores anything.
    pub fn disabled() -> Self {
        Self::new(Arc::new(NullStore), "", Arc::new(SystemClock))
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn seed(&self) -> &str {
        &self.seed
    }

    /// Fresh record for `key`. Expired records are removed.
    pub fn get(&self, key: &str) -> Option<CacheRecord> {
        let ndx = self.namespaced(key);
        let record = match self.store.get(&ndx) {
            Ok(record) => record?,
            Err(e) => {
                tracing::warn!(key = %ndx, error = %e, "Cache read failed");
                return None;
            }
        };

        if record.is_valid(self.clock.now()) {
            return Some(record);
        }

        if let Err(e) = self.store.clear(&ndx) {
            tracing::warn!(key = %ndx, error = %e, "Cache clear failed");
        }
        None
    }

    /// Store a response under `key`, stamped with the current time.
    pub fn put(&self, key: &str, headers: Vec<(String, String)>, body: String, ttl: u64) {
        let ndx = self.namespaced(key);
        let record = CacheRecord {
            headers,
            body,
            created_at: self.clock.now(),
            ttl,
        };
        if let Err(e) = self.store.put(&ndx, record) {
            tracing::warn!(key = %ndx, error = %e, "Cache write failed");
        }
    }

    pub fn clear(&self, key: &str) -> bool {
        let ndx = self.namespaced(key);
        self.store.clear(&ndx).unwrap_or_else(|e| {
            tracing::warn!(key = %ndx, error = %e, "Cache clear failed");
            false
        })
    }

    /// Remove every key of this namespace ending with `suffix`.
    pub fn reset(&self, suffix: &str) -> usize {
        let prefix = format!("{}.", self.seed);
        let keys = match self.store.keys() {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!(error = %e, "Cache listing failed");
                return 0;
            }
        };

        let removed = keys
            .iter()
            .filter(|k| k.starts_with(&prefix) && k.ends_with(suffix))
            .filter(|k| matches!(self.store.clear(k), Ok(true)))
            .count();
        tracing::debug!(suffix = %suffix, removed, "Cache reset");
        removed
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}.{}", self.seed, key)
    }
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("seed", &self.seed)
            .field("clock", &self.clock)
            .finish()
    }
}
