//! In-process cache store.

use std::sync::Arc;

use dashmap::DashMap;

use crate::cache::{CacheError, CacheRecord, CacheStore};

/// A thread-safe in-memory store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<DashMap<String, CacheRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<CacheRecord>, CacheError> {
        Ok(self.inner.get(key).map(|r| r.value().clone()))
    }

    fn put(&self, key: &str, record: CacheRecord) -> Result<(), CacheError> {
        self.inner.insert(key.to_string(), record);
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.inner.remove(key).is_some())
    }

    fn keys(&self) -> Result<Vec<String>, CacheError> {
        Ok(self.inner.iter().map(|r| r.key().clone()).collect())
    }
}
