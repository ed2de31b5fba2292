//! Filesystem cache store: one JSON file per key.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cache::{CacheError, CacheRecord, CacheStore};

#[derive(Serialize, Deserialize)]
struct StoredEntry {
    key: String,
    record: CacheRecord,
}

/// Stores each record in its own file under a directory.
#[derive(Debug, Clone)]
pub struct FolderStore {
    dir: PathBuf,
}

impl FolderStore {
    /// Create the store, creating `dir` if needed.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, CacheError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
            .collect();
        self.dir.join(name)
    }

    fn read(path: &Path) -> Result<Option<StoredEntry>, CacheError> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl CacheStore for FolderStore {
    fn get(&self, key: &str) -> Result<Option<CacheRecord>, CacheError> {
        Ok(Self::read(&self.file(key))?
            .filter(|entry| entry.key == key)
            .map(|entry| entry.record))
    }

    fn put(&self, key: &str, record: CacheRecord) -> Result<(), CacheError> {
        let entry = StoredEntry {
            key: key.to_string(),
            record,
        };
        // Each writer gets its own temp file; the rename makes the last one win.
        let mut tmp = tempfile::Builder::new()
            .prefix(".")
            .suffix(".tmp")
            .tempfile_in(&self.dir)?;
        tmp.write_all(&serde_json::to_vec(&entry)?)?;
        tmp.persist(self.file(key)).map_err(|e| e.error)?;
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<bool, CacheError> {
        match fs::remove_file(self.file(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self) -> Result<Vec<String>, CacheError> {
        let mut keys = Vec::new();
        for dirent in fs::read_dir(&self.dir)? {
            let path = dirent?.path();
            if !path.is_file() || path.extension().is_some_and(|e| e == "tmp") {
                continue;
            }
            match Self::read(&path) {
                Ok(Some(entry)) => keys.push(entry.key),
                Ok(None) => {}
                Err(e) => tracing::debug!(path = ?path, error = %e, "Skipping unreadable cache file"),
            }
        }
        Ok(keys)
    }
}
