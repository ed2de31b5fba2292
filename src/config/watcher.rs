//! Configuration file watcher for hot reload.
//!
//! Editors often emit several events for one save. The watcher fingerprints
//! the file content and only forwards a config when the content changed and
//! parses cleanly.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::cache::hash;
use crate::config::loader::parse_config;
use crate::config::schema::StickConfig;

/// Watches the configuration file and publishes reloaded configs.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<StickConfig>,
    fingerprint: Mutex<String>,
}

impl ConfigWatcher {
    /// Create a watcher for `path` and the receiving end of its updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<StickConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let fingerprint = fs::read_to_string(path).map(|s| hash(&s)).unwrap_or_default();

        (
            Self {
                path: path.to_path_buf(),
                update_tx,
                fingerprint: Mutex::new(fingerprint),
            },
            update_rx,
        )
    }

    /// Re-read the file and forward it if the content changed.
    ///
    /// Returns true when a new config was published.
    pub fn reload(&self) -> bool {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(path = ?self.path, error = %e, "Config file unreadable, keeping current configuration");
                return false;
            }
        };

        let fingerprint = hash(&content);
        {
            let Ok(mut current) = self.fingerprint.lock() else {
                return false;
            };
            if *current == fingerprint {
                tracing::debug!(path = ?self.path, "Config content unchanged");
                return false;
            }
            *current = fingerprint;
        }

        match parse_config(&content) {
            Ok(config) => {
                tracing::info!(
                    path = ?self.path,
                    routes = config.routes.len(),
                    redirects = config.redirects.len(),
                    "Config file changed, reloading"
                );
                self.update_tx.send(config).is_ok()
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to reload config, keeping current configuration");
                false
            }
        }
    }

    /// Start watching the file. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) => {
                    self.reload();
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?path, "Config watcher started");
        Ok(watcher)
    }
}
