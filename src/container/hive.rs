//! Typed kernel settings plus a string-keyed extension map.
//!
//! System values are explicit fields of [`KernelConfig`] and are reachable
//! by their uppercase names (`PACKAGE`, `DEBUG`, ...). Everything else lives
//! in the extension map and is addressed with dot paths (`site.name`).

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::config::schema::KernelConfig;

/// Configuration values available to the kernel and to `%key%` references.
#[derive(Debug, Clone, Default)]
pub struct Hive {
    settings: Arc<KernelConfig>,
    extras: Map<String, Value>,
}

impl Hive {
    pub fn new(settings: KernelConfig) -> Self {
        Self {
            settings: Arc::new(settings),
            extras: Map::new(),
        }
    }

    /// Build from settings and an extension table (e.g. the `[hive]` section).
    pub fn with_extras(settings: KernelConfig, extras: Map<String, Value>) -> Self {
        Self {
            settings: Arc::new(settings),
            extras,
        }
    }

    pub fn settings(&self) -> &Arc<KernelConfig> {
        &self.settings
    }

    /// Render a value as text. Uppercase system names read the settings;
    /// anything else is a dot path into the extension map.
    pub fn get(&self, key: &str) -> Option<String> {
        if let Some(value) = self.system(key) {
            return Some(value);
        }
        self.lookup(key).and_then(render)
    }

    /// Raw extension value at a dot path.
    pub fn lookup(&self, key: &str) -> Option<&Value> {
        let mut parts = key.split('.');
        let mut current = self.extras.get(parts.next()?)?;
        for part in parts {
            current = match current {
                Value::Object(map) => map.get(part)?,
                Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Set an extension value, creating intermediate tables as needed.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        let mut parts: Vec<&str> = key.split('.').collect();
        let Some(last) = parts.pop() else {
            return;
        };

        let mut current = &mut self.extras;
        for part in parts {
            let slot = current
                .entry(part.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            current = match slot {
                Value::Object(map) => map,
                _ => return,
            };
        }
        current.insert(last.to_string(), value.into());
    }

    fn system(&self, key: &str) -> Option<String> {
        let s = &self.settings;
        let value = match key {
            "CASELESS" => s.caseless.to_string(),
            "DEBUG" => s.debug.to_string(),
            "PACKAGE" => s.package.clone(),
            "XFRAME" => s.xframe.clone(),
            "ENCODING" => s.encoding.clone(),
            "BASE" => s.base.clone(),
            "SEED" => s.seed.clone(),
            _ => return None,
        };
        Some(value)
    }
}

fn render(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
