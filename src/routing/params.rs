//! Ordered route parameters.
//!
//! Named placeholders come first in capture order, catch-all segments follow
//! as positional entries numbered from zero.

use std::fmt;

/// Key of an extracted parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamKey {
    /// Value captured by an `@name` placeholder (or passed by name).
    Named(String),
    /// Value captured by the catch-all segment (or passed positionally).
    Index(usize),
}

impl fmt::Display for ParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKey::Named(name) => f.write_str(name),
            ParamKey::Index(i) => write!(f, "{}", i),
        }
    }
}

/// Ordered key/value list of route parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: Vec<(ParamKey, String)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a named value, replacing an earlier value with the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .entries
            .iter_mut()
            .find(|(k, _)| matches!(k, ParamKey::Named(n) if *n == name))
        {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((ParamKey::Named(name), value)),
        }
    }

    /// Append a positional value.
    pub fn push(&mut self, value: impl Into<String>) {
        let index = self
            .entries
            .iter()
            .filter(|(k, _)| matches!(k, ParamKey::Index(_)))
            .count();
        self.entries.push((ParamKey::Index(index), value.into()));
    }

    /// Named value lookup.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.iter().find_map(|(k, v)| match k {
            ParamKey::Named(n) if n == name => Some(v.as_str()),
            _ => None,
        })
    }

    /// Positional value lookup.
    pub fn get_index(&self, index: usize) -> Option<&str> {
        self.entries.iter().find_map(|(k, v)| match k {
            ParamKey::Index(i) if *i == index => Some(v.as_str()),
            _ => None,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &(ParamKey, String)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for Params {
    type Item = (ParamKey, String);
    type IntoIter = std::vec::IntoIter<(ParamKey, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_and_positional() {
        let mut params = Params::new();
        params.insert("id", "5");
        params.push("a");
        params.push("b");

        assert_eq!(params.get("id"), Some("5"));
        assert_eq!(params.get_index(0), Some("a"));
        assert_eq!(params.get_index(1), Some("b"));
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn test_insert_replaces() {
        let mut params: Params = [("id", "1")].into_iter().collect();
        params.insert("id", "2");
        assert_eq!(params.get("id"), Some("2"));
        assert_eq!(params.len(), 1);
    }
}
