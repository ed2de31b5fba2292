//! Route storage and alias resolution.
//!
//! # Responsibilities
//! - Parse templates and store one entry per registration
//! - Bucket entries by path template, then mode, then verb
//! - Keep alias → path mappings and render paths from aliases
//!
//! # Design Decisions
//! - Distinct path templates keep their first registration order; later
//!   registrations of the same path only add or overwrite bucket slots
//! - Same path + mode + verb overwrites (last wins); same for aliases
//! - Built once at startup and shared immutably afterwards

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use url::form_urlencoded;

use crate::dispatch::handler::HandlerRef;
use crate::error::{RouteError, RouteResult};
use crate::routing::params::{ParamKey, Params};
use crate::routing::pattern::CompiledPattern;
use crate::routing::template::{Mode, RouteTemplate};

static ALIAS_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\w+)(?:\(([^(]+)\))?(\?.+)?$").expect("alias call regex is valid")
});

/// One registered route.
#[derive(Debug, Clone)]
pub struct RouteEntry {
    pub alias: Option<String>,
    pub handler: HandlerRef,
    /// Response cache lifetime in seconds; 0 disables caching.
    pub ttl: u64,
    /// Output throttle in kilobytes per second; 0 disables throttling.
    pub kbps: u32,
}

/// All buckets registered under one path template.
#[derive(Debug, Clone)]
pub struct PathRoutes {
    pattern: CompiledPattern,
    modes: HashMap<Mode, HashMap<String, usize>>,
}

impl PathRoutes {
    pub fn pattern(&self) -> &CompiledPattern {
        &self.pattern
    }

    /// Verb map for the mode, if the mode has a bucket.
    pub fn bucket(&self, mode: Mode) -> Option<&HashMap<String, usize>> {
        self.modes.get(&mode)
    }
}

/// Ordered route table.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    caseless: bool,
    paths: Vec<PathRoutes>,
    index: HashMap<String, usize>,
    entries: Vec<RouteEntry>,
    aliases: HashMap<String, String>,
}

impl RouteTable {
    /// Create an empty table. `caseless` applies to every compiled pattern.
    pub fn new(caseless: bool) -> Self {
        Self {
            caseless,
            ..Self::default()
        }
    }

    /// Register a handler under a route template.
    pub fn register(
        &mut self,
        template: &str,
        handler: impl Into<HandlerRef>,
        ttl: u64,
        kbps: u32,
    ) -> RouteResult<&RouteEntry> {
        let parsed = RouteTemplate::parse(template)?;

        let path = match parsed.path {
            Some(path) => path,
            None => {
                let alias = parsed.alias.clone().unwrap_or_default();
                self.aliases
                    .get(&alias)
                    .cloned()
                    .ok_or(RouteError::UnknownAlias(alias))?
            }
        };

        let slot = match self.index.get(&path) {
            Some(&slot) => slot,
            None => {
                let pattern = CompiledPattern::compile(&path, self.caseless)?;
                self.paths.push(PathRoutes {
                    pattern,
                    modes: HashMap::new(),
                });
                self.index.insert(path.clone(), self.paths.len() - 1);
                self.paths.len() - 1
            }
        };

        let id = self.entries.len();
        self.entries.push(RouteEntry {
            alias: parsed.alias.clone(),
            handler: handler.into(),
            ttl,
            kbps,
        });

        let bucket = self.paths[slot].modes.entry(parsed.mode).or_default();
        for verb in parsed.verbs {
            bucket.insert(verb, id);
        }

        if let Some(alias) = parsed.alias {
            self.aliases.insert(alias, path.clone());
        }

        tracing::debug!(template = %template, path = %path, entry = id, "Route registered");
        Ok(&self.entries[id])
    }

    /// Register `Controller->method` references for each
    /// `(template, method, ttl, kbps)` tuple.
    pub fn map(&mut self, controller: &str, routes: &[(&str, &str, u64, u32)]) -> RouteResult<()> {
        for &(template, method, ttl, kbps) in routes {
            self.register(template, format!("{}->{}", controller, method), ttl, kbps)?;
        }
        Ok(())
    }

    /// Register a route answering with a redirect to `target`.
    pub fn redirect(&mut self, template: &str, target: &str, permanent: bool) -> RouteResult<()> {
        self.register(
            template,
            HandlerRef::Redirect {
                target: target.to_string(),
                permanent,
            },
            0,
            0,
        )?;
        Ok(())
    }

    /// Path template registered for an alias.
    pub fn alias_path(&self, alias: &str) -> Option<&str> {
        self.aliases.get(alias).map(String::as_str)
    }

    /// Render a path from an alias.
    ///
    /// Placeholders take the named value with the same name, otherwise the
    /// next unused value in order. Unused values fill the catch-all joined by
    /// `/`. Unknown aliases render as `/alias`.
    pub fn resolve_alias(&self, alias: &str, params: &Params, query: &[(String, String)]) -> String {
        let query = render_query(query);
        let Some(path) = self.aliases.get(alias) else {
            return format!("/{}{}", alias.trim_start_matches('/'), query);
        };
        if params.is_empty() {
            return format!("{}{}", path, query);
        }

        let pattern = self.index.get(path).map(|&slot| &self.paths[slot].pattern);
        let placeholders: &[String] = pattern.map(|p| p.placeholders()).unwrap_or(&[]);

        let entries: Vec<&(ParamKey, String)> = params.iter().collect();
        let mut used = vec![false; entries.len()];
        let mut values: HashMap<&str, &str> = HashMap::new();

        for name in placeholders {
            let by_name = entries
                .iter()
                .position(|(k, _)| matches!(k, ParamKey::Named(n) if n == name));
            let pick = by_name.or_else(|| {
                (0..entries.len()).find(|&i| {
                    !used[i]
                        && match &entries[i].0 {
                            ParamKey::Index(_) => true,
                            ParamKey::Named(n) => !placeholders.contains(n),
                        }
                })
            });
            if let Some(i) = pick {
                used[i] = true;
                values.insert(name.as_str(), entries[i].1.as_str());
            }
        }

        let rest: Vec<&str> = entries
            .iter()
            .zip(&used)
            .filter(|(_, used)| !**used)
            .map(|((_, v), _)| v.as_str())
            .collect();

        let mut rendered = substitute_placeholders(path, |name| values.get(name).map(|v| v.to_string()));
        if pattern.is_some_and(|p| p.has_catch_all()) {
            rendered.pop();
            rendered.push_str(&rest.join("/"));
        }

        format!("{}{}", rendered, query)
    }

    /// Resolve a target expression: a registered alias, `alias(k=v,...)`
    /// with an optional `?query`, or a literal path. A bare word that is not
    /// a registered alias renders as `/word`.
    pub fn resolve_target(&self, target: &str) -> String {
        if let Some(path) = self.aliases.get(target) {
            return path.clone();
        }
        if let Some(caps) = ALIAS_CALL.captures(target) {
            let params: Params = caps
                .get(2)
                .map(|m| parse_pairs(&m.as_str().replace(',', "&")))
                .unwrap_or_default()
                .into_iter()
                .collect();
            let query = caps
                .get(3)
                .map(|m| parse_pairs(m.as_str().trim_start_matches('?')))
                .unwrap_or_default();
            return self.resolve_alias(&caps[1], &params, &query);
        }
        target.to_string()
    }

    pub fn entry(&self, id: usize) -> Option<&RouteEntry> {
        self.entries.get(id)
    }

    /// Path templates in registration order.
    pub fn paths(&self) -> impl Iterator<Item = &PathRoutes> {
        self.paths.iter()
    }

    pub fn caseless(&self) -> bool {
        self.caseless
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Replace `@name` tokens using `lookup`; tokens without a value stay as-is.
pub fn substitute_placeholders(text: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    static TOKEN: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"@(\w+)").expect("placeholder regex is valid"));

    TOKEN
        .replace_all(text, |caps: &regex::Captures<'_>| {
            lookup(&caps[1]).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Parse a `k=v&k2=v2` string.
pub fn parse_pairs(input: &str) -> Vec<(String, String)> {
    form_urlencoded::parse(input.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

/// Render `?k=v&...`, or an empty string for no pairs.
pub fn render_query(query: &[(String, String)]) -> String {
    if query.is_empty() {
        return String::new();
    }
    let encoded = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(query.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .finish();
    format!("?{}", encoded)
}
