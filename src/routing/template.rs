//! Route template DSL: `VERBS [ALIAS] [PATH] [MODE]`.
//!
//! # Examples
//! ```text
//! GET /
//! GET|POST user_edit /user/@id sync
//! GET /user/@id/*
//! GET user_edit            (reuses the path registered for the alias)
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{RouteError, RouteResult};

static TEMPLATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^([\w+|]+)(?:[ \t]+(\w+))?(?:[ \t]+(/[^ \t]*))?(?:[ \t]+(all|ajax|cli|sync))?$")
        .expect("route template regex is valid")
});

/// Verbs a `ALL` verb token expands to.
pub const ALL_VERBS: [&str; 7] = ["GET", "HEAD", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"];

/// Request category a handler is registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    /// Fallback bucket used when the request's own mode has no bucket.
    #[default]
    All,
    Ajax,
    Cli,
    Sync,
}

impl FromStr for Mode {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(Mode::All),
            "ajax" => Ok(Mode::Ajax),
            "cli" => Ok(Mode::Cli),
            "sync" => Ok(Mode::Sync),
            other => Err(RouteError::MalformedRoute(other.to_string())),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Mode::All => "all",
            Mode::Ajax => "ajax",
            Mode::Cli => "cli",
            Mode::Sync => "sync",
        };
        f.write_str(s)
    }
}

/// A parsed route template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTemplate {
    /// Uppercased verbs, deduplicated, in declaration order.
    pub verbs: Vec<String>,
    pub alias: Option<String>,
    /// `None` when the template reuses the path of `alias`.
    pub path: Option<String>,
    pub mode: Mode,
}

impl RouteTemplate {
    pub fn parse(template: &str) -> RouteResult<Self> {
        let malformed = || RouteError::MalformedRoute(template.to_string());
        let caps = TEMPLATE.captures(template.trim()).ok_or_else(malformed)?;

        let alias = caps.get(2).map(|m| m.as_str().to_string());
        let path = caps.get(3).map(|m| m.as_str().to_string());
        if alias.is_none() && path.is_none() {
            return Err(malformed());
        }

        let mode = match caps.get(4) {
            Some(m) => m.as_str().parse()?,
            None => Mode::All,
        };

        let mut verbs: Vec<String> = Vec::new();
        for token in caps[1].split(['|', '+']).filter(|t| !t.is_empty()) {
            let token = token.to_ascii_uppercase();
            let expanded: Vec<String> = if token == "ALL" {
                ALL_VERBS.iter().map(|v| v.to_string()).collect()
            } else {
                vec![token]
            };
            for verb in expanded {
                if !verbs.contains(&verb) {
                    verbs.push(verb);
                }
            }
        }
        if verbs.is_empty() {
            return Err(malformed());
        }

        Ok(Self {
            verbs,
            alias,
            path,
            mode,
        })
    }
}

impl FromStr for RouteTemplate {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
