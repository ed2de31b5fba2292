//! Route path compilation.
//!
//! # Responsibilities
//! - Turn `@name` placeholders into named groups matching one segment
//! - Turn a trailing `*` into the catch-all group
//! - Escape every other character literally and anchor the whole path
//!
//! # Design Decisions
//! - Placeholder names follow `[A-Za-z_][A-Za-z0-9_]*`; an `@` not followed by
//!   a name character stays literal
//! - `*` is only special as the last character of the path
//! - Duplicate placeholder names and the reserved catch-all name are rejected
//!   at registration instead of producing colliding groups

use regex::Regex;

use crate::error::{RouteError, RouteResult};
use crate::routing::params::Params;

/// Group name reserved for the trailing catch-all segment.
pub const CATCH_ALL: &str = "_rest";

/// A route path compiled into an anchored regular expression.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    path: String,
    regex: Regex,
    names: Vec<String>,
    catch_all: bool,
}

impl CompiledPattern {
    /// Compile a route path. `caseless` adds the case-insensitive flag.
    pub fn compile(path: &str, caseless: bool) -> RouteResult<Self> {
        let invalid = |reason: String| RouteError::InvalidPattern {
            path: path.to_string(),
            reason,
        };

        let (body, catch_all) = match path.strip_suffix('*') {
            Some(rest) => (rest, true),
            None => (path, false),
        };

        let mut source = String::with_capacity(path.len() * 2);
        let mut names: Vec<String> = Vec::new();
        let mut literal = String::new();
        let mut chars = body.char_indices().peekable();

        while let Some((_, c)) = chars.next() {
            let starts_name = c == '@'
                && chars
                    .peek()
                    .is_some_and(|(_, n)| n.is_ascii_alphanumeric() || *n == '_');
            if !starts_name {
                literal.push(c);
                continue;
            }

            let mut name = String::new();
            while let Some((_, n)) = chars.peek() {
                if n.is_ascii_alphanumeric() || *n == '_' {
                    name.push(*n);
                    chars.next();
                } else {
                    break;
                }
            }

            if name.starts_with(|c: char| c.is_ascii_digit()) {
                return Err(invalid(format!("placeholder \"@{}\" must not start with a digit", name)));
            }
            if name == CATCH_ALL {
                return Err(invalid(format!("placeholder name \"{}\" is reserved", CATCH_ALL)));
            }
            if names.contains(&name) {
                return Err(invalid(format!("placeholder \"@{}\" is used twice", name)));
            }

            source.push_str(&regex::escape(&literal));
            literal.clear();
            source.push_str(&format!("(?<{}>[^/]+)", name));
            names.push(name);
        }
        source.push_str(&regex::escape(&literal));

        if catch_all {
            source.push_str(&format!("(?<{}>.+)", CATCH_ALL));
        }

        let flags = if caseless { "(?i)" } else { "" };
        let regex = Regex::new(&format!("{}^{}$", flags, source))
            .map_err(|e| invalid(e.to_string()))?;

        Ok(Self {
            path: path.to_string(),
            regex,
            names,
            catch_all,
        })
    }

    /// Structural match. Returns the extracted parameters.
    pub fn captures(&self, path: &str) -> Option<Params> {
        let caps = self.regex.captures(path)?;
        let mut params = Params::new();

        for name in &self.names {
            if let Some(m) = caps.name(name) {
                params.insert(name.as_str(), m.as_str());
            }
        }

        if let Some(rest) = caps.name(CATCH_ALL) {
            for segment in rest.as_str().split('/') {
                params.push(segment);
            }
        }

        Some(params)
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Path template this pattern was compiled from.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Placeholder names in declaration order.
    pub fn placeholders(&self) -> &[String] {
        &self.names
    }

    pub fn has_catch_all(&self) -> bool {
        self.catch_all
    }

    /// Generated regular expression.
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_path() {
        let pattern = CompiledPattern::compile("/about.html", false).unwrap();
        assert_eq!(pattern.as_str(), r"^/about\.html$");
        assert!(pattern.is_match("/about.html"));
        assert!(!pattern.is_match("/aboutxhtml"));
        assert!(!pattern.is_match("/about.html/more"));
    }

    #[test]
    fn test_placeholder_derivation() {
        let pattern = CompiledPattern::compile("/user/@id", false).unwrap();
        assert_eq!(pattern.as_str(), "^/user/(?<id>[^/]+)$");

        let params = pattern.captures("/user/42").unwrap();
        assert_eq!(params.get("id"), Some("42"));
        assert!(pattern.captures("/user/42/edit").is_none());
    }

    #[test]
    fn test_catch_all() {
        let pattern = CompiledPattern::compile("/user/@id/*", false).unwrap();
        assert_eq!(pattern.as_str(), "^/user/(?<id>[^/]+)/(?<_rest>.+)$");

        let params = pattern.captures("/user/5/a/b").unwrap();
        assert_eq!(params.get("id"), Some("5"));
        assert_eq!(params.get_index(0), Some("a"));
        assert_eq!(params.get_index(1), Some("b"));
    }

    #[test]
    fn test_caseless_flag() {
        let strict = CompiledPattern::compile("/Home", false).unwrap();
        assert!(!strict.is_match("/home"));

        let caseless = CompiledPattern::compile("/Home", true).unwrap();
        assert!(caseless.is_match("/home"));
    }

    #[test]
    fn test_star_only_special_at_end() {
        let pattern = CompiledPattern::compile("/a*b", false).unwrap();
        assert!(pattern.is_match("/a*b"));
        assert!(!pattern.has_catch_all());
    }

    #[test]
    fn test_rejects_duplicate_and_reserved_names() {
        assert!(matches!(
            CompiledPattern::compile("/@id/@id", false),
            Err(RouteError::InvalidPattern { .. })
        ));
        assert!(matches!(
            CompiledPattern::compile("/@_rest", false),
            Err(RouteError::InvalidPattern { .. })
        ));
        assert!(CompiledPattern::compile("/@1st", false).is_err());
    }

    #[test]
    fn test_lone_at_is_literal() {
        let pattern = CompiledPattern::compile("/mail/@/x", false).unwrap();
        assert!(pattern.is_match("/mail/@/x"));
        assert!(pattern.placeholders().is_empty());
    }
}
