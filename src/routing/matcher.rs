//! Route matching logic.
//!
//! # Responsibilities
//! - Walk path templates in registration order
//! - Return the first structural match with its extracted parameters
//!
//! # Design Decisions
//! - Registration order is the only tie-break; no specificity scoring
//! - Verb and mode are ignored here: a structural match on a template that
//!   lacks the verb is a 405, not a reason to keep scanning

use crate::routing::params::Params;
use crate::routing::table::{PathRoutes, RouteTable};

/// First structural match for a path.
#[derive(Debug, Clone)]
pub struct MatchResult<'t> {
    /// Matched path template.
    pub pattern: &'t str,
    /// Mode-bucketed verb map of the matched template.
    pub routes: &'t PathRoutes,
    pub params: Params,
}

/// Matches request paths against a route table.
#[derive(Debug, Clone, Copy)]
pub struct RouteMatcher<'t> {
    table: &'t RouteTable,
}

impl<'t> RouteMatcher<'t> {
    pub fn new(table: &'t RouteTable) -> Self {
        Self { table }
    }

    /// Returns the first template (in registration order) matching `path`.
    pub fn find(&self, path: &str) -> Option<MatchResult<'t>> {
        self.table.paths().find_map(|routes| {
            routes.pattern().captures(path).map(|params| MatchResult {
                pattern: routes.pattern().path(),
                routes,
                params,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::template::Mode;

    #[test]
    fn test_first_registered_wins() {
        let mut table = RouteTable::new(false);
        table.register("GET /", "A->root", 0, 0).unwrap();
        table.register("GET /@name", "A->name", 0, 0).unwrap();
        table.register("POST /fixed", "A->fixed", 0, 0).unwrap();
        let matcher = RouteMatcher::new(&table);

        let m = matcher.find("/").unwrap();
        assert_eq!(m.pattern, "/");
        assert!(m.params.is_empty());

        let m = matcher.find("/x").unwrap();
        assert_eq!(m.pattern, "/@name");
        assert_eq!(m.params.get("name"), Some("x"));

        // "/@name" was registered first and shadows "/fixed" for every verb.
        let m = matcher.find("/fixed").unwrap();
        assert_eq!(m.pattern, "/@name");
        assert!(m.routes.bucket(Mode::All).unwrap().contains_key("GET"));
    }

    #[test]
    fn test_no_match() {
        let mut table = RouteTable::new(false);
        table.register("GET /a", "A->a", 0, 0).unwrap();
        assert!(RouteMatcher::new(&table).find("/b").is_none());
        assert!(RouteMatcher::new(&table).find("/a/").is_none());
    }

    #[test]
    fn test_catch_all_params_follow_named() {
        let mut table = RouteTable::new(false);
        table.register("GET /user/@id/*", "U->files", 0, 0).unwrap();
        let m = RouteMatcher::new(&table).find("/user/5/a/b").unwrap();

        let collected: Vec<String> = m.params.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        assert_eq!(collected, vec!["id=5", "0=a", "1=b"]);
    }

    #[test]
    fn test_caseless_table() {
        let mut table = RouteTable::new(true);
        table.register("GET /About", "A->about", 0, 0).unwrap();
        assert!(RouteMatcher::new(&table).find("/about").is_some());
    }
}
