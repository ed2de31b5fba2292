//! Controller resolution.
//!
//! # Responsibilities
//! - Pick the mode bucket of a matched template and look up the verb
//! - Turn the stored handler reference into a callable [`Handler`]
//!
//! # Design Decisions
//! - The request mode's bucket wins; the `all` bucket is the fallback
//! - A structural match without a handler for the verb is 405
//! - A named reference that does not resolve after `@token` substitution
//!   degrades to 404
//! - HEAD runs the GET handler when no HEAD handler is registered

use std::collections::HashMap;

use crate::dispatch::handler::{Handler, HandlerRef, Reply};
use crate::routing::matcher::MatchResult;
use crate::routing::params::Params;
use crate::routing::table::{substitute_placeholders, RouteTable};
use crate::routing::template::Mode;

/// Named handlers: controller methods and plain functions.
#[derive(Debug, Clone, Default)]
pub struct Controllers {
    classes: HashMap<String, HashMap<String, Handler>>,
    functions: HashMap<String, Handler>,
}

impl Controllers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `controller->method` (also reachable as `controller::method`).
    pub fn method(&mut self, controller: &str, method: &str, handler: Handler) -> &mut Self {
        self.classes
            .entry(controller.to_string())
            .or_default()
            .insert(method.to_string(), handler);
        self
    }

    pub fn function(&mut self, name: &str, handler: Handler) -> &mut Self {
        self.functions.insert(name.to_string(), handler);
        self
    }

    /// Whether a controller with this name exists.
    pub fn has_controller(&self, controller: &str) -> bool {
        self.classes.contains_key(controller)
    }

    /// Look up `Controller->method`, `Controller::method` or a function name.
    pub fn grab(&self, reference: &str) -> Option<&Handler> {
        let split = reference
            .split_once("->")
            .or_else(|| reference.split_once("::"));
        match split {
            Some((controller, method)) => self.classes.get(controller)?.get(method),
            None => self.functions.get(reference),
        }
    }
}

/// A handler ready to be invoked, with the route settings it runs under.
#[derive(Debug, Clone)]
pub struct ResolvedHandler {
    pub handler: Handler,
    pub alias: Option<String>,
    pub ttl: u64,
    pub kbps: u32,
}

/// Outcome of resolving a structural match.
#[derive(Debug, Clone)]
pub enum Resolution {
    Found(ResolvedHandler),
    /// No handler for the verb in the selected bucket.
    NotAllowed,
    /// Handler reference did not lead to anything callable.
    NotInvocable,
}

/// Resolves matched routes into handlers.
#[derive(Debug, Clone, Copy)]
pub struct ControllerResolver<'k> {
    table: &'k RouteTable,
    controllers: &'k Controllers,
}

impl<'k> ControllerResolver<'k> {
    pub fn new(table: &'k RouteTable, controllers: &'k Controllers) -> Self {
        Self { table, controllers }
    }

    pub fn resolve(&self, found: &MatchResult<'_>, verb: &str, mode: Mode) -> Resolution {
        let bucket = found
            .routes
            .bucket(mode)
            .or_else(|| found.routes.bucket(Mode::All));
        let Some(bucket) = bucket else {
            return Resolution::NotAllowed;
        };

        let slot = bucket
            .get(verb)
            .or_else(|| (verb == "HEAD").then(|| bucket.get("GET")).flatten());
        let Some(entry) = slot.and_then(|&id| self.table.entry(id)) else {
            return Resolution::NotAllowed;
        };

        let handler = match &entry.handler {
            HandlerRef::Direct(handler) => Some(handler.clone()),
            HandlerRef::Named(reference) => {
                let reference = substitute_tokens(reference, &found.params);
                let handler = self.controllers.grab(&reference).cloned();
                if handler.is_none() {
                    tracing::debug!(handler = %reference, "Handler reference not invocable");
                }
                handler
            }
            HandlerRef::Factory(factory) => factory(&found.params),
            HandlerRef::Redirect { target, permanent } => Some(redirect_handler(target, *permanent)),
        };

        match handler {
            Some(handler) => Resolution::Found(ResolvedHandler {
                handler,
                alias: entry.alias.clone(),
                ttl: entry.ttl,
                kbps: entry.kbps,
            }),
            None => Resolution::NotInvocable,
        }
    }
}

/// Replace `@name` (named) and `@0` (positional) tokens with parameter values.
fn substitute_tokens(reference: &str, params: &Params) -> String {
    substitute_placeholders(reference, |token| {
        params
            .get(token)
            .or_else(|| params.get_index(token.parse().ok()?))
            .map(str::to_string)
    })
}

fn redirect_handler(target: &str, permanent: bool) -> Handler {
    let target = target.to_string();
    Handler::from_fn(move |_, _| {
        Ok(Reply::Reroute {
            target: target.clone(),
            permanent,
        })
    })
}
