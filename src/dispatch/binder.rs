//! Argument binding.
//!
//! # Responsibilities
//! - Walk a handler's declared parameters in order
//! - Bind services, route values, request values and defaults
//! - Expand `%key%` references against the hive
//!
//! # Data Flow
//! ```text
//! Signature + available values ──► per parameter:
//!   Service  ─► typed value at cursor │ service id at cursor │ registry lookup
//!   Value    ─► value by name │ value at cursor │ request input │ default
//!   Variadic ─► stop
//! leftover values ──► appended
//! ```

use std::any::TypeId;
use std::sync::LazyLock;

use regex::Regex;

use crate::container::{Hive, ServiceRegistry};
use crate::dispatch::handler::{Arg, Args, ParamKind, Signature};
use crate::error::BindError;
use crate::http::request::RequestContext;
use crate::routing::params::ParamKey;

static HIVE_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+)?%([.\w]+)%(.+)?$").expect("hive reference regex is valid"));

/// Binds available values to a handler signature.
#[derive(Debug, Clone, Copy)]
pub struct ArgumentBinder<'k> {
    services: &'k ServiceRegistry,
    hive: &'k Hive,
}

impl<'k> ArgumentBinder<'k> {
    pub fn new(services: &'k ServiceRegistry, hive: &'k Hive) -> Self {
        Self { services, hive }
    }

    /// Produce positional arguments for `signature`.
    pub fn bind(
        &self,
        signature: &Signature,
        available: Vec<(ParamKey, Arg)>,
        request: &RequestContext,
    ) -> Result<Args, BindError> {
        let mut slots: Vec<Option<(ParamKey, Arg)>> = available.into_iter().map(Some).collect();
        let mut bound = Vec::with_capacity(signature.params().len());

        for spec in signature.params() {
            match &spec.kind {
                ParamKind::Variadic => break,
                ParamKind::Service { type_name, type_id } => {
                    if let Some(service) = self.service_at_cursor(&mut slots, *type_id)? {
                        bound.push(service);
                        continue;
                    }
                    let service = self.services.get(type_name)?;
                    bound.push(Arg::Service(service));
                }
                ParamKind::Value => {
                    let taken = take_named(&mut slots, &spec.name).or_else(|| take_next(&mut slots));
                    let arg = match taken {
                        Some(arg) => self.expand(arg)?,
                        None => match request.input(&spec.name) {
                            Some(value) => self.expand(Arg::Text(value.to_string()))?,
                            None => spec
                                .default
                                .clone()
                                .ok_or_else(|| BindError::MissingArgument(spec.name.clone()))?,
                        },
                    };
                    bound.push(arg);
                }
            }
        }

        for (_, arg) in slots.into_iter().flatten() {
            bound.push(self.expand(arg)?);
        }
        Ok(Args::new(bound))
    }

    /// Service compatible with `type_id` at the cursor, consuming the slot.
    fn service_at_cursor(
        &self,
        slots: &mut [Option<(ParamKey, Arg)>],
        type_id: TypeId,
    ) -> Result<Option<Arg>, BindError> {
        let Some(slot) = slots.iter_mut().find(|s| s.is_some()) else {
            return Ok(None);
        };
        let candidate = match slot.as_ref().map(|(_, arg)| arg) {
            Some(Arg::Service(service)) if service.type_id() == type_id => Some(service.clone()),
            Some(arg) => match arg.as_str().filter(|id| self.services.contains(id)) {
                Some(id) => Some(self.services.get(id)?).filter(|s| s.type_id() == type_id),
                None => None,
            },
            None => None,
        };
        Ok(candidate.map(|service| {
            *slot = None;
            Arg::Service(service)
        }))
    }

    /// Expand `%key%` in text values: a hive value is spliced in, otherwise
    /// the key names a service.
    fn expand(&self, arg: Arg) -> Result<Arg, BindError> {
        let Some(text) = arg.as_str() else {
            return Ok(arg);
        };
        let Some(caps) = HIVE_REF.captures(text) else {
            return Ok(arg);
        };

        let key = &caps[2];
        match self.hive.get(key) {
            Some(value) => Ok(Arg::Text(format!(
                "{}{}{}",
                caps.get(1).map_or("", |m| m.as_str()),
                value,
                caps.get(3).map_or("", |m| m.as_str()),
            ))),
            None => self.services.get(key).map(Arg::Service),
        }
    }
}

fn take_named(slots: &mut [Option<(ParamKey, Arg)>], name: &str) -> Option<Arg> {
    slots
        .iter_mut()
        .find(|s| matches!(s, Some((ParamKey::Named(n), _)) if n == name))
        .and_then(Option::take)
        .map(|(_, arg)| arg)
}

fn take_next(slots: &mut [Option<(ParamKey, Arg)>]) -> Option<Arg> {
    slots
        .iter_mut()
        .find(|s| s.is_some())
        .and_then(Option::take)
        .map(|(_, arg)| arg)
}
