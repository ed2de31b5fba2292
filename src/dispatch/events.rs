//! Kernel hooks.
//!
//! One hook per event; registering again replaces the previous hook. A hook
//! returns `true` to tell the kernel it handled the step itself.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::dispatch::exchange::Exchange;
use crate::dispatch::handler::{Handler, Reply};
use crate::routing::params::Params;

/// Points in the dispatch cycle where hooks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    /// Before the first dispatch of a kernel; fires once.
    Boot,
    /// Before route matching; `true` ends the dispatch.
    PreRoute,
    /// After resolution and before argument binding; may edit the parameters.
    ControllerArgs,
    /// After the handler returned; `true` skips reply interpretation.
    PostRoute,
    /// Before a redirect is issued; `true` cancels the default redirect.
    Reroute,
    /// After the error state was entered; `true` suppresses the default body.
    Error,
}

/// Data passed along with an event.
pub enum EventArgs<'a> {
    None,
    ControllerArgs {
        handler: &'a Handler,
        params: &'a mut Params,
    },
    PostRoute {
        reply: &'a mut Reply,
    },
    Reroute {
        url: &'a str,
        permanent: bool,
    },
    Error {
        code: u16,
        text: &'a str,
        trace: &'a str,
    },
}

/// Hook body.
pub type HookFn = dyn Fn(&mut Exchange, &mut EventArgs<'_>) -> bool + Send + Sync;

struct Hook {
    func: Arc<HookFn>,
    once: bool,
}

/// Registered hooks, shareable across concurrent dispatches.
#[derive(Default)]
pub struct EventHub {
    hooks: Mutex<HashMap<Event, Hook>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook for `event`, replacing any previous one.
    pub fn on<F>(&self, event: Event, func: F)
    where
        F: Fn(&mut Exchange, &mut EventArgs<'_>) -> bool + Send + Sync + 'static,
    {
        self.insert(event, Arc::new(func), false);
    }

    /// Register a hook removed after its first call.
    pub fn one<F>(&self, event: Event, func: F)
    where
        F: Fn(&mut Exchange, &mut EventArgs<'_>) -> bool + Send + Sync + 'static,
    {
        self.insert(event, Arc::new(func), true);
    }

    pub fn off(&self, event: Event) {
        self.lock().remove(&event);
    }

    pub fn has(&self, event: Event) -> bool {
        self.lock().contains_key(&event)
    }

    /// Run the hook for `event`. `off` unregisters it before the call, like a
    /// fire-once registration. Returns the hook's result, `false` if none.
    pub fn trigger(&self, event: Event, exchange: &mut Exchange, args: &mut EventArgs<'_>, off: bool) -> bool {
        let func = {
            let mut hooks = self.lock();
            let Some(hook) = hooks.get(&event) else {
                return false;
            };
            let func = hook.func.clone();
            if hook.once || off {
                hooks.remove(&event);
            }
            func
        };

        let handled = func(exchange, args);
        tracing::trace!(event = ?event, handled, "Hook fired");
        handled
    }

    fn insert(&self, event: Event, func: Arc<HookFn>, once: bool) {
        self.lock().insert(event, Hook { func, once });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Event, Hook>> {
        self.hooks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for EventHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let events: Vec<Event> = self.lock().keys().copied().collect();
        f.debug_struct("EventHub").field("events", &events).finish()
    }
}
