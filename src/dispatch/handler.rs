//! Handler model.
//!
//! Handlers are first-class values registered with the route table. Each one
//! declares a [`Signature`] describing the parameters it expects; the argument
//! binder resolves that signature against route parameters, request values
//! and the service registry before the handler runs.

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::dispatch::exchange::Exchange;
use crate::error::HandlerError;
use crate::routing::params::Params;

/// A shared service instance together with its type identity.
#[derive(Clone)]
pub struct Service {
    type_name: &'static str,
    type_id: TypeId,
    instance: Arc<dyn Any + Send + Sync>,
}

impl Service {
    pub fn new<T: Any + Send + Sync>(instance: Arc<T>) -> Self {
        Self {
            type_name: type_name::<T>(),
            type_id: TypeId::of::<T>(),
            instance,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn is<T: Any>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.instance.clone().downcast::<T>().ok()
    }
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service").field("type", &self.type_name).finish()
    }
}

/// A value available to, or bound for, a handler parameter.
#[derive(Debug, Clone)]
pub enum Arg {
    Text(String),
    Json(Value),
    Service(Service),
}

impl Arg {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Arg::Text(s) => Some(s),
            Arg::Json(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_service(&self) -> Option<&Service> {
        match self {
            Arg::Service(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Arg {
    fn from(s: &str) -> Self {
        Arg::Text(s.to_string())
    }
}

impl From<String> for Arg {
    fn from(s: String) -> Self {
        Arg::Text(s)
    }
}

impl From<Value> for Arg {
    fn from(v: Value) -> Self {
        Arg::Json(v)
    }
}

/// What a declared parameter expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamKind {
    /// Plain value: route parameter, request value or hive reference.
    Value,
    /// Service typed by `type_name`, resolved from the registry when no
    /// compatible value is supplied.
    Service {
        type_name: &'static str,
        type_id: TypeId,
    },
    /// Collects every remaining value. Binding stops at the first variadic.
    Variadic,
}

/// One declared handler parameter.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub default: Option<Arg>,
}

/// Ordered parameter declarations of a handler.
#[derive(Debug, Clone, Default)]
pub struct Signature {
    params: Vec<ParamSpec>,
}

impl Signature {
    pub fn new() -> Self {
        Self::default()
    }

    /// Required value parameter.
    pub fn value(mut self, name: impl Into<String>) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            kind: ParamKind::Value,
            default: None,
        });
        self
    }

    /// Value parameter falling back to `default`.
    pub fn optional(mut self, name: impl Into<String>, default: impl Into<Arg>) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            kind: ParamKind::Value,
            default: Some(default.into()),
        });
        self
    }

    /// Service parameter of type `T`.
    pub fn service<T: Any + Send + Sync>(mut self, name: impl Into<String>) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            kind: ParamKind::Service {
                type_name: type_name::<T>(),
                type_id: TypeId::of::<T>(),
            },
            default: None,
        });
        self
    }

    pub fn variadic(mut self, name: impl Into<String>) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            kind: ParamKind::Variadic,
            default: None,
        });
        self
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }
}

/// Positional arguments produced by the binder.
#[derive(Debug, Clone, Default)]
pub struct Args {
    values: Vec<Arg>,
}

impl Args {
    pub fn new(values: Vec<Arg>) -> Self {
        Self { values }
    }

    pub fn get(&self, index: usize) -> Option<&Arg> {
        self.values.get(index)
    }

    pub fn text(&self, index: usize) -> Option<&str> {
        self.values.get(index).and_then(Arg::as_str)
    }

    pub fn service<T: Any + Send + Sync>(&self, index: usize) -> Option<Arc<T>> {
        self.values
            .get(index)
            .and_then(Arg::as_service)
            .and_then(|s| s.downcast::<T>())
    }

    /// Text argument or a `500` handler error naming the missing position.
    pub fn require_text(&self, index: usize) -> Result<&str, HandlerError> {
        self.text(index)
            .ok_or_else(|| HandlerError::Failed(format!("argument {} is not text", index)))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arg> {
        self.values.iter()
    }
}

/// Callback that takes over the response.
pub type ReplyCallback = Box<dyn FnOnce(&mut Exchange) + Send>;

/// Raw handler result, interpreted after the post-route hook.
pub enum Reply {
    /// Nothing to add to the response.
    Empty,
    /// Scalar result, becomes the body as-is.
    Text(String),
    /// Structured result, serialized with `Content-Type: application/json`.
    Json(Value),
    /// Invoked with the exchange so it can shape the response directly.
    Callback(ReplyCallback),
    /// Redirect to an alias, `alias(k=v,...)` expression or path.
    Reroute { target: String, permanent: bool },
}

impl Reply {
    pub fn callback(f: impl FnOnce(&mut Exchange) + Send + 'static) -> Self {
        Reply::Callback(Box::new(f))
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Empty => f.write_str("Empty"),
            Reply::Text(s) => f.debug_tuple("Text").field(s).finish(),
            Reply::Json(v) => f.debug_tuple("Json").field(v).finish(),
            Reply::Callback(_) => f.write_str("Callback"),
            Reply::Reroute { target, permanent } => f
                .debug_struct("Reroute")
                .field("target", target)
                .field("permanent", permanent)
                .finish(),
        }
    }
}

impl From<&str> for Reply {
    fn from(s: &str) -> Self {
        Reply::Text(s.to_string())
    }
}

impl From<String> for Reply {
    fn from(s: String) -> Self {
        Reply::Text(s)
    }
}

impl From<Value> for Reply {
    fn from(v: Value) -> Self {
        Reply::Json(v)
    }
}

impl From<()> for Reply {
    fn from(_: ()) -> Self {
        Reply::Empty
    }
}

macro_rules! reply_from_scalar {
    ($($t:ty),*) => {
        $(impl From<$t> for Reply {
            fn from(v: $t) -> Self {
                Reply::Text(v.to_string())
            }
        })*
    };
}

reply_from_scalar!(i32, i64, u32, u64, usize, f64, bool);

/// Handler body.
pub type HandlerFn = dyn Fn(&mut Exchange, Args) -> Result<Reply, HandlerError> + Send + Sync;

/// A callable handler with its declared signature.
#[derive(Clone)]
pub struct Handler {
    signature: Signature,
    func: Arc<HandlerFn>,
}

impl Handler {
    pub fn new<F>(signature: Signature, func: F) -> Self
    where
        F: Fn(&mut Exchange, Args) -> Result<Reply, HandlerError> + Send + Sync + 'static,
    {
        Self {
            signature,
            func: Arc::new(func),
        }
    }

    /// Handler without declared parameters; every available value is passed through.
    pub fn from_fn<F>(func: F) -> Self
    where
        F: Fn(&mut Exchange, Args) -> Result<Reply, HandlerError> + Send + Sync + 'static,
    {
        Self::new(Signature::new(), func)
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn call(&self, exchange: &mut Exchange, args: Args) -> Result<Reply, HandlerError> {
        (self.func)(exchange, args)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("signature", &self.signature)
            .finish()
    }
}

/// Builds a handler from the extracted path parameters; `None` means the
/// target does not exist and the request degrades to 404.
pub type HandlerFactory = dyn Fn(&Params) -> Option<Handler> + Send + Sync;

/// Handler reference stored in a route entry.
#[derive(Clone)]
pub enum HandlerRef {
    Direct(Handler),
    /// `Controller->method`, `Controller::method` or a function name. May
    /// contain `@name` tokens substituted from the path parameters.
    Named(String),
    Factory(Arc<HandlerFactory>),
    Redirect { target: String, permanent: bool },
}

impl HandlerRef {
    pub fn factory(f: impl Fn(&Params) -> Option<Handler> + Send + Sync + 'static) -> Self {
        HandlerRef::Factory(Arc::new(f))
    }
}

impl fmt::Debug for HandlerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerRef::Direct(h) => f.debug_tuple("Direct").field(h).finish(),
            HandlerRef::Named(n) => f.debug_tuple("Named").field(n).finish(),
            HandlerRef::Factory(_) => f.write_str("Factory"),
            HandlerRef::Redirect { target, permanent } => f
                .debug_struct("Redirect")
                .field("target", target)
                .field("permanent", permanent)
                .finish(),
        }
    }
}

impl From<Handler> for HandlerRef {
    fn from(h: Handler) -> Self {
        HandlerRef::Direct(h)
    }
}

impl From<&str> for HandlerRef {
    fn from(s: &str) -> Self {
        HandlerRef::Named(s.to_string())
    }
}

impl From<String> for HandlerRef {
    fn from(s: String) -> Self {
        HandlerRef::Named(s)
    }
}
