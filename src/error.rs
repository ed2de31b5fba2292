//! Error taxonomy for route registration, argument binding and dispatch.
//!
//! # Design Decisions
//! - Registration errors (`RouteError`) are fatal at startup
//! - Per-request errors (`DispatchError`) never escape the kernel; each one
//!   maps onto an HTTP status and is rendered by the error pipeline

use axum::http::HeaderMap;
use thiserror::Error;

/// Errors raised while building the route table.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouteError {
    /// Template did not parse into verbs, alias, path and mode.
    #[error("Route should contain at least a verb and a path or alias, given \"{0}\"")]
    MalformedRoute(String),

    /// Template without a path referenced an alias that does not exist yet.
    #[error("Route alias \"{0}\" does not exist")]
    UnknownAlias(String),

    /// Path compiled into an unusable pattern.
    #[error("Invalid route pattern \"{path}\": {reason}")]
    InvalidPattern { path: String, reason: String },
}

/// Result type for route registration.
pub type RouteResult<T> = Result<T, RouteError>;

/// Errors raised while binding handler arguments.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BindError {
    /// A service dependency could not be produced.
    #[error("Unable to resolve service \"{0}\"")]
    ServiceResolution(String),

    /// A required parameter had neither a value nor a default.
    #[error("Missing value for parameter \"{0}\"")]
    MissingArgument(String),
}

/// Error returned by a route handler.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Handler asks for a specific HTTP error response.
    #[error("{}", .message.as_deref().unwrap_or("HTTP error"))]
    Http {
        code: u16,
        message: Option<String>,
        headers: HeaderMap,
    },

    /// Handler failed for any other reason.
    #[error("{0}")]
    Failed(String),

    /// Handler needed a service that could not be produced.
    #[error(transparent)]
    Bind(#[from] BindError),
}

impl HandlerError {
    /// Shorthand for an HTTP error without extra headers.
    pub fn http(code: u16, message: impl Into<String>) -> Self {
        HandlerError::Http {
            code,
            message: Some(message.into()),
            headers: HeaderMap::new(),
        }
    }
}

/// Errors funneled into the kernel's error state.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No route template structurally matched the path.
    #[error("No route matches {verb} {path}")]
    NoMatch { verb: String, path: String },

    /// A template matched but has no handler for the verb/mode.
    #[error("Method {verb} not allowed for {path}")]
    MethodNotAllowed { verb: String, path: String },

    /// Argument binding could not resolve a dependency.
    #[error(transparent)]
    ServiceResolution(BindError),

    /// The handler failed while running.
    #[error("{message}")]
    HandlerInvocation {
        code: u16,
        message: String,
        headers: HeaderMap,
    },

    /// Status code outside the supported table.
    #[error("Unsupported HTTP code: {0}")]
    UnsupportedStatus(u16),

    /// Mock expression did not contain a verb and a target.
    #[error("Mock should contain at least a verb and a path, given \"{0}\"")]
    MalformedMock(String),
}

impl DispatchError {
    /// HTTP status the error renders with.
    pub fn status(&self) -> u16 {
        match self {
            DispatchError::NoMatch { .. } => 404,
            DispatchError::MethodNotAllowed { .. } => 405,
            DispatchError::HandlerInvocation { code, .. } => *code,
            DispatchError::ServiceResolution(_)
            | DispatchError::UnsupportedStatus(_)
            | DispatchError::MalformedMock(_) => 500,
        }
    }

    /// Message shown to the client; `None` lets the pipeline build the default text.
    pub fn public_message(&self) -> Option<String> {
        match self {
            DispatchError::NoMatch { .. } | DispatchError::MethodNotAllowed { .. } => None,
            other => Some(other.to_string()),
        }
    }
}

impl From<BindError> for DispatchError {
    fn from(err: BindError) -> Self {
        match err {
            BindError::ServiceResolution(_) => DispatchError::ServiceResolution(err),
            BindError::MissingArgument(_) => DispatchError::HandlerInvocation {
                code: 500,
                message: err.to_string(),
                headers: HeaderMap::new(),
            },
        }
    }
}

impl From<HandlerError> for DispatchError {
    fn from(err: HandlerError) -> Self {
        match err {
            HandlerError::Http {
                code,
                message,
                headers,
            } => DispatchError::HandlerInvocation {
                code,
                message: message.unwrap_or_default(),
                headers,
            },
            HandlerError::Failed(message) => DispatchError::HandlerInvocation {
                code: 500,
                message,
                headers: HeaderMap::new(),
            },
            HandlerError::Bind(bind) => bind.into(),
        }
    }
}

/// Result type for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;
