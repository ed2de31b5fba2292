//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check that route templates parse
//! - Validate value ranges and addresses
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: StickConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{CacheEngine, StickConfig};
use crate::routing::template::RouteTemplate;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("routes[{index}]: {reason}")]
    Route { index: usize, reason: String },

    #[error("redirects[{index}]: {reason}")]
    Redirect { index: usize, reason: String },

    #[error("cache: folder engine requires a dir")]
    MissingCacheDir,

    #[error("observability: unknown log level \"{0}\"")]
    LogLevel(String),

    #[error("{field}: invalid socket address \"{value}\"")]
    Address { field: &'static str, value: String },

    #[error("timeouts: request_secs must be greater than 0")]
    ZeroTimeout,
}

/// Validate a parsed configuration.
pub fn validate_config(config: &StickConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::Address {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    for (index, route) in config.routes.iter().enumerate() {
        if let Err(e) = RouteTemplate::parse(&route.route) {
            errors.push(ValidationError::Route {
                index,
                reason: e.to_string(),
            });
        }
        if route.body.is_some() && route.json.is_some() {
            errors.push(ValidationError::Route {
                index,
                reason: "body and json are mutually exclusive".to_string(),
            });
        }
    }

    for (index, redirect) in config.redirects.iter().enumerate() {
        if let Err(e) = RouteTemplate::parse(&redirect.route) {
            errors.push(ValidationError::Redirect {
                index,
                reason: e.to_string(),
            });
        }
        if redirect.target.trim().is_empty() {
            errors.push(ValidationError::Redirect {
                index,
                reason: "target must not be empty".to_string(),
            });
        }
    }

    if config.cache.engine == CacheEngine::Folder
        && config.cache.dir.as_deref().is_none_or(|d| d.trim().is_empty())
    {
        errors.push(ValidationError::MissingCacheDir);
    }

    if !LOG_LEVELS.contains(&config.observability.log_level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::LogLevel(config.observability.log_level.clone()));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::Address {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{RedirectConfig, RouteConfig};

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&StickConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = StickConfig::default();
        config.routes.push(RouteConfig {
            route: "GET".into(),
            ..Default::default()
        });
        config.redirects.push(RedirectConfig {
            route: "GET /old".into(),
            target: " ".into(),
            permanent: false,
        });
        config.cache.engine = CacheEngine::Folder;
        config.observability.log_level = "loud".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::MissingCacheDir));
        assert!(errors.contains(&ValidationError::LogLevel("loud".into())));
    }

    #[test]
    fn test_body_and_json_conflict() {
        let mut config = StickConfig::default();
        config.routes.push(RouteConfig {
            route: "GET /".into(),
            body: Some("x".into()),
            json: Some(serde_json::json!({})),
            ..Default::default()
        });
        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(errors[0], ValidationError::Route { index: 0, .. }));
    }
}
