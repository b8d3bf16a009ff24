//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, rate-limit values positive)
//! - Check targets are absolute http(s) URLs
//! - Check extra header entries are well-formed
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use axum::http::Uri;

use crate::config::schema::AppConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, PartialEq, Eq)]
pub enum ValidationError {
    EmptyRouteName { index: usize },
    DuplicateRouteName { name: String },
    EmptyHeaderValue { route: String },
    InvalidTarget { route: String, target: String },
    InvalidPrefix { route: String, prefix: String },
    InvalidRateLimit { route: String, field: &'static str },
    ZeroTimeout { route: String },
    MalformedExtraHeader { route: String, entry: String },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::EmptyRouteName { index } => {
                write!(f, "route #{index} has an empty name")
            }
            ValidationError::DuplicateRouteName { name } => {
                write!(f, "duplicate route name '{name}'")
            }
            ValidationError::EmptyHeaderValue { route } => {
                write!(f, "route '{route}': header_value must be non-empty")
            }
            ValidationError::InvalidTarget { route, target } => {
                write!(
                    f,
                    "route '{route}': target '{target}' is not an absolute http(s) URL"
                )
            }
            ValidationError::InvalidPrefix { route, prefix } => {
                write!(f, "route '{route}': url_prefix '{prefix}' must start with '/'")
            }
            ValidationError::InvalidRateLimit { route, field } => {
                write!(f, "route '{route}': rate_limit.{field} must be positive")
            }
            ValidationError::ZeroTimeout { route } => {
                write!(f, "route '{route}': timeout_ms must be positive")
            }
            ValidationError::MalformedExtraHeader { route, entry } => {
                write!(
                    f,
                    "route '{route}': extra header '{entry}' is not of the form 'key: value'"
                )
            }
        }
    }
}

/// Validate the configuration, collecting every problem found.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for (index, route) in config.routes.iter().enumerate() {
        if route.name.is_empty() {
            errors.push(ValidationError::EmptyRouteName { index });
        }
        if config.routes[..index].iter().any(|r| r.name == route.name) {
            errors.push(ValidationError::DuplicateRouteName {
                name: route.name.clone(),
            });
        }
        if route.header_value.is_empty() {
            errors.push(ValidationError::EmptyHeaderValue {
                route: route.name.clone(),
            });
        }
        if !is_absolute_http_url(&route.target) {
            errors.push(ValidationError::InvalidTarget {
                route: route.name.clone(),
                target: route.target.clone(),
            });
        }
        if let Some(prefix) = &route.url_prefix {
            if !prefix.starts_with('/') {
                errors.push(ValidationError::InvalidPrefix {
                    route: route.name.clone(),
                    prefix: prefix.clone(),
                });
            }
        }
        if let Some(limit) = &route.rate_limit {
            if limit.window_seconds == 0 {
                errors.push(ValidationError::InvalidRateLimit {
                    route: route.name.clone(),
                    field: "window_seconds",
                });
            }
            if limit.max_requests == 0 {
                errors.push(ValidationError::InvalidRateLimit {
                    route: route.name.clone(),
                    field: "max_requests",
                });
            }
        }
        if route.timeout_ms == 0 {
            errors.push(ValidationError::ZeroTimeout {
                route: route.name.clone(),
            });
        }
        for entry in &route.extra_headers {
            let malformed = match entry.split_once(':') {
                Some((key, value)) => key.trim().is_empty() || value.trim().is_empty(),
                None => true,
            };
            if malformed {
                errors.push(ValidationError::MalformedExtraHeader {
                    route: route.name.clone(),
                    entry: entry.clone(),
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_absolute_http_url(target: &str) -> bool {
    match target.parse::<Uri>() {
        Ok(uri) => {
            matches!(uri.scheme_str(), Some("http") | Some("https")) && uri.authority().is_some()
        }
        Err(_) => false,
    }
}
