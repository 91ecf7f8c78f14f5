mod conversions;
mod normalizer;

pub use normalizer::panic_response;

use jsonwebtoken::Algorithm;
use thiserror::Error;

/// Every way a request can fail inside the gateway pipeline.
///
/// Stages return these immediately; the variant alone decides the status and
/// client message when the failure is rendered.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("validation failed: {}", .0.first().map(String::as_str).unwrap_or("no detail"))]
    Validation(Vec<String>),

    #[error("unauthorized: {0}")]
    Unauthorized(#[from] TokenError),

    #[error("forbidden: missing authority {required}")]
    Forbidden { required: String },

    #[error("no route matched {path}")]
    NoRouteMatched { path: String },

    #[error("backend for route {route_id} unavailable: {reason}")]
    BackendUnavailable { route_id: String, reason: String },

    #[error("unexpected error: {0}")]
    Unexpected(#[from] anyhow::Error),
}

impl GatewayError {
    pub fn validation(message: impl Into<String>) -> Self {
        GatewayError::Validation(vec![message.into()])
    }
}

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("missing bearer token")]
    MissingToken,

    #[error("malformed authorization header")]
    MalformedHeader,

    #[error("unsupported algorithm {0:?}")]
    UnsupportedAlgorithm(Algorithm),

    #[error("no signing key for kid {0:?}")]
    KeyNotFound(Option<String>),

    #[error("key source unavailable: {0}")]
    KeySource(String),

    #[error("invalid token: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(String),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}

impl ConfigError {
    pub fn invalid(key: impl Into<String>, reason: impl ToString) -> Self {
        ConfigError::Invalid {
            key: key.into(),
            reason: reason.to_string(),
        }
    }
}
