//! Raw error types produced by the transport and the schema validator.
//!
//! # Design
//! `ApiError` keeps "no response arrived" (`Network`), "a response arrived
//! with a non-2xx status" (`Http`) and "a 2xx response arrived but the payload
//! is malformed" (`Validation`) as separate variants. Consumers never see these
//! directly: the query engine passes them through `classify` first.

use std::fmt;

use thiserror::Error;

/// Errors returned by `TransportClient` and the endpoint fetchers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The exchange could not complete: DNS, connect, reset or timeout.
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with a status outside 200..=299.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The payload was JSON but did not match the expected shape.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A 2xx response body was not valid JSON.
    #[error("response body is not valid JSON: {0}")]
    Decode(String),

    /// The request body could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

/// The first structural violation found while validating a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    path: String,
    reason: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// JSON path of the offending value, e.g. `data[2].email`. Empty for the root.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            f.write_str(&self.reason)
        } else {
            write!(f, "{}: {}", self.path, self.reason)
        }
    }
}

impl std::error::Error for ValidationError {}

/// Errors raised while loading `ClientConfig` from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_prefixes_path() {
        let err = ValidationError::new("[0].email", "missing required field");
        assert_eq!(err.to_string(), "[0].email: missing required field");
    }

    #[test]
    fn root_validation_error_has_no_prefix() {
        let err = ValidationError::new("", "expected array, found object");
        assert_eq!(err.to_string(), "expected array, found object");
    }

    #[test]
    fn validation_converts_into_api_error() {
        let err: ApiError = ValidationError::new("id", "expected string, found number").into();
        assert!(matches!(err, ApiError::Validation(_)));
        assert_eq!(err.to_string(), "id: expected string, found number");
    }
}
