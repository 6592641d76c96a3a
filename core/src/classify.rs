//! Maps raw `ApiError`s onto the user-facing error categories.
//!
//! `classify` is total and pure: every error maps to exactly one
//! `ClassifiedError` and nothing else happens.

use serde::Serialize;

use crate::error::ApiError;

pub const NOT_FOUND_MESSAGE: &str = "Resource not found";
pub const SERVER_ERROR_MESSAGE: &str = "Server error occurred";
pub const UNKNOWN_MESSAGE: &str = "An unexpected error occurred";

/// User-facing error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Validation,
    Network,
    Http,
    Unknown,
}

/// Normalized error shown to consumers, independent of transport details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    pub message: String,
}

impl ClassifiedError {
    fn new(kind: ErrorKind, http_status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            kind,
            http_status,
            message: message.into(),
        }
    }
}

/// Classify `error` for display. `resource` names what was being fetched and
/// only appears in the network-failure message ("Failed to fetch users").
pub fn classify(error: &ApiError, resource: &str) -> ClassifiedError {
    match error {
        ApiError::Http { status: 404, .. } => {
            ClassifiedError::new(ErrorKind::Http, Some(404), NOT_FOUND_MESSAGE)
        }
        ApiError::Http { status, .. } if (500..600).contains(status) => {
            ClassifiedError::new(ErrorKind::Http, Some(*status), SERVER_ERROR_MESSAGE)
        }
        ApiError::Http { status, .. } => ClassifiedError::new(
            ErrorKind::Http,
            Some(*status),
            format!("Request failed with status {status}"),
        ),
        ApiError::Network(_) => {
            ClassifiedError::new(ErrorKind::Network, None, format!("Failed to fetch {resource}"))
        }
        ApiError::Validation(cause) => ClassifiedError::new(
            ErrorKind::Validation,
            None,
            format!("Data validation failed: {cause}"),
        ),
        ApiError::Decode(_) | ApiError::Serialization(_) => {
            ClassifiedError::new(ErrorKind::Unknown, None, UNKNOWN_MESSAGE)
        }
    }
}
