//! Runtime shape validation for JSON payloads.
//!
//! # Design
//! `TransportClient` only guarantees "a 2xx response with a JSON body". This
//! module is the single boundary that turns that `serde_json::Value` into a
//! typed value or a `ValidationError`. Validation stops at the first
//! violation and reports its JSON path; a collection is accepted whole or not
//! at all.
//!
//! Shapes are expressed as the `Schema` trait, implemented per type, so the
//! expected shape is chosen by the caller's type annotation:
//!
//! ```
//! use users_core::{schema, Envelope, User};
//!
//! let raw = serde_json::json!({
//!     "data": [{"id": "user-1", "name": "Alice", "email": "alice@example.com"}],
//!     "status": 200,
//!     "message": "ok",
//! });
//! let envelope: Envelope<Vec<User>> = schema::validate(&raw).unwrap();
//! assert_eq!(envelope.data[0].avatar, None);
//! ```

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::types::{Envelope, Page, User};

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"));

/// A type that can be validated out of an untyped JSON value.
pub trait Schema: Sized {
    /// Validate `value`, reporting violations relative to `path`.
    fn from_json(value: &Value, path: &str) -> Result<Self, ValidationError>;
}

/// Validate `raw` against the shape of `T`.
pub fn validate<T: Schema>(raw: &Value) -> Result<T, ValidationError> {
    T::from_json(raw, "")
}

/// Returns true when `email` passes the simple `local@domain.tld` check.
pub fn is_email(email: &str) -> bool {
    EMAIL.is_match(email)
}

impl Schema for User {
    fn from_json(value: &Value, path: &str) -> Result<Self, ValidationError> {
        let object = as_object(value, path)?;
        let id = required_string(object, "id", path)?;
        let name = required_string(object, "name", path)?;
        let email = required_string(object, "email", path)?;
        if !is_email(&email) {
            return Err(ValidationError::new(
                field(path, "email"),
                format!("invalid email address {email:?}"),
            ));
        }
        Ok(User {
            id,
            name,
            email,
            avatar: optional_string(object, "avatar", path)?,
        })
    }
}

impl<T: Schema> Schema for Vec<T> {
    fn from_json(value: &Value, path: &str) -> Result<Self, ValidationError> {
        let Value::Array(elements) = value else {
            return Err(mismatch(path, "array", value));
        };
        elements
            .iter()
            .enumerate()
            .map(|(i, element)| T::from_json(element, &format!("{path}[{i}]")))
            .collect()
    }
}

impl<T: Schema> Schema for Envelope<T> {
    fn from_json(value: &Value, path: &str) -> Result<Self, ValidationError> {
        let object = as_object(value, path)?;
        let data = object
            .get("data")
            .ok_or_else(|| missing(path, "data"))?;
        let status = required_integer(object, "status", path)?;
        let status = u16::try_from(status).map_err(|_| {
            ValidationError::new(field(path, "status"), format!("{status} is not an HTTP status"))
        })?;
        Ok(Envelope {
            data: T::from_json(data, &field(path, "data"))?,
            status,
            message: string_field(object, "message", path)?,
        })
    }
}

impl<T: Schema> Schema for Page<T> {
    fn from_json(value: &Value, path: &str) -> Result<Self, ValidationError> {
        let object = as_object(value, path)?;
        let items = object
            .get("items")
            .ok_or_else(|| missing(path, "items"))?;
        let total = required_integer(object, "total", path)?;
        let page = required_integer(object, "page", path)?;
        let page = u32::try_from(page)
            .ok()
            .filter(|page| *page >= 1)
            .ok_or_else(|| {
                ValidationError::new(field(path, "page"), format!("page {page} is not 1-indexed"))
            })?;
        Ok(Page {
            items: Vec::<T>::from_json(items, &field(path, "items"))?,
            total,
            page,
        })
    }
}

impl Schema for String {
    fn from_json(value: &Value, path: &str) -> Result<Self, ValidationError> {
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| mismatch(path, "string", value))
    }
}

fn as_object<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>, ValidationError> {
    value.as_object().ok_or_else(|| mismatch(path, "object", value))
}

/// A present, non-empty string.
fn required_string(object: &Map<String, Value>, key: &str, path: &str) -> Result<String, ValidationError> {
    let value = string_field(object, key, path)?;
    if value.is_empty() {
        return Err(ValidationError::new(field(path, key), "must not be empty"));
    }
    Ok(value)
}

/// A present string, possibly empty.
fn string_field(object: &Map<String, Value>, key: &str, path: &str) -> Result<String, ValidationError> {
    let value = object.get(key).ok_or_else(|| missing(path, key))?;
    String::from_json(value, &field(path, key))
}

/// Absent is fine; present must be a string.
fn optional_string(
    object: &Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<Option<String>, ValidationError> {
    object
        .get(key)
        .map(|value| String::from_json(value, &field(path, key)))
        .transpose()
}

fn required_integer(object: &Map<String, Value>, key: &str, path: &str) -> Result<u64, ValidationError> {
    let value = object.get(key).ok_or_else(|| missing(path, key))?;
    value
        .as_u64()
        .ok_or_else(|| mismatch(&field(path, key), "non-negative integer", value))
}

fn field(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn missing(path: &str, key: &str) -> ValidationError {
    ValidationError::new(field(path, key), "missing required field")
}

fn mismatch(path: &str, expected: &str, found: &Value) -> ValidationError {
    ValidationError::new(path, format!("expected {expected}, found {}", kind_name(found)))
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
