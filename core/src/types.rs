//! Domain DTOs and wire envelopes for the users API.
//!
//! These types are produced by the `schema` validator, never by serde
//! deserialization directly, so every instance has passed the shape checks.
//! `Serialize` is derived so consumers can forward them.

use serde::Serialize;

/// A single user record.
///
/// `avatar` stays `None` when the payload omits it; it is never coerced to an
/// empty string.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// The `{data, status, message}` wrapper every endpoint returns.
///
/// `status` mirrors the HTTP status but is informational only, as is `message`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Envelope<T> {
    pub data: T,
    pub status: u16,
    pub message: String,
}

/// One slice of a paginated collection. `page` is 1-indexed and `total` is the
/// size of the whole collection, not of `items`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
}

pub type PagedEnvelope<T> = Envelope<Page<T>>;
