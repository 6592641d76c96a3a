//! Client-side data access for the users service.
//!
//! # Overview
//! Three layers, leaves first:
//! - `TransportClient` performs one HTTP exchange and returns untyped JSON,
//!   failing with `ApiError::Network` or `ApiError::Http`.
//! - `schema` turns that JSON into typed values or a `ValidationError`.
//! - `QueryEngine` and the four query shapes in `queries` run fetches on a
//!   tokio runtime, discard superseded results, and publish a `QueryState`
//!   whose errors have been through `classify`.
//!
//! `UsersApi` wires the three together for each endpoint.
//!
//! # Design
//! - The I/O boundary is the `Transport` trait; everything else is
//!   deterministic and tested against scripted transports.
//! - Exactly one attempt per trigger. No retries, no caching.

pub mod api;
pub mod classify;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod http;
pub mod queries;
pub mod schema;
pub mod transport;
pub mod types;

pub use api::UsersApi;
pub use classify::{classify, ClassifiedError, ErrorKind};
pub use client::{RequestOptions, TransportClient};
pub use config::ClientConfig;
pub use engine::{fetch_fn, FetchFn, QueryEngine, QueryState, QueryStatus};
pub use error::{ApiError, ConfigError, ValidationError};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use queries::{ByIdQuery, ListQuery, PaginatedQuery, SearchQuery, DEBOUNCE_DELAY};
pub use transport::{ReqwestTransport, Transport};
pub use types::{Envelope, Page, PagedEnvelope, User};
