//! Endpoint bindings for the users service.
//!
//! `UsersApi` pairs each endpoint with the schema its payload must satisfy,
//! and builds the matching query for each. Every fetch is one
//! `TransportClient::request` followed by one `schema::validate`.

use std::sync::Arc;

use url::{form_urlencoded, Url};

use crate::client::TransportClient;
use crate::config::ClientConfig;
use crate::error::{ApiError, ConfigError, ValidationError};
use crate::queries::{ByIdQuery, ListQuery, PaginatedQuery, SearchQuery};
use crate::schema::{self, Schema};
use crate::transport::{ReqwestTransport, Transport};
use crate::types::{Envelope, PagedEnvelope, User};

const USERS: &str = "users";
const USER: &str = "user";
const DATA: &str = "data";

/// Typed access to the users endpoints. Clones share one client.
pub struct UsersApi<X> {
    client: Arc<TransportClient<X>>,
}

impl<X> Clone for UsersApi<X> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
        }
    }
}

impl UsersApi<ReqwestTransport> {
    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(TransportClient::from_config(config)?))
    }
}

impl<X: Transport> UsersApi<X> {
    pub fn new(client: TransportClient<X>) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    pub fn client(&self) -> &TransportClient<X> {
        &self.client
    }

    async fn fetch<T: Schema>(&self, endpoint: &str) -> Result<T, ApiError> {
        let raw = self.client.get(endpoint).await?;
        Ok(schema::validate(&raw)?)
    }

    pub async fn list_users(&self) -> Result<Envelope<Vec<User>>, ApiError> {
        self.fetch("/users").await
    }

    pub async fn get_user(&self, id: &str) -> Result<Envelope<User>, ApiError> {
        self.fetch(&user_path(id)?).await
    }

    /// Fetch one page. A server that returns more than `limit` items fails
    /// validation.
    pub async fn users_paginated(&self, page: u32, limit: u32) -> Result<PagedEnvelope<User>, ApiError> {
        let envelope: PagedEnvelope<User> = self
            .fetch(&format!("/users/paginated?page={page}&limit={limit}"))
            .await?;
        let count = envelope.data.items.len();
        if count > limit as usize {
            return Err(ValidationError::new(
                "data.items",
                format!("expected at most {limit} items, found {count}"),
            )
            .into());
        }
        Ok(envelope)
    }

    pub async fn search_users(&self, query: &str) -> Result<Envelope<Vec<User>>, ApiError> {
        self.fetch(&format!("/users/search?q={}", encode(query))).await
    }

    pub async fn empty_users(&self) -> Result<Envelope<Vec<User>>, ApiError> {
        self.fetch("/users/empty").await
    }

    /// Always answers 500.
    pub async fn error_fixture(&self) -> Result<Envelope<String>, ApiError> {
        self.fetch("/error").await
    }

    pub async fn slow(&self) -> Result<Envelope<String>, ApiError> {
        self.fetch("/slow").await
    }

    /// Fails at random; demonstration only.
    pub async fn unreliable(&self) -> Result<Envelope<String>, ApiError> {
        self.fetch("/unreliable").await
    }

    pub fn list_query(&self) -> ListQuery<Envelope<Vec<User>>> {
        let api = self.clone();
        ListQuery::new(USERS, move || {
            let api = api.clone();
            async move { api.list_users().await }
        })
    }

    pub fn empty_query(&self) -> ListQuery<Envelope<Vec<User>>> {
        let api = self.clone();
        ListQuery::new(USERS, move || {
            let api = api.clone();
            async move { api.empty_users().await }
        })
    }

    pub fn user_query(&self, id: &str) -> ByIdQuery<Envelope<User>> {
        let api = self.clone();
        ByIdQuery::new(USER, id, move |id| {
            let api = api.clone();
            async move { api.get_user(&id).await }
        })
    }

    pub fn paginated_query(&self, page: u32, limit: u32) -> PaginatedQuery<User> {
        let api = self.clone();
        PaginatedQuery::new(USERS, page, limit, move |page, limit| {
            let api = api.clone();
            async move { api.users_paginated(page, limit).await }
        })
    }

    pub fn search_query(&self) -> SearchQuery<Envelope<Vec<User>>> {
        let api = self.clone();
        SearchQuery::new(USERS, move |query| {
            let api = api.clone();
            async move { api.search_users(&query).await }
        })
    }

    pub fn error_query(&self) -> ListQuery<Envelope<String>> {
        let api = self.clone();
        ListQuery::new(DATA, move || {
            let api = api.clone();
            async move { api.error_fixture().await }
        })
    }

    pub fn slow_query(&self) -> ListQuery<Envelope<String>> {
        let api = self.clone();
        ListQuery::new(DATA, move || {
            let api = api.clone();
            async move { api.slow().await }
        })
    }

    pub fn unreliable_query(&self) -> ListQuery<Envelope<String>> {
        let api = self.clone();
        ListQuery::new(DATA, move || {
            let api = api.clone();
            async move { api.unreliable().await }
        })
    }
}

/// Query-string encoding: spaces become `+`.
fn encode(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// `/users/{id}` with `id` percent-encoded as a single path segment.
fn user_path(id: &str) -> Result<String, ApiError> {
    let mut url = Url::parse("http://users.invalid/users")
        .map_err(|e| ApiError::Serialization(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|()| ApiError::Serialization("URL cannot carry path segments".to_string()))?
        .push(id);
    Ok(url.path().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_query_values() {
        assert_eq!(encode("Ali"), "Ali");
        assert_eq!(encode("a&b=c"), "a%26b%3Dc");
        assert_eq!(encode("user-1"), "user-1");
    }

    #[test]
    fn user_ids_are_encoded_as_one_path_segment() {
        assert_eq!(user_path("user-1").unwrap(), "/users/user-1");
        assert_eq!(user_path("a b").unwrap(), "/users/a%20b");
        assert_eq!(user_path("a/b").unwrap(), "/users/a%2Fb");
        assert_eq!(user_path("a+b").unwrap(), "/users/a+b");
    }
}
