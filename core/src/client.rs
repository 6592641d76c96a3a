//! Typed transport client: one request in, parsed JSON out.
//!
//! # Design
//! `TransportClient` holds only its base URL and a `Transport`, and carries no
//! mutable state between calls. Each request is split into `build_request`
//! (produces an `HttpRequest`) and `parse_response` (consumes an
//! `HttpResponse`); `request` runs both around the transport. The parsed body
//! is returned as an untyped `serde_json::Value`: giving it a shape is the
//! schema layer's job.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{ApiError, ConfigError};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::transport::{ReqwestTransport, Transport};

const CONTENT_TYPE: &str = "content-type";
const APPLICATION_JSON: &str = "application/json";

/// Per-request options. Defaults to a bare `GET`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    pub method: HttpMethod,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl RequestOptions {
    pub fn new(method: HttpMethod) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Attach `body` as the JSON payload.
    pub fn json<B: Serialize>(mut self, body: &B) -> Result<Self, ApiError> {
        let value =
            serde_json::to_value(body).map_err(|e| ApiError::Serialization(e.to_string()))?;
        self.body = Some(value);
        Ok(self)
    }
}

/// Stateless JSON client bound to one base URL.
#[derive(Debug, Clone)]
pub struct TransportClient<X> {
    base_url: String,
    transport: X,
}

impl TransportClient<ReqwestTransport> {
    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(config, ReqwestTransport::new(config)?))
    }
}

impl<X> TransportClient<X> {
    pub fn new(config: &ClientConfig, transport: X) -> Self {
        Self {
            base_url: config.base_url().to_string(),
            transport,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn transport(&self) -> &X {
        &self.transport
    }

    /// Join the base URL and `endpoint` and serialize the body.
    ///
    /// `content-type: application/json` is always sent; a caller-supplied
    /// content type is ignored.
    pub fn build_request(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<HttpRequest, ApiError> {
        let mut headers = vec![(CONTENT_TYPE.to_string(), APPLICATION_JSON.to_string())];
        headers.extend(
            options
                .headers
                .into_iter()
                .filter(|(name, _)| !name.eq_ignore_ascii_case(CONTENT_TYPE)),
        );
        let body = options
            .body
            .map(|value| serde_json::to_string(&value))
            .transpose()
            .map_err(|e| ApiError::Serialization(e.to_string()))?;

        Ok(HttpRequest {
            method: options.method,
            url: format!("{}{endpoint}", self.base_url),
            headers,
            body,
        })
    }

    /// Reject non-2xx statuses and parse the body as JSON.
    pub fn parse_response(&self, response: HttpResponse) -> Result<Value, ApiError> {
        check_status(&response)?;
        serde_json::from_str(&response.body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

impl<X: Transport> TransportClient<X> {
    /// Perform exactly one HTTP exchange against `endpoint`.
    pub async fn request(&self, endpoint: &str, options: RequestOptions) -> Result<Value, ApiError> {
        let request = self.build_request(endpoint, options)?;
        debug!(method = %request.method, url = %request.url, "sending request");
        let response = match self.transport.execute(request).await {
            Ok(response) => response,
            Err(err) => {
                warn!(endpoint, error = %err, "request did not complete");
                return Err(err);
            }
        };
        debug!(endpoint, status = response.status, "received response");
        self.parse_response(response)
    }

    pub async fn get(&self, endpoint: &str) -> Result<Value, ApiError> {
        self.request(endpoint, RequestOptions::default()).await
    }
}

/// Any status outside 200..=299 is an `Http` error, regardless of body.
fn check_status(response: &HttpResponse) -> Result<(), ApiError> {
    if response.is_success() {
        return Ok(());
    }
    Err(ApiError::Http {
        status: response.status,
        body: response.body.clone(),
    })
}
