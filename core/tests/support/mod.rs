//! In-memory `Transport` for query tests.
//!
//! Responses are canned per path. A path can instead be gated: its request
//! parks until the test releases the matching sender, which lets tests choose
//! the order in which overlapping requests resolve.

#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use tokio::sync::oneshot;
use users_core::{ApiError, ClientConfig, HttpResponse, Transport, TransportClient, UsersApi};

pub const BASE_URL: &str = "http://scripted.test";

#[derive(Default)]
struct Script {
    calls: Mutex<Vec<String>>,
    routes: Mutex<HashMap<String, (u16, String)>>,
    gates: Mutex<HashMap<String, oneshot::Receiver<HttpResponse>>>,
    offline: bool,
}

#[derive(Clone, Default)]
pub struct ScriptedTransport(Arc<Script>);

impl ScriptedTransport {
    pub fn offline() -> Self {
        Self(Arc::new(Script {
            offline: true,
            ..Script::default()
        }))
    }

    pub fn respond(&self, path: &str, status: u16, body: Value) -> &Self {
        self.0
            .routes
            .lock()
            .unwrap()
            .insert(path.to_string(), (status, body.to_string()));
        self
    }

    /// Park the next request for `path` until the returned sender fires.
    pub fn gate(&self, path: &str) -> oneshot::Sender<HttpResponse> {
        let (tx, rx) = oneshot::channel();
        self.0.gates.lock().unwrap().insert(path.to_string(), rx);
        tx
    }

    /// Paths requested so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.0.calls.lock().unwrap().clone()
    }

    pub fn api(&self) -> UsersApi<ScriptedTransport> {
        UsersApi::new(TransportClient::new(&ClientConfig::new(BASE_URL), self.clone()))
    }
}

impl Transport for ScriptedTransport {
    fn execute(
        &self,
        request: users_core::HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, ApiError>> + Send {
        let path = request
            .url
            .strip_prefix(BASE_URL)
            .unwrap_or(&request.url)
            .to_string();
        self.0.calls.lock().unwrap().push(path.clone());

        let gate = self.0.gates.lock().unwrap().remove(&path);
        let canned = if self.0.offline {
            Err(ApiError::Network("connection refused".to_string()))
        } else {
            let routes = self.0.routes.lock().unwrap();
            let (status, body) = routes
                .get(&path)
                .cloned()
                .unwrap_or((404, json!({"data": null, "status": 404, "message": "not found"}).to_string()));
            Ok(response(status, &body))
        };

        async move {
            match gate {
                Some(rx) => rx
                    .await
                    .map_err(|_| ApiError::Network("gate dropped".to_string())),
                None => canned,
            }
        }
    }
}

pub fn response(status: u16, body: &str) -> HttpResponse {
    HttpResponse {
        status,
        headers: Vec::new(),
        body: body.to_string(),
    }
}

pub fn envelope(data: Value) -> Value {
    json!({"data": data, "status": 200, "message": "ok"})
}

pub fn user(n: u32) -> Value {
    json!({
        "id": format!("user-{n}"),
        "name": format!("User {n}"),
        "email": format!("user{n}@example.com"),
    })
}

pub async fn drain() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
