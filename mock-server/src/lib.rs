//! Axum fixture server for the users API.
//!
//! Serves six seeded users plus the demonstration fixtures (`/error`, `/slow`,
//! `/unreliable`). Every body is a `{data, status, message}` envelope,
//! including error responses.

use std::{sync::Arc, time::Duration};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
    pub status: u16,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Page {
    pub items: Vec<User>,
    pub total: usize,
    pub page: u32,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub slow_delay: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            slow_delay: Duration::from_secs(2),
        }
    }
}

#[derive(Clone)]
struct AppState {
    users: Arc<Vec<User>>,
    slow_delay: Duration,
}

#[derive(Deserialize)]
struct PageParams {
    page: Option<u32>,
    limit: Option<u32>,
}

#[derive(Deserialize)]
struct SearchParams {
    q: Option<String>,
}

/// The canonical fixture users. `user-6` has no avatar.
pub fn seed_users() -> Vec<User> {
    let user = |n: u32, name: &str, email: &str, avatar: bool| User {
        id: format!("user-{n}"),
        name: name.to_string(),
        email: email.to_string(),
        avatar: avatar.then(|| format!("https://example.com/avatars/user-{n}.jpg")),
    };
    vec![
        user(1, "Alice Johnson", "alice@example.com", true),
        user(2, "Bob Smith", "bob@example.com", true),
        user(3, "Charlie Brown", "charlie@example.com", true),
        user(4, "Very Long Name That Tests UI Overflow", "long@example.com", true),
        user(5, "X", "short@example.com", true),
        user(6, "Test User With No Avatar", "no-avatar@example.com", false),
    ]
}

pub fn app() -> Router {
    app_with(AppConfig::default())
}

pub fn app_with(config: AppConfig) -> Router {
    let state = AppState {
        users: Arc::new(seed_users()),
        slow_delay: config.slow_delay,
    };
    Router::new()
        .route("/users", get(list_users))
        .route("/users/empty", get(empty_users))
        .route("/users/paginated", get(paginated_users))
        .route("/users/search", get(search_users))
        .route("/users/{id}", get(get_user))
        .route("/error", get(always_error))
        .route("/slow", get(slow))
        .route("/unreliable", get(unreliable))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_with(listener, AppConfig::default()).await
}

pub async fn run_with(listener: TcpListener, config: AppConfig) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(config)).await
}

fn ok<T: Serialize>(data: T, message: impl Into<String>) -> Response {
    Json(Envelope {
        data,
        status: StatusCode::OK.as_u16(),
        message: message.into(),
    })
    .into_response()
}

fn failure(status: StatusCode, message: &str) -> Response {
    let body = Envelope {
        data: serde_json::Value::Null,
        status: status.as_u16(),
        message: message.to_string(),
    };
    (status, Json(body)).into_response()
}

async fn list_users(State(state): State<AppState>) -> Response {
    ok(state.users.as_slice(), "Users retrieved successfully")
}

async fn empty_users() -> Response {
    ok(Vec::<User>::new(), "No users found")
}

async fn get_user(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.users.iter().find(|user| user.id == id) {
        Some(user) => ok(user, "User retrieved successfully"),
        None => failure(StatusCode::NOT_FOUND, "User not found"),
    }
}

async fn paginated_users(State(state): State<AppState>, Query(params): Query<PageParams>) -> Response {
    let page = params.page.unwrap_or(1);
    let limit = params.limit.unwrap_or(10) as usize;
    let start = (page.saturating_sub(1) as usize).saturating_mul(limit);
    let items = state.users.iter().skip(start).take(limit).cloned().collect();
    ok(
        Page {
            items,
            total: state.users.len(),
            page,
        },
        "Paginated users retrieved successfully",
    )
}

async fn search_users(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Response {
    let query = params.q.unwrap_or_default().to_lowercase();
    let found: Vec<&User> = state
        .users
        .iter()
        .filter(|user| {
            user.name.to_lowercase().contains(&query) || user.email.to_lowercase().contains(&query)
        })
        .collect();
    let message = format!("Found {} users matching \"{query}\"", found.len());
    ok(found, message)
}

async fn always_error() -> Response {
    warn!("serving fixture failure on /error");
    failure(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}

async fn slow(State(state): State<AppState>) -> Response {
    info!(delay = ?state.slow_delay, "delaying /slow response");
    tokio::time::sleep(state.slow_delay).await;
    ok(
        format!("This response was delayed by {} ms", state.slow_delay.as_millis()),
        "Slow response completed",
    )
}

async fn unreliable() -> Response {
    if rand::random::<bool>() {
        warn!("unreliable fixture chose to fail");
        return failure(StatusCode::INTERNAL_SERVER_ERROR, "Random server error");
    }
    ok("Success! This endpoint randomly fails.", "Request succeeded")
}
