//! The four query shapes built on `QueryEngine`: list, by-id, paginated and
//! debounced search.
//!
//! Each owns its parameters, compares them by value, and re-triggers the
//! engine only when they change. A missing required parameter (empty id,
//! zero page or limit, blank search) resets the engine to `Idle` without
//! issuing a request.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::engine::{fetch_fn, FetchFn, FetchFuture, QueryEngine, QueryState};
use crate::error::ApiError;
use crate::types::PagedEnvelope;

pub const DEBOUNCE_DELAY: Duration = Duration::from_millis(300);

type Loader<P, T> = Arc<dyn Fn(P) -> FetchFuture<T> + Send + Sync>;

fn loader<P, T, F, Fut>(load: F) -> Loader<P, T>
where
    F: Fn(P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
{
    Arc::new(move |params: P| load(params).boxed())
}

macro_rules! delegate_state {
    ($data:ty) => {
        pub fn state(&self) -> QueryState<$data> {
            self.engine.state()
        }

        pub fn subscribe(&self) -> watch::Receiver<QueryState<$data>> {
            self.engine.subscribe()
        }

        /// Wait for the current request (if any) to resolve.
        pub async fn settled(&self) -> QueryState<$data> {
            self.engine.settled().await
        }
    };
}

macro_rules! delegate_refetch {
    () => {
        /// Re-run the current request. A no-op while disabled.
        pub fn refetch(&self) {
            self.engine.refetch();
        }
    };
}

/// Parameterless query, triggered once at creation.
pub struct ListQuery<T> {
    engine: QueryEngine<T>,
}

impl<T> ListQuery<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new<F, Fut>(resource: &str, fetch: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let engine = QueryEngine::new(resource);
        engine.trigger(fetch_fn(fetch));
        Self { engine }
    }

    delegate_refetch!();
    delegate_state!(T);
}

/// Single-item query keyed by an id. Disabled while the id is blank.
pub struct ByIdQuery<T> {
    engine: QueryEngine<T>,
    load: Loader<String, T>,
    id: String,
}

impl<T> ByIdQuery<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new<F, Fut>(resource: &str, id: &str, load: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let query = Self {
            engine: QueryEngine::new(resource),
            load: loader(load),
            id: id.to_string(),
        };
        query.run();
        query
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Switch to `id`. Re-triggers only when the value differs.
    pub fn set_id(&mut self, id: &str) {
        if self.id == id {
            return;
        }
        self.id = id.to_string();
        self.run();
    }

    fn run(&self) {
        if self.id.trim().is_empty() {
            self.engine.reset();
            return;
        }
        let load = Arc::clone(&self.load);
        let id = self.id.clone();
        self.engine.trigger(Arc::new(move || load(id.clone())));
    }

    delegate_refetch!();
    delegate_state!(T);
}

/// One page of users at a time. `total` and `items` come from the last
/// committed `PagedEnvelope`.
pub struct PaginatedQuery<T> {
    engine: QueryEngine<PagedEnvelope<T>>,
    load: Loader<(u32, u32), PagedEnvelope<T>>,
    page: u32,
    limit: u32,
}

impl<T> PaginatedQuery<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new<F, Fut>(resource: &str, page: u32, limit: u32, load: F) -> Self
    where
        F: Fn(u32, u32) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<PagedEnvelope<T>, ApiError>> + Send + 'static,
    {
        let query = Self {
            engine: QueryEngine::new(resource),
            load: loader(move |(page, limit): (u32, u32)| load(page, limit)),
            page,
            limit,
        };
        query.run();
        query
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn set_page(&mut self, page: u32) {
        self.set_params(page, self.limit);
    }

    pub fn set_limit(&mut self, limit: u32) {
        self.set_params(self.page, limit);
    }

    pub fn set_params(&mut self, page: u32, limit: u32) {
        if (self.page, self.limit) == (page, limit) {
            return;
        }
        self.page = page;
        self.limit = limit;
        self.run();
    }

    /// Users on the committed page, if any page has been committed.
    pub fn items(&self) -> Option<Vec<T>> {
        self.engine.state().data.map(|envelope| envelope.data.items)
    }

    /// Size of the whole collection as of the committed page.
    pub fn total(&self) -> Option<u64> {
        self.engine.state().data.map(|envelope| envelope.data.total)
    }

    fn run(&self) {
        if self.page == 0 || self.limit == 0 {
            self.engine.reset();
            return;
        }
        let load = Arc::clone(&self.load);
        let params = (self.page, self.limit);
        self.engine.trigger(Arc::new(move || load(params)));
    }

    delegate_refetch!();
    delegate_state!(PagedEnvelope<T>);
}

/// Search query gated by a cancellable debounce timer.
///
/// Each new query string cancels the pending timer before scheduling another;
/// only a query that survives the full delay reaches the engine. A blank
/// query resets to `Idle` immediately and schedules nothing.
///
/// Aborting the timer task cannot stop one that has already woken, so every
/// schedule also carries a debounce token. The timer only triggers if its
/// token is still current, checked under the engine's lock.
pub struct SearchQuery<T> {
    engine: QueryEngine<T>,
    load: Loader<String, T>,
    query: String,
    delay: Duration,
    timer: Option<JoinHandle<()>>,
    debounce: Arc<AtomicU64>,
}

impl<T> SearchQuery<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new<F, Fut>(resource: &str, load: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        Self::with_delay(resource, DEBOUNCE_DELAY, load)
    }

    pub fn with_delay<F, Fut>(resource: &str, delay: Duration, load: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        Self {
            engine: QueryEngine::new(resource),
            load: loader(load),
            query: String::new(),
            delay,
            timer: None,
            debounce: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// True while a debounce timer is waiting to fire.
    pub fn is_pending(&self) -> bool {
        self.timer.as_ref().is_some_and(|timer| !timer.is_finished())
    }

    pub fn set_query(&mut self, query: &str) {
        if self.query == query {
            return;
        }
        self.query = query.to_string();
        self.cancel_timer();

        if self.query.trim().is_empty() {
            self.engine.reset();
            return;
        }

        let engine = self.engine.clone();
        let fetch = self.current_fetch();
        let debounce = Arc::clone(&self.debounce);
        let token = debounce.load(Ordering::SeqCst);
        let delay = self.delay;
        debug!(query = %self.query, ?delay, "scheduling search");
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            engine.trigger_if(|| debounce.load(Ordering::SeqCst) == token, fetch);
        }));
    }

    /// Search for the current query now, dropping any pending debounce.
    pub fn refetch(&mut self) {
        self.cancel_timer();
        if self.query.trim().is_empty() {
            self.engine.reset();
            return;
        }
        self.engine.trigger(self.current_fetch());
    }

    fn current_fetch(&self) -> FetchFn<T> {
        let load = Arc::clone(&self.load);
        let query = self.query.clone();
        Arc::new(move || load(query.clone()))
    }

    fn cancel_timer(&mut self) {
        self.debounce.fetch_add(1, Ordering::SeqCst);
        if let Some(timer) = self.timer.take() {
            if !timer.is_finished() {
                debug!("cancelling pending search");
            }
            timer.abort();
        }
    }

    delegate_state!(T);
}

impl<T> Drop for SearchQuery<T> {
    fn drop(&mut self) {
        self.debounce.fetch_add(1, Ordering::SeqCst);
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}
