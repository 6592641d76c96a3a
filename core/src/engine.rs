//! Generic request-lifecycle state machine shared by every query shape.
//!
//! # Design
//! A `QueryEngine` owns one `QueryState` slot, published through a
//! `tokio::sync::watch` channel, and a monotonic generation counter.
//! `trigger` bumps the generation, moves the slot to loading and spawns the
//! fetch; when the fetch resolves, its result is committed only if no newer
//! trigger (or reset) has happened since. Superseded results are dropped
//! without touching the slot. In-flight requests are never aborted.
//!
//! Generation bumps and commit checks both run inside the watch channel's
//! write lock, so a commit can never interleave with a newer trigger.
//!
//! ```text
//! Idle ──trigger──▶ Loading ──ok──▶ Success ─┐
//!  ▲                  │  ▲                   │
//!  │                  └err──▶ Error ─────────┤ trigger / refetch
//!  └────── reset ◀───────────────────────────┘
//! ```

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::future::{BoxFuture, FutureExt};
use tokio::sync::watch;
use tracing::debug;

use crate::classify::{classify, ClassifiedError};
use crate::error::ApiError;

pub type FetchFuture<T> = BoxFuture<'static, Result<T, ApiError>>;

/// A re-invocable fetch: one call performs one request plus validation.
pub type FetchFn<T> = Arc<dyn Fn() -> FetchFuture<T> + Send + Sync>;

/// Box a closure returning a future into a `FetchFn`.
pub fn fetch_fn<T, F, Fut>(f: F) -> FetchFn<T>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

/// Coarse lifecycle phase derived from a `QueryState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Idle,
    Loading,
    Success,
    Error,
}

/// Snapshot of a query as seen by its consumer.
///
/// Once a request has resolved exactly one of `data` and `error` is set;
/// both are `None` while idle or loading.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState<T> {
    pub data: Option<T>,
    pub is_loading: bool,
    pub error: Option<ClassifiedError>,
}

impl<T> QueryState<T> {
    pub fn idle() -> Self {
        Self {
            data: None,
            is_loading: false,
            error: None,
        }
    }

    fn loading() -> Self {
        Self {
            is_loading: true,
            ..Self::idle()
        }
    }

    fn success(data: T) -> Self {
        Self {
            data: Some(data),
            ..Self::idle()
        }
    }

    fn failure(error: ClassifiedError) -> Self {
        Self {
            error: Some(error),
            ..Self::idle()
        }
    }

    pub fn status(&self) -> QueryStatus {
        match (self.is_loading, &self.data, &self.error) {
            (true, _, _) => QueryStatus::Loading,
            (false, Some(_), _) => QueryStatus::Success,
            (false, None, Some(_)) => QueryStatus::Error,
            (false, None, None) => QueryStatus::Idle,
        }
    }
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self::idle()
    }
}

struct Shared<T> {
    resource: String,
    generation: AtomicU64,
    state: watch::Sender<QueryState<T>>,
    fetch: Mutex<Option<FetchFn<T>>>,
}

impl<T> Shared<T> {
    /// Store `fetch`, start a new generation and enter `Loading`, all under
    /// the slot's write lock. Does nothing and returns `None` when `admit`
    /// rejects the trigger.
    fn begin(&self, fetch: &FetchFn<T>, admit: impl FnOnce() -> bool) -> Option<u64> {
        let mut generation = None;
        self.state.send_if_modified(|state| {
            if !admit() {
                return false;
            }
            *self.fetch_slot() = Some(Arc::clone(fetch));
            generation = Some(self.generation.fetch_add(1, Ordering::SeqCst) + 1);
            *state = QueryState::loading();
            true
        });
        generation
    }

    /// Commit `outcome` if `generation` is still current. Returns whether the
    /// slot was written.
    fn commit(&self, generation: u64, outcome: Result<T, ApiError>) -> bool {
        self.state.send_if_modified(|state| {
            let current = self.generation.load(Ordering::SeqCst);
            if current != generation {
                debug!(
                    resource = %self.resource,
                    generation,
                    current,
                    "discarding superseded result"
                );
                return false;
            }
            *state = match outcome {
                Ok(data) => QueryState::success(data),
                Err(err) => {
                    debug!(resource = %self.resource, generation, error = %err, "request failed");
                    QueryState::failure(classify(&err, &self.resource))
                }
            };
            true
        })
    }

    fn reset(&self) {
        self.state.send_modify(|state| {
            *self.fetch_slot() = None;
            self.generation.fetch_add(1, Ordering::SeqCst);
            *state = QueryState::idle();
        });
    }

    fn fetch_slot(&self) -> std::sync::MutexGuard<'_, Option<FetchFn<T>>> {
        self.fetch.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Race-safe owner of one `QueryState`.
///
/// Cloning yields another handle to the same slot. Independent engines share
/// nothing.
pub struct QueryEngine<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for QueryEngine<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> QueryEngine<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create an idle engine. `resource` names the fetched data in network
    /// error messages.
    pub fn new(resource: &str) -> Self {
        let (state, _) = watch::channel(QueryState::idle());
        Self {
            shared: Arc::new(Shared {
                resource: resource.to_string(),
                generation: AtomicU64::new(0),
                state,
                fetch: Mutex::new(None),
            }),
        }
    }

    /// Start a request. Returns immediately; the outcome lands in the state
    /// slot unless a newer trigger or reset supersedes it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn trigger(&self, fetch: FetchFn<T>) {
        self.trigger_if(|| true, fetch);
    }

    /// Like `trigger`, but only when `admit` returns true. `admit` runs under
    /// the same lock as `reset`, so a trigger rejected here can never land
    /// after a reset that was meant to cancel it. Returns whether a request
    /// was started.
    pub fn trigger_if(&self, admit: impl FnOnce() -> bool, fetch: FetchFn<T>) -> bool {
        let Some(generation) = self.shared.begin(&fetch, admit) else {
            debug!(resource = %self.shared.resource, "trigger not admitted");
            return false;
        };
        debug!(resource = %self.shared.resource, generation, "triggered");

        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            let outcome = fetch().await;
            shared.commit(generation, outcome);
        });
        true
    }

    /// Re-run the last triggered fetch. A no-op when the engine has never
    /// been triggered or was reset since.
    pub fn refetch(&self) {
        let fetch = self.shared.fetch_slot().clone();
        if let Some(fetch) = fetch {
            self.trigger(fetch);
        }
    }

    /// Return to `Idle`, forget the stored fetch and invalidate every
    /// in-flight request.
    pub fn reset(&self) {
        self.shared.reset();
    }

    pub fn state(&self) -> QueryState<T> {
        self.shared.state.borrow().clone()
    }

    /// Receiver that observes every committed transition.
    pub fn subscribe(&self) -> watch::Receiver<QueryState<T>> {
        self.shared.state.subscribe()
    }

    /// Wait until the slot is no longer loading and return that snapshot.
    pub async fn settled(&self) -> QueryState<T> {
        let mut receiver = self.subscribe();
        let settled = receiver.wait_for(|state| !state.is_loading).await;
        match settled {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.shared.generation.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::oneshot;

    use super::*;
    use crate::classify::ErrorKind;

    /// A fetch whose single result is released by the returned sender.
    fn gated() -> (oneshot::Sender<Result<u32, ApiError>>, FetchFn<u32>) {
        let (tx, rx) = oneshot::channel();
        let rx = Arc::new(Mutex::new(Some(rx)));
        let fetch = fetch_fn(move || {
            let rx = rx.lock().unwrap().take();
            async move {
                match rx {
                    Some(rx) => rx
                        .await
                        .unwrap_or_else(|_| Err(ApiError::Network("gate dropped".into()))),
                    None => Err(ApiError::Network("gate already used".into())),
                }
            }
        });
        (tx, fetch)
    }

    async fn drain() {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn starts_idle() {
        let engine = QueryEngine::<u32>::new("numbers");
        let state = engine.state();
        assert_eq!(state, QueryState::idle());
        assert_eq!(state.status(), QueryStatus::Idle);
    }

    #[tokio::test]
    async fn trigger_enters_loading_then_success() {
        let engine = QueryEngine::new("numbers");
        let (tx, fetch) = gated();
        engine.trigger(fetch);
        assert_eq!(engine.state().status(), QueryStatus::Loading);
        assert!(engine.state().data.is_none());

        tx.send(Ok(7)).unwrap();
        let state = engine.settled().await;
        assert_eq!(state.data, Some(7));
        assert!(!state.is_loading);
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn failure_is_classified() {
        let engine = QueryEngine::<u32>::new("users");
        engine.trigger(fetch_fn(|| async { Err(ApiError::Network("refused".into())) }));
        let state = engine.settled().await;
        assert!(state.data.is_none());
        let error = state.error.unwrap();
        assert_eq!(error.kind, ErrorKind::Network);
        assert_eq!(error.message, "Failed to fetch users");
    }

    #[tokio::test]
    async fn later_trigger_wins_when_earlier_resolves_last() {
        let engine = QueryEngine::new("numbers");
        let (first_tx, first) = gated();
        let (second_tx, second) = gated();
        engine.trigger(first);
        engine.trigger(second);

        second_tx.send(Ok(2)).unwrap();
        assert_eq!(engine.settled().await.data, Some(2));

        first_tx.send(Ok(1)).unwrap();
        drain().await;
        assert_eq!(engine.state().data, Some(2));
    }

    #[tokio::test]
    async fn superseded_error_is_discarded_too() {
        let engine = QueryEngine::new("numbers");
        let (first_tx, first) = gated();
        let (second_tx, second) = gated();
        engine.trigger(first);
        engine.trigger(second);

        first_tx.send(Err(ApiError::Network("late".into()))).unwrap();
        drain().await;
        assert_eq!(engine.state().status(), QueryStatus::Loading);

        second_tx.send(Ok(2)).unwrap();
        let state = engine.settled().await;
        assert_eq!(state.data, Some(2));
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn reset_invalidates_in_flight_request() {
        let engine = QueryEngine::new("numbers");
        let (tx, fetch) = gated();
        engine.trigger(fetch);
        engine.reset();
        assert_eq!(engine.state(), QueryState::idle());

        tx.send(Ok(1)).unwrap();
        drain().await;
        assert_eq!(engine.state(), QueryState::idle());
    }

    #[tokio::test]
    async fn refetch_reuses_last_fetch() {
        let calls = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&calls);
        let engine = QueryEngine::new("numbers");
        engine.trigger(fetch_fn(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Ok(n) }
        }));
        assert_eq!(engine.settled().await.data, Some(1));

        engine.refetch();
        assert_eq!(engine.state().status(), QueryStatus::Loading);
        assert_eq!(engine.settled().await.data, Some(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn refetch_after_reset_does_nothing() {
        let engine = QueryEngine::new("numbers");
        engine.trigger(fetch_fn(|| async { Ok(1u32) }));
        engine.settled().await;
        engine.reset();
        engine.refetch();
        assert_eq!(engine.state(), QueryState::idle());
    }

    #[test]
    fn stale_generation_does_not_commit() {
        let engine = QueryEngine::<u32>::new("numbers");
        let fetch = fetch_fn(|| async { Ok(0u32) });
        let first = engine.shared.begin(&fetch, || true).unwrap();
        let second = engine.shared.begin(&fetch, || true).unwrap();
        assert_eq!(engine.generation(), second);
        assert!(second > first);

        assert!(!engine.shared.commit(first, Ok(1)));
        assert_eq!(engine.state().status(), QueryStatus::Loading);
        assert!(engine.shared.commit(second, Ok(2)));
        assert_eq!(engine.state().data, Some(2));
    }

    #[tokio::test]
    async fn rejected_trigger_leaves_the_slot_alone() {
        let calls = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&calls);
        let engine = QueryEngine::new("numbers");
        let fetch = fetch_fn(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(1u32) }
        });

        assert!(!engine.trigger_if(|| false, Arc::clone(&fetch)));
        drain().await;
        assert_eq!(engine.state(), QueryState::idle());
        assert_eq!(engine.generation(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        engine.refetch();
        assert_eq!(engine.state(), QueryState::idle());

        assert!(engine.trigger_if(|| true, fetch));
        assert_eq!(engine.generation(), 1);
        assert_eq!(engine.settled().await.data, Some(1));
    }

    #[tokio::test]
    async fn subscribers_observe_transitions() {
        let engine = QueryEngine::new("numbers");
        let mut receiver = engine.subscribe();
        let (tx, fetch) = gated();
        engine.trigger(fetch);
        receiver.changed().await.unwrap();
        assert!(receiver.borrow_and_update().is_loading);

        tx.send(Ok(3)).unwrap();
        receiver.changed().await.unwrap();
        assert_eq!(receiver.borrow_and_update().data, Some(3));
    }
}
