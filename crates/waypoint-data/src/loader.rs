//! Route data loading under cache policies.
//!
//! | Policy | Cached entry present |
//! |---|---|
//! | `NoCache` | evict, fetch |
//! | `CacheFirst` | serve cached |
//! | `NetworkFirst` | fetch |
//! | `StaleWhileRevalidate` | serve cached, refetch in background if stale |
//!
//! The first load after startup serves any cached entry verbatim so data
//! seeded by the server is consumed once; a seeded `NoCache` entry is evicted
//! after that read.

use std::cell::Cell;
use std::rc::Rc;

use futures::future::{self, FutureExt, LocalBoxFuture};
use serde_json::Value;
use waypoint_cache::{
    CacheKey, CachePolicy, CacheStatus, CachedData, InFlightId, InFlightLoad, SharedCache,
};
use waypoint_core::RouteError;
use waypoint_executor::SharedScheduler;
use waypoint_router::{LoaderArgs, Match, NavContext, RouteLoader};

use crate::retry::RetryPolicy;

/// A started load: how it was satisfied plus the data future.
pub struct LoadHandle {
    status: CacheStatus,
    data: LocalBoxFuture<'static, Result<Value, RouteError>>,
}

impl LoadHandle {
    fn ready(status: CacheStatus, data: Value) -> Self {
        Self {
            status,
            data: future::ready(Ok(data)).boxed_local(),
        }
    }

    fn pending(status: CacheStatus, load: InFlightLoad) -> Self {
        Self {
            status,
            data: load.boxed_local(),
        }
    }

    /// How the load was satisfied.
    pub fn status(&self) -> CacheStatus {
        self.status
    }

    /// The data future.
    pub fn into_data(self) -> LocalBoxFuture<'static, Result<Value, RouteError>> {
        self.data
    }
}

impl std::fmt::Debug for LoadHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadHandle")
            .field("status", &self.status)
            .finish()
    }
}

/// Loads route data through the shared cache.
///
/// Loads run as scheduler tasks: a load started by a navigation that goes
/// stale still completes and writes the cache.
pub struct DataLoader {
    cache: SharedCache,
    scheduler: SharedScheduler,
    retry: RetryPolicy,
    initial: Cell<bool>,
}

impl DataLoader {
    /// Create a loader over a cache.
    pub fn new(cache: SharedCache, scheduler: SharedScheduler) -> Self {
        Self {
            cache,
            scheduler,
            retry: RetryPolicy::default(),
            initial: Cell::new(true),
        }
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The shared cache.
    pub fn cache(&self) -> &SharedCache {
        &self.cache
    }

    /// Whether the next load is the first after startup.
    pub fn is_initial(&self) -> bool {
        self.initial.get()
    }

    /// Re-arm the initial-request rule.
    pub fn rearm_initial(&self) {
        self.initial.set(true);
    }

    /// Load data for a match.
    ///
    /// `force` skips the cache read (but still deduplicates in-flight loads).
    pub fn load(&self, m: &Match, nav_context: &NavContext, force: bool) -> LoadHandle {
        let is_initial = self.initial.replace(false);
        let key = &m.cache_key;

        let cached = if force {
            None
        } else {
            self.cache.borrow().get(key).cloned()
        };

        let Some(entry) = cached else {
            tracing::debug!(key = %key, force, "data not in cache");
            let status = if force {
                CacheStatus::Bypass
            } else {
                CacheStatus::Miss
            };
            return self.fetch(m, nav_context, status);
        };

        if is_initial {
            tracing::debug!(key = %key, "initial request, using cache");
            if entry.policy == CachePolicy::NoCache {
                self.cache.borrow_mut().remove(key);
            }
            return LoadHandle::ready(CacheStatus::Initial, entry.data);
        }

        match entry.policy {
            CachePolicy::NoCache => {
                self.cache.borrow_mut().remove(key);
                self.fetch(m, nav_context, CacheStatus::Bypass)
            }
            CachePolicy::CacheFirst => {
                tracing::debug!(key = %key, "loading data from cache");
                LoadHandle::ready(CacheStatus::Hit, entry.data)
            }
            CachePolicy::NetworkFirst => {
                tracing::debug!(key = %key, "network first, refetching");
                self.fetch(m, nav_context, CacheStatus::Miss)
            }
            CachePolicy::StaleWhileRevalidate => {
                let now = self.scheduler.now();
                if entry.is_stale(now, m.route.cache().stale_time) {
                    tracing::debug!(key = %key, "stale, revalidating in the background");
                    self.start_or_attach(m, nav_context);
                    LoadHandle::ready(CacheStatus::Stale, entry.data)
                } else {
                    LoadHandle::ready(CacheStatus::Hit, entry.data)
                }
            }
        }
    }

    /// Cached, in-flight, or freshly loaded data for a match.
    ///
    /// Does not consume the initial-request rule.
    pub fn use_data(&self, m: &Match) -> LoadHandle {
        let key = &m.cache_key;
        if let Some(entry) = self.cache.borrow().get(key) {
            tracing::debug!(key = %key, "using cached data");
            return LoadHandle::ready(CacheStatus::Hit, entry.data.clone());
        }
        self.fetch(m, &NavContext::new(), CacheStatus::Miss)
    }

    fn fetch(&self, m: &Match, nav_context: &NavContext, status: CacheStatus) -> LoadHandle {
        let (load, attached) = self.start_or_attach(m, nav_context);
        let status = if attached {
            CacheStatus::InFlight
        } else {
            status
        };
        LoadHandle::pending(status, load)
    }

    /// Start a load for the match's key, or attach to the one in flight.
    fn start_or_attach(&self, m: &Match, nav_context: &NavContext) -> (InFlightLoad, bool) {
        let key = m.cache_key.clone();

        if let Some(existing) = self.cache.borrow().in_flight(&key) {
            tracing::debug!(key = %key, "data already loading in flight");
            return (existing, true);
        }

        tracing::debug!(key = %key, "loading data");
        let id = self.cache.borrow_mut().next_in_flight_id();
        let task = LoadTask {
            id,
            loader: m.route.loader(),
            args: m.loader_args(nav_context.clone()),
            policy: m.route.cache_policy(),
            gc_time: m.route.cache().gc_time,
            key: key.clone(),
            cache: self.cache.clone(),
            scheduler: self.scheduler.clone(),
            retry: self.retry.clone(),
        };
        let load: InFlightLoad = task.run().boxed_local().shared();

        self.cache.borrow_mut().start_in_flight(key, id, load.clone());

        let driver = load.clone();
        self.scheduler.spawn(
            async move {
                let _ = driver.await;
            }
            .boxed_local(),
        );

        (load, false)
    }
}

impl std::fmt::Debug for DataLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataLoader")
            .field("cache", &self.cache)
            .field("retry", &self.retry)
            .field("initial", &self.initial.get())
            .finish()
    }
}

struct LoadTask {
    id: InFlightId,
    loader: Option<Rc<dyn RouteLoader>>,
    args: LoaderArgs,
    policy: CachePolicy,
    gc_time: std::time::Duration,
    key: CacheKey,
    cache: SharedCache,
    scheduler: SharedScheduler,
    retry: RetryPolicy,
}

impl LoadTask {
    async fn run(self) -> Result<Value, RouteError> {
        let result = self.load_with_retry().await;

        let mut cache = self.cache.borrow_mut();
        cache.finish_in_flight(&self.key, self.id);

        match result {
            Ok((data, fetched)) => {
                tracing::debug!(key = %self.key, "data loaded");
                if fetched && self.policy.is_cacheable() {
                    let entry = CachedData::new(
                        data.clone(),
                        self.args.location.clone(),
                        self.policy,
                        self.gc_time,
                        self.scheduler.now(),
                    );
                    cache.insert(self.key.clone(), entry);
                }
                Ok(data)
            }
            Err(err) => {
                tracing::debug!(key = %self.key, error = %err, "data load error");
                Err(err)
            }
        }
    }

    /// Returns the data and whether it was freshly fetched.
    async fn load_with_retry(&self) -> Result<(Value, bool), RouteError> {
        let Some(loader) = self.loader.clone() else {
            return Ok((Value::Null, true));
        };

        let mut attempt = 0;
        loop {
            match loader.load(&self.args).await {
                Ok(data) => return Ok((data, true)),
                Err(err) if self.retry.should_retry(&err, attempt) => {
                    tracing::debug!(key = %self.key, error = %err, "retrying data load");
                    self.scheduler
                        .sleep(self.retry.delay_for_attempt(attempt))
                        .await;
                    attempt += 1;
                }
                Err(err) if err.is_offline() => {
                    if let Some(entry) = self.cache.borrow().get(&self.key) {
                        tracing::debug!(key = %self.key, "offline after retrying, using cached data");
                        return Ok((entry.data.clone(), false));
                    }
                    return Err(err);
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::time::Duration;

    use serde_json::json;
    use tokio::task::LocalSet;
    use waypoint_cache::{CacheSnapshot, DataCache};
    use waypoint_core::Location;
    use waypoint_executor::{Scheduler, TokioScheduler};
    use waypoint_router::{RouteBuilder, RouteRegistry};

    struct Fixture {
        scheduler: SharedScheduler,
        cache: SharedCache,
        loader: DataLoader,
        calls: Rc<Cell<u32>>,
        registry: RouteRegistry,
    }

    /// Route `/users/:id` whose loader counts calls and takes `delay`.
    fn fixture(policy: CachePolicy, delay: Duration) -> Fixture {
        let scheduler = TokioScheduler::shared();
        let cache = DataCache::shared();
        let calls = Rc::new(Cell::new(0));

        let counter = calls.clone();
        let sleeper = scheduler.clone();
        let mut registry = RouteRegistry::new();
        registry.register(
            RouteBuilder::new("/users/:id")
                .with_cache_policy(policy)
                .with_stale_time(Duration::from_secs(10))
                .with_load_fn(move |args| {
                    counter.set(counter.get() + 1);
                    let n = counter.get();
                    let sleep = sleeper.sleep(delay);
                    async move {
                        sleep.await;
                        Ok(json!({"id": args.params["id"], "n": n}))
                    }
                })
                .build()
                .unwrap(),
        );

        let loader = DataLoader::new(cache.clone(), scheduler.clone());
        // Skip the initial-request rule unless a test opts back in.
        loader.initial.set(false);

        Fixture {
            scheduler,
            cache,
            loader,
            calls,
            registry,
        }
    }

    fn matched(f: &Fixture, path: &str) -> Match {
        f.registry
            .match_location(&Location::parse(path))
            .unwrap()
            .unwrap()
    }

    async fn load(f: &Fixture, path: &str) -> (CacheStatus, Result<Value, RouteError>) {
        let handle = f.loader.load(&matched(f, path), &NavContext::new(), false);
        let status = handle.status();
        (status, handle.into_data().await)
    }

    // === Policy Tests ===

    #[tokio::test(start_paused = true)]
    async fn test_cache_first_loads_once() {
        LocalSet::new()
            .run_until(async {
                let f = fixture(CachePolicy::CacheFirst, Duration::ZERO);

                let (first, a) = load(&f, "/users/1").await;
                let (second, b) = load(&f, "/users/1").await;

                assert_eq!(first, CacheStatus::Miss);
                assert_eq!(second, CacheStatus::Hit);
                assert_eq!(a.unwrap(), b.unwrap());
                assert_eq!(f.calls.get(), 1);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_cache_never_written() {
        LocalSet::new()
            .run_until(async {
                let f = fixture(CachePolicy::NoCache, Duration::ZERO);

                load(&f, "/users/1").await.1.unwrap();
                load(&f, "/users/1").await.1.unwrap();

                assert!(f.cache.borrow().is_empty());
                assert_eq!(f.calls.get(), 2);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_first_always_fetches() {
        LocalSet::new()
            .run_until(async {
                let f = fixture(CachePolicy::NetworkFirst, Duration::ZERO);

                load(&f, "/users/1").await.1.unwrap();
                let (status, data) = load(&f, "/users/1").await;

                assert_eq!(status, CacheStatus::Miss);
                assert_eq!(data.unwrap()["n"], json!(2));
                assert_eq!(f.calls.get(), 2);
                assert_eq!(f.cache.borrow().len(), 1);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_while_revalidate_serves_cached_and_refetches_once() {
        LocalSet::new()
            .run_until(async {
                let f = fixture(CachePolicy::StaleWhileRevalidate, Duration::from_millis(100));
                let m = matched(&f, "/users/1");

                load(&f, "/users/1").await.1.unwrap();
                assert_eq!(f.calls.get(), 1);

                // Fresh: served from cache, no refetch.
                let (status, _) = load(&f, "/users/1").await;
                assert_eq!(status, CacheStatus::Hit);
                assert_eq!(f.calls.get(), 1);

                f.scheduler.sleep(Duration::from_secs(11)).await;

                let (first, a) = load(&f, "/users/1").await;
                let (second, b) = load(&f, "/users/1").await;
                assert_eq!(first, CacheStatus::Stale);
                assert_eq!(second, CacheStatus::Stale);
                assert_eq!(a.unwrap()["n"], json!(1));
                assert_eq!(b.unwrap()["n"], json!(1));
                tokio::task::yield_now().await;
                // Second stale read attached to the running refetch.
                assert_eq!(f.calls.get(), 2);

                f.scheduler.sleep(Duration::from_millis(200)).await;
                let entry = f.cache.borrow().get(&m.cache_key).cloned().unwrap();
                assert_eq!(entry.data["n"], json!(2));
                assert_eq!(f.cache.borrow().in_flight_len(), 0);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidated_entry_revalidates() {
        LocalSet::new()
            .run_until(async {
                let f = fixture(CachePolicy::StaleWhileRevalidate, Duration::ZERO);
                let m = matched(&f, "/users/1");

                load(&f, "/users/1").await.1.unwrap();
                f.cache.borrow_mut().invalidate(&m.cache_key);

                let (status, _) = load(&f, "/users/1").await;
                assert_eq!(status, CacheStatus::Stale);
                tokio::task::yield_now().await;
                assert_eq!(f.calls.get(), 2);
            })
            .await;
    }

    // === In-flight Tests ===

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_loads_share_one_execution() {
        LocalSet::new()
            .run_until(async {
                let f = fixture(CachePolicy::NoCache, Duration::from_millis(50));
                let m = matched(&f, "/users/1");

                let first = f.loader.load(&m, &NavContext::new(), false);
                let second = f.loader.load(&m, &NavContext::new(), false);
                assert_eq!(first.status(), CacheStatus::Miss);
                assert_eq!(second.status(), CacheStatus::InFlight);

                let (a, b) = futures::join!(first.into_data(), second.into_data());
                assert_eq!(a.unwrap(), b.unwrap());
                assert_eq!(f.calls.get(), 1);
                assert_eq!(f.cache.borrow().in_flight_len(), 0);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_from_before_clear_keeps_newer_in_flight_entry() {
        LocalSet::new()
            .run_until(async {
                let f = fixture(CachePolicy::NoCache, Duration::from_millis(50));
                let m = matched(&f, "/users/1");

                let old = f.loader.load(&m, &NavContext::new(), false);
                f.scheduler.sleep(Duration::from_millis(20)).await;
                f.cache.borrow_mut().clear();

                let newer = f.loader.load(&m, &NavContext::new(), false);
                assert_eq!(newer.status(), CacheStatus::Miss);

                // The old load settles while the newer one is still running.
                f.scheduler.sleep(Duration::from_millis(40)).await;
                assert_eq!(f.cache.borrow().in_flight_len(), 1);

                let attached = f.loader.load(&m, &NavContext::new(), false);
                assert_eq!(attached.status(), CacheStatus::InFlight);

                let (_, b, c) = futures::join!(
                    old.into_data(),
                    newer.into_data(),
                    attached.into_data()
                );
                assert_eq!(b.unwrap(), c.unwrap());
                assert_eq!(f.calls.get(), 2);
                assert_eq!(f.cache.borrow().in_flight_len(), 0);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_load_still_writes_cache() {
        LocalSet::new()
            .run_until(async {
                let f = fixture(CachePolicy::CacheFirst, Duration::from_millis(50));
                let m = matched(&f, "/users/1");

                drop(f.loader.load(&m, &NavContext::new(), false));
                f.scheduler.sleep(Duration::from_millis(100)).await;

                assert!(f.cache.borrow().contains(&m.cache_key));
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_bypasses_cache() {
        LocalSet::new()
            .run_until(async {
                let f = fixture(CachePolicy::CacheFirst, Duration::ZERO);
                let m = matched(&f, "/users/1");

                load(&f, "/users/1").await.1.unwrap();
                let handle = f.loader.load(&m, &NavContext::new(), true);
                assert_eq!(handle.status(), CacheStatus::Bypass);
                handle.into_data().await.unwrap();

                assert_eq!(f.calls.get(), 2);
            })
            .await;
    }

    // === Initial Request Tests ===

    #[tokio::test(start_paused = true)]
    async fn test_initial_request_consumes_seeded_no_cache_once() {
        LocalSet::new()
            .run_until(async {
                let f = fixture(CachePolicy::NoCache, Duration::ZERO);
                let m = matched(&f, "/users/1");

                let mut snapshot = CacheSnapshot::new();
                snapshot.insert(
                    m.cache_key.clone(),
                    CachedData::new(
                        json!({"seeded": true}),
                        m.location.clone(),
                        CachePolicy::NoCache,
                        Duration::from_secs(60),
                        Duration::ZERO,
                    ),
                );
                f.cache.borrow_mut().hydrate(snapshot, f.scheduler.now());
                f.loader.rearm_initial();

                let (status, data) = load(&f, "/users/1").await;
                assert_eq!(status, CacheStatus::Initial);
                assert_eq!(data.unwrap(), json!({"seeded": true}));
                assert!(f.cache.borrow().is_empty());
                assert_eq!(f.calls.get(), 0);
                assert!(!f.loader.is_initial());

                let (status, _) = load(&f, "/users/1").await;
                assert_eq!(status, CacheStatus::Miss);
                assert_eq!(f.calls.get(), 1);
            })
            .await;
    }

    // === Offline Retry Tests ===

    fn offline_fixture(failures: u32, policy: CachePolicy) -> (Fixture, Rc<RefCell<Vec<Duration>>>) {
        let mut f = fixture(policy, Duration::ZERO);
        let attempts = Rc::new(RefCell::new(Vec::new()));
        let remaining = Rc::new(Cell::new(failures));

        let log = attempts.clone();
        let clock = f.scheduler.clone();
        f.registry.clear();
        f.registry.register(
            RouteBuilder::new("/feed")
                .with_cache_policy(policy)
                .with_load_fn(move |_| {
                    log.borrow_mut().push(clock.now());
                    let fail = remaining.get() > 0;
                    if fail {
                        remaining.set(remaining.get() - 1);
                    }
                    async move {
                        if fail {
                            Err(RouteError::Offline("no network".into()))
                        } else {
                            Ok(json!("fresh"))
                        }
                    }
                })
                .build()
                .unwrap(),
        );
        (f, attempts)
    }

    #[tokio::test(start_paused = true)]
    async fn test_offline_retried_once_after_delay() {
        LocalSet::new()
            .run_until(async {
                let (f, attempts) = offline_fixture(1, CachePolicy::NoCache);

                let (_, data) = load(&f, "/feed").await;
                assert_eq!(data.unwrap(), json!("fresh"));

                let attempts = attempts.borrow();
                assert_eq!(attempts.len(), 2);
                assert_eq!(attempts[1] - attempts[0], Duration::from_secs(1));
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_offline_twice_propagates_without_cache() {
        LocalSet::new()
            .run_until(async {
                let (f, attempts) = offline_fixture(2, CachePolicy::NoCache);

                let (_, data) = load(&f, "/feed").await;
                assert!(data.unwrap_err().is_offline());
                assert_eq!(attempts.borrow().len(), 2);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_offline_twice_falls_back_to_cached() {
        LocalSet::new()
            .run_until(async {
                let (f, _) = offline_fixture(0, CachePolicy::NetworkFirst);
                load(&f, "/feed").await.1.unwrap();

                let (f2, _) = offline_fixture(2, CachePolicy::NetworkFirst);
                // Share the populated cache with a loader that now fails.
                let loader = DataLoader::new(f.cache.clone(), f2.scheduler.clone());
                loader.initial.set(false);
                let m = matched(&f2, "/feed");
                let data = loader.load(&m, &NavContext::new(), false).into_data().await;

                assert_eq!(data.unwrap(), json!("fresh"));
            })
            .await;
    }

    // === use_data Tests ===

    #[tokio::test(start_paused = true)]
    async fn test_use_data_prefers_cache_then_in_flight() {
        LocalSet::new()
            .run_until(async {
                let f = fixture(CachePolicy::CacheFirst, Duration::from_millis(50));
                let m = matched(&f, "/users/2");

                let pending = f.loader.load(&m, &NavContext::new(), false);
                let attached = f.loader.use_data(&m);
                assert_eq!(attached.status(), CacheStatus::InFlight);

                let (a, b) = futures::join!(pending.into_data(), attached.into_data());
                assert_eq!(a.unwrap(), b.unwrap());

                let cached = f.loader.use_data(&m);
                assert_eq!(cached.status(), CacheStatus::Hit);
                assert_eq!(f.calls.get(), 1);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_use_data_does_not_consume_initial_rule() {
        LocalSet::new()
            .run_until(async {
                let f = fixture(CachePolicy::CacheFirst, Duration::ZERO);
                f.loader.rearm_initial();

                f.loader.use_data(&matched(&f, "/users/3")).into_data().await.unwrap();
                assert!(f.loader.is_initial());
            })
            .await;
    }
}
