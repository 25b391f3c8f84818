//! The navigation state machine.
//!
//! One attempt runs per accepted history change:
//!
//! ```text
//! Start -> unload guards -> match -> before-load -> meta
//!       -> cached view? -> data vs pending timer -> data -> mount -> Idle
//! ```
//!
//! Attempts are not serialized. A newer history change starts a new attempt,
//! and the older one notices at its next checkpoint that its location key
//! is no longer current and stops touching views and metadata.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use futures::future::{FutureExt, LocalBoxFuture, Shared};
use serde_json::Value;
use waypoint_cache::{CacheSnapshot, SharedCache};
use waypoint_core::{
    LifecycleObserver, Location, LocationKey, NavigationPhase, Query, RouteError, RouterConfig,
};
use waypoint_data::DataLoader;
use waypoint_executor::{dispatch_error, race_timeout, Raced, SharedScheduler, TimerHandle};
use waypoint_observability::{
    EventEmitter, MetricsCollector, NavigationEvent, NavigationMetrics, NavigationRecorder,
    StructuredLogger,
};
use waypoint_router::{
    match_not_found, resolve_location, BeforeLoad, FormProperties, NavArgs, NavContext, Params,
    RouteRegistry, Segment,
};

use crate::blocker::{BlockerSet, NavigationBlocker};
use crate::context::RoutingContext;
use crate::history::{HistoryAction, HistoryEvent, ListenerId, SharedHistory};
use crate::meta::MetaSink;
use crate::transition::{TransitionHost, TransitionScope};
use crate::view::{ViewHandle, ViewMounter, ViewTable, ViewTarget};

/// Receives errors from attempts that had no view to show them.
pub type ErrorHandler = Rc<dyn Fn(&RouteError)>;

/// Result of a navigation attempt.
pub type AttemptResult = Result<NavigationOutcome, RouteError>;

/// How a navigation attempt concluded.
#[derive(Debug, Clone)]
pub enum NavigationOutcome {
    /// The route's view was mounted.
    Mounted(ViewHandle),
    /// A cached view was reused with its context updated in place.
    CachedView {
        /// The reused view.
        view: ViewHandle,
        /// The view was already open, so nothing was mounted.
        already_open: bool,
    },
    /// The route's error or not-found view was mounted.
    ErrorView {
        /// The mounted error view.
        view: ViewHandle,
        /// The error it shows.
        error: RouteError,
    },
    /// A before-load hook redirected to another location.
    Redirected(Location),
    /// An unload guard vetoed the change and history was rolled back.
    Blocked,
    /// A newer navigation superseded this one.
    Stale,
}

impl NavigationOutcome {
    /// Short name used in logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Mounted(_) => "mounted",
            Self::CachedView { .. } => "cached_view",
            Self::ErrorView { .. } => "error_view",
            Self::Redirected(_) => "redirected",
            Self::Blocked => "blocked",
            Self::Stale => "stale",
        }
    }
}

/// A running navigation attempt.
#[derive(Clone)]
pub struct NavigationHandle {
    location: Location,
    cancelled: Rc<Cell<bool>>,
    outcome: Shared<LocalBoxFuture<'static, AttemptResult>>,
}

impl NavigationHandle {
    /// The location being navigated to.
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// The attempt's history key.
    pub fn key(&self) -> &LocationKey {
        &self.location.key
    }

    /// Stop the attempt at its next checkpoint. It concludes as
    /// [`NavigationOutcome::Stale`] without mounting views or updating
    /// metadata; data loads it started still populate the cache.
    pub fn cancel(&self) {
        self.cancelled.set(true);
    }

    /// Whether [`cancel`](Self::cancel) was called.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }

    /// Whether the attempt has concluded.
    pub fn is_finished(&self) -> bool {
        self.outcome.peek().is_some()
    }

    /// Wait for the attempt to conclude.
    pub async fn finished(self) -> AttemptResult {
        self.outcome.await
    }
}

impl fmt::Debug for NavigationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NavigationHandle")
            .field("location", &self.location.to_url())
            .field("cancelled", &self.is_cancelled())
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// Result of a programmatic navigation request.
#[derive(Debug, Clone)]
pub enum NavigateResult {
    /// History changed and an attempt started.
    Started(NavigationHandle),
    /// The target is the current location; nothing happened.
    Unchanged,
    /// A navigation blocker is active; nothing happened.
    Blocked,
}

/// Payload delivered with `navigate`, `pending` and `idle` events.
#[derive(Debug, Clone)]
pub struct NavigationPayload {
    /// Location being navigated to.
    pub location: Location,
    /// Parsed path params.
    pub params: Params,
    /// Parsed query.
    pub query: Query,
    /// Navigation context at the start of the attempt.
    pub nav_context: NavContext,
    /// The attempt's routing context.
    pub context: RoutingContext,
}

impl NavigationPayload {
    fn new(context: &RoutingContext) -> Self {
        Self {
            location: context.location(),
            params: context.params(),
            query: context.query(),
            nav_context: context.nav_context(),
            context: context.clone(),
        }
    }
}

/// Everything the engine is assembled from. Built by `RouterApp`.
pub(crate) struct EngineParts {
    pub config: RouterConfig,
    pub registry: Rc<RouteRegistry>,
    pub cache: SharedCache,
    pub loader: DataLoader,
    pub history: SharedHistory,
    pub mounter: Rc<dyn ViewMounter>,
    pub meta: Option<Rc<dyn MetaSink>>,
    pub transitions: Option<Rc<dyn TransitionHost>>,
    pub scheduler: SharedScheduler,
    pub blockers: Rc<BlockerSet>,
    pub observers: Vec<Rc<dyn LifecycleObserver>>,
    pub error_handler: Option<ErrorHandler>,
    pub startup_cache: Option<CacheSnapshot>,
}

#[derive(Default)]
struct EngineState {
    current: Option<RoutingContext>,
    views: ViewTable,
    undoing: bool,
    pending_args: Option<(NavContext, FormProperties)>,
    last_attempt: Option<NavigationHandle>,
    attempts: u64,
    listener: Option<ListenerId>,
}

struct EngineInner {
    config: RouterConfig,
    registry: Rc<RouteRegistry>,
    cache: SharedCache,
    loader: DataLoader,
    history: SharedHistory,
    mounter: Rc<dyn ViewMounter>,
    meta: Option<Rc<dyn MetaSink>>,
    transitions: Option<Rc<dyn TransitionHost>>,
    transition_active: Rc<Cell<bool>>,
    scheduler: SharedScheduler,
    blockers: Rc<BlockerSet>,
    events: EventEmitter<NavigationPayload>,
    observers: Vec<Rc<dyn LifecycleObserver>>,
    error_handler: Option<ErrorHandler>,
    startup_cache: RefCell<Option<CacheSnapshot>>,
    metrics: RefCell<MetricsCollector>,
    state: RefCell<EngineState>,
}

/// Per-attempt logging, metrics and cancellation.
struct AttemptLog {
    logger: StructuredLogger,
    recorder: NavigationRecorder,
    cancelled: Rc<Cell<bool>>,
}

/// Drives navigation attempts from history changes.
///
/// Cheap to clone; clones share the engine.
#[derive(Clone)]
pub struct NavigationEngine {
    inner: Rc<EngineInner>,
}

impl NavigationEngine {
    pub(crate) fn from_parts(parts: EngineParts) -> Self {
        let metrics = MetricsCollector::new(parts.config.metrics_capacity);
        Self {
            inner: Rc::new(EngineInner {
                config: parts.config,
                registry: parts.registry,
                cache: parts.cache,
                loader: parts.loader,
                history: parts.history,
                mounter: parts.mounter,
                meta: parts.meta,
                transitions: parts.transitions,
                transition_active: Rc::new(Cell::new(false)),
                scheduler: parts.scheduler,
                blockers: parts.blockers,
                events: EventEmitter::new(),
                observers: parts.observers,
                error_handler: parts.error_handler,
                startup_cache: RefCell::new(parts.startup_cache),
                metrics: RefCell::new(metrics),
                state: RefCell::new(EngineState::default()),
            }),
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Hydrate the startup cache, listen to history and navigate to the
    /// current location.
    pub fn start(&self) -> NavigationHandle {
        if let Some(snapshot) = self.inner.startup_cache.borrow_mut().take() {
            tracing::debug!(entries = snapshot.len(), "hydrating startup cache");
            self.inner
                .cache
                .borrow_mut()
                .hydrate(snapshot, self.inner.scheduler.now());
        }

        if self.inner.state.borrow().listener.is_none() {
            let weak = Rc::downgrade(&self.inner);
            let id = self.inner.history.listen(Rc::new(move |event: &HistoryEvent| {
                if let Some(inner) = weak.upgrade() {
                    NavigationEngine { inner }.on_history_event(event);
                }
            }));
            self.inner.state.borrow_mut().listener = Some(id);
        }

        let location = self.inner.history.location();
        self.begin_attempt(location, None)
    }

    /// Stop listening to history.
    pub fn stop(&self) {
        let listener = self.inner.state.borrow_mut().listener.take();
        if let Some(id) = listener {
            self.inner.history.unlisten(id);
        }
    }

    /// Clear cached data, cached views, the view/context table and the
    /// current context, and re-arm the initial-request rule.
    pub fn reset(&self) {
        self.inner.cache.borrow_mut().clear();
        {
            let mut state = self.inner.state.borrow_mut();
            state.views.clear();
            state.current = None;
            state.pending_args = None;
        }
        self.inner.loader.rearm_initial();
        tracing::debug!("navigation engine reset");
    }

    fn on_history_event(&self, event: &HistoryEvent) {
        {
            let mut state = self.inner.state.borrow_mut();
            if state.undoing {
                tracing::debug!(location = %event.location, "history rollback settled");
                state.undoing = false;
                return;
            }
            if self.inner.blockers.is_blocking() {
                if let Some(delta) = event.delta {
                    tracing::debug!(delta, "navigation blocked, rolling back");
                    state.undoing = true;
                    drop(state);
                    self.inner.history.go(-delta);
                } else {
                    tracing::debug!("navigation blocked without delta, reloading");
                    drop(state);
                    self.inner.history.reload();
                }
                return;
            }
        }

        self.begin_attempt(event.location.clone(), Some(event.clone()));
    }

    fn begin_attempt(&self, location: Location, event: Option<HistoryEvent>) -> NavigationHandle {
        let (nav_context, form_properties) = self
            .inner
            .state
            .borrow_mut()
            .pending_args
            .take()
            .unwrap_or_default();

        let cancelled = Rc::new(Cell::new(false));
        let engine = self.clone();
        let target = location.clone();
        let flag = cancelled.clone();
        let outcome = async move {
            engine
                .run_attempt(target, event, nav_context, form_properties, flag)
                .await
        }
        .boxed_local()
        .shared();

        let handle = NavigationHandle {
            location,
            cancelled,
            outcome: outcome.clone(),
        };
        {
            let mut state = self.inner.state.borrow_mut();
            state.last_attempt = Some(handle.clone());
            state.attempts += 1;
        }

        let error_handler = self.inner.error_handler.clone();
        self.inner.scheduler.spawn(
            async move {
                if let Err(err) = outcome.await {
                    match error_handler {
                        Some(handler) => handler(&err),
                        None => tracing::error!(error = %err, "unhandled navigation error"),
                    }
                }
            }
            .boxed_local(),
        );

        handle
    }

    // ========================================================================
    // Navigation API
    // ========================================================================

    /// Navigate to a path, pattern or relative target.
    pub fn navigate(&self, args: NavArgs) -> Result<NavigateResult, RouteError> {
        if self.inner.state.borrow().listener.is_none() {
            return Err(RouteError::msg("navigation engine is not started"));
        }
        if self.inner.blockers.is_blocking() {
            tracing::debug!("navigation refused while blocked");
            return Ok(NavigateResult::Blocked);
        }

        let current = self.inner.history.location();
        let location = resolve_location(&args, Some(&current))?;
        if location.is_route_equivalent(&current) {
            tracing::debug!(location = %location, "already at location");
            return Ok(NavigateResult::Unchanged);
        }

        let attempts = {
            let mut state = self.inner.state.borrow_mut();
            state.pending_args = Some((args.nav_context, args.form_properties));
            state.attempts
        };

        if args.replace {
            self.inner.history.replace(location);
        } else {
            self.inner.history.push(location);
        }

        let started = {
            let mut state = self.inner.state.borrow_mut();
            state.pending_args = None;
            if state.attempts != attempts {
                state.last_attempt.clone()
            } else {
                None
            }
        };
        Ok(match started {
            Some(handle) => NavigateResult::Started(handle),
            None => NavigateResult::Unchanged,
        })
    }

    /// Navigate to the route that mounts `view`.
    pub fn open_view(
        &self,
        view: &str,
        form_properties: FormProperties,
    ) -> Result<NavigateResult, RouteError> {
        let route = self
            .inner
            .registry
            .route_for_view(view)
            .ok_or_else(|| RouteError::NotFound(format!("no route mounts view {}", view)))?;
        let path = route
            .path()
            .ok_or_else(|| RouteError::NotFound(format!("no route mounts view {}", view)))?;

        if route
            .segments()
            .iter()
            .any(|segment| matches!(segment, Segment::Param(_)))
        {
            return Err(RouteError::InvalidPathParams(format!(
                "route {} for view {} requires path params",
                path, view
            )));
        }

        self.navigate(NavArgs::to(path).with_form_properties(form_properties))
    }

    /// Mark the cached data for a navigation target stale. Returns whether
    /// an entry was cached.
    pub fn invalidate(&self, args: &NavArgs) -> Result<bool, RouteError> {
        let current = self.inner.history.location();
        let matched = self.inner.registry.match_nav_args(args, Some(&current))?;
        Ok(self.inner.cache.borrow_mut().invalidate(&matched.cache_key))
    }

    /// Cached, in-flight or freshly loaded data for a navigation target.
    pub async fn use_data(&self, args: &NavArgs) -> Result<Value, RouteError> {
        let current = self.inner.history.location();
        let matched = self.inner.registry.match_nav_args(args, Some(&current))?;
        self.inner.loader.use_data(&matched).into_data().await
    }

    /// Create a navigation blocker.
    pub fn blocker(&self, warn_before_unload: bool) -> NavigationBlocker {
        NavigationBlocker::new(self.inner.blockers.clone(), warn_before_unload)
    }

    // ========================================================================
    // Views and contexts
    // ========================================================================

    /// The routing context associated with a mounted view.
    pub fn context_for_view(&self, view: ViewHandle) -> Option<RoutingContext> {
        self.inner.state.borrow().views.context_for(view)
    }

    /// Report that the host unmounted a view.
    pub fn view_unmounted(&self, view: ViewHandle) -> Option<RoutingContext> {
        self.inner.state.borrow_mut().views.unmounted(view)
    }

    /// The current routing context.
    pub fn current_context(&self) -> Option<RoutingContext> {
        self.inner.state.borrow().current.clone()
    }

    /// The most recently started attempt.
    pub fn last_attempt(&self) -> Option<NavigationHandle> {
        self.inner.state.borrow().last_attempt.clone()
    }

    /// Number of cached views.
    pub fn cached_view_count(&self) -> usize {
        self.inner.state.borrow().views.cached_len()
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Navigation event handlers.
    pub fn events(&self) -> &EventEmitter<NavigationPayload> {
        &self.inner.events
    }

    /// The data cache.
    pub fn cache(&self) -> &SharedCache {
        &self.inner.cache
    }

    /// The route registry.
    pub fn registry(&self) -> &RouteRegistry {
        &self.inner.registry
    }

    /// The history.
    pub fn history(&self) -> &SharedHistory {
        &self.inner.history
    }

    /// Engine configuration.
    pub fn config(&self) -> &RouterConfig {
        &self.inner.config
    }

    /// Metrics of recent attempts, oldest first.
    pub fn metrics(&self) -> Vec<NavigationMetrics> {
        self.inner.metrics.borrow().recent().cloned().collect()
    }

    // ========================================================================
    // Attempt
    // ========================================================================

    async fn run_attempt(
        &self,
        location: Location,
        event: Option<HistoryEvent>,
        nav_context: NavContext,
        form_properties: FormProperties,
        cancelled: Rc<Cell<bool>>,
    ) -> AttemptResult {
        let mut log = AttemptLog {
            logger: StructuredLogger::new(location.key.clone()).with_path(location.to_url()),
            recorder: NavigationRecorder::new(&location, self.inner.scheduler.now()),
            cancelled,
        };
        self.observe(&mut log, NavigationPhase::Start);

        let result = self
            .enter(&location, event.as_ref(), nav_context, form_properties, &mut log)
            .await;

        let outcome = match &result {
            Ok(outcome) => outcome.name(),
            Err(err) => {
                log.recorder.record_error(err.to_string());
                self.observe(&mut log, NavigationPhase::Error(err.to_string()));
                "failed"
            }
        };
        self.observe(&mut log, NavigationPhase::Completion);

        let now = self.inner.scheduler.now();
        log.logger
            .info_builder("navigation concluded")
            .field("outcome", outcome)
            .duration_ms("elapsed_ms", log.recorder.elapsed(now))
            .emit();
        self.inner
            .metrics
            .borrow_mut()
            .record(log.recorder.finish(outcome, now));

        result
    }

    /// Guard check, matching and context setup around `run_navigation`.
    async fn enter(
        &self,
        location: &Location,
        event: Option<&HistoryEvent>,
        nav_context: NavContext,
        form_properties: FormProperties,
        log: &mut AttemptLog,
    ) -> AttemptResult {
        if self.is_stale(location, log) {
            self.observe(log, NavigationPhase::Stale);
            return Ok(NavigationOutcome::Stale);
        }

        let previous = self.current_context();
        if let Some(previous) = previous {
            if previous.prevent_unload() {
                log.logger.debug("navigation blocked by unload guard");
                self.stop_unload(event, &previous).await;
                self.observe(log, NavigationPhase::Blocked);
                return Ok(NavigationOutcome::Blocked);
            }
        }

        let (matched, not_found) = match self.inner.registry.match_location(location)? {
            Some(matched) => (matched, None),
            None => {
                let missing = RouteError::NotFound(format!("No match for '{}'", location.to_url()));
                match self.inner.registry.not_found_route() {
                    Some(fallback) => (match_not_found(location, fallback)?, Some(missing)),
                    None => return Err(missing),
                }
            }
        };

        let label = matched.route.label();
        log.logger.set_route(label.clone());
        log.recorder.set_route(label);
        self.observe(log, NavigationPhase::Matched);

        let context = RoutingContext::new(matched, nav_context, form_properties);
        if let Some(missing) = not_found {
            context.set_data(None, Some(missing));
        }
        self.inner.state.borrow_mut().current = Some(context.clone());

        self.gc();

        let payload = NavigationPayload::new(&context);
        self.schedule_event(NavigationEvent::Navigate, payload.clone());
        let pending = self.schedule_event(NavigationEvent::Pending, payload.clone());

        let result = self.run_navigation(&context, log).await;

        pending.cancel();
        self.schedule_event(NavigationEvent::Idle, payload);
        result
    }

    async fn run_navigation(&self, context: &RoutingContext, log: &mut AttemptLog) -> AttemptResult {
        let route = context.route();
        let location = context.location();

        match route.run_before_load(&context.loader_args()) {
            BeforeLoad::Ready(nav_context) => context.set_nav_context(nav_context),
            BeforeLoad::Redirect(target) => return self.redirect(target, log),
            BeforeLoad::NotFound(message) => {
                return self.handle_error(context, RouteError::NotFound(message), log)
            }
            BeforeLoad::Error(err) => return self.handle_error(context, err, log),
        }
        self.observe(log, NavigationPhase::BeforeLoad);

        if let Some(outcome) = self.reuse_cached_view(context, log)? {
            return Ok(outcome);
        }

        let handle = self
            .inner
            .loader
            .load(&context.matched(), &context.nav_context(), false);
        log.recorder.set_cache_status(handle.status());
        log.logger
            .debug_builder("loading route data")
            .field("cache_status", handle.status().to_string())
            .emit();

        let raced = race_timeout(
            self.inner.scheduler.as_ref(),
            handle.into_data(),
            route.pending_delay(),
        )
        .await;

        if self.is_stale(&location, log) {
            self.observe(log, NavigationPhase::Stale);
            return Ok(NavigationOutcome::Stale);
        }

        let result = match raced {
            Raced::Completed(result) => result,
            Raced::TimedOut(data) => {
                if let Some(pending_view) = route.pending_view() {
                    log.logger
                        .debug_builder("exceeded pending delay")
                        .duration_ms("pending_delay_ms", route.pending_delay())
                        .field("view", pending_view)
                        .emit();
                    if let Err(err) = self.mount(ViewTarget::New(pending_view.to_string()), context) {
                        return self.handle_error(context, err, log);
                    }
                    log.recorder.record_pending_shown();
                    self.observe(log, NavigationPhase::PendingShown);
                    self.inner.scheduler.sleep(route.pending_min()).await;
                }
                data.await
            }
        };

        match result {
            // A fallback context keeps its not-found error.
            Ok(data) => context.set_data(Some(data), context.error()),
            Err(err) => return self.handle_error(context, err, log),
        }
        self.observe(log, NavigationPhase::DataReady);

        if self.is_stale(&location, log) {
            self.observe(log, NavigationPhase::Stale);
            return Ok(NavigationOutcome::Stale);
        }

        // Metadata goes out before the view mounts.
        if let Err(err) = self.apply_meta(context) {
            return self.handle_error(context, err, log);
        }

        let Some(view) = route.view() else {
            let err = RouteError::msg(format!("route {} has no view", route.label()));
            return self.handle_error(context, err, log);
        };

        match self.mount(ViewTarget::New(view.to_string()), context) {
            Ok(handle) => {
                {
                    let mut state = self.inner.state.borrow_mut();
                    state.views.associate(handle, context.clone());
                    if route.cache_view() {
                        state.views.cache_view(context.cache_key(), handle);
                    }
                }
                self.observe(log, NavigationPhase::ViewMounted);
                Ok(NavigationOutcome::Mounted(handle))
            }
            Err(err) => self.handle_error(context, err, log),
        }
    }

    fn reuse_cached_view(
        &self,
        context: &RoutingContext,
        log: &mut AttemptLog,
    ) -> Result<Option<NavigationOutcome>, RouteError> {
        let key = context.cache_key();
        let (view, cached_context) = {
            let mut state = self.inner.state.borrow_mut();
            let Some(view) = state.views.cached_view(&key) else {
                return Ok(None);
            };
            match state.views.context_for(view) {
                Some(cached_context) => (view, cached_context),
                None => {
                    state.views.forget_cached(&key);
                    return Ok(None);
                }
            }
        };

        log.logger
            .debug_builder("reusing cached view")
            .field("view", view.to_string())
            .emit();
        if let Err(err) = self.apply_meta(context) {
            return self.handle_error(context, err, log).map(Some);
        }
        // The reused view keeps the data it was mounted with.
        context.set_data(cached_context.data(), cached_context.error());
        cached_context.update_from(context);
        self.inner.state.borrow_mut().current = Some(cached_context.clone());

        let already_open = self.inner.mounter.open_view() == Some(view);
        if !already_open {
            self.mount(ViewTarget::Existing(view), &cached_context)?;
        }
        self.observe(log, NavigationPhase::ViewMounted);

        Ok(Some(NavigationOutcome::CachedView { view, already_open }))
    }

    fn redirect(&self, target: NavArgs, log: &mut AttemptLog) -> AttemptResult {
        let current = self.inner.history.location();
        let location = resolve_location(&target, Some(&current))?;
        self.observe(log, NavigationPhase::Redirect(location.to_url()));
        log.logger
            .debug_builder("redirecting")
            .field("to", location.to_url())
            .emit();

        match self.navigate(target.replacing())? {
            NavigateResult::Blocked => Ok(NavigationOutcome::Blocked),
            NavigateResult::Started(_) | NavigateResult::Unchanged => {
                Ok(NavigationOutcome::Redirected(location))
            }
        }
    }

    /// Show the route's error or not-found view, or hand the error back.
    fn handle_error(
        &self,
        context: &RoutingContext,
        error: RouteError,
        log: &mut AttemptLog,
    ) -> AttemptResult {
        if self.is_stale(&context.location(), log) {
            self.observe(log, NavigationPhase::Stale);
            return Ok(NavigationOutcome::Stale);
        }

        log.logger
            .debug_builder("navigation error")
            .field("error", error.to_string())
            .emit();
        context.set_data(None, Some(error.clone()));

        let route = context.route();
        let dispatch = dispatch_error(&error, route.not_found_view(), route.error_view());
        let Some(view) = dispatch.view() else {
            return Err(error);
        };

        let handle = self.mount(ViewTarget::New(view.to_string()), context)?;
        self.inner
            .state
            .borrow_mut()
            .views
            .associate(handle, context.clone());
        self.observe(log, NavigationPhase::ViewMounted);

        Ok(NavigationOutcome::ErrorView {
            view: handle,
            error,
        })
    }

    /// Undo the history change a vetoed attempt came from.
    async fn stop_unload(&self, event: Option<&HistoryEvent>, previous: &RoutingContext) {
        enum Undo {
            Go(i64),
            Replace(Location),
        }

        let undo = event.and_then(|event| match (event.action, event.delta) {
            (HistoryAction::Pop, Some(delta)) => Some(Undo::Go(-delta)),
            (HistoryAction::Pop, None) => None,
            (HistoryAction::Push, _) => Some(Undo::Go(-1)),
            (HistoryAction::Replace, _) => Some(Undo::Replace(previous.location())),
        });

        if let Some(undo) = undo {
            self.inner.state.borrow_mut().undoing = true;
            match undo {
                Undo::Go(delta) => self.inner.history.go(delta),
                Undo::Replace(location) => self.inner.history.replace(location),
            }
        }

        self.inner.scheduler.sleep(Duration::ZERO).await;
    }

    /// Push the route's metadata to the sink. Routes without a meta hook
    /// leave the sink untouched.
    fn apply_meta(&self, context: &RoutingContext) -> Result<(), RouteError> {
        let route = context.route();
        let meta = route.meta(&context.loader_args())?;
        if let (true, Some(sink)) = (route.has_meta(), &self.inner.meta) {
            sink.update(&meta);
        }
        Ok(())
    }

    fn mount(&self, target: ViewTarget, context: &RoutingContext) -> Result<ViewHandle, RouteError> {
        let _scope = TransitionScope::enter(
            self.inner.transitions.as_ref(),
            self.inner.config.view_transitions,
            &self.inner.transition_active,
        );
        Ok(self.inner.mounter.mount(target, context)?)
    }

    /// Whether the attempt was superseded by a newer history entry or
    /// cancelled through its handle.
    fn is_stale(&self, location: &Location, log: &AttemptLog) -> bool {
        let stale =
            log.cancelled.get() || location.key != self.inner.history.location().key;
        if stale {
            tracing::debug!(location = %location, "stale navigation detected");
        }
        stale
    }

    /// Evict expired cache entries and the views cached under them.
    fn gc(&self) {
        let evicted = self
            .inner
            .cache
            .borrow_mut()
            .gc(self.inner.scheduler.now());
        if evicted.is_empty() {
            return;
        }

        let mut state = self.inner.state.borrow_mut();
        for key in &evicted {
            tracing::debug!(key = %key, "released from the cache");
            state.views.forget_cached(key);
        }
    }

    fn schedule_event(&self, event: NavigationEvent, payload: NavigationPayload) -> TimerHandle {
        let engine = self.clone();
        self.inner.scheduler.set_timeout(
            Duration::ZERO,
            Box::new(move || engine.inner.events.emit(event, &payload)),
        )
    }

    fn observe(&self, log: &mut AttemptLog, phase: NavigationPhase) {
        let now = self.inner.scheduler.now();
        log.recorder.mark(phase.name(), now);
        let elapsed = log.recorder.elapsed(now);
        for observer in &self.inner.observers {
            observer.on_phase(&phase, elapsed);
        }
    }
}

impl fmt::Debug for NavigationEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("NavigationEngine")
            .field("routes", &self.inner.registry.len())
            .field("current", &state.current)
            .field("views", &state.views)
            .field("blockers", &self.inner.blockers)
            .finish()
    }
}
