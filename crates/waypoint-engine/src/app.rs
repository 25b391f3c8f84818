//! RouterApp configuration and setup.

use std::rc::Rc;

use waypoint_cache::{CacheSnapshot, DataCache, SharedCache};
use waypoint_core::{LifecycleObserver, RouteError, RouterConfig};
use waypoint_data::{DataLoader, RetryPolicy};
use waypoint_executor::SharedScheduler;
use waypoint_router::{Route, RouteBuilder, RouteRegistry};

use crate::blocker::{BlockerSet, UnloadHost};
use crate::engine::{EngineParts, ErrorHandler, NavigationEngine};
use crate::history::SharedHistory;
use crate::meta::MetaSink;
use crate::transition::TransitionHost;
use crate::view::ViewMounter;

/// Router application builder.
///
/// Collects routes and host collaborators, then builds the
/// [`NavigationEngine`].
///
/// # Example
///
/// ```rust,ignore
/// let app = RouterApp::new(history, mounter, TokioScheduler::shared())
///     .with_config(RouterConfig::from_toml_str(source)?)
///     .with_meta_sink(meta);
/// let home = app.builder("/").with_view("Home").build()?;
/// let engine = app.route(home).build();
/// ```
pub struct RouterApp {
    config: RouterConfig,
    routes: RouteRegistry,
    history: SharedHistory,
    mounter: Rc<dyn ViewMounter>,
    scheduler: SharedScheduler,
    cache: Option<SharedCache>,
    meta: Option<Rc<dyn MetaSink>>,
    transitions: Option<Rc<dyn TransitionHost>>,
    unload: Option<Rc<dyn UnloadHost>>,
    observers: Vec<Rc<dyn LifecycleObserver>>,
    error_handler: Option<ErrorHandler>,
    startup_cache: Option<CacheSnapshot>,
    retry: Option<RetryPolicy>,
}

impl RouterApp {
    /// Create an app over a history, a view mounter and a scheduler.
    pub fn new(
        history: SharedHistory,
        mounter: Rc<dyn ViewMounter>,
        scheduler: SharedScheduler,
    ) -> Self {
        Self {
            config: RouterConfig::default(),
            routes: RouteRegistry::new(),
            history,
            mounter,
            scheduler,
            cache: None,
            meta: None,
            transitions: None,
            unload: None,
            observers: Vec::new(),
            error_handler: None,
            startup_cache: None,
            retry: None,
        }
    }

    /// Set the engine configuration.
    pub fn with_config(mut self, config: RouterConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a route. Routes match in specificity order, not
    /// registration order.
    pub fn route(mut self, route: Route) -> Self {
        self.routes.register(route);
        self
    }

    /// A route builder carrying this app's configured defaults.
    pub fn builder(&self, path: impl Into<String>) -> RouteBuilder {
        RouteBuilder::new(path).with_defaults(&self.config)
    }

    /// Share an existing data cache.
    pub fn with_cache(mut self, cache: SharedCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Receive document metadata.
    pub fn with_meta_sink(mut self, sink: Rc<dyn MetaSink>) -> Self {
        self.meta = Some(sink);
        self
    }

    /// Run mounts inside host view transitions.
    pub fn with_transition_host(mut self, host: Rc<dyn TransitionHost>) -> Self {
        self.transitions = Some(host);
        self
    }

    /// Install the unload warning while warning blockers are active.
    pub fn with_unload_host(mut self, host: Rc<dyn UnloadHost>) -> Self {
        self.unload = Some(host);
        self
    }

    /// Add a lifecycle observer.
    pub fn with_observer(mut self, observer: Rc<dyn LifecycleObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Handle errors no error view could show.
    pub fn with_error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&RouteError) + 'static,
    {
        self.error_handler = Some(Rc::new(handler));
        self
    }

    /// Cache snapshot embedded by the server, consumed on start.
    pub fn with_startup_cache(mut self, snapshot: CacheSnapshot) -> Self {
        self.startup_cache = Some(snapshot);
        self
    }

    /// Override the offline retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Get the configuration.
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Get the route registry.
    pub fn routes(&self) -> &RouteRegistry {
        &self.routes
    }

    /// Build the navigation engine. Call [`NavigationEngine::start`] to
    /// begin routing.
    pub fn build(self) -> NavigationEngine {
        let cache = self.cache.unwrap_or_else(DataCache::shared);
        let retry = self
            .retry
            .unwrap_or_else(|| RetryPolicy::offline_once(self.config.offline_retry_delay));
        let loader = DataLoader::new(cache.clone(), self.scheduler.clone()).with_retry(retry);

        tracing::debug!(routes = self.routes.len(), "building navigation engine");

        NavigationEngine::from_parts(EngineParts {
            config: self.config,
            registry: Rc::new(self.routes),
            cache,
            loader,
            history: self.history,
            mounter: self.mounter,
            meta: self.meta,
            transitions: self.transitions,
            scheduler: self.scheduler,
            blockers: Rc::new(BlockerSet::new(self.unload)),
            observers: self.observers,
            error_handler: self.error_handler,
            startup_cache: self.startup_cache,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::context::RoutingContext;
    use crate::history::MemoryHistory;
    use crate::view::{ViewHandle, ViewTarget};
    use waypoint_executor::TokioScheduler;

    struct NullMounter;

    impl ViewMounter for NullMounter {
        fn mount(&self, _: ViewTarget, _: &RoutingContext) -> anyhow::Result<ViewHandle> {
            Ok(ViewHandle(0))
        }

        fn open_view(&self) -> Option<ViewHandle> {
            None
        }
    }

    fn app() -> RouterApp {
        RouterApp::new(
            MemoryHistory::shared("/"),
            Rc::new(NullMounter),
            TokioScheduler::shared(),
        )
    }

    // === RouterApp Tests ===

    #[test]
    fn test_router_app_new() {
        let app = app();

        assert_eq!(app.config(), &RouterConfig::default());
        assert!(app.routes().is_empty());
    }

    #[test]
    fn test_builder_uses_config_defaults() {
        let app = app().with_config(
            RouterConfig::new()
                .with_pending_delay(Duration::from_millis(250))
                .with_gc_time(Duration::from_secs(5)),
        );

        let route = app.builder("/users/:id").with_view("User").build().unwrap();

        assert_eq!(route.pending_delay(), Duration::from_millis(250));
        assert_eq!(route.cache().gc_time, Duration::from_secs(5));
    }

    #[test]
    fn test_route_registration() {
        let app = app()
            .route(RouteBuilder::new("/").with_view("Home").build().unwrap())
            .route(RouteBuilder::new("/about").with_view("About").build().unwrap());

        assert_eq!(app.routes().len(), 2);
    }

    #[test]
    fn test_build_engine() {
        let engine = app()
            .route(RouteBuilder::new("/").with_view("Home").build().unwrap())
            .with_config(RouterConfig::new().with_metrics_capacity(3))
            .build();

        assert_eq!(engine.registry().len(), 1);
        assert_eq!(engine.config().metrics_capacity, 3);
        assert!(engine.current_context().is_none());
    }
}
