//! Route definitions and their hooks.

use std::collections::BTreeMap;
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use waypoint_cache::{CachePolicy, RouteCachePolicy};
use waypoint_core::{Location, ParseError, Query, RouteError, RouterConfig};

use crate::navigate::NavArgs;
use crate::segment::{parse_segments, Segment};

/// Extracted path parameters (e.g., `id` from `/users/:id`).
pub type Params = BTreeMap<String, String>;

/// Navigation-scoped context accumulated by before-load hooks.
pub type NavContext = serde_json::Map<String, Value>;

/// Properties handed to the mounted view.
pub type FormProperties = serde_json::Map<String, Value>;

/// Document metadata (title, description, ...).
pub type Meta = BTreeMap<String, String>;

/// Arguments passed to every route hook and loader.
#[derive(Debug, Clone, Default)]
pub struct LoaderArgs {
    /// Location being navigated to.
    pub location: Location,
    /// Parsed path params.
    pub params: Params,
    /// Parsed query.
    pub query: Query,
    /// Context accumulated by before-load hooks.
    pub nav_context: NavContext,
}

/// Loads a route's data.
#[async_trait(?Send)]
pub trait RouteLoader {
    /// Load data for the given arguments.
    async fn load(&self, args: &LoaderArgs) -> Result<Value, RouteError>;
}

struct FnLoader<F>(F);

#[async_trait(?Send)]
impl<F, Fut> RouteLoader for FnLoader<F>
where
    F: Fn(LoaderArgs) -> Fut,
    Fut: Future<Output = Result<Value, RouteError>>,
{
    async fn load(&self, args: &LoaderArgs) -> Result<Value, RouteError> {
        (self.0)(args.clone()).await
    }
}

/// Outcome of a single before-load hook.
#[derive(Debug, Clone)]
pub enum HookResult {
    /// Proceed to the next hook.
    Continue,
    /// Abort and navigate elsewhere, replacing history.
    Redirect(NavArgs),
    /// The target does not exist.
    NotFound(String),
    /// The hook failed.
    Error(RouteError),
}

/// Outcome of running all of a route's before-load hooks.
#[derive(Debug, Clone)]
pub enum BeforeLoad {
    /// Every hook continued; carries the accumulated context.
    Ready(NavContext),
    /// A hook redirected.
    Redirect(NavArgs),
    /// A hook declared the target missing.
    NotFound(String),
    /// A hook failed.
    Error(RouteError),
}

/// Before-load hook. Receives the loader args and the accumulating context.
pub type BeforeLoadHook = Rc<dyn Fn(&LoaderArgs, &mut NavContext) -> HookResult>;
/// Metadata hook.
pub type MetaHook = Rc<dyn Fn(&LoaderArgs) -> Result<Meta, RouteError>>;
/// Typed query decoding hook.
pub type ParseQueryHook = Rc<dyn Fn(Query) -> Query>;
/// Typed params decoding hook.
pub type ParseParamsHook = Rc<dyn Fn(Params) -> Params>;
/// Cache dependency hook; must return a mapping.
pub type CacheDepsHook = Rc<dyn Fn(&Params, &Query) -> Value>;

/// A registered route. Immutable after `RouteBuilder::build`.
pub struct Route {
    path: Option<String>,
    segments: Vec<Segment>,
    view: Option<String>,
    error_view: Option<String>,
    not_found_view: Option<String>,
    pending_view: Option<String>,
    pending_delay: Duration,
    pending_min: Duration,
    cache: RouteCachePolicy,
    cache_view: bool,
    default_not_found: bool,
    before_load: Vec<BeforeLoadHook>,
    loader: Option<Rc<dyn RouteLoader>>,
    meta: Option<MetaHook>,
    parse_query: Option<ParseQueryHook>,
    parse_params: Option<ParseParamsHook>,
    cache_deps: Option<CacheDepsHook>,
}

impl Route {
    /// Path pattern, `None` for fallback-only routes.
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Parsed pattern segments.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// View mounted on success.
    pub fn view(&self) -> Option<&str> {
        self.view.as_deref()
    }

    /// View mounted on errors.
    pub fn error_view(&self) -> Option<&str> {
        self.error_view.as_deref()
    }

    /// View mounted on not-found errors.
    pub fn not_found_view(&self) -> Option<&str> {
        self.not_found_view.as_deref()
    }

    /// View shown while slow data loads.
    pub fn pending_view(&self) -> Option<&str> {
        self.pending_view.as_deref()
    }

    /// Delay before the pending view is shown.
    pub fn pending_delay(&self) -> Duration {
        self.pending_delay
    }

    /// Minimum display time of the pending view.
    pub fn pending_min(&self) -> Duration {
        self.pending_min
    }

    /// Cache settings.
    pub fn cache(&self) -> &RouteCachePolicy {
        &self.cache
    }

    /// Cache policy.
    pub fn cache_policy(&self) -> CachePolicy {
        self.cache.policy
    }

    /// Whether mounted views are kept for reuse.
    pub fn cache_view(&self) -> bool {
        self.cache_view
    }

    /// Whether this is the global not-found fallback.
    pub fn is_default_not_found(&self) -> bool {
        self.default_not_found
    }

    /// Whether the route declares a data loader.
    pub fn has_loader(&self) -> bool {
        self.loader.is_some()
    }

    /// The data loader, if any.
    pub fn loader(&self) -> Option<Rc<dyn RouteLoader>> {
        self.loader.clone()
    }

    /// Label for logs: the pattern, or the view for pathless routes.
    pub fn label(&self) -> String {
        match (&self.path, &self.view) {
            (Some(path), _) => path.clone(),
            (None, Some(view)) => format!("<{}>", view),
            (None, None) => "<anonymous>".to_string(),
        }
    }

    /// Run the before-load hooks in order, threading the nav context.
    pub fn run_before_load(&self, args: &LoaderArgs) -> BeforeLoad {
        let mut nav_context = args.nav_context.clone();
        for hook in &self.before_load {
            match hook(args, &mut nav_context) {
                HookResult::Continue => {}
                HookResult::Redirect(target) => return BeforeLoad::Redirect(target),
                HookResult::NotFound(message) => return BeforeLoad::NotFound(message),
                HookResult::Error(err) => return BeforeLoad::Error(err),
            }
        }
        BeforeLoad::Ready(nav_context)
    }

    /// Compute document metadata.
    pub fn meta(&self, args: &LoaderArgs) -> Result<Meta, RouteError> {
        match &self.meta {
            Some(hook) => hook(args),
            None => Ok(Meta::new()),
        }
    }

    /// Whether the route declares a metadata hook.
    pub fn has_meta(&self) -> bool {
        self.meta.is_some()
    }

    /// Decode the raw query.
    pub fn parse_query(&self, query: Query) -> Query {
        match &self.parse_query {
            Some(hook) => hook(query),
            None => query,
        }
    }

    /// Decode the raw params.
    pub fn parse_params(&self, params: Params) -> Params {
        match &self.parse_params {
            Some(hook) => hook(params),
            None => params,
        }
    }

    /// Data dependencies used for the cache key. Defaults to the query.
    pub fn cache_deps(&self, params: &Params, query: &Query) -> Value {
        match &self.cache_deps {
            Some(hook) => hook(params, query),
            None => Value::Object(query.clone()),
        }
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("path", &self.path)
            .field("view", &self.view)
            .field("cache", &self.cache)
            .field("cache_view", &self.cache_view)
            .field("before_load", &self.before_load.len())
            .field("has_loader", &self.loader.is_some())
            .finish()
    }
}

/// Builder for routes.
///
/// Builders are `Clone`: clone a base builder and append hooks to derive a
/// route whose base hooks run first.
///
/// # Example
///
/// ```rust,ignore
/// let authed = RouteBuilder::pathless().with_before_load(require_login);
/// let dashboard = authed.clone().with_path("/dashboard").with_view("Dashboard").build()?;
/// ```
#[derive(Clone)]
pub struct RouteBuilder {
    path: Option<String>,
    view: Option<String>,
    error_view: Option<String>,
    not_found_view: Option<String>,
    pending_view: Option<String>,
    pending_delay: Duration,
    pending_min: Duration,
    cache: RouteCachePolicy,
    cache_view: bool,
    default_not_found: bool,
    before_load: Vec<BeforeLoadHook>,
    loader: Option<Rc<dyn RouteLoader>>,
    meta: Option<MetaHook>,
    parse_query: Option<ParseQueryHook>,
    parse_params: Option<ParseParamsHook>,
    cache_deps: Option<CacheDepsHook>,
}

impl RouteBuilder {
    /// Start a route for a path pattern.
    pub fn new(path: impl Into<String>) -> Self {
        Self::pathless().with_path(path)
    }

    /// Start a route without a path (fallback or base builder).
    pub fn pathless() -> Self {
        let config = RouterConfig::default();
        Self {
            path: None,
            view: None,
            error_view: None,
            not_found_view: None,
            pending_view: None,
            pending_delay: config.pending_delay,
            pending_min: config.pending_min,
            cache: RouteCachePolicy::from_config(&config),
            cache_view: false,
            default_not_found: false,
            before_load: Vec::new(),
            loader: None,
            meta: None,
            parse_query: None,
            parse_params: None,
            cache_deps: None,
        }
    }

    /// Apply engine defaults for timings. Explicit setters called later win.
    pub fn with_defaults(mut self, config: &RouterConfig) -> Self {
        self.pending_delay = config.pending_delay;
        self.pending_min = config.pending_min;
        self.cache = self
            .cache
            .with_stale_time(config.stale_time)
            .with_gc_time(config.gc_time);
        self
    }

    /// Set the path pattern.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the view mounted on success.
    pub fn with_view(mut self, view: impl Into<String>) -> Self {
        self.view = Some(view.into());
        self
    }

    /// Set the error view.
    pub fn with_error_view(mut self, view: impl Into<String>) -> Self {
        self.error_view = Some(view.into());
        self
    }

    /// Set the not-found view.
    pub fn with_not_found_view(mut self, view: impl Into<String>) -> Self {
        self.not_found_view = Some(view.into());
        self
    }

    /// Set the pending view.
    pub fn with_pending_view(mut self, view: impl Into<String>) -> Self {
        self.pending_view = Some(view.into());
        self
    }

    /// Set the pending delay.
    pub fn with_pending_delay(mut self, delay: Duration) -> Self {
        self.pending_delay = delay;
        self
    }

    /// Set the pending minimum display time.
    pub fn with_pending_min(mut self, min: Duration) -> Self {
        self.pending_min = min;
        self
    }

    /// Set the cache policy.
    pub fn with_cache_policy(mut self, policy: CachePolicy) -> Self {
        self.cache = self.cache.with_policy(policy);
        self
    }

    /// Set the staleness threshold.
    pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.cache = self.cache.with_stale_time(stale_time);
        self
    }

    /// Set the cached data lifetime.
    pub fn with_gc_time(mut self, gc_time: Duration) -> Self {
        self.cache = self.cache.with_gc_time(gc_time);
        self
    }

    /// Keep mounted views for reuse.
    pub fn with_cache_view(mut self, enabled: bool) -> Self {
        self.cache_view = enabled;
        self
    }

    /// Mark as the global not-found fallback. Must be pathless.
    pub fn as_default_not_found(mut self) -> Self {
        self.default_not_found = true;
        self
    }

    /// Append a before-load hook.
    pub fn with_before_load<F>(mut self, hook: F) -> Self
    where
        F: Fn(&LoaderArgs, &mut NavContext) -> HookResult + 'static,
    {
        self.before_load.push(Rc::new(hook));
        self
    }

    /// Set the data loader.
    pub fn with_loader(mut self, loader: impl RouteLoader + 'static) -> Self {
        self.loader = Some(Rc::new(loader));
        self
    }

    /// Set the data loader from an async closure.
    pub fn with_load_fn<F, Fut>(self, load: F) -> Self
    where
        F: Fn(LoaderArgs) -> Fut + 'static,
        Fut: Future<Output = Result<Value, RouteError>> + 'static,
    {
        self.with_loader(FnLoader(load))
    }

    /// Set the metadata hook.
    pub fn with_meta<F>(mut self, meta: F) -> Self
    where
        F: Fn(&LoaderArgs) -> Result<Meta, RouteError> + 'static,
    {
        self.meta = Some(Rc::new(meta));
        self
    }

    /// Set the query decoding hook.
    pub fn with_parse_query<F>(mut self, parse: F) -> Self
    where
        F: Fn(Query) -> Query + 'static,
    {
        self.parse_query = Some(Rc::new(parse));
        self
    }

    /// Set the params decoding hook.
    pub fn with_parse_params<F>(mut self, parse: F) -> Self
    where
        F: Fn(Params) -> Params + 'static,
    {
        self.parse_params = Some(Rc::new(parse));
        self
    }

    /// Set the cache dependency hook.
    pub fn with_cache_deps<F>(mut self, deps: F) -> Self
    where
        F: Fn(&Params, &Query) -> Value + 'static,
    {
        self.cache_deps = Some(Rc::new(deps));
        self
    }

    /// Validate the pattern and build the route.
    pub fn build(self) -> Result<Route, ParseError> {
        let segments = match &self.path {
            Some(path) => {
                if self.default_not_found {
                    return Err(ParseError::PathedNotFound(path.clone()));
                }
                parse_segments(path)?
            }
            None => Vec::new(),
        };

        Ok(Route {
            path: self.path,
            segments,
            view: self.view,
            error_view: self.error_view,
            not_found_view: self.not_found_view,
            pending_view: self.pending_view,
            pending_delay: self.pending_delay,
            pending_min: self.pending_min,
            cache: self.cache,
            cache_view: self.cache_view,
            default_not_found: self.default_not_found,
            before_load: self.before_load,
            loader: self.loader,
            meta: self.meta,
            parse_query: self.parse_query,
            parse_params: self.parse_params,
            cache_deps: self.cache_deps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use serde_json::json;

    fn args() -> LoaderArgs {
        LoaderArgs {
            location: Location::new("/users/1"),
            params: [("id".to_string(), "1".to_string())].into_iter().collect(),
            ..Default::default()
        }
    }

    // === RouteBuilder Tests ===

    #[test]
    fn test_builder_defaults() {
        let route = RouteBuilder::new("/users/:id").build().unwrap();

        assert_eq!(route.path(), Some("/users/:id"));
        assert_eq!(route.segments().len(), 2);
        assert_eq!(route.cache_policy(), CachePolicy::NoCache);
        assert_eq!(route.pending_delay(), Duration::from_secs(1));
        assert_eq!(route.pending_min(), Duration::from_millis(500));
        assert!(!route.cache_view());
        assert!(!route.has_loader());
    }

    #[test]
    fn test_builder_chain() {
        let route = RouteBuilder::new("/users/:id")
            .with_view("UserPage")
            .with_error_view("ErrorPage")
            .with_not_found_view("MissingUser")
            .with_pending_view("Spinner")
            .with_cache_policy(CachePolicy::StaleWhileRevalidate)
            .with_stale_time(Duration::from_secs(10))
            .with_cache_view(true)
            .build()
            .unwrap();

        assert_eq!(route.view(), Some("UserPage"));
        assert_eq!(route.error_view(), Some("ErrorPage"));
        assert_eq!(route.not_found_view(), Some("MissingUser"));
        assert_eq!(route.pending_view(), Some("Spinner"));
        assert_eq!(route.cache().stale_time, Duration::from_secs(10));
        assert!(route.cache_view());
    }

    #[test]
    fn test_builder_with_defaults() {
        let config = RouterConfig::new()
            .with_pending_delay(Duration::from_millis(100))
            .with_gc_time(Duration::from_secs(60));
        let route = RouteBuilder::new("/")
            .with_defaults(&config)
            .with_pending_min(Duration::ZERO)
            .build()
            .unwrap();

        assert_eq!(route.pending_delay(), Duration::from_millis(100));
        assert_eq!(route.pending_min(), Duration::ZERO);
        assert_eq!(route.cache().gc_time, Duration::from_secs(60));
    }

    #[test]
    fn test_build_rejects_bad_pattern() {
        assert!(RouteBuilder::new("./relative").build().is_err());
    }

    #[test]
    fn test_pathed_not_found_rejected() {
        let err = RouteBuilder::new("/404")
            .as_default_not_found()
            .build()
            .unwrap_err();
        assert!(matches!(err, ParseError::PathedNotFound(_)));
    }

    // === Hook Tests ===

    #[test]
    fn test_before_load_accumulates_context() {
        let route = RouteBuilder::new("/users/:id")
            .with_before_load(|_, ctx| {
                ctx.insert("user".into(), json!("ann"));
                HookResult::Continue
            })
            .with_before_load(|_, ctx| {
                let seen = ctx.get("user").cloned().unwrap_or_default();
                ctx.insert("seen".into(), seen);
                HookResult::Continue
            })
            .build()
            .unwrap();

        match route.run_before_load(&args()) {
            BeforeLoad::Ready(ctx) => {
                assert_eq!(ctx.get("user"), Some(&json!("ann")));
                assert_eq!(ctx.get("seen"), Some(&json!("ann")));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_base_hooks_run_first() {
        let base = RouteBuilder::pathless().with_before_load(|_, ctx| {
            ctx.insert("order".into(), json!(["base"]));
            HookResult::Continue
        });
        let route = base
            .clone()
            .with_path("/child")
            .with_before_load(|_, ctx| {
                if let Some(order) = ctx.get_mut("order").and_then(|v| v.as_array_mut()) {
                    order.push(json!("child"));
                }
                HookResult::Continue
            })
            .build()
            .unwrap();

        match route.run_before_load(&args()) {
            BeforeLoad::Ready(ctx) => assert_eq!(ctx["order"], json!(["base", "child"])),
            other => panic!("unexpected {:?}", other),
        }
        // The base builder is unaffected by the derived hook.
        assert_eq!(base.build().unwrap().before_load.len(), 1);
    }

    #[test]
    fn test_before_load_redirect_stops_chain() {
        let route = RouteBuilder::new("/admin")
            .with_before_load(|_, _| HookResult::Redirect(NavArgs::to("/login")))
            .with_before_load(|_, _| HookResult::Error(RouteError::msg("unreachable")))
            .build()
            .unwrap();

        match route.run_before_load(&args()) {
            BeforeLoad::Redirect(target) => assert_eq!(target.path.as_deref(), Some("/login")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_meta_default_and_hook() {
        let plain = RouteBuilder::new("/").build().unwrap();
        assert!(plain.meta(&args()).unwrap().is_empty());

        let route = RouteBuilder::new("/users/:id")
            .with_meta(|args| {
                Ok([("title".to_string(), format!("User {}", args.params["id"]))]
                    .into_iter()
                    .collect())
            })
            .build()
            .unwrap();
        assert_eq!(route.meta(&args()).unwrap()["title"], "User 1");
    }

    #[test]
    fn test_cache_deps_default_to_query() {
        let route = RouteBuilder::new("/").build().unwrap();
        let mut query = Query::new();
        query.insert("page".into(), json!(2));

        assert_eq!(route.cache_deps(&Params::new(), &query), json!({"page": 2}));
    }

    #[test]
    fn test_load_fn_loader() {
        let route = RouteBuilder::new("/users/:id")
            .with_load_fn(|args| async move { Ok(json!({"id": args.params["id"]})) })
            .build()
            .unwrap();

        let loader = route.loader().unwrap();
        let data = block_on(loader.load(&args())).unwrap();
        assert_eq!(data, json!({"id": "1"}));
    }
}
