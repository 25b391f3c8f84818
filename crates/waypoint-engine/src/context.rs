//! Live state of one navigation.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;
use waypoint_cache::CacheKey;
use waypoint_core::{Location, Query, RouteError};
use waypoint_router::{FormProperties, LoaderArgs, Match, NavContext, Params, Route};

/// Called after a context's data or error changes.
pub type DataListener = Rc<dyn Fn(&RoutingContext)>;

/// Returns `true` to veto leaving the current location.
pub type UnloadGuard = Rc<dyn Fn() -> bool>;

/// Identifies a registered data listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataListenerId(u64);

/// Identifies a registered unload guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardId(u64);

struct ContextState {
    matched: Match,
    nav_context: NavContext,
    form_properties: FormProperties,
    data: Option<Value>,
    error: Option<RouteError>,
    data_listeners: Vec<(DataListenerId, DataListener)>,
    unload_guards: Vec<(GuardId, UnloadGuard)>,
    next_id: u64,
}

/// The live state of one navigation: its match, accumulated context,
/// resolved data or error, and unload guards.
///
/// Clones share state. A cached view's context is updated in place when the
/// view is reused, so holders of the handle see the new location.
#[derive(Clone)]
pub struct RoutingContext {
    state: Rc<RefCell<ContextState>>,
}

impl RoutingContext {
    /// Create a context for a match.
    pub fn new(matched: Match, nav_context: NavContext, form_properties: FormProperties) -> Self {
        Self {
            state: Rc::new(RefCell::new(ContextState {
                matched,
                nav_context,
                form_properties,
                data: None,
                error: None,
                data_listeners: Vec::new(),
                unload_guards: Vec::new(),
                next_id: 0,
            })),
        }
    }

    /// The match this context was created for.
    pub fn matched(&self) -> Match {
        self.state.borrow().matched.clone()
    }

    /// The matched route.
    pub fn route(&self) -> Rc<Route> {
        self.state.borrow().matched.route.clone()
    }

    /// The location navigated to.
    pub fn location(&self) -> Location {
        self.state.borrow().matched.location.clone()
    }

    /// Parsed path params.
    pub fn params(&self) -> Params {
        self.state.borrow().matched.params.clone()
    }

    /// Parsed query.
    pub fn query(&self) -> Query {
        self.state.borrow().matched.query.clone()
    }

    /// The data cache key.
    pub fn cache_key(&self) -> CacheKey {
        self.state.borrow().matched.cache_key.clone()
    }

    /// Context accumulated by before-load hooks.
    pub fn nav_context(&self) -> NavContext {
        self.state.borrow().nav_context.clone()
    }

    /// Replace the accumulated context.
    pub fn set_nav_context(&self, nav_context: NavContext) {
        self.state.borrow_mut().nav_context = nav_context;
    }

    /// Properties handed to the mounted view.
    pub fn form_properties(&self) -> FormProperties {
        self.state.borrow().form_properties.clone()
    }

    /// Resolved data, if loaded.
    pub fn data(&self) -> Option<Value> {
        self.state.borrow().data.clone()
    }

    /// Resolved error, if any.
    pub fn error(&self) -> Option<RouteError> {
        self.state.borrow().error.clone()
    }

    /// Arguments for the route's hooks and loader.
    pub fn loader_args(&self) -> LoaderArgs {
        let state = self.state.borrow();
        state.matched.loader_args(state.nav_context.clone())
    }

    /// Set the data and error, then notify data listeners.
    pub fn set_data(&self, data: Option<Value>, error: Option<RouteError>) {
        {
            let mut state = self.state.borrow_mut();
            state.data = data;
            state.error = error;
        }
        self.notify();
    }

    /// Take over another context's navigation state, keeping this context's
    /// listeners and guards, then notify data listeners.
    pub fn update_from(&self, other: &RoutingContext) {
        if self.ptr_eq(other) {
            return;
        }
        {
            let source = other.state.borrow();
            let mut state = self.state.borrow_mut();
            state.matched = source.matched.clone();
            state.nav_context = source.nav_context.clone();
            state.form_properties = source.form_properties.clone();
            state.data = source.data.clone();
            state.error = source.error.clone();
        }
        self.notify();
    }

    /// Register a listener for data changes.
    pub fn add_data_listener<F>(&self, listener: F) -> DataListenerId
    where
        F: Fn(&RoutingContext) + 'static,
    {
        let mut state = self.state.borrow_mut();
        let id = DataListenerId(state.next_id);
        state.next_id += 1;
        state.data_listeners.push((id, Rc::new(listener)));
        id
    }

    /// Remove a data listener. Returns whether it was registered.
    pub fn remove_data_listener(&self, id: DataListenerId) -> bool {
        let mut state = self.state.borrow_mut();
        let before = state.data_listeners.len();
        state.data_listeners.retain(|(listener_id, _)| *listener_id != id);
        state.data_listeners.len() != before
    }

    /// Register a guard consulted before navigating away.
    pub fn add_unload_guard<F>(&self, guard: F) -> GuardId
    where
        F: Fn() -> bool + 'static,
    {
        let mut state = self.state.borrow_mut();
        let id = GuardId(state.next_id);
        state.next_id += 1;
        state.unload_guards.push((id, Rc::new(guard)));
        id
    }

    /// Remove an unload guard. Returns whether it was registered.
    pub fn remove_unload_guard(&self, id: GuardId) -> bool {
        let mut state = self.state.borrow_mut();
        let before = state.unload_guards.len();
        state.unload_guards.retain(|(guard_id, _)| *guard_id != id);
        state.unload_guards.len() != before
    }

    /// Whether any unload guard vetoes leaving.
    pub fn prevent_unload(&self) -> bool {
        let guards: Vec<UnloadGuard> = self
            .state
            .borrow()
            .unload_guards
            .iter()
            .map(|(_, guard)| guard.clone())
            .collect();
        guards.iter().any(|guard| guard())
    }

    /// Whether both handles refer to the same context.
    pub fn ptr_eq(&self, other: &RoutingContext) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }

    fn notify(&self) {
        let listeners: Vec<DataListener> = self
            .state
            .borrow()
            .data_listeners
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(self);
        }
    }
}

impl fmt::Debug for RoutingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("RoutingContext")
            .field("location", &state.matched.location.to_url())
            .field("route", &state.matched.route.label())
            .field("has_data", &state.data.is_some())
            .field("error", &state.error)
            .field("unload_guards", &state.unload_guards.len())
            .finish()
    }
}
