//! Ordered route registry.

use std::cmp::Ordering;
use std::rc::Rc;

use waypoint_core::{Location, RouteError};

use crate::matcher::{match_not_found, Match};
use crate::navigate::{resolve_location, NavArgs};
use crate::route::Route;
use crate::segment::{compare_specificity, match_segments};

/// Registered routes, kept in specificity order.
///
/// A new route is inserted before the first route it is strictly more
/// specific than, so routes of equal specificity keep registration order.
/// Matching walks the list and the first structural match wins.
#[derive(Debug, Default)]
pub struct RouteRegistry {
    routes: Vec<Rc<Route>>,
    not_found: Option<Rc<Route>>,
}

impl RouteRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route.
    ///
    /// A default not-found route replaces any previous one and is only
    /// reachable as the fallback.
    pub fn register(&mut self, route: Route) -> Rc<Route> {
        let route = Rc::new(route);

        if route.is_default_not_found() {
            if self.not_found.is_some() {
                tracing::warn!(route = %route.label(), "replacing default not-found route");
            }
            self.not_found = Some(route.clone());
            return route;
        }

        let position = if route.path().is_some() {
            self.routes.iter().position(|existing| {
                existing.path().is_none()
                    || compare_specificity(route.segments(), existing.segments()) == Ordering::Less
            })
        } else {
            None
        };

        match position {
            Some(index) => self.routes.insert(index, route.clone()),
            None => self.routes.push(route.clone()),
        }
        tracing::debug!(route = %route.label(), "registered route");
        route
    }

    /// All routes in match order.
    pub fn routes(&self) -> &[Rc<Route>] {
        &self.routes
    }

    /// The default not-found route.
    pub fn not_found_route(&self) -> Option<&Rc<Route>> {
        self.not_found.as_ref()
    }

    /// The first route that mounts the given view.
    pub fn route_for_view(&self, view: &str) -> Option<&Rc<Route>> {
        self.routes.iter().find(|r| r.view() == Some(view))
    }

    /// Match a location against path-having routes. First match wins.
    pub fn match_location(&self, location: &Location) -> Result<Option<Match>, RouteError> {
        for route in &self.routes {
            if route.path().is_none() {
                continue;
            }
            if let Some(params) = match_segments(route.segments(), location.pathname()) {
                return Match::new(route.clone(), location.clone(), params).map(Some);
            }
        }
        Ok(None)
    }

    /// Match a location, falling back to the default not-found route.
    pub fn match_or_not_found(&self, location: &Location) -> Result<Match, RouteError> {
        if let Some(m) = self.match_location(location)? {
            return Ok(m);
        }
        match &self.not_found {
            Some(fallback) => match_not_found(location, fallback),
            None => Err(RouteError::NotFound(location.to_url())),
        }
    }

    /// Resolve navigation arguments and match the resulting location.
    pub fn match_nav_args(
        &self,
        args: &NavArgs,
        current: Option<&Location>,
    ) -> Result<Match, RouteError> {
        let location = resolve_location(args, current)?;
        self.match_location(&location)?
            .ok_or_else(|| RouteError::NotFound(location.to_url()))
    }

    /// Number of registered routes, excluding the not-found fallback.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether no routes are registered.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Remove every route.
    pub fn clear(&mut self) {
        self.routes.clear();
        self.not_found = None;
    }
}
