//! Binding locations to routes.

use std::rc::Rc;

use waypoint_cache::CacheKey;
use waypoint_core::{Location, Query, RouteError};

use crate::route::{LoaderArgs, NavContext, Params, Route};

/// A location resolved against a route.
#[derive(Debug, Clone)]
pub struct Match {
    /// The matched route.
    pub route: Rc<Route>,
    /// The location that was matched.
    pub location: Location,
    /// Params after the route's `parse_params` hook.
    pub params: Params,
    /// Query after the route's `parse_query` hook.
    pub query: Query,
    /// Cache key from the resolved path and the route's dependencies.
    pub cache_key: CacheKey,
}

impl Match {
    /// Bind a location to a route with raw extracted params.
    pub fn new(route: Rc<Route>, location: Location, params: Params) -> Result<Self, RouteError> {
        let query = route.parse_query(location.query.clone());
        let params = route.parse_params(params);
        let deps = route.cache_deps(&params, &query);
        let cache_key = CacheKey::compose(location.pathname(), &deps)?;

        Ok(Self {
            route,
            location,
            params,
            query,
            cache_key,
        })
    }

    /// Arguments for the route's hooks and loader.
    pub fn loader_args(&self, nav_context: NavContext) -> LoaderArgs {
        LoaderArgs {
            location: self.location.clone(),
            params: self.params.clone(),
            query: self.query.clone(),
            nav_context,
        }
    }
}

/// Build a match against a fallback route for an unmatched location.
pub fn match_not_found(location: &Location, fallback: &Rc<Route>) -> Result<Match, RouteError> {
    Match::new(fallback.clone(), location.clone(), Params::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::RouteBuilder;
    use serde_json::json;

    #[test]
    fn test_match_builds_cache_key_from_query() {
        let route = Rc::new(RouteBuilder::new("/list").build().unwrap());
        let location = Location::parse("/list?page=2");

        let m = Match::new(route, location, Params::new()).unwrap();
        assert_eq!(m.cache_key.as_str(), r#"/list:{"page":2}"#);
    }

    #[test]
    fn test_match_applies_parse_hooks() {
        let route = Rc::new(
            RouteBuilder::new("/users/:id")
                .with_parse_params(|mut params| {
                    if let Some(id) = params.get_mut("id") {
                        *id = id.to_uppercase();
                    }
                    params
                })
                .with_parse_query(|mut query| {
                    query.entry("page").or_insert(json!(1));
                    query
                })
                .build()
                .unwrap(),
        );
        let params: Params = [("id".to_string(), "abc".to_string())].into_iter().collect();

        let m = Match::new(route, Location::new("/users/abc"), params).unwrap();
        assert_eq!(m.params["id"], "ABC");
        assert_eq!(m.query.get("page"), Some(&json!(1)));
    }

    #[test]
    fn test_match_custom_cache_deps() {
        let route = Rc::new(
            RouteBuilder::new("/list")
                .with_cache_deps(|_, query| json!({"page": query.get("page")}))
                .build()
                .unwrap(),
        );
        let location = Location::parse("/list?page=3&sort=asc");

        let m = Match::new(route, location, Params::new()).unwrap();
        assert_eq!(m.cache_key.as_str(), r#"/list:{"page":3}"#);
    }

    #[test]
    fn test_match_rejects_non_mapping_deps() {
        let route = Rc::new(
            RouteBuilder::new("/list")
                .with_cache_deps(|_, _| json!("nope"))
                .build()
                .unwrap(),
        );
        let err = Match::new(route, Location::new("/list"), Params::new()).unwrap_err();
        assert!(matches!(err, RouteError::InvalidCacheDeps(_)));
    }

    #[test]
    fn test_match_not_found_uses_location_path() {
        let fallback = Rc::new(
            RouteBuilder::pathless()
                .with_view("NotFound")
                .as_default_not_found()
                .build()
                .unwrap(),
        );
        let m = match_not_found(&Location::new("/nope"), &fallback).unwrap();

        assert!(m.route.is_default_not_found());
        assert_eq!(m.cache_key.path(), "/nope");
        assert!(m.params.is_empty());
    }
}
