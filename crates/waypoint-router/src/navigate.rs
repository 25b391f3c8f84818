//! Navigation targets and their resolution to locations.

use serde_json::Value;
use waypoint_core::{Location, Query, RouteError};

use crate::route::{FormProperties, NavContext, Params};
use crate::segment::{fill_segments, parse_segments, trim_path};

/// Arguments describing where to navigate.
///
/// `path` may be a pattern (`/users/:id`) whose params are filled from
/// `params`, a relative path (`./edit`, `../2`) resolved against the
/// current path, or `None` to keep the current path.
#[derive(Debug, Clone, Default)]
pub struct NavArgs {
    /// Target path or pattern.
    pub path: Option<String>,
    /// Values for pattern params.
    pub params: Params,
    /// Query parameters.
    pub query: Query,
    /// Fragment.
    pub hash: String,
    /// Initial navigation context for the next routing context.
    pub nav_context: NavContext,
    /// Properties passed to the mounted view.
    pub form_properties: FormProperties,
    /// Replace the current history entry instead of pushing.
    pub replace: bool,
}

impl NavArgs {
    /// Navigate to a path or pattern.
    pub fn to(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            ..Default::default()
        }
    }

    /// Keep the current path; change only query/hash.
    pub fn here() -> Self {
        Self::default()
    }

    /// Set a path param.
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Replace all path params.
    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    /// Set a query param.
    pub fn with_query_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    /// Replace the query.
    pub fn with_query(mut self, query: Query) -> Self {
        self.query = query;
        self
    }

    /// Set the fragment.
    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = hash.into();
        self
    }

    /// Set the initial navigation context.
    pub fn with_nav_context(mut self, nav_context: NavContext) -> Self {
        self.nav_context = nav_context;
        self
    }

    /// Set properties for the mounted view.
    pub fn with_form_properties(mut self, properties: FormProperties) -> Self {
        self.form_properties = properties;
        self
    }

    /// Replace history instead of pushing.
    pub fn replacing(mut self) -> Self {
        self.replace = true;
        self
    }
}

fn resolve_relative(path: &str, current: &str) -> String {
    let mut parts: Vec<&str> = trim_path(current)
        .split('/')
        .filter(|p| !p.is_empty())
        .collect();

    for piece in path.split('/') {
        match piece {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }

    format!("/{}", parts.join("/"))
}

/// Resolve navigation arguments into a concrete location.
pub fn resolve_location(args: &NavArgs, current: Option<&Location>) -> Result<Location, RouteError> {
    let current_path = current.map(|loc| loc.pathname()).unwrap_or("/");

    let pattern = match args.path.as_deref() {
        None => current_path.to_string(),
        Some(path) if path.starts_with("./") || path.starts_with("../") => {
            resolve_relative(path, current_path)
        }
        Some(path) => path.to_string(),
    };

    let segments = parse_segments(&pattern)
        .map_err(|err| RouteError::InvalidPathParams(err.to_string()))?;
    let path = fill_segments(&segments, &args.params)?;

    Ok(Location::new(path)
        .with_query(args.query.clone())
        .with_hash(args.hash.clone()))
}
