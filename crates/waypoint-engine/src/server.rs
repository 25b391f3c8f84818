//! First-page rendering on the server.
//!
//! The responder runs a route's before-load hooks, metadata hook and loader
//! for one request, then renders a page that embeds the loaded data as a
//! [`CacheSnapshot`]. The client injects that snapshot with
//! `RouterApp::with_startup_cache` so its first navigation reuses the data.

use std::rc::Rc;
use std::time::Duration;

use http::header::{CONTENT_TYPE, LOCATION};
use http::{Response, StatusCode};
use thiserror::Error;
use waypoint_cache::{CacheSnapshot, CachedData};
use waypoint_core::{Location, RouteError};
use waypoint_router::{match_not_found, resolve_location, BeforeLoad, Meta, RouteRegistry};

use crate::meta::{html_escape, render_meta_tags};

/// Errors producing an HTTP response.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("HTTP error: {0}")]
    Http(#[from] http::Error),

    #[error("Snapshot serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// A rendered page.
#[derive(Debug, Clone)]
pub struct ServerPage {
    /// HTTP status code.
    pub status: u16,
    /// View to mount, if any.
    pub view: Option<String>,
    /// Document metadata.
    pub meta: Meta,
    /// Data to seed the client cache with.
    pub snapshot: CacheSnapshot,
    /// Error raised while preparing the page.
    pub error: Option<String>,
}

/// Response to a first-page request.
#[derive(Debug, Clone)]
pub enum ServerResponse {
    /// A before-load hook redirected.
    Redirect {
        /// Target URL.
        location: String,
    },
    /// A rendered page.
    Page(ServerPage),
}

impl ServerResponse {
    /// HTTP status code.
    pub fn status(&self) -> u16 {
        match self {
            Self::Redirect { .. } => 302,
            Self::Page(page) => page.status,
        }
    }

    /// Convert into an HTTP response with an HTML shell body.
    pub fn into_http(self) -> Result<Response<String>, ServerError> {
        match self {
            Self::Redirect { location } => Ok(Response::builder()
                .status(StatusCode::FOUND)
                .header(LOCATION, location)
                .body(String::new())?),
            Self::Page(page) => {
                let body = render_page(&page)?;
                Ok(Response::builder()
                    .status(page.status)
                    .header(CONTENT_TYPE, "text/html; charset=utf-8")
                    .body(body)?)
            }
        }
    }
}

fn render_page(page: &ServerPage) -> Result<String, ServerError> {
    // "</" would close the script element early.
    let snapshot = page.snapshot.to_json()?.replace("</", "<\\/");

    let mut html = String::from("<!DOCTYPE html>\n<html>\n<head>\n");
    html.push_str(&render_meta_tags(&page.meta));
    html.push_str("</head>\n<body>\n");
    match &page.view {
        Some(view) => html.push_str(&format!(
            "<div id=\"waypoint-root\" data-view=\"{}\"></div>\n",
            html_escape(view)
        )),
        None => html.push_str("<div id=\"waypoint-root\"></div>\n"),
    }
    html.push_str(&format!(
        "<script id=\"waypoint-cache\" type=\"application/json\">{}</script>\n",
        snapshot
    ));
    html.push_str("</body>\n</html>");

    Ok(html)
}

/// Answers first-page requests from the route registry.
pub struct ServerResponder {
    registry: Rc<RouteRegistry>,
}

impl ServerResponder {
    /// Create a responder over a registry.
    pub fn new(registry: Rc<RouteRegistry>) -> Self {
        Self { registry }
    }

    /// Respond to a request URL (path, query and hash).
    pub async fn respond(&self, url: &str) -> Result<ServerResponse, RouteError> {
        let location = Location::parse(url);

        let (matched, mut status, mut error) = match self.registry.match_location(&location)? {
            Some(matched) => (matched, 200, None),
            None => match self.registry.not_found_route() {
                Some(fallback) => (
                    match_not_found(&location, fallback)?,
                    404,
                    Some(format!("No match for '{}'", location.to_url())),
                ),
                None => {
                    tracing::debug!(url, "no route for server request");
                    return Ok(ServerResponse::Page(ServerPage {
                        status: 404,
                        view: None,
                        meta: Meta::new(),
                        snapshot: CacheSnapshot::new(),
                        error: Some(format!("No match for '{}'", location.to_url())),
                    }));
                }
            },
        };
        let route = matched.route.clone();

        let mut args = matched.loader_args(Default::default());
        let mut skip_data = false;
        let mut view = route.view().map(str::to_string);

        match route.run_before_load(&args) {
            BeforeLoad::Ready(nav_context) => args.nav_context = nav_context,
            BeforeLoad::Redirect(target) => {
                let target = resolve_location(&target, Some(&location))?;
                tracing::debug!(url, to = %target, "server redirect");
                return Ok(ServerResponse::Redirect {
                    location: target.to_url(),
                });
            }
            BeforeLoad::NotFound(message) => {
                status = 404;
                view = route.not_found_view().map(str::to_string);
                error = Some(RouteError::NotFound(message).to_string());
                skip_data = true;
            }
            BeforeLoad::Error(err) => {
                view = route.error_view().map(str::to_string);
                error = Some(err.to_string());
                skip_data = true;
            }
        }

        let meta = match route.meta(&args) {
            Ok(meta) => meta,
            Err(err) => {
                tracing::debug!(error = %err, "server meta failed");
                Meta::new()
            }
        };

        let mut snapshot = CacheSnapshot::new();
        if !skip_data {
            if let Some(loader) = route.loader() {
                match loader.load(&args).await {
                    Ok(data) => {
                        let cache = route.cache();
                        // Seeded regardless of policy; the initial-request
                        // rule consumes it once.
                        snapshot.insert(
                            matched.cache_key.clone(),
                            CachedData::new(
                                data,
                                location.clone(),
                                cache.policy,
                                cache.gc_time,
                                Duration::ZERO,
                            ),
                        );
                    }
                    Err(err) => {
                        tracing::debug!(error = %err, "server load failed");
                        error = Some(err.to_string());
                    }
                }
            }
        }

        tracing::debug!(url, status, entries = snapshot.len(), "server page ready");
        Ok(ServerResponse::Page(ServerPage {
            status,
            view,
            meta,
            snapshot,
            error,
        }))
    }
}
