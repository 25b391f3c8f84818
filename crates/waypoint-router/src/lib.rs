//! Route definitions and matching for the waypoint navigation engine.
//!
//! Patterns are slash-separated segments:
//!
//! ```text
//! /                  -> root
//! /about             -> static
//! /users/:id         -> named param
//! /files/*           -> wildcard suffix, captured as "*"
//! ```
//!
//! Routes are registered into a `RouteRegistry` ordered by specificity
//! (static beats param beats wildcard) and matched first-wins.
//!
//! ```rust,ignore
//! let mut registry = RouteRegistry::new();
//! registry.register(
//!     RouteBuilder::new("/users/:id")
//!         .with_view("UserPage")
//!         .with_cache_policy(CachePolicy::CacheFirst)
//!         .with_load_fn(|args| async move { fetch_user(&args.params["id"]).await })
//!         .build()?,
//! );
//! ```

mod matcher;
mod navigate;
mod registry;
mod route;
mod segment;

pub use matcher::*;
pub use navigate::*;
pub use registry::*;
pub use route::*;
pub use segment::*;
