//! Public SDK for the waypoint single-page-app router.
//!
//! This crate re-exports all router functionality:
//!
//! ```ignore
//! use waypoint_sdk::prelude::*;
//!
//! let engine = RouterApp::new(history, mounter, TokioScheduler::shared())
//!     .route(RouteBuilder::new("/").with_view("Home").build()?)
//!     .route(
//!         RouteBuilder::new("/users/:id")
//!             .with_view("User")
//!             .with_cache_policy(CachePolicy::StaleWhileRevalidate)
//!             .with_load_fn(|args| async move { fetch_user(&args.params["id"]).await })
//!             .build()?,
//!     )
//!     .build();
//!
//! engine.start().finished().await?;
//! engine.navigate(NavArgs::to("/users/:id").with_param("id", "1"))?;
//! ```

pub use waypoint_cache;
pub use waypoint_core;
pub use waypoint_data;
pub use waypoint_engine;
pub use waypoint_executor;
pub use waypoint_observability;
pub use waypoint_router;

/// Prelude for convenient imports.
pub mod prelude {
    pub use waypoint_cache::*;
    pub use waypoint_core::*;
    pub use waypoint_data::*;
    pub use waypoint_engine::*;
    pub use waypoint_executor::*;
    pub use waypoint_observability::*;
    pub use waypoint_router::*;
}
