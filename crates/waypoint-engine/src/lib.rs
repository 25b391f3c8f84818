//! Navigation engine for the waypoint single-page-app router.
//!
//! This crate provides:
//! - `NavigationEngine` - Drives one navigation attempt per history change
//! - `RoutingContext` - Live state of a navigation (match, data, guards)
//! - `History` / `MemoryHistory` - The history abstraction
//! - `NavigationBlocker` - Guards that veto and roll back navigations
//! - `ViewMounter`, `MetaSink`, `TransitionHost` - Host collaborators
//! - `ServerResponder` - First-page rendering with a seeded cache snapshot
//! - `RouterApp` - Builder that wires everything together
//!
//! ```rust,ignore
//! let engine = RouterApp::new(history, mounter, TokioScheduler::shared())
//!     .route(RouteBuilder::new("/").with_view("Home").build()?)
//!     .route(RouteBuilder::new("/users/:id").with_view("User").build()?)
//!     .build();
//!
//! engine.start().finished().await?;
//! engine.navigate(NavArgs::to("/users/:id").with_param("id", "1"))?;
//! ```

mod app;
mod blocker;
mod context;
mod engine;
mod history;
mod meta;
mod server;
mod transition;
mod view;

pub use app::*;
pub use blocker::*;
pub use context::*;
pub use engine::*;
pub use history::*;
pub use meta::*;
pub use server::*;
pub use transition::*;
pub use view::*;
