//! Core types for the waypoint navigation engine.
//!
//! This crate provides the value types shared by every other crate:
//! - `Location` - Resolved URL with a history identity key
//! - `Query` codec - JSON-valued query strings
//! - `RouteError` / `ParseError` - Navigation error taxonomy
//! - `RouterConfig` - Engine-wide defaults
//! - `NavigationPhase` - Navigation lifecycle tracking

mod config;
mod error;
mod lifecycle;
mod location;
mod query;

pub use config::*;
pub use error::*;
pub use lifecycle::*;
pub use location::*;
pub use query::*;
