//! Route data loading for the waypoint navigation engine.
//!
//! This crate provides:
//! - `DataLoader` - Loads route data under the four cache policies
//! - `RetryPolicy` - Retry of transient offline failures

mod loader;
mod retry;

pub use loader::*;
pub use retry::*;
