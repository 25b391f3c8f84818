//! Route data cache for the waypoint navigation engine.
//!
//! This crate provides:
//! - `CachePolicy` - How a route's data is read from and written to cache
//! - `CacheKey` - Canonical key from a resolved path and its dependencies
//! - `DataCache` - Cached entries, in-flight loads, GC and startup snapshots

mod key;
mod policy;
mod store;

pub use key::*;
pub use policy::*;
pub use store::*;
