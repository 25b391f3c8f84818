//! Observability for the waypoint navigation engine.
//!
//! This crate provides:
//! - `StructuredLogger` - Structured logging with navigation context
//! - `EventEmitter` - `navigate` / `pending` / `idle` event handlers
//! - `MetricsCollector` - Recent per-navigation timing metrics

mod events;
mod logging;
mod metrics;

pub use events::*;
pub use logging::*;
pub use metrics::*;

// Re-export the lifecycle types from waypoint-core for convenience
pub use waypoint_core::{LifecycleObserver, LocationKey, NavigationPhase, TimingContext};
