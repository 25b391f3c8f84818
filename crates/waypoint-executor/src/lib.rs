//! Scheduling primitives for the waypoint navigation engine.
//!
//! This crate keeps the engine runtime-agnostic:
//! - `Scheduler` - Clock, sleep, spawn and cancellable timeouts
//! - `TokioScheduler` - `Scheduler` on a tokio `LocalSet`
//! - `race_timeout` - races a future against a timer
//! - `dispatch_error` - Which view handles a failed navigation

mod dispatch;
mod race;
mod scheduler;

pub use dispatch::*;
pub use race::*;
pub use scheduler::*;
