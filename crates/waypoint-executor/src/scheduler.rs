//! Single-threaded task and timer scheduling.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use futures::future::{FutureExt, LocalBoxFuture};

/// Host timer queue and task spawner.
///
/// Everything runs on one thread; spawned tasks interleave only at await
/// points.
pub trait Scheduler {
    /// Monotonic time since the scheduler was created.
    fn now(&self) -> Duration;

    /// A future that resolves after `duration`.
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()>;

    /// Run a task to completion in the background.
    fn spawn(&self, task: LocalBoxFuture<'static, ()>);

    /// Run `callback` after `delay` unless the returned handle is cancelled.
    fn set_timeout(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> TimerHandle {
        let handle = TimerHandle::new();
        let cancelled = handle.cancelled.clone();
        let sleep = self.sleep(delay);

        self.spawn(
            async move {
                sleep.await;
                if !cancelled.get() {
                    callback();
                }
            }
            .boxed_local(),
        );
        handle
    }
}

/// Scheduler handle shared across the engine.
pub type SharedScheduler = Rc<dyn Scheduler>;

/// Cancellation handle for a scheduled timeout.
#[derive(Debug, Clone, Default)]
pub struct TimerHandle {
    cancelled: Rc<Cell<bool>>,
}

impl TimerHandle {
    /// Create an active handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Prevent the callback from running. No-op once it has fired.
    pub fn cancel(&self) {
        self.cancelled.set(true);
    }

    /// Whether the handle was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }
}

/// `Scheduler` backed by tokio's local task set and timer.
///
/// Must be used from within a `tokio::task::LocalSet`.
#[cfg(feature = "tokio")]
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    origin: tokio::time::Instant,
}

#[cfg(feature = "tokio")]
impl TokioScheduler {
    /// Create a scheduler whose clock starts now.
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }

    /// Create a scheduler behind a shared handle.
    pub fn shared() -> SharedScheduler {
        Rc::new(Self::new())
    }
}

#[cfg(feature = "tokio")]
impl Default for TokioScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "tokio")]
impl Scheduler for TokioScheduler {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        tokio::time::sleep(duration).boxed_local()
    }

    fn spawn(&self, task: LocalBoxFuture<'static, ()>) {
        tokio::task::spawn_local(task);
    }
}
