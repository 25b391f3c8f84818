//! Navigation lifecycle tracking.
//!
//! Times are offsets on the engine's scheduler clock, so they stay
//! deterministic under a paused test clock.

use std::collections::BTreeMap;
use std::time::Duration;

/// Phases a navigation attempt passes through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationPhase {
    /// Location change received, attempt started.
    Start,
    /// An unload guard vetoed the attempt and history was rolled back.
    Blocked,
    /// Location resolved to a route.
    Matched,
    /// Before-load hooks completed.
    BeforeLoad,
    /// A hook redirected the attempt elsewhere.
    Redirect(String),
    /// Pending view mounted because data exceeded the pending delay.
    PendingShown,
    /// Route data resolved.
    DataReady,
    /// Target view mounted.
    ViewMounted,
    /// A newer navigation superseded this one.
    Stale,
    /// Attempt concluded.
    Completion,
    /// An error occurred.
    Error(String),
}

impl NavigationPhase {
    /// Short name used for timing marks and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Blocked => "blocked",
            Self::Matched => "matched",
            Self::BeforeLoad => "before_load",
            Self::Redirect(_) => "redirect",
            Self::PendingShown => "pending_shown",
            Self::DataReady => "data_ready",
            Self::ViewMounted => "view_mounted",
            Self::Stale => "stale",
            Self::Completion => "completion",
            Self::Error(_) => "error",
        }
    }
}

/// Timing marks for one navigation attempt.
#[derive(Debug, Clone)]
pub struct TimingContext {
    start: Duration,
    marks: BTreeMap<String, Duration>,
}

impl TimingContext {
    /// Create a timing context starting at `now`.
    pub fn new(now: Duration) -> Self {
        Self {
            start: now,
            marks: BTreeMap::new(),
        }
    }

    /// Record a timing mark at `now`.
    pub fn mark(&mut self, name: &str, now: Duration) {
        self.marks
            .insert(name.to_string(), now.saturating_sub(self.start));
    }

    /// Elapsed time from start to `now`.
    pub fn elapsed(&self, now: Duration) -> Duration {
        now.saturating_sub(self.start)
    }

    /// Offset of a recorded mark from start.
    pub fn offset(&self, name: &str) -> Option<Duration> {
        self.marks.get(name).copied()
    }

    /// All recorded marks.
    pub fn marks(&self) -> &BTreeMap<String, Duration> {
        &self.marks
    }
}

/// Observer trait for navigation lifecycle events.
pub trait LifecycleObserver {
    /// Called when a navigation enters a phase.
    fn on_phase(&self, phase: &NavigationPhase, elapsed: Duration);
}
