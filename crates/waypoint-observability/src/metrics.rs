//! Per-navigation timing metrics.

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use waypoint_cache::CacheStatus;
use waypoint_core::{Location, TimingContext};

/// Metrics for a single navigation attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationMetrics {
    /// History key of the attempt.
    pub location_key: String,
    /// URL navigated to.
    pub url: String,
    /// Matched route pattern.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    /// How the attempt concluded (e.g. `mounted`, `stale`, `redirected`).
    pub outcome: String,
    /// How the route data was satisfied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_status: Option<CacheStatus>,
    /// Whether the pending view was shown.
    pub pending_shown: bool,
    /// Phase offsets from the start of the attempt (milliseconds).
    pub phases: BTreeMap<String, u64>,
    /// Total attempt duration (milliseconds).
    pub total_ms: u64,
    /// Error message if the attempt failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NavigationMetrics {
    /// Format as JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Format as human-readable summary.
    pub fn to_summary(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Navigation {}: {} [{}]", self.location_key, self.url, self.outcome));

        if let Some(route) = &self.route {
            lines.push(format!("  Route: {}", route));
        }
        if let Some(status) = self.cache_status {
            lines.push(format!("  Cache: {}", status));
        }
        if self.pending_shown {
            lines.push("  Pending view shown".to_string());
        }
        for (phase, offset) in &self.phases {
            lines.push(format!("    {}: {}ms", phase, offset));
        }
        lines.push(format!("  Total: {}ms", self.total_ms));
        if let Some(error) = &self.error {
            lines.push(format!("  Error: {}", error));
        }

        lines.join("\n")
    }
}

/// Records one attempt's metrics as it runs.
#[derive(Debug, Clone)]
pub struct NavigationRecorder {
    location_key: String,
    url: String,
    route: Option<String>,
    cache_status: Option<CacheStatus>,
    pending_shown: bool,
    timing: TimingContext,
    error: Option<String>,
}

impl NavigationRecorder {
    /// Start recording an attempt at `now` on the engine clock.
    pub fn new(location: &Location, now: Duration) -> Self {
        Self {
            location_key: location.key.to_string(),
            url: location.to_url(),
            route: None,
            cache_status: None,
            pending_shown: false,
            timing: TimingContext::new(now),
            error: None,
        }
    }

    /// Set the matched route pattern.
    pub fn set_route(&mut self, route: impl Into<String>) {
        self.route = Some(route.into());
    }

    /// Record how the data load was satisfied.
    pub fn set_cache_status(&mut self, status: CacheStatus) {
        self.cache_status = Some(status);
    }

    /// Record that the pending view was shown.
    pub fn record_pending_shown(&mut self) {
        self.pending_shown = true;
    }

    /// Record a phase mark.
    pub fn mark(&mut self, phase: &str, now: Duration) {
        self.timing.mark(phase, now);
    }

    /// Record an error message.
    pub fn record_error(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
    }

    /// Time since the attempt started.
    pub fn elapsed(&self, now: Duration) -> Duration {
        self.timing.elapsed(now)
    }

    /// Finalize and return the metrics.
    pub fn finish(self, outcome: impl Into<String>, now: Duration) -> NavigationMetrics {
        NavigationMetrics {
            location_key: self.location_key,
            url: self.url,
            route: self.route,
            outcome: outcome.into(),
            cache_status: self.cache_status,
            pending_shown: self.pending_shown,
            phases: self
                .timing
                .marks()
                .iter()
                .map(|(name, offset)| (name.clone(), offset.as_millis() as u64))
                .collect(),
            total_ms: self.timing.elapsed(now).as_millis() as u64,
            error: self.error,
        }
    }
}

/// Keeps the most recent navigation metrics.
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    capacity: usize,
    recent: VecDeque<NavigationMetrics>,
}

impl MetricsCollector {
    /// Create a collector keeping at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            recent: VecDeque::with_capacity(capacity),
        }
    }

    /// Record a finished attempt, dropping the oldest if full.
    pub fn record(&mut self, metrics: NavigationMetrics) {
        if self.capacity == 0 {
            return;
        }
        if self.recent.len() == self.capacity {
            self.recent.pop_front();
        }
        self.recent.push_back(metrics);
    }

    /// Recorded metrics, oldest first.
    pub fn recent(&self) -> impl Iterator<Item = &NavigationMetrics> {
        self.recent.iter()
    }

    /// The most recent entry.
    pub fn last(&self) -> Option<&NavigationMetrics> {
        self.recent.back()
    }

    /// Number of recorded entries.
    pub fn len(&self) -> usize {
        self.recent.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.recent.is_empty()
    }

    /// Drop all entries.
    pub fn clear(&mut self) {
        self.recent.clear();
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new(100)
    }
}
