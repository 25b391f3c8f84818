//! Route-level data cache policies.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use waypoint_core::RouterConfig;

/// How a route's loaded data interacts with the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CachePolicy {
    /// Never read or write the cache; always fetch.
    #[default]
    NoCache,
    /// Serve cached data whenever present; never revalidate.
    CacheFirst,
    /// Always fetch; cache the result for offline fallback.
    NetworkFirst,
    /// Serve cached data immediately, refetch in the background once stale.
    StaleWhileRevalidate,
}

impl CachePolicy {
    /// Whether loads under this policy write a cache entry.
    pub fn is_cacheable(&self) -> bool {
        !matches!(self, Self::NoCache)
    }
}

impl std::fmt::Display for CachePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoCache => write!(f, "NO_CACHE"),
            Self::CacheFirst => write!(f, "CACHE_FIRST"),
            Self::NetworkFirst => write!(f, "NETWORK_FIRST"),
            Self::StaleWhileRevalidate => write!(f, "STALE_WHILE_REVALIDATE"),
        }
    }
}

/// Cache settings declared by a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteCachePolicy {
    /// Cache policy.
    pub policy: CachePolicy,
    /// Age after which cached data counts as stale.
    pub stale_time: Duration,
    /// Lifetime of cached data, measured from fetch time.
    pub gc_time: Duration,
}

impl Default for RouteCachePolicy {
    fn default() -> Self {
        Self::from_config(&RouterConfig::default())
    }
}

impl RouteCachePolicy {
    /// Create a policy with default timings.
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            policy,
            ..Default::default()
        }
    }

    /// Take stale and GC times from engine configuration.
    pub fn from_config(config: &RouterConfig) -> Self {
        Self {
            policy: CachePolicy::NoCache,
            stale_time: config.stale_time,
            gc_time: config.gc_time,
        }
    }

    /// Set the policy.
    pub fn with_policy(mut self, policy: CachePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the staleness threshold.
    pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }

    /// Set the GC lifetime.
    pub fn with_gc_time(mut self, gc_time: Duration) -> Self {
        self.gc_time = gc_time;
        self
    }
}
