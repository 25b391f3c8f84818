//! Engine-wide configuration.
//!
//! Durations are written in milliseconds in configuration files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Errors loading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Defaults applied to routes and the navigation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// How long a load may run before the pending view is shown.
    #[serde(rename = "pending_delay_ms", with = "duration_ms")]
    pub pending_delay: Duration,
    /// Minimum time a pending view stays visible once shown.
    #[serde(rename = "pending_min_ms", with = "duration_ms")]
    pub pending_min: Duration,
    /// Lifetime of cached data, measured from fetch time.
    #[serde(rename = "gc_time_ms", with = "duration_ms")]
    pub gc_time: Duration,
    /// Age after which stale-while-revalidate data is refetched.
    #[serde(rename = "stale_time_ms", with = "duration_ms")]
    pub stale_time: Duration,
    /// Delay before the single retry of an offline load.
    #[serde(rename = "offline_retry_delay_ms", with = "duration_ms")]
    pub offline_retry_delay: Duration,
    /// Whether mounts run inside view transitions.
    pub view_transitions: bool,
    /// Number of navigations kept by the metrics collector.
    pub metrics_capacity: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            pending_delay: Duration::from_secs(1),
            pending_min: Duration::from_millis(500),
            gc_time: Duration::from_secs(30 * 60),
            stale_time: Duration::ZERO,
            offline_retry_delay: Duration::from_secs(1),
            view_transitions: true,
            metrics_capacity: 100,
        }
    }
}

impl RouterConfig {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a TOML document. Missing fields take defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    /// Load from a JSON document. Missing fields take defaults.
    pub fn from_json_str(source: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(source)?)
    }

    /// Set the pending delay.
    pub fn with_pending_delay(mut self, delay: Duration) -> Self {
        self.pending_delay = delay;
        self
    }

    /// Set the pending minimum display time.
    pub fn with_pending_min(mut self, min: Duration) -> Self {
        self.pending_min = min;
        self
    }

    /// Set the cached data lifetime.
    pub fn with_gc_time(mut self, gc_time: Duration) -> Self {
        self.gc_time = gc_time;
        self
    }

    /// Set the staleness threshold.
    pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }

    /// Set the offline retry delay.
    pub fn with_offline_retry_delay(mut self, delay: Duration) -> Self {
        self.offline_retry_delay = delay;
        self
    }

    /// Enable or disable view transitions.
    pub fn with_view_transitions(mut self, enabled: bool) -> Self {
        self.view_transitions = enabled;
        self
    }

    /// Set the metrics history capacity.
    pub fn with_metrics_capacity(mut self, capacity: usize) -> Self {
        self.metrics_capacity = capacity;
        self
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // === RouterConfig Tests ===

    #[test]
    fn test_router_config_default() {
        let config = RouterConfig::default();

        assert_eq!(config.pending_delay, Duration::from_secs(1));
        assert_eq!(config.pending_min, Duration::from_millis(500));
        assert_eq!(config.gc_time, Duration::from_secs(1800));
        assert_eq!(config.stale_time, Duration::ZERO);
        assert!(config.view_transitions);
    }

    #[test]
    fn test_router_config_builder_chain() {
        let config = RouterConfig::new()
            .with_pending_delay(Duration::from_millis(200))
            .with_stale_time(Duration::from_secs(5))
            .with_view_transitions(false)
            .with_metrics_capacity(10);

        assert_eq!(config.pending_delay, Duration::from_millis(200));
        assert_eq!(config.stale_time, Duration::from_secs(5));
        assert!(!config.view_transitions);
        assert_eq!(config.metrics_capacity, 10);
    }

    #[test]
    fn test_router_config_from_toml() {
        let config = RouterConfig::from_toml_str(
            r#"
            pending_delay_ms = 250
            gc_time_ms = 60000
            view_transitions = false
            "#,
        )
        .unwrap();

        assert_eq!(config.pending_delay, Duration::from_millis(250));
        assert_eq!(config.gc_time, Duration::from_secs(60));
        assert!(!config.view_transitions);
        // Unspecified fields keep defaults
        assert_eq!(config.pending_min, Duration::from_millis(500));
    }

    #[test]
    fn test_router_config_from_json() {
        let config =
            RouterConfig::from_json_str(r#"{"stale_time_ms": 1500, "metrics_capacity": 5}"#)
                .unwrap();

        assert_eq!(config.stale_time, Duration::from_millis(1500));
        assert_eq!(config.metrics_capacity, 5);
    }

    #[test]
    fn test_router_config_invalid_toml() {
        let err = RouterConfig::from_toml_str("pending_delay_ms = \"soon\"").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }
}
