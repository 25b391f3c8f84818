//! Cache key composition.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use waypoint_core::RouteError;

/// Deterministic key for a route's data: `<path>:<canonical deps>`.
///
/// Dependencies are serialized with sorted keys at every level, so two
/// logically equal dependency maps always produce the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Create a cache key from a raw string.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Compose a key from a resolved path and the route's cache dependencies.
    ///
    /// Dependencies must be an object (or null, treated as empty).
    pub fn compose(path: &str, deps: &Value) -> Result<Self, RouteError> {
        let deps = match deps {
            Value::Object(_) => canonical_json(deps),
            Value::Null => "{}".to_string(),
            other => {
                return Err(RouteError::InvalidCacheDeps(format!(
                    "expected a mapping, got {}",
                    other
                )))
            }
        };
        Ok(Self(format!("{}:{}", path, deps)))
    }

    /// Get the key string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The path component of the key.
    pub fn path(&self) -> &str {
        self.0
            .split_once(":{")
            .map(|(path, _)| path)
            .unwrap_or(&self.0)
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Serialize a JSON value with object keys sorted at every level.
pub fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let fields: Vec<String> = keys
                .into_iter()
                .map(|k| format!("{}:{}", Value::String(k.clone()), canonical_json(&map[k])))
                .collect();
            format!("{{{}}}", fields.join(","))
        }
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        other => other.to_string(),
    }
}
