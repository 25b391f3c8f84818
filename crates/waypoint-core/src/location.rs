//! Resolved locations with history identity keys.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::query::{decode_query, encode_query, Query};

/// Identity of a single history entry.
///
/// Two visits to the same URL get different keys; the engine compares keys
/// to detect that a navigation has been superseded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocationKey(pub String);

static NEXT_KEY: AtomicU64 = AtomicU64::new(1);

impl LocationKey {
    /// Generate a new, process-unique key.
    pub fn generate() -> Self {
        let n = NEXT_KEY.fetch_add(1, Ordering::Relaxed);
        Self(format!("{:08x}", n))
    }

    /// Create from an existing key string.
    pub fn from_string(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The key used for the entry present at startup.
    pub fn initial() -> Self {
        Self("default".to_string())
    }

    /// Get the key string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LocationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A resolved URL: path, query, hash, plus the history identity key.
///
/// Equality is structural on path, query and hash; the key is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    /// Path component, `None` for locations that only carry query/hash.
    pub path: Option<String>,
    /// Parsed query parameters.
    pub query: Query,
    /// Fragment, without the leading `#`.
    pub hash: String,
    /// History identity key.
    pub key: LocationKey,
}

impl Location {
    /// Create a location for a path with an empty query and hash.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            query: Query::new(),
            hash: String::new(),
            key: LocationKey::generate(),
        }
    }

    /// Parse a URL of the form `/path?query#hash`.
    pub fn parse(url: &str) -> Self {
        let (rest, hash) = match url.split_once('#') {
            Some((rest, hash)) => (rest, hash.to_string()),
            None => (url, String::new()),
        };
        let (path, search) = rest.split_once('?').unwrap_or((rest, ""));

        Self {
            path: if path.is_empty() {
                None
            } else {
                Some(path.to_string())
            },
            query: decode_query(search),
            hash,
            key: LocationKey::generate(),
        }
    }

    /// Set the query.
    pub fn with_query(mut self, query: Query) -> Self {
        self.query = query;
        self
    }

    /// Set the hash (a leading `#` is stripped).
    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        let hash = hash.into();
        self.hash = hash.strip_prefix('#').map(str::to_string).unwrap_or(hash);
        self
    }

    /// Set the identity key.
    pub fn with_key(mut self, key: LocationKey) -> Self {
        self.key = key;
        self
    }

    /// The path, or an empty string for pathless locations.
    pub fn pathname(&self) -> &str {
        self.path.as_deref().unwrap_or("")
    }

    /// Encoded search string including the leading `?`, or empty.
    pub fn search(&self) -> String {
        let encoded = encode_query(&self.query);
        if encoded.is_empty() {
            String::new()
        } else {
            format!("?{}", encoded)
        }
    }

    /// Full URL: path, search and hash.
    pub fn to_url(&self) -> String {
        let mut url = format!("{}{}", self.pathname(), self.search());
        if !self.hash.is_empty() {
            url.push('#');
            url.push_str(&self.hash);
        }
        url
    }

    /// Whether both locations address the same route state.
    pub fn is_route_equivalent(&self, other: &Location) -> bool {
        self == other
    }
}

impl Default for Location {
    fn default() -> Self {
        Self::new("/")
    }
}

impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path && self.query == other.query && self.hash == other.hash
    }
}

impl Eq for Location {}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_url())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // === LocationKey Tests ===

    #[test]
    fn test_generated_keys_are_unique() {
        let a = LocationKey::generate();
        let b = LocationKey::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_key_from_string() {
        let key = LocationKey::from_string("abc");
        assert_eq!(key.as_str(), "abc");
        assert_eq!(key.to_string(), "abc");
    }

    // === Location Tests ===

    #[test]
    fn test_parse_full_url() {
        let loc = Location::parse("/users/1?tab=posts&page=2#top");
        assert_eq!(loc.path.as_deref(), Some("/users/1"));
        assert_eq!(loc.query.get("tab"), Some(&json!("posts")));
        assert_eq!(loc.query.get("page"), Some(&json!(2)));
        assert_eq!(loc.hash, "top");
    }

    #[test]
    fn test_parse_path_only() {
        let loc = Location::parse("/about");
        assert_eq!(loc.pathname(), "/about");
        assert!(loc.query.is_empty());
        assert!(loc.hash.is_empty());
    }

    #[test]
    fn test_to_url_round_trip() {
        let url = "/search?page=2&q=shoes#results";
        assert_eq!(Location::parse(url).to_url(), url);
    }

    #[test]
    fn test_equality_ignores_key() {
        let a = Location::new("/a").with_key(LocationKey::from_string("1"));
        let b = Location::new("/a").with_key(LocationKey::from_string("2"));
        assert_eq!(a, b);
        assert!(a.is_route_equivalent(&b));
    }

    #[test]
    fn test_hash_distinguishes_locations() {
        let a = Location::new("/a");
        let b = Location::new("/a").with_hash("#section");
        assert_ne!(a, b);
        assert_eq!(b.hash, "section");
    }

    #[test]
    fn test_search_empty_query() {
        assert_eq!(Location::new("/").search(), "");
    }
}
