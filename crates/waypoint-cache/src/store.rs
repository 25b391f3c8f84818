//! Route data store with in-flight deduplication and GC.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::time::Duration;

use futures::future::{LocalBoxFuture, Shared};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use waypoint_core::{Location, RouteError};

use crate::key::CacheKey;
use crate::policy::CachePolicy;

/// A pending load shared by every caller requesting the same key.
pub type InFlightLoad = Shared<LocalBoxFuture<'static, Result<Value, RouteError>>>;

/// Cache handle shared between the loader and the engine.
pub type SharedCache = Rc<RefCell<DataCache>>;

/// How a load was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    /// Served from cache.
    Hit,
    /// Not cached; fetched.
    Miss,
    /// Served from cache while a background refetch runs.
    Stale,
    /// Attached to a load already in flight.
    InFlight,
    /// Cache skipped (no-cache policy or forced reload).
    Bypass,
    /// Consumed from the startup snapshot.
    Initial,
}

impl std::fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hit => write!(f, "HIT"),
            Self::Miss => write!(f, "MISS"),
            Self::Stale => write!(f, "STALE"),
            Self::InFlight => write!(f, "IN_FLIGHT"),
            Self::Bypass => write!(f, "BYPASS"),
            Self::Initial => write!(f, "INITIAL"),
        }
    }
}

/// A cached route data entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData {
    /// The loaded data.
    pub data: Value,
    /// Location the data was loaded for.
    pub location: Location,
    /// Policy of the route when the data was written.
    pub policy: CachePolicy,
    /// Lifetime measured from `fetched_at`.
    pub gc_time: Duration,
    /// Fetch time on the engine clock. Restamped on hydration.
    #[serde(skip)]
    pub fetched_at: Duration,
    /// Set by explicit invalidation.
    pub stale: bool,
}

impl CachedData {
    /// Create a fresh entry fetched at `now`.
    pub fn new(
        data: Value,
        location: Location,
        policy: CachePolicy,
        gc_time: Duration,
        now: Duration,
    ) -> Self {
        Self {
            data,
            location,
            policy,
            gc_time,
            fetched_at: now,
            stale: false,
        }
    }

    /// Age of the entry at `now`.
    pub fn age(&self, now: Duration) -> Duration {
        now.saturating_sub(self.fetched_at)
    }

    /// Whether the entry's lifetime has elapsed.
    pub fn should_gc(&self, now: Duration) -> bool {
        self.age(now) > self.gc_time
    }

    /// Whether the entry should be revalidated under the given threshold.
    pub fn is_stale(&self, now: Duration, stale_time: Duration) -> bool {
        self.stale || self.age(now) > stale_time
    }
}

/// Serializable cache contents injected once at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheSnapshot {
    /// Entries by key.
    pub entries: BTreeMap<CacheKey, CachedData>,
}

impl CacheSnapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry.
    pub fn insert(&mut self, key: CacheKey, entry: CachedData) {
        self.entries.insert(key, entry);
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the snapshot is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize to JSON for embedding in a server-rendered page.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse a snapshot embedded by the server.
    pub fn from_json(source: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(source)
    }
}

/// Identity of one in-flight load. Ids are never reused, even across
/// [`DataCache::clear`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InFlightId(u64);

/// Cached route data plus the table of loads currently in flight.
///
/// At most one in-flight load exists per key.
#[derive(Default)]
pub struct DataCache {
    entries: HashMap<CacheKey, CachedData>,
    in_flight: HashMap<CacheKey, (InFlightId, InFlightLoad)>,
    next_in_flight: u64,
}

impl DataCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty cache behind a shared handle.
    pub fn shared() -> SharedCache {
        Rc::new(RefCell::new(Self::new()))
    }

    /// Get a cached entry.
    pub fn get(&self, key: &CacheKey) -> Option<&CachedData> {
        self.entries.get(key)
    }

    /// Whether an entry exists for the key.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Store an entry, replacing any previous one.
    pub fn insert(&mut self, key: CacheKey, entry: CachedData) {
        tracing::debug!(key = %key, policy = %entry.policy, "cache write");
        self.entries.insert(key, entry);
    }

    /// Remove an entry.
    pub fn remove(&mut self, key: &CacheKey) -> Option<CachedData> {
        self.entries.remove(key)
    }

    /// Mark an entry stale so it is revalidated on next read.
    pub fn invalidate(&mut self, key: &CacheKey) -> bool {
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.stale = true;
                true
            }
            None => false,
        }
    }

    /// Mark every entry for a resolved path stale. Returns the count.
    pub fn invalidate_path(&mut self, path: &str) -> usize {
        let mut count = 0;
        for (key, entry) in self.entries.iter_mut() {
            if key.path() == path {
                entry.stale = true;
                count += 1;
            }
        }
        count
    }

    /// Evict entries whose lifetime has elapsed at `now`.
    pub fn gc(&mut self, now: Duration) -> Vec<CacheKey> {
        let expired: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.should_gc(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            tracing::debug!(key = %key, "gc evicting cached data");
            self.entries.remove(key);
        }
        expired
    }

    /// Load a startup snapshot, stamping every entry as fetched at `now`.
    pub fn hydrate(&mut self, snapshot: CacheSnapshot, now: Duration) {
        for (key, mut entry) in snapshot.entries {
            entry.fetched_at = now;
            self.entries.insert(key, entry);
        }
    }

    /// Copy the current entries into a snapshot.
    pub fn snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            entries: self
                .entries
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    /// Get the in-flight load for a key.
    pub fn in_flight(&self, key: &CacheKey) -> Option<InFlightLoad> {
        self.in_flight.get(key).map(|(_, load)| load.clone())
    }

    /// Allocate the id for a load about to start.
    pub fn next_in_flight_id(&mut self) -> InFlightId {
        self.next_in_flight += 1;
        InFlightId(self.next_in_flight)
    }

    /// Register an in-flight load.
    pub fn start_in_flight(&mut self, key: CacheKey, id: InFlightId, load: InFlightLoad) {
        self.in_flight.insert(key, (id, load));
    }

    /// Remove the in-flight load for a key if it is still the load `id`.
    /// Returns whether an entry was removed.
    pub fn finish_in_flight(&mut self, key: &CacheKey, id: InFlightId) -> bool {
        match self.in_flight.get(key) {
            Some((current, _)) if *current == id => {
                self.in_flight.remove(key);
                true
            }
            _ => false,
        }
    }

    /// Number of loads in flight.
    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entries are cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all entries and in-flight loads.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.in_flight.clear();
    }
}

impl std::fmt::Debug for DataCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataCache")
            .field("entries", &self.entries.len())
            .field("in_flight", &self.in_flight.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use serde_json::json;

    fn entry(data: Value, gc_secs: u64, fetched_secs: u64) -> CachedData {
        CachedData::new(
            data,
            Location::new("/users/1"),
            CachePolicy::CacheFirst,
            Duration::from_secs(gc_secs),
            Duration::from_secs(fetched_secs),
        )
    }

    fn key(path: &str) -> CacheKey {
        CacheKey::compose(path, &json!({})).unwrap()
    }

    // === CachedData Tests ===

    #[test]
    fn test_cached_data_age_and_gc() {
        let e = entry(json!(1), 60, 10);
        assert_eq!(e.age(Duration::from_secs(40)), Duration::from_secs(30));
        assert!(!e.should_gc(Duration::from_secs(70)));
        assert!(e.should_gc(Duration::from_secs(71)));
    }

    #[test]
    fn test_cached_data_staleness() {
        let mut e = entry(json!(1), 60, 0);
        assert!(!e.is_stale(Duration::from_secs(5), Duration::from_secs(10)));
        assert!(e.is_stale(Duration::from_secs(11), Duration::from_secs(10)));

        e.stale = true;
        assert!(e.is_stale(Duration::ZERO, Duration::from_secs(10)));
    }

    // === DataCache Tests ===

    #[test]
    fn test_insert_get_remove() {
        let mut cache = DataCache::new();
        cache.insert(key("/a"), entry(json!({"name": "Ann"}), 60, 0));

        assert!(cache.contains(&key("/a")));
        assert_eq!(cache.get(&key("/a")).unwrap().data, json!({"name": "Ann"}));
        assert!(cache.remove(&key("/a")).is_some());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_gc_evicts_only_expired() {
        let mut cache = DataCache::new();
        cache.insert(key("/old"), entry(json!(1), 10, 0));
        cache.insert(key("/new"), entry(json!(2), 10, 15));

        let evicted = cache.gc(Duration::from_secs(20));

        assert_eq!(evicted, vec![key("/old")]);
        assert!(!cache.contains(&key("/old")));
        assert!(cache.contains(&key("/new")));
    }

    #[test]
    fn test_invalidate_marks_stale() {
        let mut cache = DataCache::new();
        cache.insert(key("/a"), entry(json!(1), 60, 0));

        assert!(cache.invalidate(&key("/a")));
        assert!(cache.get(&key("/a")).unwrap().stale);
        assert!(!cache.invalidate(&key("/missing")));
    }

    #[test]
    fn test_invalidate_path_matches_all_deps() {
        let mut cache = DataCache::new();
        let k1 = CacheKey::compose("/list", &json!({"page": 1})).unwrap();
        let k2 = CacheKey::compose("/list", &json!({"page": 2})).unwrap();
        cache.insert(k1.clone(), entry(json!(1), 60, 0));
        cache.insert(k2.clone(), entry(json!(2), 60, 0));
        cache.insert(key("/other"), entry(json!(3), 60, 0));

        assert_eq!(cache.invalidate_path("/list"), 2);
        assert!(!cache.get(&key("/other")).unwrap().stale);
    }

    #[test]
    fn test_snapshot_hydrate_restamps() {
        let mut server = DataCache::new();
        server.insert(key("/a"), entry(json!({"x": 1}), 60, 0));
        let json = server.snapshot().to_json().unwrap();

        let snapshot = CacheSnapshot::from_json(&json).unwrap();
        let mut client = DataCache::new();
        client.hydrate(snapshot, Duration::from_secs(500));

        let hydrated = client.get(&key("/a")).unwrap();
        assert_eq!(hydrated.data, json!({"x": 1}));
        assert_eq!(hydrated.fetched_at, Duration::from_secs(500));
    }

    #[test]
    fn test_in_flight_table() {
        let mut cache = DataCache::new();
        let load: InFlightLoad = async { Ok(json!(1)) }.boxed_local().shared();

        let id = cache.next_in_flight_id();

        cache.start_in_flight(key("/a"), id, load);
        assert!(cache.in_flight(&key("/a")).is_some());
        assert_eq!(cache.in_flight_len(), 1);

        assert!(cache.finish_in_flight(&key("/a"), id));
        assert!(cache.in_flight(&key("/a")).is_none());
    }

    #[test]
    fn test_finish_ignores_replaced_in_flight_load() {
        let mut cache = DataCache::new();
        let old = cache.next_in_flight_id();
        cache.start_in_flight(key("/a"), old, async { Ok(json!(1)) }.boxed_local().shared());

        cache.clear();
        let new = cache.next_in_flight_id();
        assert_ne!(old, new);
        cache.start_in_flight(key("/a"), new, async { Ok(json!(2)) }.boxed_local().shared());

        assert!(!cache.finish_in_flight(&key("/a"), old));
        assert_eq!(cache.in_flight_len(), 1);
        assert!(cache.finish_in_flight(&key("/a"), new));
        assert_eq!(cache.in_flight_len(), 0);
    }

    #[test]
    fn test_clear() {
        let mut cache = DataCache::new();
        cache.insert(key("/a"), entry(json!(1), 60, 0));
        let id = cache.next_in_flight_id();
        cache.start_in_flight(key("/b"), id, async { Ok(json!(2)) }.boxed_local().shared());

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.in_flight_len(), 0);
    }
}
