//! View mounting and the view/context side table.

use std::collections::HashMap;
use std::fmt;

use waypoint_cache::CacheKey;

use crate::context::RoutingContext;

/// Identity of a mounted view instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewHandle(pub u64);

impl fmt::Display for ViewHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "view#{}", self.0)
    }
}

/// What to mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewTarget {
    /// Create and open a new instance of the named view.
    New(String),
    /// Reopen an instance that is still alive.
    Existing(ViewHandle),
}

/// Host view mounting.
pub trait ViewMounter {
    /// Mount a view with the given routing context, making it the open view.
    fn mount(&self, target: ViewTarget, context: &RoutingContext) -> anyhow::Result<ViewHandle>;

    /// The view currently open, if any.
    fn open_view(&self) -> Option<ViewHandle>;
}

/// Side table associating mounted views with their routing contexts, plus
/// the cached views kept alive per cache key.
///
/// Entries are removed when the host reports the view unmounted; the table
/// does not control view lifetime.
#[derive(Default)]
pub struct ViewTable {
    contexts: HashMap<ViewHandle, RoutingContext>,
    cached: HashMap<CacheKey, ViewHandle>,
}

impl ViewTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate a mounted view with its context.
    pub fn associate(&mut self, view: ViewHandle, context: RoutingContext) {
        self.contexts.insert(view, context);
    }

    /// The context associated with a view.
    pub fn context_for(&self, view: ViewHandle) -> Option<RoutingContext> {
        self.contexts.get(&view).cloned()
    }

    /// Keep a view for reuse under a cache key.
    pub fn cache_view(&mut self, key: CacheKey, view: ViewHandle) {
        self.cached.insert(key, view);
    }

    /// The cached view for a key.
    pub fn cached_view(&self, key: &CacheKey) -> Option<ViewHandle> {
        self.cached.get(key).copied()
    }

    /// Drop the cached view for a key.
    pub fn forget_cached(&mut self, key: &CacheKey) -> Option<ViewHandle> {
        self.cached.remove(key)
    }

    /// Remove a view's association and any cached entry holding it.
    pub fn unmounted(&mut self, view: ViewHandle) -> Option<RoutingContext> {
        self.cached.retain(|_, cached| *cached != view);
        self.contexts.remove(&view)
    }

    /// Number of cached views.
    pub fn cached_len(&self) -> usize {
        self.cached.len()
    }

    /// Number of associated views.
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    /// Whether no view is associated.
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.contexts.clear();
        self.cached.clear();
    }
}

impl fmt::Debug for ViewTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewTable")
            .field("views", &self.contexts.len())
            .field("cached", &self.cached.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use waypoint_core::Location;
    use waypoint_router::{FormProperties, NavContext, RouteBuilder, RouteRegistry};

    fn context(path: &str) -> RoutingContext {
        let mut registry = RouteRegistry::new();
        registry.register(RouteBuilder::new("/items/:id").build().unwrap());
        let matched = registry
            .match_location(&Location::parse(path))
            .unwrap()
            .unwrap();
        RoutingContext::new(matched, NavContext::new(), FormProperties::new())
    }

    #[test]
    fn test_associate_and_lookup() {
        let mut table = ViewTable::new();
        let ctx = context("/items/1");
        table.associate(ViewHandle(1), ctx.clone());

        assert!(table.context_for(ViewHandle(1)).unwrap().ptr_eq(&ctx));
        assert!(table.context_for(ViewHandle(2)).is_none());
    }

    #[test]
    fn test_unmount_drops_cached_entry() {
        let mut table = ViewTable::new();
        let ctx = context("/items/1");
        table.associate(ViewHandle(1), ctx.clone());
        table.cache_view(ctx.cache_key(), ViewHandle(1));

        assert!(table.unmounted(ViewHandle(1)).is_some());
        assert!(table.cached_view(&ctx.cache_key()).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_forget_cached_keeps_association() {
        let mut table = ViewTable::new();
        let ctx = context("/items/1");
        table.associate(ViewHandle(1), ctx.clone());
        table.cache_view(ctx.cache_key(), ViewHandle(1));

        assert_eq!(table.forget_cached(&ctx.cache_key()), Some(ViewHandle(1)));
        assert_eq!(table.cached_len(), 0);
        assert_eq!(table.len(), 1);
    }
}
