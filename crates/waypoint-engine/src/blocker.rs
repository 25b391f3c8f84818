//! Navigation blockers.

use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

/// Host hook for the document-unload warning.
pub trait UnloadHost {
    /// Install the shared unload intercept.
    fn install_unload_intercept(&self);

    /// Remove the shared unload intercept.
    fn remove_unload_intercept(&self);
}

/// Identifies an active block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockerId(u64);

/// Reference-counted set of active navigation blocks.
///
/// The unload intercept is installed when the first warning block is added
/// and removed when the last one goes.
pub struct BlockerSet {
    next_id: Cell<u64>,
    navigation: RefCell<BTreeSet<BlockerId>>,
    unload: RefCell<BTreeSet<BlockerId>>,
    host: Option<Rc<dyn UnloadHost>>,
}

impl BlockerSet {
    /// Create an empty set.
    pub fn new(host: Option<Rc<dyn UnloadHost>>) -> Self {
        Self {
            next_id: Cell::new(0),
            navigation: RefCell::new(BTreeSet::new()),
            unload: RefCell::new(BTreeSet::new()),
            host,
        }
    }

    /// Add a block.
    pub fn block(&self, warn_before_unload: bool) -> BlockerId {
        let id = BlockerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.navigation.borrow_mut().insert(id);

        if warn_before_unload {
            let first = {
                let mut unload = self.unload.borrow_mut();
                unload.insert(id);
                unload.len() == 1
            };
            if first {
                if let Some(host) = &self.host {
                    host.install_unload_intercept();
                }
            }
        }

        tracing::debug!(blocker = id.0, warn_before_unload, "navigation blocked");
        id
    }

    /// Remove a block. Returns whether it was active.
    pub fn unblock(&self, id: BlockerId) -> bool {
        let removed = self.navigation.borrow_mut().remove(&id);

        let last = {
            let mut unload = self.unload.borrow_mut();
            unload.remove(&id) && unload.is_empty()
        };
        if last {
            if let Some(host) = &self.host {
                host.remove_unload_intercept();
            }
        }

        if removed {
            tracing::debug!(blocker = id.0, "navigation unblocked");
        }
        removed
    }

    /// Whether any block is active.
    pub fn is_blocking(&self) -> bool {
        !self.navigation.borrow().is_empty()
    }

    /// Whether any block warns on document unload.
    pub fn is_unload_blocked(&self) -> bool {
        !self.unload.borrow().is_empty()
    }

    /// Number of active blocks.
    pub fn len(&self) -> usize {
        self.navigation.borrow().len()
    }

    /// Whether no block is active.
    pub fn is_empty(&self) -> bool {
        self.navigation.borrow().is_empty()
    }
}

impl Default for BlockerSet {
    fn default() -> Self {
        Self::new(None)
    }
}

impl fmt::Debug for BlockerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockerSet")
            .field("navigation", &self.navigation.borrow().len())
            .field("unload", &self.unload.borrow().len())
            .finish()
    }
}

/// A guard that vetoes navigation while active (e.g. unsaved changes).
///
/// While any blocker is active, back/forward moves are rolled back and
/// programmatic navigation is refused. Dropping the blocker releases it.
///
/// ```rust,ignore
/// let blocker = engine.blocker(true);
/// {
///     let _guard = blocker.guard();
///     // edits in progress
/// }
/// ```
pub struct NavigationBlocker {
    set: Rc<BlockerSet>,
    warn_before_unload: bool,
    id: Cell<Option<BlockerId>>,
}

impl NavigationBlocker {
    /// Create an inactive blocker.
    pub fn new(set: Rc<BlockerSet>, warn_before_unload: bool) -> Self {
        Self {
            set,
            warn_before_unload,
            id: Cell::new(None),
        }
    }

    /// Start blocking. No-op if already active.
    pub fn block(&self) {
        if self.id.get().is_none() {
            self.id.set(Some(self.set.block(self.warn_before_unload)));
        }
    }

    /// Stop blocking. No-op if inactive.
    pub fn unblock(&self) {
        if let Some(id) = self.id.take() {
            self.set.unblock(id);
        }
    }

    /// Whether this blocker is active.
    pub fn is_active(&self) -> bool {
        self.id.get().is_some()
    }

    /// Block until the returned guard drops.
    pub fn guard(&self) -> BlockerGuard<'_> {
        self.block();
        BlockerGuard { blocker: self }
    }
}

impl Drop for NavigationBlocker {
    fn drop(&mut self) {
        self.unblock();
    }
}

impl fmt::Debug for NavigationBlocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NavigationBlocker")
            .field("warn_before_unload", &self.warn_before_unload)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Releases a blocker on drop.
#[must_use = "the blocker is released when the guard drops"]
pub struct BlockerGuard<'a> {
    blocker: &'a NavigationBlocker,
}

impl Drop for BlockerGuard<'_> {
    fn drop(&mut self) {
        self.blocker.unblock();
    }
}
