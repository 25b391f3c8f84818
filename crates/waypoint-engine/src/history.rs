//! History abstraction and an in-memory implementation.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use waypoint_core::{Location, LocationKey};

/// How the current history entry changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryAction {
    /// A new entry was pushed.
    Push,
    /// The current entry was replaced.
    Replace,
    /// The user moved back or forward.
    Pop,
}

/// Delivered to history listeners after every change.
#[derive(Debug, Clone)]
pub struct HistoryEvent {
    /// The new current location.
    pub location: Location,
    /// What changed.
    pub action: HistoryAction,
    /// Entries moved for back/forward; `None` when unknown.
    pub delta: Option<i64>,
}

/// History change listener.
pub type HistoryListener = Rc<dyn Fn(&HistoryEvent)>;

/// Identifies a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

/// The browser history as seen by the engine.
///
/// It is the only source of navigation triggers and the only mutator of
/// the visible URL.
pub trait History {
    /// The current location, including its identity key.
    fn location(&self) -> Location;

    /// Push a new entry. Listeners are notified.
    fn push(&self, location: Location);

    /// Replace the current entry. Listeners are notified.
    fn replace(&self, location: Location);

    /// Move back (negative) or forward. Listeners are notified.
    fn go(&self, delta: i64);

    /// Reload the page, discarding client state.
    fn reload(&self);

    /// Register a change listener.
    fn listen(&self, listener: HistoryListener) -> ListenerId;

    /// Remove a change listener.
    fn unlisten(&self, id: ListenerId);
}

/// History handle shared across the engine.
pub type SharedHistory = Rc<dyn History>;

#[derive(Debug)]
struct Entries {
    stack: Vec<Location>,
    index: usize,
}

/// In-memory history stack.
///
/// Listeners are called synchronously after each change, with no internal
/// borrow held, so they may call back into the history.
pub struct MemoryHistory {
    entries: RefCell<Entries>,
    listeners: RefCell<Vec<(ListenerId, HistoryListener)>>,
    next_listener: Cell<u64>,
    reloads: Cell<u32>,
}

impl MemoryHistory {
    /// Create a history whose only entry is `url`.
    pub fn new(url: &str) -> Self {
        Self::from_location(Location::parse(url).with_key(LocationKey::initial()))
    }

    /// Create a history whose only entry is `location`.
    pub fn from_location(location: Location) -> Self {
        Self {
            entries: RefCell::new(Entries {
                stack: vec![location],
                index: 0,
            }),
            listeners: RefCell::new(Vec::new()),
            next_listener: Cell::new(0),
            reloads: Cell::new(0),
        }
    }

    /// Create a history behind a shared handle.
    pub fn shared(url: &str) -> Rc<Self> {
        Rc::new(Self::new(url))
    }

    /// URLs of every entry, oldest first.
    pub fn urls(&self) -> Vec<String> {
        self.entries
            .borrow()
            .stack
            .iter()
            .map(Location::to_url)
            .collect()
    }

    /// Index of the current entry.
    pub fn index(&self) -> usize {
        self.entries.borrow().index
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.borrow().stack.len()
    }

    /// Whether the stack is empty. Never true in practice.
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().stack.is_empty()
    }

    /// How many times `reload` was called.
    pub fn reloads(&self) -> u32 {
        self.reloads.get()
    }

    fn notify(&self, action: HistoryAction, delta: Option<i64>) {
        let event = HistoryEvent {
            location: self.location(),
            action,
            delta,
        };
        let listeners: Vec<HistoryListener> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        for listener in listeners {
            listener(&event);
        }
    }
}

impl History for MemoryHistory {
    fn location(&self) -> Location {
        let entries = self.entries.borrow();
        entries.stack[entries.index].clone()
    }

    fn push(&self, location: Location) {
        {
            let mut entries = self.entries.borrow_mut();
            let next = entries.index + 1;
            entries.stack.truncate(next);
            entries
                .stack
                .push(location.with_key(LocationKey::generate()));
            entries.index = next;
        }
        self.notify(HistoryAction::Push, None);
    }

    fn replace(&self, location: Location) {
        {
            let mut entries = self.entries.borrow_mut();
            let index = entries.index;
            entries.stack[index] = location.with_key(LocationKey::generate());
        }
        self.notify(HistoryAction::Replace, None);
    }

    fn go(&self, delta: i64) {
        let moved = {
            let mut entries = self.entries.borrow_mut();
            let last = entries.stack.len() as i64 - 1;
            let target = (entries.index as i64 + delta).clamp(0, last);
            let moved = target - entries.index as i64;
            entries.index = target as usize;
            moved
        };
        if moved != 0 {
            self.notify(HistoryAction::Pop, Some(moved));
        }
    }

    fn reload(&self) {
        tracing::debug!("history reload requested");
        self.reloads.set(self.reloads.get() + 1);
    }

    fn listen(&self, listener: HistoryListener) -> ListenerId {
        let id = ListenerId(self.next_listener.get());
        self.next_listener.set(id.0 + 1);
        self.listeners.borrow_mut().push((id, listener));
        id
    }

    fn unlisten(&self, id: ListenerId) {
        self.listeners
            .borrow_mut()
            .retain(|(listener_id, _)| *listener_id != id);
    }
}

impl fmt::Debug for MemoryHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryHistory")
            .field("entries", &self.urls())
            .field("index", &self.index())
            .field("listeners", &self.listeners.borrow().len())
            .finish()
    }
}
