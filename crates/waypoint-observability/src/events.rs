//! Navigation event emitter.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use thiserror::Error;

/// Events raised around each navigation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavigationEvent {
    /// A navigation attempt started.
    Navigate,
    /// The attempt suspended waiting on data.
    Pending,
    /// The attempt concluded, successfully or not.
    Idle,
}

impl NavigationEvent {
    /// All events, in the order they are raised.
    pub const ALL: [NavigationEvent; 3] = [Self::Navigate, Self::Pending, Self::Idle];

    /// Event name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Navigate => "navigate",
            Self::Pending => "pending",
            Self::Idle => "idle",
        }
    }
}

impl fmt::Display for NavigationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NavigationEvent {
    type Err = EventError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|event| event.name() == name)
            .ok_or_else(|| EventError::UnknownEvent(name.to_string()))
    }
}

/// Event registration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    #[error("event {0:?} is not valid, valid events are navigate, pending, idle")]
    UnknownEvent(String),
}

/// Identifies a registered handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

/// Event handler; receives the event and its payload.
pub type EventHandler<P> = Rc<dyn Fn(NavigationEvent, &P)>;

/// Dispatches navigation events to registered handlers.
///
/// Handlers may add or remove handlers while being called; changes apply
/// from the next emit.
pub struct EventEmitter<P> {
    next_id: Cell<u64>,
    handlers: RefCell<Vec<(HandlerId, NavigationEvent, EventHandler<P>)>>,
}

impl<P> EventEmitter<P> {
    /// Create an emitter with no handlers.
    pub fn new() -> Self {
        Self {
            next_id: Cell::new(0),
            handlers: RefCell::new(Vec::new()),
        }
    }

    /// Register a handler for an event.
    pub fn on<F>(&self, event: NavigationEvent, handler: F) -> HandlerId
    where
        F: Fn(NavigationEvent, &P) + 'static,
    {
        let id = HandlerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.handlers
            .borrow_mut()
            .push((id, event, Rc::new(handler)));
        id
    }

    /// Register a handler by event name.
    pub fn add_event_handler<F>(&self, name: &str, handler: F) -> Result<HandlerId, EventError>
    where
        F: Fn(NavigationEvent, &P) + 'static,
    {
        let event = name.parse()?;
        Ok(self.on(event, handler))
    }

    /// Remove a handler. Returns whether it was registered.
    pub fn remove(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.borrow_mut();
        let before = handlers.len();
        handlers.retain(|(handler_id, _, _)| *handler_id != id);
        handlers.len() != before
    }

    /// Call every handler registered for `event`, in registration order.
    pub fn emit(&self, event: NavigationEvent, payload: &P) {
        let handlers: Vec<EventHandler<P>> = self
            .handlers
            .borrow()
            .iter()
            .filter(|(_, e, _)| *e == event)
            .map(|(_, _, handler)| handler.clone())
            .collect();

        tracing::trace!(event = %event, handlers = handlers.len(), "raising navigation event");
        for handler in handlers {
            handler(event, payload);
        }
    }

    /// Number of handlers registered for `event`.
    pub fn handler_count(&self, event: NavigationEvent) -> usize {
        self.handlers
            .borrow()
            .iter()
            .filter(|(_, e, _)| *e == event)
            .count()
    }

    /// Remove every handler.
    pub fn clear(&self) {
        self.handlers.borrow_mut().clear();
    }
}

impl<P> Default for EventEmitter<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> fmt::Debug for EventEmitter<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEmitter")
            .field("handlers", &self.handlers.borrow().len())
            .finish()
    }
}
