//! Visual transitions around view mounts.

use std::cell::Cell;
use std::rc::Rc;

/// Host support for visual view transitions.
pub trait TransitionHost {
    /// Whether the host can run view transitions at all.
    fn supports_transitions(&self) -> bool;

    /// Whether the document is currently visible.
    fn is_visible(&self) -> bool {
        true
    }

    /// Begin a transition. May fail if the host state changed.
    fn start_transition(&self) -> anyhow::Result<()>;

    /// Finish the running transition.
    fn finish_transition(&self);
}

/// Runs a host transition for the lifetime of the scope.
///
/// A transition starts only when the host supports it, transitions are
/// enabled, the document is visible, and no other transition is active.
/// The transition is finished when the scope drops.
pub struct TransitionScope {
    host: Option<Rc<dyn TransitionHost>>,
    active: Rc<Cell<bool>>,
}

impl TransitionScope {
    /// Enter a scope. `active` is shared by every scope of one engine.
    pub fn enter(
        host: Option<&Rc<dyn TransitionHost>>,
        enabled: bool,
        active: &Rc<Cell<bool>>,
    ) -> Self {
        let mut started = None;

        if let Some(host) = host {
            if enabled && !active.get() && host.supports_transitions() && host.is_visible() {
                match host.start_transition() {
                    Ok(()) => {
                        active.set(true);
                        started = Some(host.clone());
                    }
                    Err(e) => tracing::debug!(error = %e, "failed to start view transition"),
                }
            }
        }

        Self {
            host: started,
            active: active.clone(),
        }
    }

    /// Whether this scope started a transition.
    pub fn is_transitioning(&self) -> bool {
        self.host.is_some()
    }
}

impl Drop for TransitionScope {
    fn drop(&mut self) {
        if let Some(host) = self.host.take() {
            self.active.set(false);
            host.finish_transition();
        }
    }
}
