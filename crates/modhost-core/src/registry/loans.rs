//! Weak record of values a component has handed out.
//!
//! Services, handlers, route handlers and event handlers obtained from a
//! component may carry code and vtables from the unit that built it. The
//! loader only closes a unit once every value recorded here is gone.

use std::any::Any;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use modhost_protocols::{EventHandler, Opaque};

#[derive(Default)]
pub struct Loans {
    values: Mutex<Vec<Weak<dyn Any + Send + Sync>>>,
    handlers: Mutex<Vec<Weak<dyn EventHandler>>>,
}

impl Loans {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a service, handler or route handler given out by the component.
    pub fn lend(&self, value: &Opaque) {
        let mut values = self.values.lock();
        values.retain(|v| v.strong_count() > 0);
        values.push(Arc::downgrade(value));
    }

    /// Record an event handler the component subscribed.
    pub fn lend_handler(&self, handler: &Arc<dyn EventHandler>) {
        let mut handlers = self.handlers.lock();
        handlers.retain(|h| h.strong_count() > 0);
        handlers.push(Arc::downgrade(handler));
    }

    /// Lent values that are still alive somewhere.
    pub fn outstanding(&self) -> usize {
        let values = self.values.lock().iter().filter(|v| v.strong_count() > 0).count();
        let handlers = self
            .handlers
            .lock()
            .iter()
            .filter(|h| h.strong_count() > 0)
            .count();
        values + handlers
    }

    /// Forget every lent value if none is alive any more.
    ///
    /// Returns `false`, keeping the record, while anything is outstanding.
    /// Once this returns `true` no weak reference into the unit remains, so
    /// it is safe to close.
    pub fn settle(&self) -> bool {
        let mut values = self.values.lock();
        let mut handlers = self.handlers.lock();
        if values.iter().any(|v| v.strong_count() > 0)
            || handlers.iter().any(|h| h.strong_count() > 0)
        {
            return false;
        }
        values.clear();
        handlers.clear();
        true
    }
}

impl std::fmt::Debug for Loans {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loans")
            .field("outstanding", &self.outstanding())
            .finish()
    }
}
