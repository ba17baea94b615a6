//! Fire-and-forget publish/subscribe between components.

use std::any::Any;
use std::sync::Arc;

use dashmap::DashMap;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use tokio::runtime::Handle;
use tracing::{debug, error, warn};

use modhost_protocols::{Event, EventHandler};

struct Subscription {
    /// Component that subscribed; `None` for the host.
    owner: Option<String>,
    handler: Arc<dyn EventHandler>,
}

/// Event bus keyed by event name.
///
/// `publish` hands each subscriber its own task and returns immediately.
/// A subscriber that errors or panics is logged and affects nobody else.
pub struct EventBus {
    subscribers: DashMap<String, Vec<Subscription>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: DashMap::new(),
        }
    }

    /// Append a handler to the subscriber list of `event`.
    pub fn subscribe(&self, event: &str, handler: Arc<dyn EventHandler>) {
        self.push(event, None, handler);
    }

    /// Subscribe on behalf of a component, so the subscription can be dropped
    /// when that component is detached.
    pub fn subscribe_owned(&self, owner: &str, event: &str, handler: Arc<dyn EventHandler>) {
        self.push(event, Some(owner.to_string()), handler);
    }

    fn push(&self, event: &str, owner: Option<String>, handler: Arc<dyn EventHandler>) {
        self.subscribers
            .entry(event.to_string())
            .or_default()
            .push(Subscription { owner, handler });
        debug!("Subscribed handler to event: {}", event);
    }

    /// Drop every subscription made on behalf of `owner`; returns how many.
    pub fn remove_owner(&self, owner: &str) -> usize {
        let mut removed = 0;
        for mut entry in self.subscribers.iter_mut() {
            let before = entry.value().len();
            entry
                .value_mut()
                .retain(|s| s.owner.as_deref() != Some(owner));
            removed += before - entry.value().len();
        }
        if removed > 0 {
            debug!("Removed {} subscriptions owned by {}", removed, owner);
        }
        removed
    }

    /// Dispatch `event` to every current subscriber without waiting.
    ///
    /// Returns the number of handlers dispatched. Outside a tokio runtime the
    /// event is dropped with a warning.
    pub fn publish(&self, event: &str, payload: serde_json::Value) -> usize {
        // Snapshot so the map shard lock is not held across spawns.
        let handlers: Vec<Arc<dyn EventHandler>> = match self.subscribers.get(event) {
            Some(list) => list.value().iter().map(|s| s.handler.clone()).collect(),
            None => return 0,
        };

        if handlers.is_empty() {
            return 0;
        }

        let runtime = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!("No async runtime available, dropping event: {}", event);
                return 0;
            }
        };

        let event = Event::new(event, payload);
        for handler in &handlers {
            let handler = handler.clone();
            let event = event.clone();
            runtime.spawn(async move {
                let name = event.name.clone();
                match AssertUnwindSafe(handler.handle(event)).catch_unwind().await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!("Event handler for {} failed: {}", name, e),
                    Err(panic) => error!(
                        "Event handler for {} panicked: {}",
                        name,
                        panic_message(panic.as_ref())
                    ),
                }
            });
        }

        handlers.len()
    }

    pub fn subscriber_count(&self, event: &str) -> usize {
        self.subscribers.get(event).map(|l| l.len()).unwrap_or(0)
    }

    /// Event names with at least one subscriber, sorted.
    pub fn event_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .subscribers
            .iter()
            .filter(|entry| !entry.value().is_empty())
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    /// Drop every subscription.
    pub fn clear(&self) {
        self.subscribers.clear();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
#[path = "event_bus_tests.rs"]
mod tests;
