//! Runtime handle given to components.

use std::sync::{Arc, Weak};

use tracing::debug;

use modhost_protocols::{ComponentError, ComponentRef, EventHandler, Opaque, RuntimeAccess};

use crate::registry::{ComponentWrapper, Loans};
use crate::runtime::Runtime;

struct Owner {
    name: String,
    loans: Arc<Loans>,
}

/// [`RuntimeAccess`] backed by a weak reference, so components holding their
/// context never keep the runtime alive.
///
/// Subscriptions made through a component's handle are owned by that
/// component, recorded in its loans and dropped when it is detached.
pub(crate) struct RuntimeHandle {
    runtime: Weak<Runtime>,
    owner: Option<Owner>,
}

impl RuntimeHandle {
    pub(crate) fn new(runtime: Weak<Runtime>) -> Self {
        Self {
            runtime,
            owner: None,
        }
    }

    pub(crate) fn owned_by(runtime: Weak<Runtime>, wrapper: &ComponentWrapper) -> Self {
        Self {
            runtime,
            owner: Some(Owner {
                name: wrapper.name().to_string(),
                loans: wrapper.loans().clone(),
            }),
        }
    }

    fn upgrade(&self) -> Result<Arc<Runtime>, ComponentError> {
        self.runtime
            .upgrade()
            .ok_or_else(|| ComponentError::NotFound("runtime".to_string()))
    }
}

impl RuntimeAccess for RuntimeHandle {
    fn component(&self, name: &str) -> Result<ComponentRef, ComponentError> {
        self.upgrade()?.get_component(name)
    }

    fn handler(&self, component: &str, handler: &str) -> Result<Opaque, ComponentError> {
        self.upgrade()?.get_handler(component, handler)
    }

    fn service(&self, component: &str, service: &str) -> Result<Opaque, ComponentError> {
        self.upgrade()?.get_service(component, service)
    }

    fn subscribe(&self, event: &str, handler: Arc<dyn EventHandler>) {
        match self.runtime.upgrade() {
            Some(runtime) => match &self.owner {
                Some(owner) => {
                    owner.loans.lend_handler(&handler);
                    runtime.events().subscribe_owned(&owner.name, event, handler);
                }
                None => runtime.subscribe(event, handler),
            },
            None => debug!("Runtime dropped, ignoring subscription to {}", event),
        }
    }

    fn publish(&self, event: &str, payload: serde_json::Value) {
        match self.runtime.upgrade() {
            Some(runtime) => {
                runtime.publish(event, payload);
            }
            None => debug!("Runtime dropped, ignoring event {}", event),
        }
    }
}
