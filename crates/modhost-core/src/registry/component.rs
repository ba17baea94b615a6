//! Name-keyed component storage.

use std::collections::HashMap;

use parking_lot::RwLock;

use modhost_protocols::{ComponentError, ComponentRef};

use super::ComponentWrapper;
use crate::lifecycle::RuntimeState;
use crate::resolver::DependencyGraph;

struct RegistryInner {
    components: HashMap<String, ComponentWrapper>,
    state: RuntimeState,
}

/// Registry for managing components.
///
/// The component map and the runtime state sit behind the same lock, so a
/// registration can never interleave with the start of `init_all`.
pub struct ComponentRegistry {
    inner: RwLock<RegistryInner>,
}

impl ComponentRegistry {
    /// Create a new component registry.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner {
                components: HashMap::new(),
                state: RuntimeState::NotStarted,
            }),
        }
    }

    /// Register a component ahead of `init_all`.
    pub fn register(&self, component: ComponentRef) -> Result<(), ComponentError> {
        self.register_wrapper(ComponentWrapper::new(component)?)
    }

    /// Register an already wrapped component ahead of `init_all`.
    pub fn register_wrapper(&self, wrapper: ComponentWrapper) -> Result<(), ComponentError> {
        let mut inner = self.inner.write();

        if inner.state != RuntimeState::NotStarted {
            return Err(ComponentError::AlreadyInitialized);
        }

        Self::insert_locked(&mut inner, wrapper)
    }

    /// Insert a component that was initialized on its own.
    ///
    /// Only succeeds while the runtime is `Initialized`; the check and the
    /// insert happen under one lock, so a concurrent `cleanup` either sees
    /// the component or the insert fails.
    pub fn insert_if_initialized(&self, wrapper: ComponentWrapper) -> Result<(), ComponentError> {
        let mut inner = self.inner.write();
        match inner.state {
            RuntimeState::Initialized => Self::insert_locked(&mut inner, wrapper),
            RuntimeState::Initializing => Err(ComponentError::AlreadyInitialized),
            state => Err(ComponentError::Busy(state.to_string())),
        }
    }

    fn insert_locked(
        inner: &mut RegistryInner,
        wrapper: ComponentWrapper,
    ) -> Result<(), ComponentError> {
        let name = wrapper.name().to_string();
        if inner.components.contains_key(&name) {
            return Err(ComponentError::DuplicateName(name));
        }
        inner.components.insert(name, wrapper);
        Ok(())
    }

    /// Get a component by name.
    pub fn get(&self, name: &str) -> Result<ComponentWrapper, ComponentError> {
        self.inner
            .read()
            .components
            .get(name)
            .cloned()
            .ok_or_else(|| ComponentError::NotFound(name.to_string()))
    }

    /// Copy of every entry; never the live map.
    pub fn get_all(&self) -> HashMap<String, ComponentWrapper> {
        self.inner.read().components.clone()
    }

    /// Remove a component by name.
    pub fn remove(&self, name: &str) -> Result<ComponentWrapper, ComponentError> {
        self.inner
            .write()
            .components
            .remove(name)
            .ok_or_else(|| ComponentError::NotFound(name.to_string()))
    }

    /// Remove a component for detaching, returning the state it was removed in.
    ///
    /// Refused while the runtime is initializing or cleaning up.
    pub fn take(&self, name: &str) -> Result<(ComponentWrapper, RuntimeState), ComponentError> {
        let mut inner = self.inner.write();
        let state = inner.state;
        if matches!(state, RuntimeState::Initializing | RuntimeState::CleaningUp) {
            return Err(ComponentError::Busy(state.to_string()));
        }
        inner
            .components
            .remove(name)
            .map(|wrapper| (wrapper, state))
            .ok_or_else(|| ComponentError::NotFound(name.to_string()))
    }

    /// Remove every component.
    pub fn clear(&self) -> Vec<ComponentWrapper> {
        let mut inner = self.inner.write();
        inner.components.drain().map(|(_, w)| w).collect()
    }

    /// Check if a component is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.inner.read().components.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.read().components.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.inner.read().components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().components.is_empty()
    }

    /// Name to dependency names for every registered component.
    pub fn dependency_graph(&self) -> DependencyGraph {
        self.inner
            .read()
            .components
            .iter()
            .map(|(name, w)| (name.clone(), w.metadata().dependencies.clone()))
            .collect()
    }

    pub fn state(&self) -> RuntimeState {
        self.inner.read().state
    }

    /// Move `NotStarted -> Initializing` atomically with respect to `register`.
    pub fn begin_init(&self) -> Result<(), ComponentError> {
        let mut inner = self.inner.write();
        if inner.state != RuntimeState::NotStarted {
            return Err(ComponentError::AlreadyInitialized);
        }
        inner.state = RuntimeState::Initializing;
        Ok(())
    }

    pub fn set_state(&self, state: RuntimeState) {
        self.inner.write().state = state;
    }

    /// Move `NotStarted | Initialized -> CleaningUp`, returning the state left.
    pub fn begin_cleanup(&self) -> Result<RuntimeState, ComponentError> {
        let mut inner = self.inner.write();
        match inner.state {
            state @ (RuntimeState::NotStarted | RuntimeState::Initialized) => {
                inner.state = RuntimeState::CleaningUp;
                Ok(state)
            }
            state => Err(ComponentError::Busy(state.to_string())),
        }
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "component_tests.rs"]
mod tests;
