//! Stored pairing of component metadata and live instance.

use std::sync::Arc;

use modhost_protocols::{ComponentError, ComponentMetadata, ComponentRef};

use super::Loans;

/// Registry entry: a metadata snapshot taken at registration plus the live component.
///
/// Clones share one [`Loans`] record.
#[derive(Clone)]
pub struct ComponentWrapper {
    metadata: ComponentMetadata,
    component: ComponentRef,
    loans: Arc<Loans>,
}

impl ComponentWrapper {
    /// Snapshot the component's metadata and check it is usable as a registry key.
    pub fn new(component: ComponentRef) -> Result<Self, ComponentError> {
        let metadata = component.metadata().clone();

        if metadata.name.trim().is_empty() {
            return Err(ComponentError::InvalidComponent(
                "component name cannot be empty".to_string(),
            ));
        }

        if component.name() != metadata.name {
            return Err(ComponentError::InvalidComponent(format!(
                "{}: name() disagrees with metadata name",
                metadata.name
            )));
        }

        if component.dependencies() != metadata.dependencies.as_slice() {
            return Err(ComponentError::InvalidComponent(format!(
                "{}: dependencies() disagrees with metadata dependencies",
                metadata.name
            )));
        }

        Ok(Self {
            metadata,
            component,
            loans: Arc::new(Loans::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn metadata(&self) -> &ComponentMetadata {
        &self.metadata
    }

    pub fn component(&self) -> &ComponentRef {
        &self.component
    }

    /// Values handed out by this component that may still be alive.
    pub fn loans(&self) -> &Arc<Loans> {
        &self.loans
    }
}

impl std::fmt::Debug for ComponentWrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentWrapper")
            .field("metadata", &self.metadata)
            .field("status", &self.component.status())
            .field("loans", &self.loans)
            .finish()
    }
}
