//! Component trait definition.

use async_trait::async_trait;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use super::{ComponentContext, ComponentMetadata};
use crate::error::ComponentError;
use crate::event::EventHandler;
use crate::types::{ComponentStatus, ServiceInfo};

/// Opaque value exposed by a component (a handler or a service).
pub type Opaque = Arc<dyn Any + Send + Sync>;

/// Named handlers exposed by a component.
pub type HandlerMap = HashMap<String, Opaque>;

/// Named services exposed by a component.
pub type ServiceMap = HashMap<String, Opaque>;

/// Shared reference to a live component.
pub type ComponentRef = Arc<dyn Component>;

/// Core trait for all components.
///
/// Every component must implement this trait. It provides:
/// - Metadata (name, version, dependencies)
/// - Multi-phase lifecycle hooks
/// - Handlers and services for cross-component wiring
///
/// Hooks take `&self`; components keep mutable state behind their own locks.
#[async_trait]
pub trait Component: Send + Sync + 'static {
    /// Returns the component metadata.
    fn metadata(&self) -> &ComponentMetadata;

    fn name(&self) -> &str {
        &self.metadata().name
    }

    fn version(&self) -> &str {
        &self.metadata().version
    }

    fn description(&self) -> &str {
        &self.metadata().description
    }

    /// Names of components that must be initialized before this one.
    ///
    /// The resolver reads this; it must agree with `metadata().dependencies`.
    fn dependencies(&self) -> &[String] {
        &self.metadata().dependencies
    }

    fn status(&self) -> ComponentStatus;

    async fn pre_init(&self) -> Result<(), ComponentError> {
        Ok(())
    }

    /// Initialize with this component's configuration and a runtime handle.
    async fn init(&self, ctx: ComponentContext) -> Result<(), ComponentError>;

    /// Runs after every component has passed `init`; siblings can be looked up here.
    async fn post_init(&self) -> Result<(), ComponentError> {
        Ok(())
    }

    async fn pre_cleanup(&self) -> Result<(), ComponentError> {
        Ok(())
    }

    async fn cleanup(&self) -> Result<(), ComponentError> {
        Ok(())
    }

    fn handlers(&self) -> HandlerMap {
        HandlerMap::new()
    }

    fn services(&self) -> ServiceMap {
        ServiceMap::new()
    }

    /// Network-exposing components add their routes here.
    fn register_routes(&self, _router: &mut dyn Router) {}

    /// Components taking part in external service discovery return their registration.
    fn service_info(&self) -> Option<ServiceInfo> {
        None
    }

    /// Returns a reference to the component as `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;
}

/// Route sink supplied by the host's HTTP layer.
pub trait Router: Send {
    fn add_route(&mut self, method: &str, path: &str, handler: Opaque);
}

/// Runtime operations available to components through their context.
pub trait RuntimeAccess: Send + Sync {
    /// Look up a registered component.
    fn component(&self, name: &str) -> Result<ComponentRef, ComponentError>;

    /// Look up a named handler exposed by a component.
    fn handler(&self, component: &str, handler: &str) -> Result<Opaque, ComponentError>;

    /// Look up a named service exposed by a component.
    fn service(&self, component: &str, service: &str) -> Result<Opaque, ComponentError>;

    /// Subscribe to an event by name.
    fn subscribe(&self, event: &str, handler: Arc<dyn EventHandler>);

    /// Publish an event; never waits for subscribers.
    fn publish(&self, event: &str, payload: serde_json::Value);
}
