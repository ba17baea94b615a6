//! # modhost Protocols
//!
//! Interface definitions shared by the modhost runtime and every component.
//! Contains no orchestration logic.
//!
//! ## Core Traits
//!
//! - [`Component`] - Lifecycle contract every functional unit implements
//! - [`RuntimeAccess`] - What a component may ask of the runtime during `init`
//! - [`EventHandler`] - Subscriber callback for the event bus
//! - [`Router`] - Opaque sink for network-exposing components

pub mod component;
pub mod error;
pub mod event;
pub mod export;
pub mod types;

pub use component::{
    Component, ComponentContext, ComponentMetadata, ComponentRef, HandlerMap, Opaque,
    Router, RuntimeAccess, ServiceMap,
};
pub use error::{ComponentError, LifecyclePhase};
pub use event::{handler_fn, Event, EventHandler};
pub use export::{ComponentEntryFn, INSTANCE_SYMBOL};
pub use types::{ComponentStatus, ServiceInfo, StatusCell};
