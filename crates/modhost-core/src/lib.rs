//! # modhost Core
//!
//! Component runtime for the modhost server.
//!
//! ## Components
//!
//! - [`Runtime`] - Registers components, drives phased init/teardown in
//!   dependency order, and serves cross-component lookups
//! - [`ComponentRegistry`] - Name-keyed component storage sharing one lock
//!   with the runtime state
//! - [`resolver`] - Dependency ordering with cycle and missing-dependency detection
//! - [`EventBus`] - Fire-and-forget publish/subscribe between components
//! - [`ComponentLoader`] - Loads, unloads and reloads components from loadable units
//! - [`Admin`] - Management surface over the runtime and loader

pub mod admin;
pub mod event_bus;
pub mod lifecycle;
pub mod loader;
pub mod registry;
pub mod resolver;
pub mod runtime;
mod runtime_handle;

#[cfg(test)]
mod test_support;

pub use admin::Admin;
pub use event_bus::EventBus;
pub use lifecycle::{CleanupReport, InitPolicy, InitReport, RuntimeOptions, RuntimeState};
pub use loader::{
    ComponentLoader, LoadOutcome, LoadReport, LoaderSettings, UnitHandle, UnitInspection,
    UnitOpener,
};

#[cfg(feature = "native-plugins")]
pub use loader::NativeOpener;
pub use registry::{ComponentRegistry, ComponentWrapper, Loans};
pub use runtime::{Admission, ComponentInfo, Runtime};
