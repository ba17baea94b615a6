//! # modhost Heartbeat Component
//!
//! Counts `heartbeat.tick` events and reports liveness. Depends on `audit`.
//!
//! The component never spawns tasks of its own; whoever wants beats publishes ticks.

pub mod beats;
pub mod component;

pub use beats::{BeatCounter, StatusProbe};
pub use component::HeartbeatComponent;

#[cfg(feature = "dynamic")]
modhost_protocols::export_component!(HeartbeatComponent::new);
