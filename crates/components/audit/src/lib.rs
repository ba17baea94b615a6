//! # modhost Audit Component
//!
//! Keeps a bounded, in-memory trail of runtime lifecycle events.
//!
//! ## Exposes
//!
//! - service `events`: the [`AuditLog`]
//! - route `GET /audit/events`
//!
//! Links statically, or builds as a loadable unit exporting `Instance` with
//! `--features dynamic`.

pub mod component;
pub mod log;

pub use component::AuditComponent;
pub use log::{AuditEntry, AuditLog};

#[cfg(feature = "dynamic")]
modhost_protocols::export_component!(AuditComponent::new);
