//! Static registration of the bundled components (dev mode).

use std::sync::Arc;

use tracing::info;

use modhost_audit::AuditComponent;
use modhost_core::Runtime;
use modhost_heartbeat::HeartbeatComponent;
use modhost_protocols::{ComponentError, ComponentRef};

pub(crate) fn bundled_components() -> Vec<ComponentRef> {
    vec![
        Arc::new(AuditComponent::new()),
        Arc::new(HeartbeatComponent::new()),
    ]
}

/// Register every bundled component; the runtime orders them at init.
pub(crate) fn register_bundled(runtime: &Runtime) -> Result<(), ComponentError> {
    for component in bundled_components() {
        runtime.register_component(component)?;
    }
    info!("Registered {} bundled component(s)", runtime.registry().len());
    Ok(())
}
