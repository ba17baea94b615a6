//! Audit component definition.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use modhost_protocols::{
    handler_fn, Component, ComponentContext, ComponentError, ComponentMetadata, ComponentStatus,
    Opaque, Router, ServiceMap, StatusCell,
};

use crate::log::{AuditEntry, AuditLog};

/// Events recorded when the component configuration names none.
pub const DEFAULT_EVENTS: &[&str] = &[
    "runtime.initialized",
    "runtime.cleanup",
    "component.attached",
    "component.detached",
];

pub struct AuditComponent {
    metadata: ComponentMetadata,
    status: StatusCell,
    log: Arc<AuditLog>,
}

impl AuditComponent {
    pub fn new() -> Self {
        Self {
            metadata: ComponentMetadata::new("audit", env!("CARGO_PKG_VERSION"))
                .with_description("Records runtime lifecycle events")
                .with_kind("observer"),
            status: StatusCell::default(),
            log: Arc::new(AuditLog::default()),
        }
    }

    pub fn log(&self) -> &Arc<AuditLog> {
        &self.log
    }
}

impl Default for AuditComponent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Component for AuditComponent {
    fn metadata(&self) -> &ComponentMetadata {
        &self.metadata
    }

    fn status(&self) -> ComponentStatus {
        self.status.get()
    }

    async fn init(&self, ctx: ComponentContext) -> Result<(), ComponentError> {
        if let Some(capacity) = ctx.get_config::<usize>("capacity") {
            self.log.set_capacity(capacity);
        }

        let events = ctx.get_config::<Vec<String>>("events").unwrap_or_else(|| {
            DEFAULT_EVENTS.iter().map(|e| e.to_string()).collect()
        });

        for event in &events {
            let log = self.log.clone();
            ctx.runtime.subscribe(
                event,
                handler_fn(move |event| {
                    let log = log.clone();
                    async move {
                        log.record(AuditEntry::from(event));
                        Ok(())
                    }
                }),
            );
        }

        debug!("Audit recording {} event(s)", events.len());
        Ok(())
    }

    async fn post_init(&self) -> Result<(), ComponentError> {
        self.status.set(ComponentStatus::Active);
        Ok(())
    }

    async fn cleanup(&self) -> Result<(), ComponentError> {
        self.status.set(ComponentStatus::Inactive);
        Ok(())
    }

    fn services(&self) -> ServiceMap {
        let mut services = ServiceMap::new();
        services.insert("events".to_string(), self.log.clone() as Opaque);
        services
    }

    fn register_routes(&self, router: &mut dyn Router) {
        router.add_route("GET", "/audit/events", self.log.clone());
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
