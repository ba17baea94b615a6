//! Heartbeat component definition.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info};

use modhost_protocols::{
    handler_fn, Component, ComponentContext, ComponentError, ComponentMetadata, ComponentStatus,
    HandlerMap, Opaque, RuntimeAccess, ServiceInfo, ServiceMap, StatusCell,
};

use crate::beats::{BeatCounter, StatusProbe};

pub const TICK_EVENT: &str = "heartbeat.tick";
pub const READY_EVENT: &str = "heartbeat.ready";
pub const STOPPED_EVENT: &str = "heartbeat.stopped";

pub struct HeartbeatComponent {
    metadata: ComponentMetadata,
    status: StatusCell,
    beats: Arc<BeatCounter>,
    runtime: Mutex<Option<Arc<dyn RuntimeAccess>>>,
}

impl HeartbeatComponent {
    pub fn new() -> Self {
        Self {
            metadata: ComponentMetadata::new("heartbeat", env!("CARGO_PKG_VERSION"))
                .with_description("Counts tick events and reports liveness")
                .with_dependency("audit"),
            status: StatusCell::default(),
            beats: Arc::new(BeatCounter::new()),
            runtime: Mutex::new(None),
        }
    }

    pub fn beats(&self) -> &Arc<BeatCounter> {
        &self.beats
    }

    fn runtime(&self) -> Result<Arc<dyn RuntimeAccess>, ComponentError> {
        self.runtime
            .lock()
            .clone()
            .ok_or_else(|| ComponentError::Custom("heartbeat is not initialized".to_string()))
    }
}

impl Default for HeartbeatComponent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Component for HeartbeatComponent {
    fn metadata(&self) -> &ComponentMetadata {
        &self.metadata
    }

    fn status(&self) -> ComponentStatus {
        self.status.get()
    }

    async fn init(&self, ctx: ComponentContext) -> Result<(), ComponentError> {
        let tick = ctx
            .get_config::<String>("tick_event")
            .unwrap_or_else(|| TICK_EVENT.to_string());

        let beats = self.beats.clone();
        ctx.runtime.subscribe(
            &tick,
            handler_fn(move |_event| {
                let beats = beats.clone();
                async move {
                    let total = beats.beat();
                    debug!("Heartbeat {}", total);
                    Ok(())
                }
            }),
        );

        *self.runtime.lock() = Some(ctx.runtime);
        Ok(())
    }

    async fn post_init(&self) -> Result<(), ComponentError> {
        let runtime = self.runtime()?;
        // Every sibling has passed init by now.
        let audit = runtime.component("audit")?;
        info!("Heartbeat ready (audit v{})", audit.version());

        runtime.publish(READY_EVENT, serde_json::json!({ "beats": self.beats.count() }));
        self.status.set(ComponentStatus::Active);
        Ok(())
    }

    async fn pre_cleanup(&self) -> Result<(), ComponentError> {
        if let Ok(runtime) = self.runtime() {
            runtime.publish(
                STOPPED_EVENT,
                serde_json::json!({ "beats": self.beats.count() }),
            );
        }
        Ok(())
    }

    async fn cleanup(&self) -> Result<(), ComponentError> {
        self.runtime.lock().take();
        self.status.set(ComponentStatus::Inactive);
        Ok(())
    }

    fn handlers(&self) -> HandlerMap {
        let mut handlers = HandlerMap::new();
        handlers.insert(
            "status".to_string(),
            Arc::new(StatusProbe::new(self.beats.clone())) as Opaque,
        );
        handlers
    }

    fn services(&self) -> ServiceMap {
        let mut services = ServiceMap::new();
        services.insert("beats".to_string(), self.beats.clone() as Opaque);
        services
    }

    fn service_info(&self) -> Option<ServiceInfo> {
        Some(ServiceInfo::new("heartbeat", "local://heartbeat").with_tag("health"))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
