//! Shared fixtures for unit tests.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use modhost_protocols::{
    Component, ComponentContext, ComponentError, ComponentMetadata, ComponentStatus, HandlerMap,
    LifecyclePhase, Opaque, Router, ServiceInfo, ServiceMap, StatusCell,
};

/// Ordered record of hook invocations shared between mock components.
#[derive(Clone, Default)]
pub(crate) struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub(crate) fn record(&self, entry: String) {
        self.0.lock().push(entry);
    }

    pub(crate) fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    /// Component names recorded for one phase, in call order.
    pub(crate) fn phase(&self, phase: LifecyclePhase) -> Vec<String> {
        let prefix = format!("{phase}:");
        self.entries()
            .into_iter()
            .filter_map(|e| e.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }
}

pub(crate) struct MockComponent {
    metadata: ComponentMetadata,
    status: StatusCell,
    journal: Journal,
    fail_on: Option<LifecyclePhase>,
    hang_on: Option<LifecyclePhase>,
    seen_config: Mutex<Option<serde_json::Value>>,
    context: Mutex<Option<ComponentContext>>,
}

impl MockComponent {
    pub(crate) fn new(name: &str, deps: &[&str], journal: &Journal) -> Self {
        Self {
            metadata: ComponentMetadata::new(name, "1.0.0")
                .with_dependencies(deps.iter().copied()),
            status: StatusCell::default(),
            journal: journal.clone(),
            fail_on: None,
            hang_on: None,
            seen_config: Mutex::new(None),
            context: Mutex::new(None),
        }
    }

    pub(crate) fn shared(name: &str, deps: &[&str], journal: &Journal) -> Arc<dyn Component> {
        Arc::new(Self::new(name, deps, journal))
    }

    pub(crate) fn failing_on(mut self, phase: LifecyclePhase) -> Self {
        self.fail_on = Some(phase);
        self
    }

    pub(crate) fn hanging_on(mut self, phase: LifecyclePhase) -> Self {
        self.hang_on = Some(phase);
        self
    }

    pub(crate) fn seen_config(&self) -> Option<serde_json::Value> {
        self.seen_config.lock().clone()
    }

    pub(crate) fn context(&self) -> Option<ComponentContext> {
        self.context.lock().clone()
    }

    async fn hook(&self, phase: LifecyclePhase) -> Result<(), ComponentError> {
        self.journal.record(format!("{phase}:{}", self.metadata.name));
        if self.hang_on == Some(phase) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.fail_on == Some(phase) {
            self.status.set(ComponentStatus::Error);
            return Err(ComponentError::Custom(format!("{phase} refused")));
        }
        Ok(())
    }
}

#[async_trait]
impl Component for MockComponent {
    fn metadata(&self) -> &ComponentMetadata {
        &self.metadata
    }

    fn status(&self) -> ComponentStatus {
        self.status.get()
    }

    async fn pre_init(&self) -> Result<(), ComponentError> {
        self.hook(LifecyclePhase::PreInit).await
    }

    async fn init(&self, ctx: ComponentContext) -> Result<(), ComponentError> {
        *self.seen_config.lock() = Some(ctx.config.clone());
        *self.context.lock() = Some(ctx);
        self.hook(LifecyclePhase::Init).await
    }

    async fn post_init(&self) -> Result<(), ComponentError> {
        self.hook(LifecyclePhase::PostInit).await?;
        self.status.set(ComponentStatus::Active);
        Ok(())
    }

    async fn pre_cleanup(&self) -> Result<(), ComponentError> {
        self.hook(LifecyclePhase::PreCleanup).await
    }

    async fn cleanup(&self) -> Result<(), ComponentError> {
        self.hook(LifecyclePhase::Cleanup).await?;
        self.status.set(ComponentStatus::Inactive);
        Ok(())
    }

    fn handlers(&self) -> HandlerMap {
        let mut handlers = HandlerMap::new();
        handlers.insert("ping".to_string(), Arc::new(1u32) as Opaque);
        handlers
    }

    fn services(&self) -> ServiceMap {
        let mut services = ServiceMap::new();
        services.insert(
            "echo".to_string(),
            Arc::new(self.metadata.name.clone()) as Opaque,
        );
        services
    }

    fn register_routes(&self, router: &mut dyn Router) {
        let path = format!("/{}", self.metadata.name);
        router.add_route("GET", &path, Arc::new(()) as Opaque);
    }

    fn service_info(&self) -> Option<ServiceInfo> {
        Some(ServiceInfo::new(&self.metadata.name, "127.0.0.1:0"))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Mock whose `dependencies()` disagrees with its metadata.
pub(crate) struct InconsistentComponent {
    metadata: ComponentMetadata,
    deps: Vec<String>,
}

impl InconsistentComponent {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            metadata: ComponentMetadata::new(name, "1.0.0"),
            deps: vec!["ghost".to_string()],
        }
    }
}

#[async_trait]
impl Component for InconsistentComponent {
    fn metadata(&self) -> &ComponentMetadata {
        &self.metadata
    }

    fn dependencies(&self) -> &[String] {
        &self.deps
    }

    fn status(&self) -> ComponentStatus {
        ComponentStatus::Inactive
    }

    async fn init(&self, _ctx: ComponentContext) -> Result<(), ComponentError> {
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
