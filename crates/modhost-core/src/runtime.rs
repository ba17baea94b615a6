//! The component runtime.
//!
//! Owns the registry and the event bus, drives phased initialization and
//! teardown in dependency order, and serves cross-component lookups. One
//! `Runtime` is constructed at process start and injected wherever it is
//! needed; components reach it through the handle in their `ComponentContext`.

use std::any::Any;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error, info, warn};

use modhost_protocols::{
    ComponentContext, ComponentError, ComponentMetadata, ComponentRef, ComponentStatus,
    EventHandler, LifecyclePhase, Opaque, Router, RuntimeAccess, ServiceInfo,
};

use crate::event_bus::EventBus;
use crate::lifecycle::{
    run_hook, CleanupReport, Hook, InitPolicy, InitReport, RuntimeOptions, RuntimeState,
    STARTUP_PHASES,
};
use crate::registry::{ComponentRegistry, ComponentWrapper, Loans};
use crate::resolver;
use crate::runtime_handle::RuntimeHandle;

/// How `add_component` admitted a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Registered ahead of `init_all`; it will be initialized with everyone else.
    Registered,
    /// Initialized on its own and attached to a running runtime.
    Attached,
}

/// Listing entry for one registered component.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentInfo {
    pub metadata: ComponentMetadata,
    pub status: ComponentStatus,
}

/// Dependency-ordered component runtime.
pub struct Runtime {
    registry: ComponentRegistry,
    events: EventBus,
    options: RuntimeOptions,
    /// Components that completed startup, in the order they did so.
    init_order: RwLock<Vec<String>>,
    this: Weak<Runtime>,
}

impl Runtime {
    /// Create a runtime.
    pub fn new(options: RuntimeOptions) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            registry: ComponentRegistry::new(),
            events: EventBus::new(),
            options,
            init_order: RwLock::new(Vec::new()),
            this: this.clone(),
        })
    }

    pub fn options(&self) -> &RuntimeOptions {
        &self.options
    }

    /// Handle for host code; holds the runtime weakly.
    pub fn handle(&self) -> Arc<dyn RuntimeAccess> {
        Arc::new(RuntimeHandle::new(self.this.clone()))
    }

    fn handle_for(&self, wrapper: &ComponentWrapper) -> Arc<dyn RuntimeAccess> {
        Arc::new(RuntimeHandle::owned_by(self.this.clone(), wrapper))
    }

    pub fn state(&self) -> RuntimeState {
        self.registry.state()
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn contains(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    /// Register a component for the next `init_all`.
    pub fn register_component(&self, component: ComponentRef) -> Result<(), ComponentError> {
        let name = component.name().to_string();
        self.registry.register(component)?;
        info!("Component registered: {}", name);
        Ok(())
    }

    /// Verify every registered component's dependencies are registered and acyclic.
    pub fn check_dependencies(&self) -> Result<(), ComponentError> {
        resolver::resolve_order(&self.registry.dependency_graph()).map(|_| ())
    }

    /// Verify one component's dependencies against what is registered right now.
    pub fn check_component_dependencies(
        &self,
        metadata: &ComponentMetadata,
    ) -> Result<(), ComponentError> {
        for dep in &metadata.dependencies {
            if !self.registry.contains(dep) {
                return Err(ComponentError::MissingDependency {
                    component: metadata.name.clone(),
                    dependency: dep.clone(),
                });
            }
        }
        Ok(())
    }

    /// Initialize every registered component in dependency order.
    ///
    /// Runs `pre_init` across the whole order, then `init`, then `post_init`.
    /// Structural errors are returned before any hook runs and leave the
    /// runtime in `NotStarted`. Hook failures follow the configured policy.
    pub async fn init_all(&self) -> Result<InitReport, ComponentError> {
        self.registry.begin_init()?;

        let order = match resolver::resolve_order(&self.registry.dependency_graph()) {
            Ok(order) => order,
            Err(e) => {
                self.registry.set_state(RuntimeState::NotStarted);
                return Err(e);
            }
        };

        info!("Initializing {} components: {:?}", order.len(), order);

        let snapshot = self.registry.get_all();
        let mut active: Vec<ComponentWrapper> = order
            .iter()
            .filter_map(|name| snapshot.get(name).cloned())
            .collect();
        let mut started: Vec<ComponentWrapper> = Vec::new();
        let mut report = InitReport {
            order,
            ..Default::default()
        };

        for phase in STARTUP_PHASES {
            let mut survivors = Vec::with_capacity(active.len());

            for wrapper in active {
                let hook = self.hook_for(phase, &wrapper);
                let result =
                    run_hook(wrapper.component().as_ref(), hook, self.options.phase_timeout).await;
                match result {
                    Ok(()) => {
                        debug!("{} completed {}", wrapper.name(), phase);
                        if phase == LifecyclePhase::PreInit {
                            started.push(wrapper.clone());
                        }
                        survivors.push(wrapper);
                    }
                    Err(e) => match self.options.policy {
                        InitPolicy::Strict => {
                            error!("Initialization aborted: {}", e);
                            self.roll_back(&started).await;
                            self.registry.set_state(RuntimeState::NotStarted);
                            return Err(e);
                        }
                        InitPolicy::Lenient => {
                            warn!("Skipping {}: {}", wrapper.name(), e);
                            report.failed.push((wrapper.name().to_string(), e));
                        }
                    },
                }
            }

            active = survivors;
        }

        report.initialized = active.iter().map(|w| w.name().to_string()).collect();
        *self.init_order.write() = report.initialized.clone();
        self.registry.set_state(RuntimeState::Initialized);

        if report.is_complete() {
            info!("Initialized {} components", report.initialized.len());
        } else {
            warn!(
                "Initialized {} of {} components",
                report.initialized.len(),
                report.order.len()
            );
        }

        self.events
            .publish("runtime.initialized", json!({ "order": report.initialized }));
        Ok(report)
    }

    /// Tear every registered component down in reverse dependency order.
    ///
    /// Best-effort: hook failures are logged and collected. Afterwards the
    /// registry and event bus are empty and the runtime is back in `NotStarted`.
    pub async fn cleanup(&self) -> Result<CleanupReport, ComponentError> {
        self.registry.begin_cleanup()?;

        info!("Cleaning up components...");
        self.events.publish("runtime.cleanup", serde_json::Value::Null);

        let mut order = match resolver::resolve_order_lenient(&self.registry.dependency_graph()) {
            Ok(order) => order,
            Err(e) => {
                warn!("Falling back to name order for cleanup: {}", e);
                self.registry.names()
            }
        };
        order.reverse();

        let snapshot = self.registry.get_all();
        let mut report = CleanupReport {
            order,
            ..Default::default()
        };

        for name in &report.order {
            if let Some(wrapper) = snapshot.get(name) {
                self.tear_down(wrapper, &mut report.errors).await;
            }
        }

        self.registry.clear();
        self.events.clear();
        self.init_order.write().clear();
        self.registry.set_state(RuntimeState::NotStarted);

        if report.is_clean() {
            info!("Cleanup complete");
        } else {
            warn!("Cleanup finished with {} errors", report.errors.len());
        }
        Ok(report)
    }

    /// Register before `init_all`, or initialize and attach after it.
    pub async fn add_component(&self, component: ComponentRef) -> Result<Admission, ComponentError> {
        self.admit(ComponentWrapper::new(component)?).await
    }

    /// `add_component` for a wrapper whose loans the caller keeps watching.
    pub(crate) async fn admit(&self, wrapper: ComponentWrapper) -> Result<Admission, ComponentError> {
        match self.state() {
            RuntimeState::NotStarted => {
                let name = wrapper.name().to_string();
                self.registry.register_wrapper(wrapper)?;
                info!("Component registered: {}", name);
                Ok(Admission::Registered)
            }
            RuntimeState::Initialized => {
                self.attach(wrapper).await?;
                Ok(Admission::Attached)
            }
            RuntimeState::Initializing => Err(ComponentError::AlreadyInitialized),
            RuntimeState::CleaningUp => Err(ComponentError::Busy("cleaning_up".into())),
        }
    }

    /// Initialize one component against the running set and insert it.
    ///
    /// Its dependencies must already be registered. If a startup hook fails,
    /// or the runtime left `Initialized` while the hooks ran, the component
    /// is torn down again and never becomes visible.
    async fn attach(&self, wrapper: ComponentWrapper) -> Result<(), ComponentError> {
        let name = wrapper.name().to_string();

        if self.registry.contains(&name) {
            return Err(ComponentError::DuplicateName(name));
        }
        self.check_component_dependencies(wrapper.metadata())?;

        info!("Attaching component: {}", name);

        for phase in STARTUP_PHASES {
            let hook = self.hook_for(phase, &wrapper);
            if let Err(e) =
                run_hook(wrapper.component().as_ref(), hook, self.options.phase_timeout).await
            {
                error!("Failed to attach {}: {}", name, e);
                self.tear_down(&wrapper, &mut Vec::new()).await;
                self.events.remove_owner(&name);
                return Err(e);
            }
        }

        // init_order is locked first so cleanup cannot clear it in between.
        let inserted = {
            let mut init_order = self.init_order.write();
            let inserted = self.registry.insert_if_initialized(wrapper.clone());
            if inserted.is_ok() {
                init_order.push(name.clone());
            }
            inserted
        };
        if let Err(e) = inserted {
            warn!("Dropping {} after startup: {}", name, e);
            self.tear_down(&wrapper, &mut Vec::new()).await;
            self.events.remove_owner(&name);
            return Err(e);
        }

        info!("Component attached: {}", name);
        self.events
            .publish("component.attached", json!({ "name": name }));
        Ok(())
    }

    /// Tear one component down and remove it.
    ///
    /// Components still depending on it are left in place and only warned about.
    pub async fn detach(&self, name: &str) -> Result<(), ComponentError> {
        let (wrapper, state) = self.registry.take(name)?;

        if state != RuntimeState::Initialized {
            // Never initialized, so there is nothing to tear down.
            debug!("Component unregistered: {}", name);
            return Ok(());
        }

        let dependents = self.dependents_of(name);
        if !dependents.is_empty() {
            warn!("Detaching {} while {:?} depend on it", name, dependents);
        }

        info!("Detaching component: {}", name);
        let mut errors = Vec::new();
        self.tear_down(&wrapper, &mut errors).await;
        self.init_order.write().retain(|n| n != name);
        self.events.remove_owner(name);

        self.events
            .publish("component.detached", json!({ "name": name }));
        Ok(())
    }

    /// Names of registered components that declare `name` as a dependency.
    pub fn dependents_of(&self, name: &str) -> Vec<String> {
        self.registry
            .dependency_graph()
            .into_iter()
            .filter(|(_, deps)| deps.iter().any(|d| d == name))
            .map(|(dependent, _)| dependent)
            .collect()
    }

    pub fn get_component(&self, name: &str) -> Result<ComponentRef, ComponentError> {
        self.registry.get(name).map(|w| w.component().clone())
    }

    pub fn get_handler(&self, component: &str, handler: &str) -> Result<Opaque, ComponentError> {
        let wrapper = self.registry.get(component)?;
        let value = wrapper
            .component()
            .handlers()
            .remove(handler)
            .ok_or_else(|| ComponentError::NotFound(format!("{component}/{handler}")))?;
        wrapper.loans().lend(&value);
        Ok(value)
    }

    pub fn get_service(&self, component: &str, service: &str) -> Result<Opaque, ComponentError> {
        let wrapper = self.registry.get(component)?;
        let value = wrapper
            .component()
            .services()
            .remove(service)
            .ok_or_else(|| ComponentError::NotFound(format!("{component}/{service}")))?;
        wrapper.loans().lend(&value);
        Ok(value)
    }

    /// Look up a service and downcast it to its concrete type.
    pub fn get_service_as<T>(&self, component: &str, service: &str) -> Result<Arc<T>, ComponentError>
    where
        T: Any + Send + Sync,
    {
        self.get_service(component, service)?
            .downcast::<T>()
            .map_err(|_| {
                ComponentError::InvalidComponent(format!(
                    "{component}/{service} is not a {}",
                    std::any::type_name::<T>()
                ))
            })
    }

    /// Every registered component with its current status, sorted by name.
    pub fn list_components(&self) -> Vec<ComponentInfo> {
        let mut infos: Vec<ComponentInfo> = self
            .registry
            .get_all()
            .into_values()
            .map(|w| ComponentInfo {
                status: w.component().status(),
                metadata: w.metadata().clone(),
            })
            .collect();
        infos.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));
        infos
    }

    pub fn init_order(&self) -> Vec<String> {
        self.init_order.read().clone()
    }

    /// Let each initialized component add its routes, in init order.
    pub fn register_routes(&self, router: &mut dyn Router) {
        for wrapper in self.initialized_components() {
            let mut lending = LendingRouter {
                inner: &mut *router,
                loans: wrapper.loans(),
            };
            wrapper.component().register_routes(&mut lending);
        }
    }

    /// Discovery registrations of initialized components, in init order.
    pub fn service_infos(&self) -> Vec<ServiceInfo> {
        self.initialized_components()
            .iter()
            .filter_map(|w| w.component().service_info())
            .collect()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe(&self, event: &str, handler: Arc<dyn EventHandler>) {
        self.events.subscribe(event, handler);
    }

    pub fn publish(&self, event: &str, payload: serde_json::Value) -> usize {
        self.events.publish(event, payload)
    }

    fn initialized_components(&self) -> Vec<ComponentWrapper> {
        self.init_order()
            .iter()
            .filter_map(|name| self.registry.get(name).ok())
            .collect()
    }

    fn context_for(&self, wrapper: &ComponentWrapper) -> ComponentContext {
        ComponentContext::new(
            self.options.config_for(wrapper.name()),
            self.handle_for(wrapper),
        )
    }

    fn hook_for(&self, phase: LifecyclePhase, wrapper: &ComponentWrapper) -> Hook {
        match phase {
            LifecyclePhase::PreInit => Hook::PreInit,
            LifecyclePhase::Init => Hook::Init(self.context_for(wrapper)),
            LifecyclePhase::PostInit => Hook::PostInit,
            LifecyclePhase::PreCleanup => Hook::PreCleanup,
            LifecyclePhase::Cleanup => Hook::Cleanup,
        }
    }

    /// `pre_cleanup` then `cleanup`, logging and collecting failures.
    async fn tear_down(
        &self,
        wrapper: &ComponentWrapper,
        errors: &mut Vec<(String, ComponentError)>,
    ) {
        for hook in [Hook::PreCleanup, Hook::Cleanup] {
            if let Err(e) =
                run_hook(wrapper.component().as_ref(), hook, self.options.phase_timeout).await
            {
                warn!("{}", e);
                errors.push((wrapper.name().to_string(), e));
            }
        }
    }

    async fn roll_back(&self, started: &[ComponentWrapper]) {
        let mut errors = Vec::new();
        for wrapper in started.iter().rev() {
            self.tear_down(wrapper, &mut errors).await;
            self.events.remove_owner(wrapper.name());
        }
        if !errors.is_empty() {
            warn!("Rollback finished with {} errors", errors.len());
        }
    }
}

/// Records every route handler a component adds against its loans.
struct LendingRouter<'a> {
    inner: &'a mut dyn Router,
    loans: &'a Loans,
}

impl Router for LendingRouter<'_> {
    fn add_route(&mut self, method: &str, path: &str, handler: Opaque) {
        self.loans.lend(&handler);
        self.inner.add_route(method, path, handler);
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
