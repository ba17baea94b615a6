//! Administrative surface for a management layer.
//!
//! Thin calls onto the runtime and the loader: list, load, unload, reload.

use std::sync::Arc;

use modhost_protocols::ComponentError;

use crate::loader::{ComponentLoader, LoadOutcome, LoadReport};
use crate::runtime::{ComponentInfo, Runtime};

pub struct Admin {
    runtime: Arc<Runtime>,
    loader: Option<Arc<ComponentLoader>>,
}

impl Admin {
    /// Admin over a runtime without dynamic loading (dev mode).
    pub fn new(runtime: Arc<Runtime>) -> Self {
        Self {
            runtime,
            loader: None,
        }
    }

    pub fn with_loader(runtime: Arc<Runtime>, loader: Arc<ComponentLoader>) -> Self {
        Self {
            runtime,
            loader: Some(loader),
        }
    }

    pub fn list(&self) -> Vec<ComponentInfo> {
        self.runtime.list_components()
    }

    pub async fn load(&self, name: &str) -> Result<LoadOutcome, ComponentError> {
        self.loader()?.load(name).await
    }

    /// Unload a component; without a loader it is detached from the runtime.
    pub async fn unload(&self, name: &str) -> Result<(), ComponentError> {
        match &self.loader {
            Some(loader) => loader.unload(name).await,
            None => self.runtime.detach(name).await,
        }
    }

    pub async fn reload(&self, name: &str) -> Result<LoadOutcome, ComponentError> {
        self.loader()?.reload(name).await
    }

    pub async fn reload_all(&self) -> Result<LoadReport, ComponentError> {
        self.loader()?.reload_all().await
    }

    fn loader(&self) -> Result<&ComponentLoader, ComponentError> {
        self.loader
            .as_deref()
            .ok_or_else(|| ComponentError::Custom("dynamic loading is disabled".to_string()))
    }
}
