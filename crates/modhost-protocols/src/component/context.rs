//! Component context for initialization.

use std::sync::Arc;

use super::RuntimeAccess;

/// Context passed to components during `init`.
#[derive(Clone)]
pub struct ComponentContext {
    /// Configuration for this component.
    pub config: serde_json::Value,

    /// Handle back into the runtime for lookups and events.
    pub runtime: Arc<dyn RuntimeAccess>,
}

impl ComponentContext {
    /// Create a new component context.
    pub fn new(config: serde_json::Value, runtime: Arc<dyn RuntimeAccess>) -> Self {
        Self { config, runtime }
    }

    /// Get a configuration value.
    pub fn get_config<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.config
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}
