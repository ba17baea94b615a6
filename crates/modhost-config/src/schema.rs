//! Configuration schema definitions.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub runtime: RuntimeConfig,

    #[serde(default)]
    pub plugins: PluginsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Free-form per-component tables, keyed by component name.
    #[serde(default)]
    pub components: HashMap<String, serde_json::Value>,
}

impl Config {
    /// Configuration handed to a component's `init`, `Null` when absent.
    pub fn component_config(&self, name: &str) -> serde_json::Value {
        self.components
            .get(name)
            .cloned()
            .unwrap_or(serde_json::Value::Null)
    }
}

/// How the runtime reacts to a failing lifecycle hook during `init_all`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitPolicyConfig {
    /// Log, skip the failing component, continue with the rest.
    #[default]
    Lenient,
    /// Abort on the first failure and roll back.
    Strict,
}

/// Runtime orchestration configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Register compiled-in components only; skip the plugin directory.
    #[serde(default)]
    pub dev_mode: bool,

    #[serde(default)]
    pub init_policy: InitPolicyConfig,

    /// Per-hook timeout; no timeout when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase_timeout_secs: Option<u64>,
}

impl RuntimeConfig {
    pub fn phase_timeout(&self) -> Option<Duration> {
        self.phase_timeout_secs.map(Duration::from_secs)
    }
}

/// Loadable-unit discovery configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginsConfig {
    #[serde(default = "default_plugin_dir")]
    pub directory: String,

    /// File extension of loadable units, without the dot.
    #[serde(default = "default_plugin_extension")]
    pub extension: String,

    /// When non-empty, only these component names are loaded.
    #[serde(default)]
    pub include: Vec<String>,

    /// Never loaded; wins over `include`.
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            directory: default_plugin_dir(),
            extension: default_plugin_extension(),
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }
}

fn default_plugin_dir() -> String {
    "~/.modhost/plugins".to_string()
}

fn default_plugin_extension() -> String {
    std::env::consts::DLL_EXTENSION.to_string()
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,

    /// Directory for daily-rolling log files; console only when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            directory: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
