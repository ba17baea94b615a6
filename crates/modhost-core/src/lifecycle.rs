//! Runtime lifecycle state, init policy and hook execution.
//!
//! The runtime moves through `NotStarted -> Initializing -> Initialized`;
//! `cleanup` passes through `CleaningUp` and returns to `NotStarted`.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use tokio::time::timeout;

use modhost_protocols::{Component, ComponentContext, ComponentError, LifecyclePhase};

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;

/// Runtime state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    /// Components may be registered; `init_all` has not run.
    NotStarted,
    /// `init_all` is running.
    Initializing,
    /// `init_all` has completed; only dynamic attachment is allowed.
    Initialized,
    /// `cleanup` is tearing components down.
    CleaningUp,
}

impl fmt::Display for RuntimeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RuntimeState::NotStarted => "not_started",
            RuntimeState::Initializing => "initializing",
            RuntimeState::Initialized => "initialized",
            RuntimeState::CleaningUp => "cleaning_up",
        };
        f.write_str(name)
    }
}

/// What `init_all` does when a component hook fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InitPolicy {
    /// Log the failure, skip that component for the remaining phases, continue.
    #[default]
    Lenient,
    /// Stop at the first failure, roll back what already started, return the error.
    Strict,
}

/// Runtime construction options.
#[derive(Debug, Clone, Default)]
pub struct RuntimeOptions {
    pub policy: InitPolicy,
    /// Upper bound for any single hook; hooks may block forever when `None`.
    pub phase_timeout: Option<Duration>,
    /// Configuration handed to each component's `init`, keyed by name.
    pub component_config: HashMap<String, serde_json::Value>,
}

impl RuntimeOptions {
    pub fn with_policy(mut self, policy: InitPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_phase_timeout(mut self, phase_timeout: Duration) -> Self {
        self.phase_timeout = Some(phase_timeout);
        self
    }

    pub fn with_component_config(
        mut self,
        name: impl Into<String>,
        config: serde_json::Value,
    ) -> Self {
        self.component_config.insert(name.into(), config);
        self
    }

    pub(crate) fn config_for(&self, name: &str) -> serde_json::Value {
        self.component_config
            .get(name)
            .cloned()
            .unwrap_or(serde_json::Value::Null)
    }
}

/// Outcome of `Runtime::init_all`.
#[derive(Debug, Default)]
pub struct InitReport {
    /// Resolved dependency-first order.
    pub order: Vec<String>,
    /// Components that passed every startup phase, in order.
    pub initialized: Vec<String>,
    /// Components skipped after a failing hook (lenient policy only).
    pub failed: Vec<(String, ComponentError)>,
}

impl InitReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Outcome of `Runtime::cleanup`.
#[derive(Debug, Default)]
pub struct CleanupReport {
    /// Teardown order (reverse of the dependency order).
    pub order: Vec<String>,
    pub errors: Vec<(String, ComponentError)>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// One invocation of a lifecycle hook.
pub(crate) enum Hook {
    PreInit,
    Init(ComponentContext),
    PostInit,
    PreCleanup,
    Cleanup,
}

impl Hook {
    pub(crate) fn phase(&self) -> LifecyclePhase {
        match self {
            Hook::PreInit => LifecyclePhase::PreInit,
            Hook::Init(_) => LifecyclePhase::Init,
            Hook::PostInit => LifecyclePhase::PostInit,
            Hook::PreCleanup => LifecyclePhase::PreCleanup,
            Hook::Cleanup => LifecyclePhase::Cleanup,
        }
    }
}

/// Startup phases in execution order.
pub(crate) const STARTUP_PHASES: [LifecyclePhase; 3] = [
    LifecyclePhase::PreInit,
    LifecyclePhase::Init,
    LifecyclePhase::PostInit,
];

/// Run one hook, bounded by `limit` when set.
///
/// Errors come back wrapped with the component name and phase.
pub(crate) async fn run_hook(
    component: &dyn Component,
    hook: Hook,
    limit: Option<Duration>,
) -> Result<(), ComponentError> {
    let phase = hook.phase();
    let name = component.name();

    let fut = match hook {
        Hook::PreInit => component.pre_init(),
        Hook::Init(ctx) => component.init(ctx),
        Hook::PostInit => component.post_init(),
        Hook::PreCleanup => component.pre_cleanup(),
        Hook::Cleanup => component.cleanup(),
    };

    let result = match limit {
        Some(limit) => match timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => {
                return Err(ComponentError::Timeout {
                    component: name.to_string(),
                    phase,
                });
            }
        },
        None => fut.await,
    };

    result.map_err(|e| ComponentError::hook_failure(name, phase, &e))
}
