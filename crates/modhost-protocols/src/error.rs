//! Component and runtime errors.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Lifecycle hook a failure originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecyclePhase {
    PreInit,
    Init,
    PostInit,
    PreCleanup,
    Cleanup,
}

impl LifecyclePhase {
    /// Whether the phase belongs to startup (as opposed to teardown).
    pub fn is_startup(&self) -> bool {
        matches!(
            self,
            LifecyclePhase::PreInit | LifecyclePhase::Init | LifecyclePhase::PostInit
        )
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecyclePhase::PreInit => "pre_init",
            LifecyclePhase::Init => "init",
            LifecyclePhase::PostInit => "post_init",
            LifecyclePhase::PreCleanup => "pre_cleanup",
            LifecyclePhase::Cleanup => "cleanup",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum ComponentError {
    #[error("Component already registered: {0}")]
    DuplicateName(String),

    #[error("Component not found: {0}")]
    NotFound(String),

    #[error("Missing dependency: {component} requires {dependency}")]
    MissingDependency { component: String, dependency: String },

    #[error("Cyclic dependency detected at component: {0}")]
    CyclicDependency(String),

    #[error("Runtime already initialized")]
    AlreadyInitialized,

    #[error("Runtime is busy: {0}")]
    Busy(String),

    #[error("Invalid plugin {path:?}: {reason}")]
    InvalidPlugin { path: PathBuf, reason: String },

    #[error("Invalid component: {0}")]
    InvalidComponent(String),

    #[error("Component {component} failed during {phase}: {message}")]
    Init {
        component: String,
        phase: LifecyclePhase,
        message: String,
    },

    #[error("Component {component} failed during {phase}: {message}")]
    Cleanup {
        component: String,
        phase: LifecyclePhase,
        message: String,
    },

    #[error("Component {component} timed out during {phase}")]
    Timeout {
        component: String,
        phase: LifecyclePhase,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Custom(String),
}

impl ComponentError {
    /// Wrap a component's own failure with the hook it came from.
    pub fn hook_failure(component: &str, phase: LifecyclePhase, source: &ComponentError) -> Self {
        if phase.is_startup() {
            ComponentError::Init {
                component: component.to_string(),
                phase,
                message: source.to_string(),
            }
        } else {
            ComponentError::Cleanup {
                component: component.to_string(),
                phase,
                message: source.to_string(),
            }
        }
    }

    pub fn invalid_plugin(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        ComponentError::InvalidPlugin {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Structural errors are detected before any component code runs.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            ComponentError::DuplicateName(_)
                | ComponentError::MissingDependency { .. }
                | ComponentError::CyclicDependency(_)
                | ComponentError::AlreadyInitialized
        )
    }
}
