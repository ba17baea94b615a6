//! Dynamic component loader.
//!
//! Discovers loadable units in a directory, opens each one, resolves its
//! `Instance` symbol and hands the component to the [`Runtime`]. Before
//! `init_all` the component is registered like a static one; afterwards it is
//! initialized on its own and attached. Units can be unloaded and reloaded
//! singly or in bulk.
//!
//! # Example
//!
//! ```rust,ignore
//! let settings = LoaderSettings::new("~/.modhost/plugins").with_exclude(["legacy"]);
//! let loader = ComponentLoader::new(runtime.clone(), settings);
//! let report = loader.load_all().await?;
//! runtime.init_all().await?;
//! ```

mod settings;
mod unit;

#[cfg(feature = "native-plugins")]
mod native;

pub use settings::LoaderSettings;
pub use unit::{UnitHandle, UnitOpener};

#[cfg(feature = "native-plugins")]
pub use native::NativeOpener;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use modhost_protocols::{ComponentError, ComponentMetadata, INSTANCE_SYMBOL};

use crate::registry::ComponentWrapper;
use crate::runtime::{Admission, Runtime};

/// Result of loading a single unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Handed to the runtime.
    Loaded { name: String, admission: Admission },
    /// Rejected by the include/exclude filter.
    Filtered(String),
    /// A component with this name is already present; nothing changed.
    AlreadyLoaded(String),
}

/// Result of loading a directory.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: Vec<String>,
    /// Filtered or already present.
    pub skipped: Vec<String>,
    pub failed: Vec<(PathBuf, ComponentError)>,
}

impl LoadReport {
    fn record(&mut self, path: &Path, result: Result<LoadOutcome, ComponentError>) {
        match result {
            Ok(LoadOutcome::Loaded { name, .. }) => self.loaded.push(name),
            Ok(LoadOutcome::Filtered(name)) | Ok(LoadOutcome::AlreadyLoaded(name)) => {
                self.skipped.push(name)
            }
            Err(e) => self.failed.push((path.to_path_buf(), e)),
        }
    }
}

/// A discovered unit path with the metadata it exports, or why it could not be read.
pub type UnitInspection = (PathBuf, Result<ComponentMetadata, ComponentError>);

struct LoadedUnit {
    path: PathBuf,
    /// Shares its loans with the runtime's entry, and outlives it after cleanup.
    wrapper: ComponentWrapper,
    handle: Box<dyn UnitHandle>,
}

/// Loads components from units and keeps their handles open while in use.
pub struct ComponentLoader {
    runtime: Arc<Runtime>,
    opener: Arc<dyn UnitOpener>,
    settings: LoaderSettings,
    /// Keyed by component name.
    units: RwLock<HashMap<String, LoadedUnit>>,
    /// Serializes load/unload so a reload is never interleaved with another.
    ops: Mutex<()>,
}

impl ComponentLoader {
    /// Loader opening shared libraries.
    #[cfg(feature = "native-plugins")]
    pub fn new(runtime: Arc<Runtime>, settings: LoaderSettings) -> Self {
        Self::with_opener(runtime, settings, Arc::new(NativeOpener))
    }

    pub fn with_opener(
        runtime: Arc<Runtime>,
        settings: LoaderSettings,
        opener: Arc<dyn UnitOpener>,
    ) -> Self {
        Self {
            runtime,
            opener,
            settings,
            units: RwLock::new(HashMap::new()),
            ops: Mutex::new(()),
        }
    }

    pub fn settings(&self) -> &LoaderSettings {
        &self.settings
    }

    /// Unit files in the plugin directory, sorted. A missing directory is empty.
    pub fn discover(&self) -> Result<Vec<PathBuf>, ComponentError> {
        let dir = &self.settings.directory;
        if !dir.is_dir() {
            debug!("Plugin directory {:?} does not exist", dir);
            return Ok(Vec::new());
        }

        let pattern = format!(
            "{}/*.{}",
            glob::Pattern::escape(&dir.to_string_lossy()),
            glob::Pattern::escape(&self.settings.extension)
        );
        let entries = glob::glob(&pattern)
            .map_err(|e| ComponentError::Custom(format!("invalid plugin pattern: {e}")))?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| match entry {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!("Skipping unreadable plugin entry: {}", e);
                    None
                }
            })
            .filter(|path| path.is_file())
            .collect();
        paths.sort();
        Ok(paths)
    }

    /// Load every discovered unit.
    ///
    /// A failure affects only that unit. Units whose dependencies are not
    /// there yet are retried after the others, as long as progress is made.
    pub async fn load_all(&self) -> Result<LoadReport, ComponentError> {
        let _guard = self.ops.lock().await;
        let mut pending = self.discover()?;
        let mut report = LoadReport::default();

        info!(
            "Loading {} units from {:?}",
            pending.len(),
            self.settings.directory
        );

        loop {
            let mut deferred = Vec::new();
            let mut progressed = false;

            for path in pending {
                match self.load_path_locked(&path).await {
                    Err(e @ ComponentError::MissingDependency { .. }) => deferred.push((path, e)),
                    result => {
                        if let Err(e) = &result {
                            error!("Failed to load {:?}: {}", path, e);
                        }
                        progressed |= matches!(result, Ok(LoadOutcome::Loaded { .. }));
                        report.record(&path, result);
                    }
                }
            }

            if deferred.is_empty() || !progressed {
                for (path, e) in deferred {
                    error!("Failed to load {:?}: {}", path, e);
                    report.failed.push((path, e));
                }
                break;
            }
            pending = deferred.into_iter().map(|(path, _)| path).collect();
        }

        info!(
            "Loaded {} units ({} skipped, {} failed)",
            report.loaded.len(),
            report.skipped.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Load one unit file.
    pub async fn load_path(&self, path: &Path) -> Result<LoadOutcome, ComponentError> {
        let _guard = self.ops.lock().await;
        self.load_path_locked(path).await
    }

    /// Load the unit for component `name` from the plugin directory.
    pub async fn load(&self, name: &str) -> Result<LoadOutcome, ComponentError> {
        let _guard = self.ops.lock().await;

        if self.units.read().contains_key(name) {
            return Ok(LoadOutcome::AlreadyLoaded(name.to_string()));
        }

        let path = self
            .settings
            .candidate_files(name)
            .into_iter()
            .find(|p| p.is_file())
            .ok_or_else(|| ComponentError::NotFound(name.to_string()))?;

        self.load_path_locked(&path).await
    }

    /// Tear a component down, remove it and close its unit.
    ///
    /// Works for statically registered components too; those have no unit.
    pub async fn unload(&self, name: &str) -> Result<(), ComponentError> {
        let _guard = self.ops.lock().await;
        self.unload_locked(name).await
    }

    /// Unload a unit-backed component and load the same file again.
    pub async fn reload(&self, name: &str) -> Result<LoadOutcome, ComponentError> {
        let _guard = self.ops.lock().await;
        self.reload_locked(name).await
    }

    /// Reload every discovered unit; files not loaded yet are loaded.
    pub async fn reload_all(&self) -> Result<LoadReport, ComponentError> {
        let _guard = self.ops.lock().await;
        let mut report = LoadReport::default();

        for path in self.discover()? {
            let loaded_as = self.name_for_path(&path);
            let result = match loaded_as {
                Some(name) => self.reload_locked(&name).await,
                None => self.load_path_locked(&path).await,
            };
            if let Err(e) = &result {
                error!("Failed to reload {:?}: {}", path, e);
            }
            report.record(&path, result);
        }

        info!(
            "Reloaded {} units ({} skipped, {} failed)",
            report.loaded.len(),
            report.skipped.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Read the metadata of every discovered unit without initializing anything.
    pub fn inspect(&self) -> Result<Vec<UnitInspection>, ComponentError> {
        Ok(self
            .discover()?
            .into_iter()
            .map(|path| {
                let metadata = self.read_metadata(&path);
                (path, metadata)
            })
            .collect())
    }

    /// Loaded component names with their unit paths, sorted by name.
    pub fn loaded_units(&self) -> Vec<(String, PathBuf)> {
        let mut units: Vec<(String, PathBuf)> = self
            .units
            .read()
            .iter()
            .map(|(name, unit)| (name.clone(), unit.path.clone()))
            .collect();
        units.sort();
        units
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.units.read().contains_key(name)
    }

    fn name_for_path(&self, path: &Path) -> Option<String> {
        self.units
            .read()
            .iter()
            .find(|(_, unit)| unit.path == path)
            .map(|(name, _)| name.clone())
    }

    async fn load_path_locked(&self, path: &Path) -> Result<LoadOutcome, ComponentError> {
        if let Some(name) = self.name_for_path(path) {
            debug!("{:?} already loaded as {}", path, name);
            return Ok(LoadOutcome::AlreadyLoaded(name));
        }

        let handle = self.opener.open(path)?;
        let wrapper = match Self::resolve(handle.as_ref(), path) {
            Ok(wrapper) => wrapper,
            Err(e) => {
                release(handle, None);
                return Err(e);
            }
        };

        let name = wrapper.name().to_string();

        if !self.settings.allows(&name) {
            info!("Skipping {} from {:?}: filtered out", name, path);
            release(handle, Some(wrapper));
            return Ok(LoadOutcome::Filtered(name));
        }

        if self.units.read().contains_key(&name) || self.runtime.contains(&name) {
            info!("Skipping {} from {:?}: already loaded", name, path);
            release(handle, Some(wrapper));
            return Ok(LoadOutcome::AlreadyLoaded(name));
        }

        match self.runtime.admit(wrapper.clone()).await {
            Ok(admission) => {
                self.units.write().insert(
                    name.clone(),
                    LoadedUnit {
                        path: path.to_path_buf(),
                        wrapper,
                        handle,
                    },
                );
                info!("Loaded {} from {:?}", name, path);
                Ok(LoadOutcome::Loaded { name, admission })
            }
            Err(e) => {
                release(handle, Some(wrapper));
                Err(e)
            }
        }
    }

    async fn unload_locked(&self, name: &str) -> Result<(), ComponentError> {
        let detached = self.runtime.detach(name).await;
        let unit = self.units.write().remove(name);

        match (detached, unit) {
            (Ok(()), unit) => {
                if let Some(unit) = unit {
                    release(unit.handle, Some(unit.wrapper));
                }
                info!("Unloaded {}", name);
                Ok(())
            }
            // The runtime already dropped it (e.g. after cleanup); just close the unit.
            (Err(ComponentError::NotFound(_)), Some(unit)) => {
                release(unit.handle, Some(unit.wrapper));
                Ok(())
            }
            (Err(e), Some(unit)) => {
                self.units.write().insert(name.to_string(), unit);
                Err(e)
            }
            (Err(e), None) => Err(e),
        }
    }

    async fn reload_locked(&self, name: &str) -> Result<LoadOutcome, ComponentError> {
        let path = self
            .units
            .read()
            .get(name)
            .map(|unit| unit.path.clone())
            .ok_or_else(|| ComponentError::NotFound(name.to_string()))?;

        info!("Reloading {} from {:?}", name, path);
        self.unload_locked(name).await?;
        self.load_path_locked(&path).await
    }

    fn read_metadata(&self, path: &Path) -> Result<ComponentMetadata, ComponentError> {
        let handle = self.opener.open(path)?;
        let result = Self::resolve(handle.as_ref(), path).map(|w| w.metadata().clone());
        release(handle, None);
        result
    }

    /// Resolve the instance symbol and check the component is registrable.
    fn resolve(handle: &dyn UnitHandle, path: &Path) -> Result<ComponentWrapper, ComponentError> {
        let component = handle.resolve(INSTANCE_SYMBOL)?;
        ComponentWrapper::new(component)
            .map_err(|e| ComponentError::invalid_plugin(path, e.to_string()))
    }
}

/// Close a unit once its component and everything it lent out are gone;
/// otherwise leave it resident.
fn release(handle: Box<dyn UnitHandle>, wrapper: Option<ComponentWrapper>) {
    if let Some(wrapper) = wrapper {
        let name = wrapper.name().to_string();
        if Arc::strong_count(wrapper.component()) > 1 {
            warn!("{} is still referenced, leaving {:?} loaded", name, handle.path());
            return;
        }

        let loans = wrapper.loans().clone();
        // Its drop glue lives in the unit.
        drop(wrapper);
        if !loans.settle() {
            warn!(
                "{} values lent by {} are still alive, leaving {:?} loaded",
                loans.outstanding(),
                name,
                handle.path()
            );
            return;
        }
    }

    let path = handle.path().to_path_buf();
    if let Err(e) = handle.close() {
        warn!("{}", e);
    } else {
        debug!("Closed {:?}", path);
    }
}

#[cfg(test)]
#[path = "loader_tests.rs"]
mod tests;
