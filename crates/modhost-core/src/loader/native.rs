//! Shared-library units opened through `libloading`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use libloading::{Library, Symbol};
use tracing::debug;

use modhost_protocols::{ComponentEntryFn, ComponentError, ComponentRef};

use super::unit::{UnitHandle, UnitOpener};

/// Opens `.so` / `.dylib` / `.dll` files built with `export_component!`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeOpener;

impl UnitOpener for NativeOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn UnitHandle>, ComponentError> {
        // SAFETY: loading a library runs its initializers. Units are trusted
        // code from the configured plugin directory.
        let library = unsafe { Library::new(path) }.map_err(|e| {
            ComponentError::invalid_plugin(path, format!("failed to open library: {e}"))
        })?;

        debug!("Opened library {:?}", path);
        Ok(Box::new(NativeUnit {
            path: path.to_path_buf(),
            library: Some(library),
        }))
    }
}

struct NativeUnit {
    path: PathBuf,
    library: Option<Library>,
}

impl UnitHandle for NativeUnit {
    fn path(&self) -> &Path {
        &self.path
    }

    fn resolve(&self, symbol: &str) -> Result<ComponentRef, ComponentError> {
        let library = self
            .library
            .as_ref()
            .ok_or_else(|| ComponentError::invalid_plugin(&self.path, "library already closed"))?;

        // SAFETY: the symbol is expected to be the `extern "C" fn` emitted by
        // `export_component!`, compiled against the same protocols crate.
        let component = unsafe {
            let entry: Symbol<ComponentEntryFn> = library.get(symbol.as_bytes()).map_err(|e| {
                ComponentError::invalid_plugin(&self.path, format!("missing symbol '{symbol}': {e}"))
            })?;
            entry()
        };

        Ok(Arc::from(component))
    }

    fn close(mut self: Box<Self>) -> Result<(), ComponentError> {
        match self.library.take() {
            Some(library) => library.close().map_err(|e| {
                ComponentError::invalid_plugin(&self.path, format!("failed to close library: {e}"))
            }),
            None => Ok(()),
        }
    }
}

impl Drop for NativeUnit {
    fn drop(&mut self) {
        // Unmapping is only done by an explicit close.
        if let Some(library) = self.library.take() {
            std::mem::forget(library);
        }
    }
}
