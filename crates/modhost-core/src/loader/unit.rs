//! Loadable-unit abstraction.
//!
//! Opening a unit, resolving its exported instance and closing it are kept
//! behind traits so the loader can be driven by something other than real
//! shared libraries.

use std::path::Path;

use modhost_protocols::{ComponentError, ComponentRef};

/// Opens loadable units from disk.
pub trait UnitOpener: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn UnitHandle>, ComponentError>;
}

/// An opened loadable unit.
///
/// Dropping a handle without calling [`close`](UnitHandle::close) keeps the
/// unit resident, which is always safe.
pub trait UnitHandle: Send + Sync {
    fn path(&self) -> &Path;

    /// Resolve `symbol` and build the component it exports.
    ///
    /// A missing symbol is `InvalidPlugin`.
    fn resolve(&self, symbol: &str) -> Result<ComponentRef, ComponentError>;

    /// Release the unit.
    ///
    /// Every component resolved from it, and every value those components
    /// handed out, must already be gone.
    fn close(self: Box<Self>) -> Result<(), ComponentError>;
}
