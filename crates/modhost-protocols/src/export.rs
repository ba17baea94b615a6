//! Loadable-unit entry point.
//!
//! A loadable unit exports exactly one symbol, [`INSTANCE_SYMBOL`], with the
//! [`ComponentEntryFn`] signature. Use [`export_component!`](crate::export_component)
//! rather than writing it by hand:
//!
//! ```rust,ignore
//! pub struct Tenants { /* ... */ }
//! impl Tenants { pub fn new() -> Self { /* ... */ } }
//!
//! modhost_protocols::export_component!(Tenants::new);
//! ```
//!
//! Units must be built with the same compiler and the same `modhost-protocols`
//! version as the host; trait objects have no stable ABI.

use crate::component::Component;

/// Signature of the exported instance constructor.
#[allow(improper_ctypes_definitions)]
pub type ComponentEntryFn = unsafe extern "C" fn() -> Box<dyn Component>;

/// Name of the single symbol a loadable unit exports.
pub const INSTANCE_SYMBOL: &str = "Instance";

/// Export a component constructor as the unit's `Instance` symbol.
#[macro_export]
macro_rules! export_component {
    ($constructor:path) => {
        #[unsafe(no_mangle)]
        #[allow(improper_ctypes_definitions, non_snake_case)]
        pub extern "C" fn Instance() -> ::std::boxed::Box<dyn $crate::Component> {
            ::std::boxed::Box::new($constructor())
        }
    };
}
