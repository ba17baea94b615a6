//! Component protocol definitions.
//!
//! Components are the independently initialized units the runtime orchestrates.

mod context;
mod metadata;
mod traits;

pub use context::*;
pub use metadata::*;
pub use traits::*;
