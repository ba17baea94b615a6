//! Component registry.

mod component;
mod loans;
mod wrapper;

pub use component::ComponentRegistry;
pub use loans::Loans;
pub use wrapper::ComponentWrapper;
