//! Common component types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};

/// Health of a component as reported by the component itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ComponentStatus {
    #[default]
    Inactive = 0,
    Active = 1,
    Error = 2,
}

impl From<u8> for ComponentStatus {
    fn from(v: u8) -> Self {
        match v {
            1 => ComponentStatus::Active,
            2 => ComponentStatus::Error,
            _ => ComponentStatus::Inactive,
        }
    }
}

/// Lock-free status cell for components whose hooks take `&self`.
#[derive(Debug, Default)]
pub struct StatusCell(AtomicU8);

impl StatusCell {
    pub fn new(status: ComponentStatus) -> Self {
        Self(AtomicU8::new(status as u8))
    }

    pub fn get(&self) -> ComponentStatus {
        ComponentStatus::from(self.0.load(Ordering::SeqCst))
    }

    pub fn set(&self, status: ComponentStatus) {
        self.0.store(status as u8, Ordering::SeqCst);
    }
}

/// Registration data for external service discovery.
///
/// Produced by components; consumed by whatever discovery backend the host wires in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl ServiceInfo {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            tags: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}
