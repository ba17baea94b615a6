//! Bounded audit trail.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use modhost_protocols::Event;

pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub event: String,
    pub event_id: String,
    pub payload: serde_json::Value,
    pub recorded_at: DateTime<Utc>,
}

impl From<Event> for AuditEntry {
    fn from(event: Event) -> Self {
        Self {
            event: event.name,
            event_id: event.id,
            payload: event.payload,
            recorded_at: Utc::now(),
        }
    }
}

/// Ring of the most recent entries; the oldest entry is dropped when full.
#[derive(Debug)]
pub struct AuditLog {
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    capacity: usize,
    entries: VecDeque<AuditEntry>,
}

impl AuditLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                capacity: capacity.max(1),
                entries: VecDeque::new(),
            }),
        }
    }

    pub fn record(&self, entry: AuditEntry) {
        let mut inner = self.inner.lock();
        while inner.entries.len() >= inner.capacity {
            inner.entries.pop_front();
        }
        inner.entries.push_back(entry);
    }

    /// Shrinking drops the oldest entries.
    pub fn set_capacity(&self, capacity: usize) {
        let mut inner = self.inner.lock();
        inner.capacity = capacity.max(1);
        let excess = inner.entries.len().saturating_sub(inner.capacity);
        inner.entries.drain(..excess);
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.inner.lock().entries.iter().cloned().collect()
    }

    /// Up to `limit` newest entries, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<AuditEntry> {
        let inner = self.inner.lock();
        let skip = inner.entries.len().saturating_sub(limit);
        inner.entries.iter().skip(skip).cloned().collect()
    }

    pub fn count(&self, event: &str) -> usize {
        self.inner
            .lock()
            .entries
            .iter()
            .filter(|e| e.event == event)
            .count()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
