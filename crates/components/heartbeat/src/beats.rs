use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// Exposed as the `beats` service.
#[derive(Debug, Default)]
pub struct BeatCounter {
    count: AtomicU64,
    last: Mutex<Option<DateTime<Utc>>>,
}

impl BeatCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one beat and return the new total.
    pub fn beat(&self) -> u64 {
        *self.last.lock() = Some(Utc::now());
        self.count.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }

    pub fn last_beat(&self) -> Option<DateTime<Utc>> {
        *self.last.lock()
    }

    pub fn reset(&self) {
        self.count.store(0, Ordering::SeqCst);
        *self.last.lock() = None;
    }
}

/// Exposed as the `status` handler.
#[derive(Debug, Clone)]
pub struct StatusProbe {
    beats: Arc<BeatCounter>,
}

impl StatusProbe {
    pub fn new(beats: Arc<BeatCounter>) -> Self {
        Self { beats }
    }

    pub fn report(&self) -> serde_json::Value {
        serde_json::json!({
            "beats": self.beats.count(),
            "last_beat": self.beats.last_beat().map(|t| t.to_rfc3339()),
        })
    }
}
