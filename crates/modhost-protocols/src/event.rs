//! Event types for loosely coupled component notification.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ComponentError;

/// A published event as seen by one subscriber.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub name: String,
    pub payload: serde_json::Value,
    pub published_at: DateTime<Utc>,
}

impl Event {
    pub fn new(name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            payload,
            published_at: Utc::now(),
        }
    }
}

/// Subscriber callback.
///
/// Each invocation runs detached from the publisher; an error or panic is
/// logged by the bus and goes nowhere else.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: Event) -> Result<(), ComponentError>;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> EventHandler for FnHandler<F>
where
    F: Fn(Event) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), ComponentError>> + Send,
{
    async fn handle(&self, event: Event) -> Result<(), ComponentError> {
        (self.0)(event).await
    }
}

/// Build an [`EventHandler`] from an async closure.
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn EventHandler>
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ComponentError>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}
