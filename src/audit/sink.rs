//! Audit sinks.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::audit::events::AuditEvent;
use crate::store::{DocumentStore, StoreError};

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit sink unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("audit record could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Destination for audit records.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: &AuditEvent) -> Result<(), AuditError>;
}

/// Appends audit records to a collection of the document store.
pub struct StoreAuditSink {
    store: Arc<dyn DocumentStore>,
    collection: String,
}

impl StoreAuditSink {
    pub fn new(store: Arc<dyn DocumentStore>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }
}

#[async_trait]
impl AuditSink for StoreAuditSink {
    async fn record(&self, event: &AuditEvent) -> Result<(), AuditError> {
        let data: Map<String, Value> = match serde_json::to_value(event)? {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("event".to_string(), other);
                map
            }
        };
        self.store.insert(&self.collection, data).await?;
        Ok(())
    }
}

/// Emits audit records as structured log lines under the `audit` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: &AuditEvent) -> Result<(), AuditError> {
        tracing::info!(
            target: "audit",
            event_id = %event.id,
            event_type = event.event_type.as_str(),
            actor = %event.actor_id,
            success = event.success(),
            payload = %event.payload,
            "Audit event"
        );
        Ok(())
    }
}

/// Keeps audit records in memory. Writes can be made to fail on demand.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
    failing: AtomicBool,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, event: &AuditEvent) -> Result<(), AuditError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AuditError::Unavailable("memory sink set to fail".to_string()));
        }
        let mut events = self
            .events
            .lock()
            .map_err(|_| AuditError::Unavailable("memory sink poisoned".to_string()))?;
        events.push(event.clone());
        Ok(())
    }
}
