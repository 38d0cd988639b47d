//! Key access logging.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::store::{DocumentStore, StoreError, StoreResult};

/// One attempt to read a raw key.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessLogEntry {
    pub provider_id: String,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
}

impl AccessLogEntry {
    pub fn now(provider_id: impl Into<String>, success: bool) -> Self {
        Self {
            provider_id: provider_id.into(),
            timestamp: Utc::now(),
            success,
        }
    }
}

#[async_trait]
pub trait AccessLogSink: Send + Sync {
    async fn record(&self, entry: AccessLogEntry) -> StoreResult<()>;
}

/// Appends entries to a store collection.
pub struct StoreAccessLog {
    store: Arc<dyn DocumentStore>,
    collection: String,
}

impl StoreAccessLog {
    pub fn new(store: Arc<dyn DocumentStore>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }
}

#[async_trait]
impl AccessLogSink for StoreAccessLog {
    async fn record(&self, entry: AccessLogEntry) -> StoreResult<()> {
        let data: Map<String, Value> = match serde_json::to_value(&entry)? {
            Value::Object(map) => map,
            _ => return Err(StoreError::Other("access log entry is not an object".to_string())),
        };
        self.store.insert(&self.collection, data).await?;
        Ok(())
    }
}

/// In-memory access log.
#[derive(Debug, Default)]
pub struct MemoryAccessLog {
    entries: Mutex<Vec<AccessLogEntry>>,
    failing: AtomicBool,
    rejected: AtomicUsize,
}

impl MemoryAccessLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Writes refused while failing.
    pub fn rejected(&self) -> usize {
        self.rejected.load(Ordering::SeqCst)
    }

    pub fn entries(&self) -> Vec<AccessLogEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AccessLogSink for MemoryAccessLog {
    async fn record(&self, entry: AccessLogEntry) -> StoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            self.rejected.fetch_add(1, Ordering::SeqCst);
            return Err(StoreError::Unavailable("access log set to fail".to_string()));
        }
        self.entries
            .lock()
            .map_err(|_| StoreError::Other("access log poisoned".to_string()))?
            .push(entry);
        Ok(())
    }
}
