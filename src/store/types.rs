//! Store-level types and error definitions.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// A document as held by the store: its id plus a flat field map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub data: Map<String, Value>,
}

impl Document {
    pub fn new(id: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    /// Decode into a typed record. The document id is injected as the `id` field.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        let mut data = self.data.clone();
        data.insert("id".to_string(), Value::String(self.id.clone()));
        serde_json::from_value(Value::Object(data))
    }

    /// Read a single field.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }
}

/// Conjunction of field equality clauses. An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<(String, Value)>,
}

impl Filter {
    /// Match every document.
    pub fn all() -> Self {
        Self::default()
    }

    /// Add a `field == value` clause.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push((field.into(), value.into()));
        self
    }

    pub fn matches(&self, data: &Map<String, Value>) -> bool {
        self.clauses
            .iter()
            .all(|(field, expected)| data.get(field) == Some(expected))
    }
}

/// Kind of change reported by a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// The document started matching the subscription.
    Added,
    /// A matching document changed and still matches.
    Modified,
    /// The document was deleted or stopped matching.
    Removed,
}

/// A single change-feed event.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    /// Document state after the change (last known state for `Removed`).
    pub document: Document,
}

/// Receiving half of a subscription.
pub type ChangeStream = mpsc::UnboundedReceiver<ChangeEvent>;

/// Errors surfaced by a [`DocumentStore`](super::DocumentStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// Document required by the operation does not exist.
    #[error("document {collection}/{id} not found")]
    NotFound { collection: String, id: String },

    /// Store could not be reached or rejected the request transiently.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Store request did not complete in time.
    #[error("store request timed out after {0:?}")]
    Timeout(Duration),

    /// A record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Snapshot file could not be read or written.
    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other store failure.
    #[error("store operation failed: {0}")]
    Other(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
