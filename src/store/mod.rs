//! Authoritative document store contract.
//!
//! # Data Flow
//! ```text
//! registry / credentials / audit
//!     → DocumentStore (point get, filtered list, insert, partial update, merge)
//!     → backing store (MemoryStore in-process, or any external adapter)
//!
//! backing store mutation
//!     → subscribe() channel (Added / Modified / Removed relative to a filter)
//!     → registry feed task
//! ```
//!
//! # Design Decisions
//! - The core depends only on this trait, never on a wire format
//! - Documents are untyped JSON maps; callers decode into their own types
//! - Change events are delivered on an unbounded channel per subscription
//! - Partial updates are last-writer-wins at the field level

pub mod memory;
pub mod types;

use async_trait::async_trait;
use serde_json::{Map, Value};

pub use memory::MemoryStore;
pub use types::{ChangeEvent, ChangeKind, ChangeStream, Document, Filter, StoreError, StoreResult};

/// Operations the registry needs from the authoritative store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Point lookup by id. `Ok(None)` when the document does not exist.
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>>;

    /// All documents in `collection` matching `filter`.
    async fn list(&self, collection: &str, filter: &Filter) -> StoreResult<Vec<Document>>;

    /// Insert a new document and return its store-assigned id.
    async fn insert(&self, collection: &str, data: Map<String, Value>) -> StoreResult<String>;

    /// Overwrite the named fields of an existing document.
    ///
    /// Fails with [`StoreError::NotFound`] if the document does not exist.
    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> StoreResult<()>;

    /// Overwrite the named fields, creating the document if it is absent.
    async fn merge(&self, collection: &str, id: &str, fields: Map<String, Value>)
        -> StoreResult<()>;

    /// Attach a live subscription to documents of `collection` matching `filter`.
    ///
    /// Dropping the returned receiver detaches the subscription.
    async fn subscribe(&self, collection: &str, filter: Filter) -> StoreResult<ChangeStream>;
}
