//! In-process document store with snapshot persistence.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::store::types::{
    ChangeEvent, ChangeKind, ChangeStream, Document, Filter, StoreError, StoreResult,
};
use crate::store::DocumentStore;

type Collections = HashMap<String, BTreeMap<String, Map<String, Value>>>;

struct Subscriber {
    collection: String,
    filter: Filter,
    tx: mpsc::UnboundedSender<ChangeEvent>,
}

#[derive(Default)]
struct State {
    collections: Collections,
    subscribers: Vec<Subscriber>,
}

/// A thread-safe in-memory [`DocumentStore`].
///
/// Cloning shares the underlying data, so a clone handed to another task
/// observes (and notifies subscribers of) the same documents.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    persistence_path: Option<PathBuf>,
    writes: Arc<AtomicU64>,
    failing_writes: Arc<AtomicU32>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new(persistence_path: Option<PathBuf>) -> Self {
        Self {
            persistence_path,
            ..Self::default()
        }
    }

    /// Load from a snapshot file if it exists; start empty otherwise.
    pub fn load_from_file(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let store = Self::new(Some(path.to_path_buf()));
        if path.exists() {
            let reader = BufReader::new(File::open(path)?);
            let collections: Collections = serde_json::from_reader(reader)?;
            let count: usize = collections.values().map(BTreeMap::len).sum();
            store.lock().collections = collections;
            tracing::info!(path = %path.display(), documents = count, "Loaded store snapshot");
        }
        Ok(store)
    }

    /// Save to the snapshot file, if one was configured.
    pub fn save_to_file(&self) -> StoreResult<()> {
        if let Some(path) = &self.persistence_path {
            let state = self.lock();
            let writer = BufWriter::new(File::create(path)?);
            serde_json::to_writer_pretty(writer, &state.collections)?;
            tracing::debug!(path = %path.display(), "Saved store snapshot");
        }
        Ok(())
    }

    /// Delete a document. Deletion is owned by whoever holds the store, not by the registry.
    pub fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        self.begin_write()?;
        let mut state = self.lock();
        let removed = state
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.remove(id));
        match removed {
            Some(before) => {
                notify(&mut state, collection, id, Some(&before), None);
                Ok(())
            }
            None => Err(not_found(collection, id)),
        }
    }

    /// Number of successful or attempted write operations so far.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make the next `count` write operations fail with [`StoreError::Unavailable`].
    pub fn fail_next_writes(&self, count: u32) {
        self.failing_writes.store(count, Ordering::SeqCst);
    }

    /// Number of documents in a collection.
    pub fn count(&self, collection: &str) -> usize {
        self.lock()
            .collections
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin_write(&self) -> StoreResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let injected = self
            .failing_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StoreError::Unavailable("injected write failure".to_string()));
        }
        Ok(())
    }

    fn write_fields(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
        create: bool,
    ) -> StoreResult<()> {
        self.begin_write()?;
        let mut state = self.lock();
        let docs = state.collections.entry(collection.to_string()).or_default();
        let before = docs.get(id).cloned();
        if before.is_none() && !create {
            return Err(not_found(collection, id));
        }
        let doc = docs.entry(id.to_string()).or_default();
        for (field, value) in fields {
            doc.insert(field, value);
        }
        let after = doc.clone();
        notify(&mut state, collection, id, before.as_ref(), Some(&after));
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        Ok(self
            .lock()
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|data| Document::new(id, data.clone())))
    }

    async fn list(&self, collection: &str, filter: &Filter) -> StoreResult<Vec<Document>> {
        let state = self.lock();
        let Some(docs) = state.collections.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(docs
            .iter()
            .filter(|(_, data)| filter.matches(data))
            .map(|(id, data)| Document::new(id.clone(), data.clone()))
            .collect())
    }

    async fn insert(&self, collection: &str, data: Map<String, Value>) -> StoreResult<String> {
        let id = Uuid::new_v4().simple().to_string();
        self.write_fields(collection, &id, data, true)?;
        Ok(id)
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> StoreResult<()> {
        self.write_fields(collection, id, fields, false)
    }

    async fn merge(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> StoreResult<()> {
        self.write_fields(collection, id, fields, true)
    }

    async fn subscribe(&self, collection: &str, filter: Filter) -> StoreResult<ChangeStream> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().subscribers.push(Subscriber {
            collection: collection.to_string(),
            filter,
            tx,
        });
        tracing::debug!(collection, "Change subscription attached");
        Ok(rx)
    }
}

fn not_found(collection: &str, id: &str) -> StoreError {
    StoreError::NotFound {
        collection: collection.to_string(),
        id: id.to_string(),
    }
}

/// Fan a change out to every live subscriber of `collection`, pruning closed ones.
fn notify(
    state: &mut State,
    collection: &str,
    id: &str,
    before: Option<&Map<String, Value>>,
    after: Option<&Map<String, Value>>,
) {
    state.subscribers.retain(|sub| {
        if sub.collection != collection {
            return !sub.tx.is_closed();
        }
        let was = before.is_some_and(|data| sub.filter.matches(data));
        let is = after.is_some_and(|data| sub.filter.matches(data));
        let event = match (was, is, after, before) {
            (false, true, Some(data), _) => Some((ChangeKind::Added, data)),
            (true, true, Some(data), _) => Some((ChangeKind::Modified, data)),
            (true, false, _, Some(data)) => Some((ChangeKind::Removed, after.unwrap_or(data))),
            _ => None,
        };
        match event {
            Some((kind, data)) => sub
                .tx
                .send(ChangeEvent {
                    kind,
                    document: Document::new(id, data.clone()),
                })
                .is_ok(),
            None => !sub.tx.is_closed(),
        }
    });
}
