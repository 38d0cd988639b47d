//! Change-feed task keeping the cache and default mapping in sync with the store.

use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::observability::metrics;
use crate::registry::defaults::DefaultMapping;
use crate::registry::provider_registry::RegistryState;
use crate::registry::types::Provider;
use crate::store::{ChangeEvent, ChangeKind, ChangeStream};

/// Handle to a running feed task.
pub(crate) struct FeedHandle {
    shutdown: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

impl FeedHandle {
    /// Signal the task and wait for it to exit.
    pub(crate) async fn stop(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "Change feed task ended abnormally");
        }
    }
}

/// Spawn the feed task over the two subscriptions.
pub(crate) fn spawn(
    providers: ChangeStream,
    settings: ChangeStream,
    state: Arc<RegistryState>,
    defaults_document: String,
) -> FeedHandle {
    let (shutdown, rx) = broadcast::channel(1);
    let task = tokio::spawn(run(providers, settings, state, defaults_document, rx));
    FeedHandle { shutdown, task }
}

async fn run(
    mut providers: ChangeStream,
    mut settings: ChangeStream,
    state: Arc<RegistryState>,
    defaults_document: String,
    mut shutdown: broadcast::Receiver<()>,
) {
    tracing::debug!("Change feed started");
    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::debug!("Change feed received shutdown signal, exiting loop");
                break;
            }
            Some(event) = providers.recv() => apply_provider_event(&state, event),
            Some(event) = settings.recv() => apply_settings_event(&state, &defaults_document, event),
        }
    }
}

pub(crate) fn apply_provider_event(state: &RegistryState, event: ChangeEvent) {
    let id = event.document.id.clone();
    match event.kind {
        ChangeKind::Added | ChangeKind::Modified => match event.document.decode::<Provider>() {
            Ok(provider) => {
                state.cache.upsert(provider);
                metrics::record_cache_event(kind_label(event.kind));
                tracing::debug!(provider_id = %id, kind = kind_label(event.kind), "Cache updated from feed");
            }
            Err(e) => {
                tracing::warn!(provider_id = %id, error = %e, "Skipping undecodable provider change");
            }
        },
        ChangeKind::Removed => {
            if state.cache.evict(&id) {
                metrics::record_cache_event("removed");
                tracing::debug!(provider_id = %id, "Provider evicted from cache");
            }
        }
    }
}

pub(crate) fn apply_settings_event(state: &RegistryState, defaults_document: &str, event: ChangeEvent) {
    if event.document.id != defaults_document {
        return;
    }
    match event.kind {
        ChangeKind::Added | ChangeKind::Modified => {
            state
                .defaults
                .store(Arc::new(DefaultMapping::from_fields(&event.document.data)));
            tracing::debug!("Default mapping refreshed from feed");
        }
        ChangeKind::Removed => {
            tracing::warn!("Default mapping document was deleted; keeping last known mapping");
        }
    }
}

fn kind_label(kind: ChangeKind) -> &'static str {
    match kind {
        ChangeKind::Added => "added",
        ChangeKind::Modified => "modified",
        ChangeKind::Removed => "removed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Document;
    use serde_json::{json, Value};

    fn doc(id: &str, value: Value) -> Document {
        match value {
            Value::Object(map) => Document::new(id, map),
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_provider_events_drive_cache() {
        let state = RegistryState::default();
        let data = json!({"name": "A", "type": "LLM", "key": "sk-0000000000", "isActive": true});

        apply_provider_event(
            &state,
            ChangeEvent { kind: ChangeKind::Added, document: doc("p1", data.clone()) },
        );
        assert_eq!(state.cache.get("p1").map(|p| p.name), Some("A".to_string()));

        apply_provider_event(
            &state,
            ChangeEvent { kind: ChangeKind::Removed, document: doc("p1", data) },
        );
        assert!(state.cache.get("p1").is_none());
    }

    #[test]
    fn test_undecodable_provider_is_skipped() {
        let state = RegistryState::default();
        apply_provider_event(
            &state,
            ChangeEvent { kind: ChangeKind::Added, document: doc("bad", json!({"name": 3})) },
        );
        assert!(state.cache.is_empty());
    }

    #[test]
    fn test_only_defaults_document_updates_mapping() {
        let state = RegistryState::default();
        apply_settings_event(
            &state,
            "defaultProviders",
            ChangeEvent { kind: ChangeKind::Modified, document: doc("other", json!({"LLM": "x"})) },
        );
        assert_eq!(state.defaults.load().get("LLM"), None);

        apply_settings_event(
            &state,
            "defaultProviders",
            ChangeEvent {
                kind: ChangeKind::Modified,
                document: doc("defaultProviders", json!({"LLM": "x", "EMAIL": null})),
            },
        );
        assert_eq!(state.defaults.load().get("LLM"), Some("x"));
    }
}
