//! Provider registry: authoritative-store backed cache with a live change feed.

use arc_swap::ArcSwap;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::StoreConfig;
use crate::registry::cache::ProviderCache;
use crate::registry::defaults::DefaultMapping;
use crate::registry::feed::{self, FeedHandle};
use crate::registry::types::{
    Provider, ProviderType, ProviderView, RegistryError, RegistryResult,
};
use crate::store::{DocumentStore, Filter};

/// State shared between the registry and its feed task.
#[derive(Default)]
pub(crate) struct RegistryState {
    pub(crate) cache: ProviderCache,
    pub(crate) defaults: ArcSwap<DefaultMapping>,
}

struct Inner {
    store: Arc<dyn DocumentStore>,
    config: StoreConfig,
    state: Arc<RegistryState>,
    initialized: AtomicBool,
    feed: Mutex<Option<FeedHandle>>,
}

/// Read side of the registry. Cheap to clone; clones share one cache.
#[derive(Clone)]
pub struct ProviderRegistry {
    inner: Arc<Inner>,
}

impl ProviderRegistry {
    pub fn new(store: Arc<dyn DocumentStore>, config: StoreConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                config,
                state: Arc::new(RegistryState::default()),
                initialized: AtomicBool::new(false),
                feed: Mutex::new(None),
            }),
        }
    }

    /// Bulk-load active providers, load or seed the default mapping and
    /// attach the change feed. Idempotent; concurrent callers share one load.
    pub async fn initialize(&self) -> RegistryResult<()> {
        if self.is_initialized() {
            return Ok(());
        }
        let mut feed = self.inner.feed.lock().await;
        if self.is_initialized() {
            return Ok(());
        }

        let config = &self.inner.config;
        let active = Filter::all().eq("isActive", true);

        // Subscribe before the bulk read so no change falls between the two.
        let providers_rx = self
            .inner
            .store
            .subscribe(&config.providers_collection, active.clone())
            .await?;
        let settings_rx = self
            .inner
            .store
            .subscribe(&config.settings_collection, Filter::all())
            .await?;

        let documents = self
            .inner
            .store
            .list(&config.providers_collection, &active)
            .await?;
        // Anything cached while detached may have been deleted or deactivated since.
        self.inner.state.cache.clear();
        let mut loaded = 0usize;
        for document in documents {
            match document.decode::<Provider>() {
                Ok(provider) => {
                    self.inner.state.cache.upsert(provider);
                    loaded += 1;
                }
                Err(e) => {
                    tracing::warn!(provider_id = %document.id, error = %e, "Skipping undecodable provider");
                }
            }
        }

        let mapping = self.load_default_mapping().await?;
        self.inner.state.defaults.store(Arc::new(mapping));

        *feed = Some(feed::spawn(
            providers_rx,
            settings_rx,
            self.inner.state.clone(),
            config.defaults_document.clone(),
        ));
        self.inner.initialized.store(true, Ordering::Release);

        tracing::info!(providers = loaded, "Provider registry initialized");
        Ok(())
    }

    /// Read the default mapping document, seeding a null entry for every type it lacks.
    async fn load_default_mapping(&self) -> RegistryResult<DefaultMapping> {
        let config = &self.inner.config;
        let existing = self
            .inner
            .store
            .get(&config.settings_collection, &config.defaults_document)
            .await?;

        let mut mapping = existing
            .map(|document| DefaultMapping::from_fields(&document.data))
            .unwrap_or_default();

        let mut missing = Map::new();
        for provider_type in ProviderType::ALL {
            if !mapping.contains(provider_type.as_str()) {
                missing.insert(provider_type.as_str().to_string(), Value::Null);
                mapping.set(provider_type.as_str(), None);
            }
        }
        if !missing.is_empty() {
            tracing::info!(entries = missing.len(), "Seeding default provider mapping");
            self.inner
                .store
                .merge(&config.settings_collection, &config.defaults_document, missing)
                .await?;
        }
        Ok(mapping)
    }

    /// Look up one provider. Secrets in the result are redacted.
    pub async fn get_provider(&self, id: &str) -> RegistryResult<ProviderView> {
        self.fetch(id).await.map(|provider| ProviderView::from(&provider))
    }

    /// Full record, cache first. A miss falls through to a point read that populates the cache.
    pub(crate) async fn fetch(&self, id: &str) -> RegistryResult<Provider> {
        if let Some(provider) = self.inner.state.cache.get(id) {
            return Ok(provider);
        }
        self.fetch_fresh(id).await
    }

    /// Full record read from the store, bypassing the cache.
    pub(crate) async fn fetch_fresh(&self, id: &str) -> RegistryResult<Provider> {
        let document = self
            .inner
            .store
            .get(&self.inner.config.providers_collection, id)
            .await?
            .ok_or_else(|| RegistryError::NotFound(format!("provider {id}")))?;
        let provider: Provider = document.decode().map_err(|source| RegistryError::Decode {
            id: id.to_string(),
            source,
        })?;
        self.inner.state.cache.upsert(provider.clone());
        Ok(provider)
    }

    /// Cached providers, optionally restricted to one type.
    pub fn list_providers(&self, provider_type: Option<ProviderType>) -> Vec<ProviderView> {
        self.inner
            .state
            .cache
            .values(provider_type)
            .iter()
            .map(ProviderView::from)
            .collect()
    }

    pub fn cache_size(&self) -> usize {
        self.inner.state.cache.len()
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::Acquire)
    }

    /// Detach the change feed. A later `initialize` drops the cache and reloads it.
    pub async fn cleanup(&self) {
        let mut feed = self.inner.feed.lock().await;
        if let Some(handle) = feed.take() {
            handle.stop().await;
        }
        self.inner.initialized.store(false, Ordering::Release);
        tracing::info!("Provider registry change feed detached");
    }

    pub(crate) fn cache_upsert(&self, provider: Provider) {
        self.inner.state.cache.upsert(provider);
    }

    pub(crate) fn default_mapping(&self) -> Arc<DefaultMapping> {
        self.inner.state.defaults.load_full()
    }

    pub(crate) fn apply_default(&self, key: &str, provider_id: Option<String>) {
        self.inner.state.defaults.rcu(|current| {
            let mut next = DefaultMapping::clone(current);
            next.set(key, provider_id.clone());
            next
        });
    }

    pub(crate) fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.inner.store
    }

    pub(crate) fn store_config(&self) -> &StoreConfig {
        &self.inner.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[tokio::test]
    async fn test_initialize_loads_only_active_and_seeds_defaults() {
        let store = MemoryStore::default();
        store
            .insert(
                "providers",
                fields(json!({"name": "On", "type": "LLM", "key": "sk-1111111111", "isActive": true})),
            )
            .await
            .unwrap();
        store
            .insert(
                "providers",
                fields(json!({"name": "Off", "type": "LLM", "key": "sk-2222222222", "isActive": false})),
            )
            .await
            .unwrap();

        let registry = ProviderRegistry::new(Arc::new(store.clone()), StoreConfig::default());
        registry.initialize().await.unwrap();
        registry.initialize().await.unwrap();

        assert_eq!(registry.cache_size(), 1);
        let defaults = store.get("settings", "defaultProviders").await.unwrap().unwrap();
        assert_eq!(defaults.data.len(), ProviderType::ALL.len());
        assert_eq!(defaults.field("LLM"), Some(&Value::Null));

        registry.cleanup().await;
        assert!(!registry.is_initialized());
    }

    #[tokio::test]
    async fn test_seeding_keeps_existing_entries() {
        let store = MemoryStore::default();
        store
            .merge("settings", "defaultProviders", fields(json!({"LLM": "p1", "LLM_OPENAI": "p2"})))
            .await
            .unwrap();

        let registry = ProviderRegistry::new(Arc::new(store.clone()), StoreConfig::default());
        registry.initialize().await.unwrap();

        let defaults = store.get("settings", "defaultProviders").await.unwrap().unwrap();
        assert_eq!(defaults.field("LLM"), Some(&json!("p1")));
        assert_eq!(defaults.field("LLM_OPENAI"), Some(&json!("p2")));
        assert_eq!(defaults.field("EMAIL"), Some(&Value::Null));
        registry.cleanup().await;
    }

    #[tokio::test]
    async fn test_cache_miss_falls_through_to_store() {
        let store = MemoryStore::default();
        let id = store
            .insert(
                "providers",
                fields(json!({"name": "Off", "type": "EMAIL", "key": "SG.abcdefghijkl", "isActive": false})),
            )
            .await
            .unwrap();
        let registry = ProviderRegistry::new(Arc::new(store), StoreConfig::default());

        let view = registry.get_provider(&id).await.unwrap();
        assert_eq!(view.name, "Off");
        assert_eq!(view.key, "SG…kl");
        assert_eq!(registry.cache_size(), 1);

        let missing = registry.get_provider("nope").await;
        assert!(matches!(missing, Err(RegistryError::NotFound(_))));
    }
}
