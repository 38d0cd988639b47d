//! In-memory provider cache.

use dashmap::DashMap;
use std::sync::Arc;

use crate::observability::metrics;
use crate::registry::types::{Provider, ProviderType};

/// Thread-safe cache of provider records keyed by id.
#[derive(Clone, Default)]
pub struct ProviderCache {
    inner: Arc<DashMap<String, Provider>>,
}

impl ProviderCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<Provider> {
        self.inner.get(id).map(|entry| entry.value().clone())
    }

    /// Insert or replace a record.
    pub fn upsert(&self, provider: Provider) {
        self.inner.insert(provider.id.clone(), provider);
        metrics::record_cache_size(self.inner.len());
    }

    /// Remove a record. Returns true if it was present.
    pub fn evict(&self, id: &str) -> bool {
        let removed = self.inner.remove(id).is_some();
        if removed {
            metrics::record_cache_size(self.inner.len());
        }
        removed
    }

    /// Snapshot of cached records, optionally narrowed to one type, ordered by name.
    pub fn values(&self, provider_type: Option<ProviderType>) -> Vec<Provider> {
        let mut providers: Vec<Provider> = self
            .inner
            .iter()
            .filter(|entry| provider_type.map_or(true, |t| entry.value().provider_type == t))
            .map(|entry| entry.value().clone())
            .collect();
        providers.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        providers
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn clear(&self) {
        self.inner.clear();
        metrics::record_cache_size(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::types::ApiKey;
    use serde_json::json;

    fn provider(id: &str, name: &str, provider_type: &str) -> Provider {
        let mut p: Provider = serde_json::from_value(json!({
            "name": name,
            "type": provider_type,
            "key": "k-0000000000",
        }))
        .unwrap();
        p.id = id.to_string();
        p
    }

    #[test]
    fn test_upsert_replaces_and_evict_removes() {
        let cache = ProviderCache::new();
        cache.upsert(provider("a", "Alpha", "LLM"));
        let mut updated = provider("a", "Alpha", "LLM");
        updated.key = ApiKey::new("k-1111111111");
        cache.upsert(updated.clone());

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a"), Some(updated));
        assert!(cache.evict("a"));
        assert!(!cache.evict("a"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_values_filters_and_sorts() {
        let cache = ProviderCache::new();
        cache.upsert(provider("2", "Zeta", "LLM"));
        cache.upsert(provider("1", "Beta", "LLM"));
        cache.upsert(provider("3", "Mailer", "EMAIL"));

        let names: Vec<String> = cache
            .values(Some(ProviderType::Llm))
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Beta", "Zeta"]);
        assert_eq!(cache.values(None).len(), 3);
    }
}
