//! Default provider resolution.
//!
//! The mapping document holds one entry per resolution key (`TYPE` or
//! `TYPE_SUBTYPE`), each a provider id or null. Entries are never removed,
//! only nulled.

use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::audit::{self, AuditEvent, AuditEventType, AuditSink};
use crate::registry::provider_registry::ProviderRegistry;
use crate::registry::types::{
    parse_provider_type, parse_subtype, resolution_key, LlmSubtype, ProviderType, ProviderView,
    RegistryError, RegistryResult,
};

/// In-memory copy of the default mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DefaultMapping {
    entries: BTreeMap<String, Option<String>>,
}

impl DefaultMapping {
    /// Build from a stored document. Non-string, non-null values are ignored.
    pub fn from_fields(data: &Map<String, Value>) -> Self {
        let entries = data
            .iter()
            .filter_map(|(key, value)| match value {
                Value::String(id) if !id.is_empty() => Some((key.clone(), Some(id.clone()))),
                Value::String(_) | Value::Null => Some((key.clone(), None)),
                _ => None,
            })
            .collect();
        Self { entries }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(|id| id.as_deref())
    }

    pub fn set(&mut self, key: &str, provider_id: Option<String>) {
        self.entries.insert(key.to_string(), provider_id);
    }

    /// Composite key first, then the bare type key.
    pub fn resolve(&self, provider_type: ProviderType, subtype: Option<LlmSubtype>) -> Option<&str> {
        subtype
            .and_then(|subtype| self.get(&resolution_key(provider_type, Some(subtype))))
            .or_else(|| self.get(provider_type.as_str()))
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries
            .iter()
            .map(|(key, id)| (key.as_str(), id.as_deref()))
    }
}

/// Resolves and assigns default providers per type and subtype.
#[derive(Clone)]
pub struct DefaultResolutionIndex {
    registry: ProviderRegistry,
    audit: Arc<dyn AuditSink>,
}

impl DefaultResolutionIndex {
    pub fn new(registry: ProviderRegistry, audit: Arc<dyn AuditSink>) -> Self {
        Self { registry, audit }
    }

    /// Resolve the default provider for `provider_type`, preferring the
    /// subtype-specific entry when one is set.
    pub async fn get_default_provider(
        &self,
        provider_type: &str,
        subtype: Option<&str>,
    ) -> RegistryResult<ProviderView> {
        let provider_type = parse_provider_type(provider_type)?;
        let subtype = subtype.map(parse_subtype).transpose()?;
        self.registry.initialize().await?;

        let mapping = self.registry.default_mapping();
        let id = mapping.resolve(provider_type, subtype).ok_or_else(|| {
            RegistryError::NotFound(format!(
                "no default provider for {}",
                resolution_key(provider_type, subtype)
            ))
        })?;
        self.registry.get_provider(id).await
    }

    /// Assign (or clear, with `None`) the default for a type or type/subtype pair.
    pub async fn set_default_provider(
        &self,
        provider_type: &str,
        provider_id: Option<&str>,
        subtype: Option<&str>,
        actor: &str,
    ) -> RegistryResult<()> {
        let result = self.assign(provider_type, provider_id, subtype).await;

        let payload = json!({
            "type": provider_type,
            "subtype": subtype,
            "providerId": provider_id,
        });
        let event = AuditEvent::new(AuditEventType::DefaultProviderSet, actor, payload)
            .with_outcome(&result);
        let _ = audit::emit(self.audit.as_ref(), event).await;

        result
    }

    async fn assign(
        &self,
        provider_type: &str,
        provider_id: Option<&str>,
        subtype: Option<&str>,
    ) -> RegistryResult<()> {
        let provider_type = parse_provider_type(provider_type)?;
        let subtype = subtype.map(parse_subtype).transpose()?;
        if let Some(id) = provider_id {
            if id.is_empty() {
                return Err(RegistryError::Validation(
                    "provider id must not be empty".to_string(),
                ));
            }
            self.registry.fetch(id).await?;
        }
        self.registry.initialize().await?;

        let key = resolution_key(provider_type, subtype);
        let mut fields = Map::new();
        fields.insert(
            key.clone(),
            provider_id.map_or(Value::Null, |id| Value::String(id.to_string())),
        );

        let config = self.registry.store_config();
        self.registry
            .store()
            .merge(&config.settings_collection, &config.defaults_document, fields)
            .await?;
        self.registry
            .apply_default(&key, provider_id.map(str::to_string));

        tracing::info!(key = %key, provider_id = ?provider_id, "Default provider set");
        Ok(())
    }
}
