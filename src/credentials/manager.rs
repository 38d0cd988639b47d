//! Credential lifecycle: create, update, rotate and access keys.

use chrono::Utc;
use serde_json::{json, Map, Value};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

use crate::audit::{self, AuditEvent, AuditEventType, AuditSink};
use crate::credentials::access_log::{AccessLogEntry, AccessLogSink};
use crate::credentials::validation::{
    parse_expiry, validate_key, validate_new_provider, NewProvider, ProviderUpdate,
};
use crate::observability::metrics;
use crate::registry::{
    parse_subtype, Provider, ProviderRegistry, ProviderView, RegistryError, RegistryResult,
};

/// Result of a provider test, as persisted on the record.
#[derive(Debug, Clone, PartialEq)]
pub struct TestResult {
    pub success: bool,
    pub message: String,
}

/// Mutations of provider records. Every mutation is audited.
#[derive(Clone)]
pub struct CredentialManager {
    registry: ProviderRegistry,
    audit: Arc<dyn AuditSink>,
    access_log: Arc<dyn AccessLogSink>,
    pending_access: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl CredentialManager {
    pub fn new(
        registry: ProviderRegistry,
        audit: Arc<dyn AuditSink>,
        access_log: Arc<dyn AccessLogSink>,
    ) -> Self {
        Self {
            registry,
            audit,
            access_log,
            pending_access: Arc::default(),
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Validate and persist a new provider. Nothing is written if validation fails.
    pub async fn create_provider(&self, input: NewProvider, actor: &str) -> RegistryResult<ProviderView> {
        let result = self.insert_provider(&input, actor).await;

        let payload = json!({
            "providerId": result.as_ref().ok().map(|view| view.id.clone()),
            "name": input.name,
            "type": input.provider_type,
            "subtype": input.subtype,
        });
        let event = AuditEvent::new(AuditEventType::ProviderCreated, actor, payload).with_outcome(&result);
        let _ = audit::emit(self.audit.as_ref(), event).await;

        result
    }

    async fn insert_provider(&self, input: &NewProvider, actor: &str) -> RegistryResult<ProviderView> {
        let validated = validate_new_provider(input)?;
        let now = Utc::now();

        let mut provider = Provider {
            id: String::new(),
            name: validated.name,
            provider_type: validated.provider_type,
            subtype: validated.subtype,
            key: validated.key,
            previous_key: None,
            is_active: validated.is_active,
            description: validated.description,
            expiry_date: validated.expiry_date,
            last_tested: None,
            last_test_result: None,
            last_test_message: None,
            created_by: actor.to_string(),
            created_at: now,
            updated_by: actor.to_string(),
            updated_at: now,
            key_rotated_at: None,
            key_rotated_by: None,
        };

        let data = to_fields(&provider)?;
        let config = self.registry.store_config();
        provider.id = self
            .registry
            .store()
            .insert(&config.providers_collection, data)
            .await?;

        tracing::info!(
            provider_id = %provider.id,
            provider_type = %provider.provider_type,
            actor,
            "Provider created"
        );
        let view = ProviderView::from(&provider);
        self.registry.cache_upsert(provider);
        Ok(view)
    }

    /// Apply a partial update. `previousKey` is never touched here.
    pub async fn update_provider(
        &self,
        id: &str,
        update: ProviderUpdate,
        actor: &str,
    ) -> RegistryResult<ProviderView> {
        let result = self.apply_update(id, &update, actor).await;

        let mut fields: Vec<&str> = Vec::new();
        if update.name.is_some() {
            fields.push("name");
        }
        if update.subtype.is_some() {
            fields.push("subtype");
        }
        if update.key.is_some() {
            fields.push("key");
        }
        if update.is_active.is_some() {
            fields.push("isActive");
        }
        if update.description.is_some() {
            fields.push("description");
        }
        if update.expiry_date.is_some() || update.clear_expiry {
            fields.push("expiryDate");
        }
        let payload = json!({
            "providerId": id,
            "fields": fields,
            "keyChanged": update.key.is_some(),
        });
        let event = AuditEvent::new(AuditEventType::ProviderUpdated, actor, payload).with_outcome(&result);
        let _ = audit::emit(self.audit.as_ref(), event).await;

        result
    }

    async fn apply_update(
        &self,
        id: &str,
        update: &ProviderUpdate,
        actor: &str,
    ) -> RegistryResult<ProviderView> {
        if update.is_empty() {
            return Err(RegistryError::Validation("update contains no fields".to_string()));
        }

        // Validate everything before the first read so bad input never costs a round trip.
        let name = match update.name.as_deref().map(str::trim) {
            Some("") => return Err(RegistryError::Validation("name must not be empty".to_string())),
            other => other,
        };
        let key = update.key.as_deref().map(validate_key).transpose()?;
        let subtype = update.subtype.as_deref().map(parse_subtype).transpose()?;
        let expiry = if update.clear_expiry {
            Some(None)
        } else {
            update.expiry_date.as_deref().map(parse_expiry).transpose()?.map(Some)
        };

        let mut provider = self.registry.fetch(id).await?;
        let now = Utc::now();
        let mut fields = Map::new();

        if let Some(name) = name {
            provider.name = name.to_string();
            fields.insert("name".into(), json!(provider.name));
        }
        if let Some(subtype) = subtype {
            provider.subtype = Some(subtype);
            fields.insert("subtype".into(), serde_json::to_value(subtype)?);
        }
        if let Some(key) = key {
            fields.insert("key".into(), serde_json::to_value(&key)?);
            provider.key = key;
        }
        if let Some(is_active) = update.is_active {
            provider.is_active = is_active;
            fields.insert("isActive".into(), json!(is_active));
        }
        if let Some(description) = &update.description {
            provider.description = Some(description.clone());
            fields.insert("description".into(), json!(description));
        }
        if let Some(expiry) = expiry {
            provider.expiry_date = expiry;
            fields.insert("expiryDate".into(), serde_json::to_value(expiry)?);
        }
        provider.updated_by = actor.to_string();
        provider.updated_at = now;
        fields.insert("updatedBy".into(), json!(actor));
        fields.insert("updatedAt".into(), serde_json::to_value(now)?);

        let config = self.registry.store_config();
        self.registry
            .store()
            .update(&config.providers_collection, id, fields)
            .await?;

        tracing::info!(provider_id = %id, actor, key_changed = update.key.is_some(), "Provider updated");
        let view = ProviderView::from(&provider);
        self.registry.cache_upsert(provider);
        Ok(view)
    }

    /// Replace the key, keeping the outgoing one as `previousKey`.
    ///
    /// The audit write is part of the operation: if the rotation succeeded but
    /// the audit record could not be written, the call fails with
    /// [`RegistryError::Audit`]. On a failed rotation the original error is kept.
    pub async fn rotate_api_key(&self, id: &str, new_key: &str, actor: &str) -> RegistryResult<ProviderView> {
        let result = self.rotate(id, new_key, actor).await;

        let payload = json!({ "providerId": id });
        let event = AuditEvent::new(AuditEventType::ApiKeyRotated, actor, payload).with_outcome(&result);
        let audited = audit::emit(self.audit.as_ref(), event).await;

        match (result, audited) {
            (Ok(view), Ok(())) => Ok(view),
            (Ok(_), Err(e)) => Err(RegistryError::Audit(e)),
            (Err(e), _) => Err(e),
        }
    }

    async fn rotate(&self, id: &str, new_key: &str, actor: &str) -> RegistryResult<ProviderView> {
        let new_key = validate_key(new_key)?;
        // Read through to the store so the outgoing key is the one current right now.
        let mut provider = self.registry.fetch_fresh(id).await?;
        let now = Utc::now();

        let previous = std::mem::replace(&mut provider.key, new_key);
        provider.previous_key = Some(previous);
        provider.key_rotated_at = Some(now);
        provider.key_rotated_by = Some(actor.to_string());
        provider.updated_at = now;
        provider.updated_by = actor.to_string();

        let mut fields = Map::new();
        fields.insert("key".into(), serde_json::to_value(&provider.key)?);
        fields.insert("previousKey".into(), serde_json::to_value(&provider.previous_key)?);
        fields.insert("keyRotatedAt".into(), serde_json::to_value(now)?);
        fields.insert("keyRotatedBy".into(), json!(actor));
        fields.insert("updatedAt".into(), serde_json::to_value(now)?);
        fields.insert("updatedBy".into(), json!(actor));

        let config = self.registry.store_config();
        self.registry
            .store()
            .update(&config.providers_collection, id, fields)
            .await?;

        tracing::info!(provider_id = %id, actor, "API key rotated");
        let view = ProviderView::from(&provider);
        self.registry.cache_upsert(provider);
        Ok(view)
    }

    /// Hand out the raw key of an active, unexpired provider.
    ///
    /// Every attempt on a known provider is written to the access log in the
    /// background; the caller never waits on or sees that write.
    pub async fn get_api_key(&self, id: &str) -> RegistryResult<String> {
        let provider = self.registry.fetch(id).await?;

        let refusal = if !provider.is_active {
            Some(format!("provider {id} is inactive"))
        } else if provider.is_expired_at(Utc::now()) {
            Some(format!("API key for provider {id} has expired"))
        } else {
            None
        };

        self.log_access(id, refusal.is_none());
        match refusal {
            Some(reason) => {
                tracing::warn!(provider_id = %id, reason = %reason, "API key access denied");
                Err(RegistryError::Validation(reason))
            }
            None => Ok(provider.key.expose().to_string()),
        }
    }

    fn log_access(&self, id: &str, success: bool) {
        metrics::record_key_access(success);
        let sink = self.access_log.clone();
        let entry = AccessLogEntry::now(id, success);
        let handle = tokio::spawn(async move {
            let provider_id = entry.provider_id.clone();
            if let Err(e) = sink.record(entry).await {
                tracing::warn!(provider_id = %provider_id, error = %e, "Failed to write key access log");
            }
        });
        if let Ok(mut pending) = self.pending_access.lock() {
            pending.retain(|handle| !handle.is_finished());
            pending.push(handle);
        }
    }

    /// Wait for access-log writes still in flight. Callers that persist the
    /// store on exit use this so detached writes are not lost.
    pub async fn flush_access_log(&self) {
        let handles = self
            .pending_access
            .lock()
            .map(|mut pending| std::mem::take(&mut *pending))
            .unwrap_or_default();
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Key access log write did not complete");
            }
        }
    }

    /// Persist the outcome of a provider test.
    pub async fn record_test_result(&self, id: &str, result: &TestResult) -> RegistryResult<()> {
        let mut provider = self.registry.fetch(id).await?;
        let now = Utc::now();
        provider.last_tested = Some(now);
        provider.last_test_result = Some(result.success);
        provider.last_test_message = Some(result.message.clone());

        let mut fields = Map::new();
        fields.insert("lastTested".into(), serde_json::to_value(now)?);
        fields.insert("lastTestResult".into(), json!(result.success));
        fields.insert("lastTestMessage".into(), json!(result.message));

        let config = self.registry.store_config();
        self.registry
            .store()
            .update(&config.providers_collection, id, fields)
            .await?;
        self.registry.cache_upsert(provider);
        Ok(())
    }
}

fn to_fields(provider: &Provider) -> RegistryResult<Map<String, Value>> {
    match serde_json::to_value(provider)? {
        Value::Object(map) => Ok(map),
        _ => Err(RegistryError::Validation("provider did not encode as an object".to_string())),
    }
}
