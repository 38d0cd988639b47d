//! Audit event model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Mutation kinds that are audited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    ProviderCreated,
    ProviderUpdated,
    ApiKeyRotated,
    DefaultProviderSet,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::ProviderCreated => "provider_created",
            AuditEventType::ProviderUpdated => "provider_updated",
            AuditEventType::ApiKeyRotated => "api_key_rotated",
            AuditEventType::DefaultProviderSet => "default_provider_set",
        }
    }
}

impl fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One audit record. The payload always carries `success`, plus `error` on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub id: Uuid,
    pub event_type: AuditEventType,
    pub actor_id: String,
    pub payload: Value,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType, actor_id: impl Into<String>, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type,
            actor_id: actor_id.into(),
            payload,
            occurred_at: Utc::now(),
        }
    }

    /// Stamp the outcome of the audited operation into the payload.
    pub fn with_outcome<T, E: fmt::Display>(mut self, result: &Result<T, E>) -> Self {
        if !self.payload.is_object() {
            self.payload = Value::Object(Map::new());
        }
        if let Value::Object(map) = &mut self.payload {
            map.insert("success".to_string(), Value::Bool(result.is_ok()));
            if let Err(error) = result {
                map.insert("error".to_string(), Value::String(error.to_string()));
            }
        }
        self
    }

    pub fn success(&self) -> bool {
        self.payload
            .get("success")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}
