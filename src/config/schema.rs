//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the registry.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::resilience::RetryPolicies;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RegistryConfig {
    /// Collection names and snapshot location.
    pub store: StoreConfig,

    /// DEFAULT retry policy plus per-class overrides.
    pub retry: RetryPolicies,

    /// Provider probe settings.
    pub probes: ProbeConfig,

    /// Audit sink selection.
    pub audit: AuditConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Where records live in the authoritative store.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Collection holding provider records.
    pub providers_collection: String,

    /// Collection holding settings documents.
    pub settings_collection: String,

    /// Settings document holding the default mapping.
    pub defaults_document: String,

    /// Collection receiving audit records.
    pub audit_collection: String,

    /// Collection receiving key access records.
    pub access_log_collection: String,

    /// JSON snapshot used by the CLI's in-process store.
    pub snapshot_path: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            providers_collection: "providers".to_string(),
            settings_collection: "settings".to_string(),
            defaults_document: "defaultProviders".to_string(),
            audit_collection: "auditLogs".to_string(),
            access_log_collection: "apiKeyAccessLogs".to_string(),
            snapshot_path: None,
        }
    }
}

/// Provider probe configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Follow format checks with a live vendor round trip.
    pub live_checks: bool,

    /// Retry class used for live checks.
    pub retry_class: String,

    pub openai_base_url: String,
    pub anthropic_base_url: String,
    pub google_base_url: String,
    pub cohere_base_url: String,
    pub mistral_base_url: String,

    /// `anthropic-version` header sent with Anthropic checks.
    pub anthropic_version: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            live_checks: false,
            retry_class: "llm".to_string(),
            openai_base_url: "https://api.openai.com/v1".to_string(),
            anthropic_base_url: "https://api.anthropic.com/v1".to_string(),
            google_base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            cohere_base_url: "https://api.cohere.com/v1".to_string(),
            mistral_base_url: "https://api.mistral.ai/v1".to_string(),
            anthropic_version: "2023-06-01".to_string(),
        }
    }
}

/// Which sink receives audit records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkKind {
    /// Write to the audit collection of the document store.
    #[default]
    Store,
    /// Emit a structured log line under the `audit` target.
    Log,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AuditConfig {
    pub sink: AuditSinkKind,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the pretty format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: RegistryConfig = toml::from_str("").unwrap();
        assert_eq!(config.store.providers_collection, "providers");
        assert_eq!(config.store.defaults_document, "defaultProviders");
        assert_eq!(config.retry.default.max_retries, 3);
        assert!(!config.probes.live_checks);
        assert_eq!(config.audit.sink, AuditSinkKind::Store);
    }

    #[test]
    fn test_sections_override() {
        let config: RegistryConfig = toml::from_str(
            r#"
            [store]
            providers_collection = "apiProviders"

            [audit]
            sink = "log"

            [retry.policies.openai]
            max_retries = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.store.providers_collection, "apiProviders");
        assert_eq!(config.store.settings_collection, "settings");
        assert_eq!(config.audit.sink, AuditSinkKind::Log);
        assert_eq!(config.retry.resolve("openai").max_retries, 5);
    }
}
