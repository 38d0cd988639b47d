//! Provider records, redacted views and registry errors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::audit::AuditError;
use crate::store::StoreError;

/// Family of external API a provider belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderType {
    Llm,
    SocialMedia,
    Email,
    Sms,
    Analytics,
    ContentModeration,
    Payment,
    Crm,
    DataEnrichment,
    Other,
}

impl ProviderType {
    pub const ALL: [ProviderType; 10] = [
        ProviderType::Llm,
        ProviderType::SocialMedia,
        ProviderType::Email,
        ProviderType::Sms,
        ProviderType::Analytics,
        ProviderType::ContentModeration,
        ProviderType::Payment,
        ProviderType::Crm,
        ProviderType::DataEnrichment,
        ProviderType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::Llm => "LLM",
            ProviderType::SocialMedia => "SOCIAL_MEDIA",
            ProviderType::Email => "EMAIL",
            ProviderType::Sms => "SMS",
            ProviderType::Analytics => "ANALYTICS",
            ProviderType::ContentModeration => "CONTENT_MODERATION",
            ProviderType::Payment => "PAYMENT",
            ProviderType::Crm => "CRM",
            ProviderType::DataEnrichment => "DATA_ENRICHMENT",
            ProviderType::Other => "OTHER",
        }
    }

    /// Parse the wire name. Unrecognised names yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == value)
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// LLM vendor. Only meaningful when the provider type is [`ProviderType::Llm`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LlmSubtype {
    #[serde(rename = "OPENAI")]
    OpenAi,
    #[serde(rename = "ANTHROPIC")]
    Anthropic,
    #[serde(rename = "GOOGLE")]
    Google,
    #[serde(rename = "COHERE")]
    Cohere,
    #[serde(rename = "MISTRAL")]
    Mistral,
    #[serde(rename = "AZURE_OPENAI")]
    AzureOpenAi,
    #[serde(rename = "OTHER")]
    Other,
}

impl LlmSubtype {
    pub const ALL: [LlmSubtype; 7] = [
        LlmSubtype::OpenAi,
        LlmSubtype::Anthropic,
        LlmSubtype::Google,
        LlmSubtype::Cohere,
        LlmSubtype::Mistral,
        LlmSubtype::AzureOpenAi,
        LlmSubtype::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LlmSubtype::OpenAi => "OPENAI",
            LlmSubtype::Anthropic => "ANTHROPIC",
            LlmSubtype::Google => "GOOGLE",
            LlmSubtype::Cohere => "COHERE",
            LlmSubtype::Mistral => "MISTRAL",
            LlmSubtype::AzureOpenAi => "AZURE_OPENAI",
            LlmSubtype::Other => "OTHER",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == value)
    }
}

impl fmt::Display for LlmSubtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A secret credential. `Debug` and `Display` never show the raw value.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw secret. Only the credential manager hands this out.
    pub(crate) fn expose(&self) -> &str {
        &self.0
    }

    pub fn redacted(&self) -> String {
        redact_secret(&self.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiKey({})", self.redacted())
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

/// Redact a secret value for display (show first 2 and last 2 chars).
pub fn redact_secret(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 6 {
        return "***".to_string();
    }
    let head: String = chars[..2].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{head}…{tail}")
}

/// A registered credential plus its metadata, as persisted in the store.
///
/// The `id` is store-assigned and never written back as a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    #[serde(default, skip_serializing)]
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    #[serde(default)]
    pub subtype: Option<LlmSubtype>,
    pub key: ApiKey,
    #[serde(default)]
    pub previous_key: Option<ApiKey>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub expiry_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_tested: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_test_result: Option<bool>,
    #[serde(default)]
    pub last_test_message: Option<String>,
    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_by: String,
    #[serde(default)]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub key_rotated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub key_rotated_by: Option<String>,
}

fn default_active() -> bool {
    true
}

impl Provider {
    /// True if an expiry is set and lies strictly before `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry_date.is_some_and(|expiry| expiry < now)
    }
}

/// Externally returned view of a provider. Secrets are redacted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderView {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    pub subtype: Option<LlmSubtype>,
    pub key: String,
    pub previous_key: Option<String>,
    pub is_active: bool,
    pub description: Option<String>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub last_tested: Option<DateTime<Utc>>,
    pub last_test_result: Option<bool>,
    pub last_test_message: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_by: String,
    pub updated_at: DateTime<Utc>,
    pub key_rotated_at: Option<DateTime<Utc>>,
    pub key_rotated_by: Option<String>,
}

impl From<&Provider> for ProviderView {
    fn from(p: &Provider) -> Self {
        Self {
            id: p.id.clone(),
            name: p.name.clone(),
            provider_type: p.provider_type,
            subtype: p.subtype,
            key: p.key.redacted(),
            previous_key: p.previous_key.as_ref().map(ApiKey::redacted),
            is_active: p.is_active,
            description: p.description.clone(),
            expiry_date: p.expiry_date,
            last_tested: p.last_tested,
            last_test_result: p.last_test_result,
            last_test_message: p.last_test_message.clone(),
            created_by: p.created_by.clone(),
            created_at: p.created_at,
            updated_by: p.updated_by.clone(),
            updated_at: p.updated_at,
            key_rotated_at: p.key_rotated_at,
            key_rotated_by: p.key_rotated_by.clone(),
        }
    }
}

/// Resolution key of a default mapping: `TYPE` or `TYPE_SUBTYPE`.
pub fn resolution_key(provider_type: ProviderType, subtype: Option<LlmSubtype>) -> String {
    match subtype {
        Some(subtype) => format!("{}_{}", provider_type.as_str(), subtype.as_str()),
        None => provider_type.as_str().to_string(),
    }
}

/// Parse a provider type supplied by a caller.
pub fn parse_provider_type(value: &str) -> RegistryResult<ProviderType> {
    ProviderType::parse(value)
        .ok_or_else(|| RegistryError::Validation(format!("unknown provider type '{value}'")))
}

/// Parse an LLM subtype supplied by a caller.
pub fn parse_subtype(value: &str) -> RegistryResult<LlmSubtype> {
    LlmSubtype::parse(value)
        .ok_or_else(|| RegistryError::Validation(format!("unknown LLM subtype '{value}'")))
}

/// Errors that can occur during registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Missing or malformed input, unrecognised enum member, or refused key access.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Unknown provider id or unresolved default mapping.
    #[error("not found: {0}")]
    NotFound(String),

    /// The authoritative store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A stored record does not match the provider schema.
    #[error("record {id} could not be decoded: {source}")]
    Decode {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    /// A record could not be encoded for the store.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A required audit record could not be written.
    #[error("audit write failed: {0}")]
    Audit(#[from] AuditError),
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;
