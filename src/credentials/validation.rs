//! Input checks for credential mutations. Nothing here touches the store.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use crate::registry::{
    parse_provider_type, parse_subtype, ApiKey, LlmSubtype, ProviderType, RegistryError,
    RegistryResult,
};

/// Caller input for `create_provider`. Enum members arrive as strings and are checked here.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProvider {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub provider_type: Option<String>,
    pub subtype: Option<String>,
    pub key: Option<String>,
    pub is_active: Option<bool>,
    pub description: Option<String>,
    /// RFC 3339 timestamp or `YYYY-MM-DD` (midnight UTC).
    pub expiry_date: Option<String>,
}

/// Caller input for `update_provider`. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderUpdate {
    pub name: Option<String>,
    pub subtype: Option<String>,
    pub key: Option<String>,
    pub is_active: Option<bool>,
    pub description: Option<String>,
    pub expiry_date: Option<String>,
    /// Remove any expiry. Takes precedence over `expiry_date`.
    #[serde(default)]
    pub clear_expiry: bool,
}

impl ProviderUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.subtype.is_none()
            && self.key.is_none()
            && self.is_active.is_none()
            && self.description.is_none()
            && self.expiry_date.is_none()
            && !self.clear_expiry
    }
}

/// A `NewProvider` that passed every check.
#[derive(Debug, Clone)]
pub struct ValidatedProvider {
    pub name: String,
    pub provider_type: ProviderType,
    pub subtype: Option<LlmSubtype>,
    pub key: ApiKey,
    pub is_active: bool,
    pub description: Option<String>,
    pub expiry_date: Option<DateTime<Utc>>,
}

pub fn validate_new_provider(input: &NewProvider) -> RegistryResult<ValidatedProvider> {
    let name = required("name", input.name.as_deref())?;
    let provider_type = parse_provider_type(required("type", input.provider_type.as_deref())?)?;
    let key = required("key", input.key.as_deref())?;
    let subtype = input.subtype.as_deref().map(parse_subtype).transpose()?;
    let expiry_date = input.expiry_date.as_deref().map(parse_expiry).transpose()?;

    Ok(ValidatedProvider {
        name: name.to_string(),
        provider_type,
        subtype,
        key: ApiKey::new(key),
        is_active: input.is_active.unwrap_or(true),
        description: input.description.clone(),
        expiry_date,
    })
}

/// Reject a blank replacement key.
pub fn validate_key(key: &str) -> RegistryResult<ApiKey> {
    required("key", Some(key)).map(ApiKey::new)
}

/// Accept RFC 3339 or a bare date.
pub fn parse_expiry(value: &str) -> RegistryResult<DateTime<Utc>> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Ok(timestamp.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| RegistryError::Validation(format!("invalid expiry date '{value}'")))
}

fn required<'a>(field: &str, value: Option<&'a str>) -> RegistryResult<&'a str> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(RegistryError::Validation(format!("{field} is required"))),
    }
}
