//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, base delay <= max delay, status codes)
//! - Reject empty collection names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RegistryConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::RegistryConfig;
use crate::resilience::{PolicyOverride, RetryPolicy};

/// A single semantic violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &RegistryConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let store = &config.store;
    for (field, value) in [
        ("store.providers_collection", &store.providers_collection),
        ("store.settings_collection", &store.settings_collection),
        ("store.defaults_document", &store.defaults_document),
        ("store.audit_collection", &store.audit_collection),
        ("store.access_log_collection", &store.access_log_collection),
    ] {
        if value.trim().is_empty() {
            errors.push(ValidationError::new(field, "must not be empty"));
        }
    }

    validate_policy("retry.default", &config.retry.default, &mut errors);
    for (tag, overrides) in &config.retry.policies {
        let resolved = overrides.apply(&config.retry.default);
        validate_override(&format!("retry.policies.{tag}"), overrides, &resolved, &mut errors);
    }

    if config.probes.retry_class.trim().is_empty() {
        errors.push(ValidationError::new("probes.retry_class", "must not be empty"));
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address '{}'", observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_policy(prefix: &str, policy: &RetryPolicy, errors: &mut Vec<ValidationError>) {
    if policy.timeout_ms == 0 {
        errors.push(ValidationError::new(
            format!("{prefix}.timeout_ms"),
            "must be greater than zero",
        ));
    }
    if policy.base_delay_ms > policy.max_delay_ms {
        errors.push(ValidationError::new(
            format!("{prefix}.base_delay_ms"),
            format!(
                "base delay {}ms exceeds max delay {}ms",
                policy.base_delay_ms, policy.max_delay_ms
            ),
        ));
    }
    for code in &policy.retryable_status_codes {
        if !(100..=599).contains(code) {
            errors.push(ValidationError::new(
                format!("{prefix}.retryable_status_codes"),
                format!("{code} is not an HTTP status code"),
            ));
        }
    }
}

/// Only report problems the override itself introduces.
fn validate_override(
    prefix: &str,
    overrides: &PolicyOverride,
    resolved: &RetryPolicy,
    errors: &mut Vec<ValidationError>,
) {
    let touches_delays = overrides.base_delay_ms.is_some() || overrides.max_delay_ms.is_some();
    let mut found = Vec::new();
    validate_policy(prefix, resolved, &mut found);
    found.retain(|e| {
        (overrides.timeout_ms.is_some() && e.field.ends_with(".timeout_ms"))
            || (touches_delays && e.field.ends_with(".base_delay_ms"))
            || (overrides.retryable_status_codes.is_some()
                && e.field.ends_with(".retryable_status_codes"))
    });
    errors.extend(found);
}
