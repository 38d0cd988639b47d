//! Retry policies and per-class resolution.
//!
//! # Responsibilities
//! - Hold the DEFAULT policy and named partial overrides (API-class tags)
//! - Resolve a tag into a complete, immutable `RetryPolicy`
//! - Publish hot-reloaded policy tables without blocking readers
//!
//! # Design Decisions
//! - Unknown tags resolve to DEFAULT
//! - Tags are case-insensitive (`OPENAI` and `openai` are the same class)
//! - A resolved policy is a plain value; later reloads never affect it

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

/// Complete retry configuration for one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts = `max_retries + 1`.
    pub max_retries: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Cap on any single backoff delay in milliseconds.
    pub max_delay_ms: u64,

    /// Deadline for each individual attempt in milliseconds.
    pub timeout_ms: u64,

    /// HTTP-like status codes that make an error retryable.
    pub retryable_status_codes: BTreeSet<u16>,
}

impl RetryPolicy {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable_status_codes.contains(&status)
    }

    /// Total number of attempts the policy allows.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 10_000,
            timeout_ms: 30_000,
            retryable_status_codes: [408, 429, 500, 502, 503, 504].into_iter().collect(),
        }
    }
}

/// A partial policy; unset fields fall back to DEFAULT.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PolicyOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retryable_status_codes: Option<BTreeSet<u16>>,
}

impl PolicyOverride {
    /// Fill unset fields from `base`.
    pub fn apply(&self, base: &RetryPolicy) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries.unwrap_or(base.max_retries),
            base_delay_ms: self.base_delay_ms.unwrap_or(base.base_delay_ms),
            max_delay_ms: self.max_delay_ms.unwrap_or(base.max_delay_ms),
            timeout_ms: self.timeout_ms.unwrap_or(base.timeout_ms),
            retryable_status_codes: self
                .retryable_status_codes
                .clone()
                .unwrap_or_else(|| base.retryable_status_codes.clone()),
        }
    }
}

/// The DEFAULT policy plus named overrides.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryPolicies {
    pub default: RetryPolicy,
    pub policies: BTreeMap<String, PolicyOverride>,
}

impl Default for RetryPolicies {
    fn default() -> Self {
        let mut policies = BTreeMap::new();
        policies.insert(
            "llm".to_string(),
            PolicyOverride {
                timeout_ms: Some(60_000),
                ..PolicyOverride::default()
            },
        );
        policies.insert(
            "social_media".to_string(),
            PolicyOverride {
                base_delay_ms: Some(2000),
                max_delay_ms: Some(30_000),
                ..PolicyOverride::default()
            },
        );
        policies.insert(
            "email".to_string(),
            PolicyOverride {
                max_retries: Some(2),
                base_delay_ms: Some(500),
                max_delay_ms: Some(5000),
                timeout_ms: Some(15_000),
                ..PolicyOverride::default()
            },
        );
        policies.insert(
            "sms".to_string(),
            PolicyOverride {
                max_retries: Some(2),
                base_delay_ms: Some(500),
                max_delay_ms: Some(5000),
                timeout_ms: Some(10_000),
                ..PolicyOverride::default()
            },
        );
        policies.insert(
            "payment".to_string(),
            PolicyOverride {
                max_retries: Some(1),
                timeout_ms: Some(20_000),
                retryable_status_codes: Some([429, 503].into_iter().collect()),
                ..PolicyOverride::default()
            },
        );
        Self {
            default: RetryPolicy::default(),
            policies,
        }
    }
}

impl RetryPolicies {
    /// Resolve the policy for an API-class tag.
    pub fn resolve(&self, tag: &str) -> RetryPolicy {
        match self.policies.get(&tag.to_ascii_lowercase()) {
            Some(overrides) => overrides.apply(&self.default),
            None => self.default.clone(),
        }
    }
}

/// Hot-swappable policy table shared by every caller of the executor.
#[derive(Debug, Default)]
pub struct SharedPolicies {
    inner: ArcSwap<RetryPolicies>,
}

impl SharedPolicies {
    pub fn new(policies: RetryPolicies) -> Self {
        Self {
            inner: ArcSwap::from_pointee(policies),
        }
    }

    /// Current table snapshot.
    pub fn load(&self) -> Arc<RetryPolicies> {
        self.inner.load_full()
    }

    /// Publish a new table. In-flight invocations keep the policy they resolved.
    pub fn replace(&self, policies: RetryPolicies) {
        self.inner.store(Arc::new(policies));
        tracing::info!("Retry policies replaced");
    }

    pub fn resolve(&self, tag: &str) -> RetryPolicy {
        self.inner.load().resolve(tag)
    }
}
