//! Prober contract and shared types.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::credentials::TestResult;
use crate::registry::{LlmSubtype, ProviderType};
use crate::resilience::ApiError;

/// What a prober reports about a credential.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Value>,
}

impl ProbeOutcome {
    pub fn passed(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            capabilities: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            capabilities: None,
        }
    }

    pub fn with_capabilities(mut self, capabilities: Value) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    pub fn to_test_result(&self) -> TestResult {
        TestResult {
            success: self.success,
            message: self.message.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("{0}")]
    Internal(String),
}

/// Checks one family of credentials.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Vendor label used in messages and logs.
    fn name(&self) -> &'static str;

    async fn probe(&self, key: &str) -> Result<ProbeOutcome, ProbeError>;
}

/// Dispatch key: LLM providers by subtype, everything else by type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeTarget {
    Llm(LlmSubtype),
    Service(ProviderType),
}

impl ProbeTarget {
    pub fn for_provider(provider_type: ProviderType, subtype: Option<LlmSubtype>) -> Self {
        match provider_type {
            ProviderType::Llm => ProbeTarget::Llm(subtype.unwrap_or(LlmSubtype::Other)),
            other => ProbeTarget::Service(other),
        }
    }
}
