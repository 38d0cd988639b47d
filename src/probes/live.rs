//! Live vendor round trips, run through the retry executor.

use serde_json::{json, Value};
use std::sync::Arc;

use crate::probes::types::ProbeOutcome;
use crate::resilience::{ApiError, ExecuteOptions, ResponseInfo, RetryExecutor, SharedPolicies};

/// Where the key goes on the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPlacement {
    Bearer,
    Header(&'static str),
    Query(&'static str),
}

/// A cheap authenticated GET against a vendor listing endpoint.
///
/// 2xx means the key works; 401/403 means the vendor rejected it. Anything
/// else is an error and goes through retry classification.
pub struct LiveCheck {
    client: reqwest::Client,
    executor: RetryExecutor,
    policies: Arc<SharedPolicies>,
    retry_class: String,
    url: String,
    placement: KeyPlacement,
    headers: Vec<(&'static str, String)>,
}

impl LiveCheck {
    pub fn new(
        client: reqwest::Client,
        executor: RetryExecutor,
        policies: Arc<SharedPolicies>,
        retry_class: impl Into<String>,
        url: impl Into<String>,
        placement: KeyPlacement,
    ) -> Self {
        Self {
            client,
            executor,
            policies,
            retry_class: retry_class.into(),
            url: url.into(),
            placement,
            headers: Vec::new(),
        }
    }

    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub async fn verify(&self, vendor: &str, key: &str) -> Result<ProbeOutcome, ApiError> {
        // Resolved once per call so a hot reload never changes a running loop.
        let policy = self.policies.resolve(&self.retry_class);
        let context = format!("probe:{}", vendor.to_ascii_lowercase());
        self.executor
            .execute_with(&policy, ExecuteOptions::context(&context), || self.send(key))
            .await
    }

    async fn send(&self, key: &str) -> Result<ProbeOutcome, ApiError> {
        let mut request = self.client.get(&self.url);
        request = match self.placement {
            KeyPlacement::Bearer => request.bearer_auth(key),
            KeyPlacement::Header(name) => request.header(name, key),
            KeyPlacement::Query(param) => request.query(&[(param, key)]),
        };
        for (name, value) in &self.headers {
            request = request.header(*name, value);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();

        match status {
            200..=299 => {
                let body: Value = response.json().await.unwrap_or(Value::Null);
                let models = body
                    .get("data")
                    .or_else(|| body.get("models"))
                    .and_then(Value::as_array)
                    .map(Vec::len);
                let outcome = ProbeOutcome::passed("API key verified with vendor");
                Ok(match models {
                    Some(count) => outcome.with_capabilities(json!({"models": count})),
                    None => outcome,
                })
            }
            401 | 403 => Ok(ProbeOutcome::failed(format!(
                "API key rejected by vendor (status {status})"
            ))),
            429 => Err(ApiError::RateLimited(format!("vendor returned {status}"))),
            _ => {
                let body = response.text().await.ok();
                Err(ApiError::Response {
                    message: "live key check failed".to_string(),
                    response: ResponseInfo { status, body },
                })
            }
        }
    }
}
