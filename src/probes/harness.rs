//! Provider test harness.

use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;

use crate::credentials::CredentialManager;
use crate::observability::metrics;
use crate::probes::catalog::ProberSet;
use crate::probes::types::{ProbeOutcome, ProbeTarget};
use crate::registry::ProviderView;

/// Runs the matching prober against a provider's key and records the result.
#[derive(Clone)]
pub struct ProviderTester {
    credentials: CredentialManager,
    probers: ProberSet,
}

impl ProviderTester {
    pub fn new(credentials: CredentialManager, probers: ProberSet) -> Self {
        Self {
            credentials,
            probers,
        }
    }

    /// Test the key of provider `id`.
    ///
    /// Never fails: every error, including a panicking prober, becomes an
    /// unsuccessful outcome. The outcome is written to the record whenever the
    /// record exists.
    pub async fn test_api_key(&self, id: &str) -> ProbeOutcome {
        let mut provider_type = None;
        let outcome = match self.credentials.registry().get_provider(id).await {
            Ok(view) => {
                provider_type = Some(view.provider_type);
                self.probe_provider(&view).await
            }
            Err(e) => ProbeOutcome::failed(format!("Provider lookup failed: {e}")),
        };

        if let Err(e) = self
            .credentials
            .record_test_result(id, &outcome.to_test_result())
            .await
        {
            tracing::warn!(provider_id = %id, error = %e, "Failed to persist test result");
        }

        metrics::record_probe_result(
            provider_type.map_or("unknown", |t| t.as_str()),
            outcome.success,
        );
        tracing::info!(
            provider_id = %id,
            success = outcome.success,
            message = %outcome.message,
            "Provider key tested"
        );
        outcome
    }

    async fn probe_provider(&self, view: &ProviderView) -> ProbeOutcome {
        let key = match self.credentials.get_api_key(&view.id).await {
            Ok(key) => key,
            Err(e) => return ProbeOutcome::failed(e.to_string()),
        };

        let prober = self
            .probers
            .select(ProbeTarget::for_provider(view.provider_type, view.subtype));
        match AssertUnwindSafe(prober.probe(&key)).catch_unwind().await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                tracing::warn!(provider_id = %view.id, prober = prober.name(), error = %e, "Prober failed");
                ProbeOutcome::failed(format!("{} check failed: {e}", prober.name()))
            }
            Err(_) => {
                tracing::error!(provider_id = %view.id, prober = prober.name(), "Prober panicked");
                ProbeOutcome::failed(format!("{} check aborted unexpectedly", prober.name()))
            }
        }
    }
}
