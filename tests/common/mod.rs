//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use provider_registry::audit::MemoryAuditSink;
use provider_registry::config::{ProbeConfig, StoreConfig};
use provider_registry::credentials::{CredentialManager, MemoryAccessLog, NewProvider};
use provider_registry::probes::{ProberSet, ProviderTester};
use provider_registry::registry::{DefaultResolutionIndex, ProviderRegistry};
use provider_registry::resilience::{RetryExecutor, RetryPolicies, SharedPolicies};
use provider_registry::store::MemoryStore;

/// Every subsystem wired over one in-memory store, with observable sinks.
pub struct Harness {
    pub store: MemoryStore,
    pub audit: Arc<MemoryAuditSink>,
    pub access_log: Arc<MemoryAccessLog>,
    pub registry: ProviderRegistry,
    pub defaults: DefaultResolutionIndex,
    pub credentials: CredentialManager,
    pub tester: ProviderTester,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_probers(ProberSet::builtin(
            &ProbeConfig::default(),
            Arc::new(SharedPolicies::new(RetryPolicies::default())),
            RetryExecutor::default(),
        ))
    }

    pub fn with_probers(probers: ProberSet) -> Self {
        let store = MemoryStore::default();
        let audit = Arc::new(MemoryAuditSink::new());
        let access_log = Arc::new(MemoryAccessLog::new());

        let registry = ProviderRegistry::new(Arc::new(store.clone()), StoreConfig::default());
        let defaults = DefaultResolutionIndex::new(registry.clone(), audit.clone());
        let credentials = CredentialManager::new(registry.clone(), audit.clone(), access_log.clone());
        let tester = ProviderTester::new(credentials.clone(), probers);

        Self {
            store,
            audit,
            access_log,
            registry,
            defaults,
            credentials,
            tester,
        }
    }

    /// Create a provider as `tester` and return its id.
    pub async fn create(&self, name: &str, provider_type: &str, subtype: Option<&str>, key: &str) -> String {
        self.credentials
            .create_provider(new_provider(name, provider_type, subtype, key), "tester")
            .await
            .expect("create provider")
            .id
    }
}

pub fn new_provider(name: &str, provider_type: &str, subtype: Option<&str>, key: &str) -> NewProvider {
    NewProvider {
        name: Some(name.to_string()),
        provider_type: Some(provider_type.to_string()),
        subtype: subtype.map(str::to_string),
        key: Some(key.to_string()),
        ..NewProvider::default()
    }
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
