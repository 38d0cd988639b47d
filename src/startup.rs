//! Startup orchestration.
//!
//! # Responsibilities
//! - Build every subsystem over one document store, in dependency order
//! - Share one policy table between the executor's callers and the config watcher
//!
//! # Design Decisions
//! - Construction never touches the store; `ProviderRegistry::initialize` does
//! - The audit and access-log sinks are chosen here, not inside the subsystems

use std::path::Path;
use std::sync::Arc;

use notify::RecommendedWatcher;

use crate::audit;
use crate::config::watcher::ConfigWatcher;
use crate::config::RegistryConfig;
use crate::credentials::{CredentialManager, StoreAccessLog};
use crate::probes::{ProberSet, ProviderTester};
use crate::registry::{DefaultResolutionIndex, ProviderRegistry};
use crate::resilience::{RetryExecutor, SharedPolicies};
use crate::store::DocumentStore;

/// Wired-up registry subsystems.
#[derive(Clone)]
pub struct Services {
    pub store: Arc<dyn DocumentStore>,
    pub policies: Arc<SharedPolicies>,
    pub executor: RetryExecutor,
    pub registry: ProviderRegistry,
    pub defaults: DefaultResolutionIndex,
    pub credentials: CredentialManager,
    pub tester: ProviderTester,
}

impl Services {
    pub fn build(config: &RegistryConfig, store: Arc<dyn DocumentStore>) -> Self {
        let policies = Arc::new(SharedPolicies::new(config.retry.clone()));
        let executor = RetryExecutor::default();

        let audit_sink = audit::sink_from_config(
            &config.audit,
            store.clone(),
            &config.store.audit_collection,
        );
        let access_log = Arc::new(StoreAccessLog::new(
            store.clone(),
            config.store.access_log_collection.clone(),
        ));

        let registry = ProviderRegistry::new(store.clone(), config.store.clone());
        let defaults = DefaultResolutionIndex::new(registry.clone(), audit_sink.clone());
        let credentials = CredentialManager::new(registry.clone(), audit_sink, access_log);
        let probers = ProberSet::builtin(&config.probes, policies.clone(), executor.clone());
        let tester = ProviderTester::new(credentials.clone(), probers);

        tracing::debug!(
            audit_sink = ?config.audit.sink,
            live_checks = config.probes.live_checks,
            "Registry services constructed"
        );

        Self {
            store,
            policies,
            executor,
            registry,
            defaults,
            credentials,
            tester,
        }
    }

    /// Reload retry policies from `path` whenever it changes. Dropping the
    /// returned watcher stops reloading.
    pub fn watch_config(&self, path: &Path) -> Result<RecommendedWatcher, notify::Error> {
        ConfigWatcher::new(path, self.policies.clone()).run()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::watcher::reload_policies;
    use crate::store::MemoryStore;
    use std::fs;

    #[test]
    fn test_policies_are_shared_with_reloads() {
        let services = Services::build(&RegistryConfig::default(), Arc::new(MemoryStore::default()));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.toml");
        fs::write(&path, "[retry.policies.llm]\nmax_retries = 9\n").unwrap();

        reload_policies(&path, &services.policies).unwrap();
        assert_eq!(services.policies.resolve("llm").max_retries, 9);
    }

    #[tokio::test]
    async fn test_watch_config_requires_existing_file() {
        let services = Services::build(&RegistryConfig::default(), Arc::new(MemoryStore::default()));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.toml");

        assert!(services.watch_config(&path).is_err());

        fs::write(&path, "").unwrap();
        assert!(services.watch_config(&path).is_ok());
    }
}
