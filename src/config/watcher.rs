//! Configuration file watcher for hot reload of retry policies.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::config::loader::{load_config, ConfigError};
use crate::resilience::SharedPolicies;

/// A watcher that monitors the configuration file for changes.
pub struct ConfigWatcher {
    path: PathBuf,
    policies: Arc<SharedPolicies>,
}

impl ConfigWatcher {
    pub fn new(path: &Path, policies: Arc<SharedPolicies>) -> Self {
        Self {
            path: path.to_path_buf(),
            policies,
        }
    }

    /// Start watching the file. Dropping the returned watcher stops it.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let path = self.path.clone();
        let policies = self.policies.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!("Config file change detected, reloading retry policies...");
                        if let Err(e) = reload_policies(&path, &policies) {
                            tracing::error!(
                                "Failed to reload config: {}. Keeping current retry policies.",
                                e
                            );
                        }
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

/// Load `path` and publish its retry policies. Invalid files leave the current table in place.
pub fn reload_policies(path: &Path, policies: &SharedPolicies) -> Result<(), ConfigError> {
    let config = load_config(path)?;
    policies.replace(config.retry);
    Ok(())
}
