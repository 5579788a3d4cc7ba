//! Persisted configuration and the runtime handle that publishes it.
//!
//! The store is the only place configuration is written to disk. Running
//! tasks never read the store directly: they hold a `watch::Receiver` from
//! [`ConfigHandle::subscribe`] and take a complete snapshot per use.

use crate::config::{Config, LokiConfig};
use crate::error::EsptailError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

/// TOML file holding the persisted configuration
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load and validate the persisted configuration
    pub fn load(&self) -> Result<Config, EsptailError> {
        if !self.path.exists() {
            return Err(EsptailError::Store(format!(
                "config file not found: {}",
                self.path.display()
            )));
        }
        let config = Config::from_file(&self.path)?;
        config.validate()?;
        debug!(path = %self.path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Write the whole configuration, replacing the file atomically
    pub fn save(&self, config: &Config) -> Result<(), EsptailError> {
        let content = config.to_toml()?;
        let tmp = self.path.with_extension("toml.tmp");
        std::fs::write(&tmp, content)
            .and_then(|_| std::fs::rename(&tmp, &self.path))
            .map_err(|e| {
                EsptailError::Store(format!(
                    "failed to write {}: {}",
                    self.path.display(),
                    e
                ))
            })?;
        info!(path = %self.path.display(), "Configuration saved");
        Ok(())
    }

    /// Replace the `[loki]` section, keeping every other section as stored
    pub fn update_loki(&self, loki: &LokiConfig) -> Result<(), EsptailError> {
        let mut config = if self.path.exists() {
            Config::from_file(&self.path)?
        } else {
            Config::default()
        };
        config.loki = loki.clone();
        self.save(&config)
    }
}

/// Owned handle for replacing the Loki configuration at runtime
///
/// Readers always observe a whole `LokiConfig`; a new value is validated and
/// persisted before it is published. Snapshots are shared behind an `Arc`, so
/// taking one does not copy the configuration.
#[derive(Debug, Clone)]
pub struct ConfigHandle {
    sender: Arc<watch::Sender<Arc<LokiConfig>>>,
    store: Option<ConfigStore>,
}

impl ConfigHandle {
    pub fn new(initial: LokiConfig, store: Option<ConfigStore>) -> Self {
        let (sender, _) = watch::channel(Arc::new(initial));
        Self {
            sender: Arc::new(sender),
            store,
        }
    }

    /// Snapshot of the current configuration
    pub fn get(&self) -> Arc<LokiConfig> {
        self.sender.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<LokiConfig>> {
        self.sender.subscribe()
    }

    /// Validate, persist, and publish a new configuration
    pub fn set(&self, config: LokiConfig) -> Result<(), EsptailError> {
        config.validate()?;
        if let Some(store) = &self.store {
            store.update_loki(&config)?;
        }
        self.replace(config);
        Ok(())
    }

    /// Validate and publish without writing to the store
    pub fn publish(&self, config: LokiConfig) -> Result<(), EsptailError> {
        config.validate()?;
        self.replace(config);
        Ok(())
    }

    fn replace(&self, config: LokiConfig) {
        info!(
            endpoint = %config.endpoint,
            emitter = %config.emitter,
            job = %config.job,
            "Loki configuration updated"
        );
        self.sender.send_replace(Arc::new(config));
    }
}
