//! Shared application state, built once at startup and passed by reference.

use anyhow::Result;

use crate::config::Config;
use crate::context::ContextCache;
use crate::metrics::MetricsSink;
use crate::vault::VaultManager;

/// Everything an action needs: the vault, the context cache and the
/// optional metrics sink.
#[derive(Debug)]
pub struct AppContext {
    pub config: Config,
    pub vault: VaultManager,
    pub cache: ContextCache,
    pub metrics: Option<MetricsSink>,
}

impl AppContext {
    pub fn new(config: Config) -> Result<Self> {
        let vault = VaultManager::from_config(&config.vault)?;
        let cache = ContextCache::new(config.context.cache_capacity);
        let metrics = config.metrics.log_path.clone().map(MetricsSink::new);
        Ok(Self {
            config,
            vault,
            cache,
            metrics,
        })
    }
}
