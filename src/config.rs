//! TOML configuration.
//!
//! ```toml
//! [vault]
//! root = "/path/to/vault"
//! max_concurrent_io = 20
//! extensions = [".md", ".mdx"]
//! exclude_globs = [".obsidian/**"]
//!
//! [context]
//! cache_capacity = 200
//! snapshot_path = "memory/context_memory_snapshot.v1.md"
//!
//! [metrics]
//! log_path = "./data/vault-metrics.jsonl"
//! ```
//!
//! `VAULT_DIR_PATH` and `VAULT_METRICS_LOG_PATH` override the file when set.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::context::{DEFAULT_CACHE_CAPACITY, SNAPSHOT_NOTE_PATH};
use crate::semaphore::DEFAULT_IO_PERMITS;
use crate::walker::DEFAULT_EXTENSIONS;

pub const VAULT_DIR_ENV: &str = "VAULT_DIR_PATH";
pub const METRICS_LOG_ENV: &str = "VAULT_METRICS_LOG_PATH";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub vault: VaultConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VaultConfig {
    pub root: PathBuf,
    #[serde(default = "default_max_concurrent_io")]
    pub max_concurrent_io: usize,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

fn default_max_concurrent_io() -> usize {
    DEFAULT_IO_PERMITS
}
fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ContextConfig {
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: String,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            snapshot_path: SNAPSHOT_NOTE_PATH.to_string(),
        }
    }
}

fn default_cache_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}
fn default_snapshot_path() -> String {
    SNAPSHOT_NOTE_PATH.to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MetricsConfig {
    #[serde(default)]
    pub log_path: Option<PathBuf>,
}

impl Config {
    /// Defaults for everything except the vault root.
    pub fn minimal(root: impl Into<PathBuf>) -> Self {
        Self {
            vault: VaultConfig {
                root: root.into(),
                max_concurrent_io: default_max_concurrent_io(),
                extensions: default_extensions(),
                exclude_globs: Vec::new(),
            },
            context: ContextConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }

    /// Apply `VAULT_DIR_PATH` / `VAULT_METRICS_LOG_PATH` when set and non-blank.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(root) = env_path(VAULT_DIR_ENV) {
            self.vault.root = root;
        }
        if let Some(log_path) = env_path(METRICS_LOG_ENV) {
            self.metrics.log_path = Some(log_path);
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.vault.root.as_os_str().is_empty() {
            anyhow::bail!("vault.root must not be empty");
        }
        if self.vault.max_concurrent_io == 0 {
            anyhow::bail!("vault.max_concurrent_io must be > 0");
        }
        if self.vault.extensions.is_empty() {
            anyhow::bail!("vault.extensions must list at least one extension");
        }
        if self.context.cache_capacity == 0 {
            anyhow::bail!("context.cache_capacity must be > 0");
        }
        let snapshot = Path::new(&self.context.snapshot_path);
        if self.context.snapshot_path.trim().is_empty() || snapshot.is_absolute() {
            anyhow::bail!("context.snapshot_path must be a relative path inside the vault");
        }
        Ok(())
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Read, parse and validate a config file. Environment overrides are
/// applied before validation.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config = parse_config(&content)?.with_env_overrides();
    config.validate()?;
    Ok(config)
}

fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).with_context(|| "Failed to parse config file")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults() {
        let config = parse_config("[vault]\nroot = \"/notes\"\n").unwrap();
        assert_eq!(config.vault.root, PathBuf::from("/notes"));
        assert_eq!(config.vault.max_concurrent_io, DEFAULT_IO_PERMITS);
        assert_eq!(config.vault.extensions, vec![".md", ".mdx"]);
        assert_eq!(config.context.cache_capacity, 200);
        assert_eq!(config.context.snapshot_path, SNAPSHOT_NOTE_PATH);
        assert!(config.metrics.log_path.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_full() {
        let toml = r#"
[vault]
root = "/notes"
max_concurrent_io = 4
extensions = [".md"]
exclude_globs = [".obsidian/**"]

[context]
cache_capacity = 10
snapshot_path = "ai/memory.md"

[metrics]
log_path = "/tmp/metrics.jsonl"
"#;
        let config = parse_config(toml).unwrap();
        assert_eq!(config.vault.max_concurrent_io, 4);
        assert_eq!(config.vault.exclude_globs, vec![".obsidian/**"]);
        assert_eq!(config.context.cache_capacity, 10);
        assert_eq!(config.context.snapshot_path, "ai/memory.md");
        assert_eq!(
            config.metrics.log_path,
            Some(PathBuf::from("/tmp/metrics.jsonl"))
        );
    }

    #[test]
    fn test_missing_vault_section_fails() {
        assert!(parse_config("[context]\ncache_capacity = 5\n").is_err());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::minimal("/notes");
        config.vault.max_concurrent_io = 0;
        assert!(config.validate().is_err());

        let mut config = Config::minimal("/notes");
        config.context.snapshot_path = "/abs/path.md".into();
        assert!(config.validate().is_err());

        let mut config = Config::minimal("/notes");
        config.context.cache_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_config_reports_missing_file() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
