//! Per-response metrics appended to a JSONL log.
//!
//! Only successful responses that carry a `compression` block are recorded.
//! Logging problems are swallowed so they never change a tool response.

use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::io::AsyncWriteExt;

use crate::actions::VaultAction;

/// One line of the metrics log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseMetric {
    pub timestamp: String,
    pub action: VaultAction,
    pub mode: String,
    pub estimated_tokens: u64,
    pub truncated: bool,
    pub doc_count: u64,
    pub output_chars: u64,
    pub source_chars: u64,
    pub max_output_chars: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_hit: Option<bool>,
}

impl ResponseMetric {
    /// Build a metric from a rendered response payload. `None` when the
    /// payload has no well-formed compression block.
    pub fn from_payload(action: VaultAction, payload: &Value) -> Option<Self> {
        let compression = payload.get("compression")?.as_object()?;
        let mode = compression.get("mode")?.as_str()?;
        if !matches!(mode, "aggressive" | "balanced" | "none") {
            return None;
        }
        let max_output_chars = match compression.get("max_output_chars")? {
            Value::Null => None,
            other => Some(other.as_u64()?),
        };

        Some(Self {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            action,
            mode: mode.to_string(),
            estimated_tokens: compression.get("estimated_tokens")?.as_u64()?,
            truncated: compression.get("truncated")?.as_bool()?,
            doc_count: doc_count(action, payload),
            output_chars: compression.get("output_chars")?.as_u64()?,
            source_chars: compression.get("source_chars")?.as_u64()?,
            max_output_chars,
            cache_hit: payload
                .get("cache")
                .and_then(|c| c.get("hit"))
                .and_then(Value::as_bool),
        })
    }
}

fn doc_count(action: VaultAction, payload: &Value) -> u64 {
    if let Some(documents) = payload.get("documents").and_then(Value::as_array) {
        return documents.len() as u64;
    }
    if let Some(count) = payload.get("documents_count").and_then(Value::as_u64) {
        return count;
    }
    match action {
        VaultAction::Search => payload.get("found").and_then(Value::as_u64).unwrap_or(0),
        VaultAction::Read
            if ["filename", "fullPath", "filePath"]
                .iter()
                .any(|key| payload.get(*key).is_some_and(Value::is_string)) =>
        {
            1
        }
        _ => 0,
    }
}

/// Appends [`ResponseMetric`] lines to a file.
#[derive(Debug, Clone)]
pub struct MetricsSink {
    path: PathBuf,
}

impl MetricsSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record a metric for `payload` if it has a compression block.
    pub async fn record(&self, action: VaultAction, payload: &Value) {
        let Some(metric) = ResponseMetric::from_payload(action, payload) else {
            return;
        };
        if let Err(e) = self.append(&metric).await {
            tracing::debug!(path = %self.path.display(), error = %e, "metrics append failed");
        }
    }

    async fn append(&self, metric: &ResponseMetric) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut line = serde_json::to_string(metric).map_err(std::io::Error::other)?;
        line.push('\n');
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }
}
