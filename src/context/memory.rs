//! `load_memory`: read a snapshot note back into a compact payload.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{MemoryPacket, Scope, SNAPSHOT_NOTE_PATH, SNAPSHOT_SCHEMA_VERSION};
use crate::compression::{
    finalize, json_len, normalize_whitespace, trim_with_ellipsis, BudgetedAction, Compressed,
    CompressionMode, CompressionSummary,
};
use crate::error::Result;
use crate::frontmatter::strip_block;
use crate::vault::{DocumentInfoOptions, VaultManager};

const DEFAULT_PREVIEW_CHARS: usize = 900;
const CLAMPED_PREVIEW_CHARS: usize = 400;
const EMPTY_PREVIEW: &str = "Stored memory note exists but has no readable summary section.";
const PREVIEW_DISABLED: &str =
    "(preview disabled: set includeContent=true to include memory preview)";
const EXPAND_HINT: &str = "If memory note is stale, rerun collect_context with memoryMode='both'.";

static JSON_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```json\s*(.*?)```").expect("valid json block regex"));

#[derive(Debug, Clone)]
pub struct LoadMemoryRequest {
    /// Vault-relative note path; blank falls back to `default_path`.
    pub memory_path: Option<String>,
    pub include_content: bool,
    pub excerpt_length: Option<usize>,
    pub quiet: bool,
    pub compression_mode: CompressionMode,
    pub max_output_chars: Option<usize>,
    pub default_path: String,
}

impl Default for LoadMemoryRequest {
    fn default() -> Self {
        Self {
            memory_path: None,
            include_content: true,
            excerpt_length: None,
            quiet: false,
            compression_mode: CompressionMode::default(),
            max_output_chars: None,
            default_path: SNAPSHOT_NOTE_PATH.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryPayload {
    pub action: &'static str,
    pub found: bool,
    pub memory_path: String,
    pub has_canonical_json: bool,
    pub schema_version: Option<String>,
    pub generated_at: Option<String>,
    pub source_hash: Option<String>,
    pub topic: Option<String>,
    pub scope: Option<Scope>,
    pub documents_count: usize,
    pub memory_packet: Option<MemoryPacket>,
    pub preview: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuietMemory {
    pub found: bool,
    pub memory_path: String,
    pub has_canonical_json: bool,
    pub topic: Option<String>,
    pub scope: Option<Scope>,
    pub schema_version: String,
}

#[derive(Debug, Clone)]
pub enum LoadMemoryOutcome {
    NotFound { path: String },
    Quiet(QuietMemory),
    Full(Compressed<MemoryPayload>),
}

/// Loosely typed view of the canonical block. Every field is optional so a
/// hand-edited note still yields whatever is readable.
#[derive(Debug, Default, Deserialize)]
struct CanonicalView {
    #[serde(default)]
    schema_version: Option<serde_json::Value>,
    #[serde(default)]
    generated_at: Option<serde_json::Value>,
    #[serde(default)]
    source_hash: Option<serde_json::Value>,
    #[serde(default)]
    topic: Option<serde_json::Value>,
    #[serde(default)]
    scope: Option<serde_json::Value>,
    #[serde(default)]
    documents: Option<serde_json::Value>,
    #[serde(default)]
    memory_packet: Option<serde_json::Value>,
}

fn parse_canonical(content: &str) -> Option<CanonicalView> {
    let block = JSON_BLOCK.captures(content)?.get(1)?.as_str();
    if block.is_empty() {
        return None;
    }
    let value: serde_json::Value = serde_json::from_str(block).ok()?;
    if !value.is_object() {
        return None;
    }
    serde_json::from_value(value).ok()
}

fn strip_canonical(content: &str) -> String {
    JSON_BLOCK.replace(content, "").into_owned()
}

fn meta_value(content: &str, key: &str) -> Option<String> {
    let pattern = format!(r"(?m)^-\s*{}:\s*(.+)$", regex::escape(key));
    let re = Regex::new(&pattern).ok()?;
    re.captures(content)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

fn as_string(value: &Option<serde_json::Value>) -> Option<String> {
    value.as_ref().and_then(|v| v.as_str()).map(str::to_string)
}

fn validate_packet(value: Option<serde_json::Value>) -> Option<MemoryPacket> {
    let packet: MemoryPacket = serde_json::from_value(value?).ok()?;
    (0.0..=1.0).contains(&packet.confidence).then_some(packet)
}

fn build_payload(memory_path: String, body: &str, preview: String) -> MemoryPayload {
    let canonical = parse_canonical(body);
    let has_canonical_json = canonical.is_some();
    let view = canonical.unwrap_or_default();

    let from_meta = |field: &Option<serde_json::Value>, key: &str| {
        as_string(field).or_else(|| meta_value(body, key))
    };

    MemoryPayload {
        action: "load_memory",
        found: true,
        memory_path,
        has_canonical_json,
        schema_version: from_meta(&view.schema_version, "schema_version"),
        generated_at: from_meta(&view.generated_at, "generated_at"),
        source_hash: from_meta(&view.source_hash, "source_hash"),
        topic: as_string(&view.topic),
        scope: view.scope.and_then(|v| serde_json::from_value(v).ok()),
        documents_count: view
            .documents
            .as_ref()
            .and_then(|d| d.as_array())
            .map_or(0, Vec::len),
        memory_packet: validate_packet(view.memory_packet),
        preview,
    }
}

fn clamp(mut payload: MemoryPayload, max_output_chars: usize) -> (MemoryPayload, bool) {
    let over = |p: &MemoryPayload| json_len(p) > max_output_chars;
    let mut clamped = false;

    macro_rules! pop_while_over {
        ($field:ident, $keep:expr) => {
            while over(&payload)
                && payload
                    .memory_packet
                    .as_ref()
                    .is_some_and(|p| p.$field.len() > $keep)
            {
                if let Some(packet) = payload.memory_packet.as_mut() {
                    packet.$field.pop();
                }
                clamped = true;
            }
        };
    }
    pop_while_over!(source_refs, 3);
    pop_while_over!(key_facts, 5);
    pop_while_over!(experience_bullets, 5);

    if over(&payload) && payload.preview.chars().count() > CLAMPED_PREVIEW_CHARS {
        payload.preview = trim_with_ellipsis(&payload.preview, CLAMPED_PREVIEW_CHARS);
        clamped = true;
    }
    (payload, clamped)
}

/// Load the snapshot note at `memory_path` (or the default path).
pub async fn load_memory(vault: &VaultManager, req: &LoadMemoryRequest) -> Result<LoadMemoryOutcome> {
    vault.initialize().await?;
    let mode = req.compression_mode;
    let path = req
        .memory_path
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(&req.default_path)
        .to_string();

    let options = DocumentInfoOptions {
        include_stats: true,
        ..Default::default()
    };
    let Some(note) = vault.get_document_info(&path, options).await? else {
        return Ok(LoadMemoryOutcome::NotFound { path });
    };
    let memory_path = note.index.file_path.to_string_lossy().into_owned();
    let body = strip_block(&note.content);

    if req.quiet {
        let payload = build_payload(memory_path, body, String::new());
        return Ok(LoadMemoryOutcome::Quiet(QuietMemory {
            found: true,
            memory_path: payload.memory_path,
            has_canonical_json: payload.has_canonical_json,
            topic: payload.topic,
            scope: payload.scope,
            schema_version: payload
                .schema_version
                .unwrap_or_else(|| SNAPSHOT_SCHEMA_VERSION.to_string()),
        }));
    }

    let normalized = normalize_whitespace(&strip_canonical(body));
    let source = if normalized.is_empty() {
        EMPTY_PREVIEW.to_string()
    } else {
        normalized
    };
    let source_len = source.chars().count();
    let limit = req.excerpt_length.unwrap_or(match mode {
        CompressionMode::None => source_len,
        _ => DEFAULT_PREVIEW_CHARS,
    });
    let preview = if req.include_content {
        trim_with_ellipsis(&source, limit)
    } else {
        PREVIEW_DISABLED.to_string()
    };
    let preview_truncated = preview.chars().count() < source_len;

    let max_output_chars = mode.max_output_chars(BudgetedAction::LoadMemory, req.max_output_chars);
    let mut payload = build_payload(memory_path, body, preview);
    let mut clamped = false;
    if let Some(max) = max_output_chars {
        (payload, clamped) = clamp(payload, max);
    }

    Ok(LoadMemoryOutcome::Full(finalize(
        payload,
        CompressionSummary {
            mode,
            source_chars: body.chars().count(),
            max_output_chars,
            truncated: preview_truncated || clamped,
            expand_hint: EXPAND_HINT,
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOTE: &str = r#"# Context Memory Snapshot v1

- generated_at: 2026-01-01T00:00:00.000Z
- source_hash: deadbeef
- schema_version: context_memory_snapshot.v1

## Topic Summary
Rust notes.

## Canonical JSON
```json
{
  "schema_version": "context_memory_snapshot.v1",
  "generated_at": "2026-01-02T00:00:00.000Z",
  "source_hash": "cafe",
  "topic": "rust",
  "scope": "topic",
  "documents": [{}, {}],
  "memory_packet": {
    "topicSummary": "Rust notes.",
    "keyFacts": ["a", "b"],
    "experienceBullets": [],
    "sourceRefs": [],
    "openQuestions": [],
    "confidence": 0.61
  }
}
```
"#;

    #[test]
    fn test_canonical_block_wins_over_meta_lines() {
        let payload = build_payload("/v/n.md".into(), NOTE, "p".into());
        assert!(payload.has_canonical_json);
        assert_eq!(payload.generated_at.as_deref(), Some("2026-01-02T00:00:00.000Z"));
        assert_eq!(payload.source_hash.as_deref(), Some("cafe"));
        assert_eq!(payload.topic.as_deref(), Some("rust"));
        assert_eq!(payload.scope, Some(Scope::Topic));
        assert_eq!(payload.documents_count, 2);
        assert_eq!(payload.memory_packet.unwrap().key_facts.len(), 2);
    }

    #[test]
    fn test_meta_lines_are_fallback() {
        let without_json = strip_canonical(NOTE);
        let payload = build_payload("/v/n.md".into(), &without_json, "p".into());
        assert!(!payload.has_canonical_json);
        assert_eq!(payload.source_hash.as_deref(), Some("deadbeef"));
        assert_eq!(payload.generated_at.as_deref(), Some("2026-01-01T00:00:00.000Z"));
        assert_eq!(payload.memory_packet, None);
        assert_eq!(payload.scope, None);
    }

    #[test]
    fn test_invalid_packet_becomes_null() {
        let broken = NOTE.replace("0.61", "3.5");
        assert_eq!(build_payload("p".into(), &broken, String::new()).memory_packet, None);
        let broken = NOTE.replace("\"keyFacts\": [\"a\", \"b\"],", "");
        assert_eq!(build_payload("p".into(), &broken, String::new()).memory_packet, None);
    }

    #[test]
    fn test_clamp_order() {
        let mut payload = build_payload("p".into(), NOTE, "x".repeat(2000));
        let packet = payload.memory_packet.as_mut().unwrap();
        packet.key_facts = (0..20).map(|i| format!("fact {i}")).collect();
        let (clamped, changed) = clamp(payload, 600);
        assert!(changed);
        assert_eq!(clamped.memory_packet.unwrap().key_facts.len(), 5);
        assert_eq!(clamped.preview.chars().count(), CLAMPED_PREVIEW_CHARS + 3);
    }

    #[tokio::test]
    async fn test_missing_note_is_not_found() {
        let tmp = tempfile::TempDir::new().unwrap();
        let vault = VaultManager::new(tmp.path(), 2);
        let outcome = load_memory(&vault, &LoadMemoryRequest::default()).await.unwrap();
        assert!(matches!(outcome, LoadMemoryOutcome::NotFound { ref path } if path == SNAPSHOT_NOTE_PATH));
    }

    #[tokio::test]
    async fn test_preview_and_quiet() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("memory")).unwrap();
        std::fs::write(tmp.path().join(SNAPSHOT_NOTE_PATH), NOTE).unwrap();
        let vault = VaultManager::new(tmp.path(), 2);

        let outcome = load_memory(&vault, &LoadMemoryRequest::default()).await.unwrap();
        let LoadMemoryOutcome::Full(out) = outcome else {
            panic!("expected full payload");
        };
        assert!(out.payload.preview.starts_with("# Context Memory Snapshot v1 - generated_at"));
        assert!(!out.payload.preview.contains("memory_packet"));
        assert!(!out.compression.truncated);
        assert_eq!(out.compression.source_chars, NOTE.chars().count());

        let disabled = LoadMemoryRequest {
            include_content: false,
            ..Default::default()
        };
        let LoadMemoryOutcome::Full(out) = load_memory(&vault, &disabled).await.unwrap() else {
            panic!("expected full payload");
        };
        assert_eq!(out.payload.preview, PREVIEW_DISABLED);

        let quiet = LoadMemoryRequest {
            quiet: true,
            ..Default::default()
        };
        let LoadMemoryOutcome::Quiet(q) = load_memory(&vault, &quiet).await.unwrap() else {
            panic!("expected quiet payload");
        };
        assert!(q.has_canonical_json);
        assert_eq!(q.topic.as_deref(), Some("rust"));
        assert_eq!(q.schema_version, SNAPSHOT_SCHEMA_VERSION);
    }
}
