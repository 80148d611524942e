//! Context collection pipeline.
//!
//! Turns a topic (or the whole vault) into a size-bounded memory packet an
//! agent can consume in one response:
//!
//! ```text
//! token ─▶ candidates ─▶ scan + guardrails ─▶ cache ─▶ snapshot note ─▶ final trim
//! ```
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`token`] | Versioned, self-contained continuation tokens |
//! | [`document`] | Per-document excerpt, evidence and relevance |
//! | [`packet`] | Memory packet synthesis and confidence |
//! | [`guardrails`] | Staged shrinking under an output budget |
//! | [`cache`] | Content-addressed LRU of built payloads |
//! | [`snapshot`] | Canonical markdown snapshot note |
//! | [`collect`] | The `collect_context` orchestration |
//! | [`memory`] | `load_memory`: reading a snapshot note back |

pub mod cache;
pub mod collect;
pub mod document;
pub mod guardrails;
pub mod memory;
pub mod packet;
pub mod snapshot;
pub mod token;

use serde::{Deserialize, Serialize};

pub use cache::ContextCache;
pub use collect::{collect_context, CollectRequest};
pub use memory::{load_memory, LoadMemoryOutcome, LoadMemoryRequest};
pub use token::ContinuationToken;

/// Vault-relative path of the snapshot note.
pub const SNAPSHOT_NOTE_PATH: &str = "memory/context_memory_snapshot.v1.md";
pub const SNAPSHOT_SCHEMA_VERSION: &str = "context_memory_snapshot.v1";
pub const DEFAULT_CACHE_CAPACITY: usize = 200;

pub const DEFAULT_MAX_DOCS: usize = 20;
pub const DEFAULT_MAX_CHARS_PER_DOC: usize = 1800;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    #[default]
    Topic,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryMode {
    #[default]
    ResponseOnly,
    VaultNote,
    Both,
}

impl MemoryMode {
    pub fn writes_note(self) -> bool {
        !matches!(self, MemoryMode::ResponseOnly)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relevance {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocStats {
    pub content_length: usize,
    pub word_count: usize,
    pub has_content: bool,
}

/// One scanned document as it appears in a payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextDocument {
    pub filename: String,
    #[serde(rename = "fullPath")]
    pub full_path: String,
    pub title: String,
    pub tags: Vec<String>,
    pub doc_hash: String,
    pub summary: String,
    pub excerpt: String,
    pub evidence_snippets: Vec<String>,
    pub relevance: Relevance,
    pub stats: DocStats,
    pub backlinks_count: usize,
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRef {
    pub file_path: String,
    pub title: String,
    pub relevance: Relevance,
    pub evidence_snippets: Vec<String>,
}

/// Distilled knowledge about the collected documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryPacket {
    pub topic_summary: String,
    pub key_facts: Vec<String>,
    pub experience_bullets: Vec<String>,
    pub source_refs: Vec<SourceRef>,
    pub open_questions: Vec<String>,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteStatus {
    NotRequested,
    Written,
    Failed,
}

/// Outcome of persisting the snapshot note. Failures are reported here and
/// never raised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryWrite {
    pub requested: bool,
    pub status: WriteStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl MemoryWrite {
    pub fn not_requested() -> Self {
        Self {
            requested: false,
            status: WriteStatus::NotRequested,
            note_path: None,
            generated_at: None,
            source_hash: None,
            reason: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheInfo {
    pub key: String,
    pub hit: bool,
    pub schema_version: String,
    pub topic: Option<String>,
    pub doc_hash: String,
    pub mode: MemoryMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub start_cursor: usize,
    pub processed_docs: usize,
    pub consumed_candidates: usize,
    pub max_docs: usize,
    pub max_chars_per_doc: usize,
    pub has_more: bool,
    pub continuation_token: Option<String>,
}

/// The `collect_context` response body, before the compression envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextPayload {
    pub action: String,
    pub scope: Scope,
    pub topic: Option<String>,
    pub matched_total: usize,
    pub total_in_vault: usize,
    pub documents: Vec<ContextDocument>,
    pub memory_packet: MemoryPacket,
    pub memory_mode: MemoryMode,
    pub memory_write: MemoryWrite,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheInfo>,
    pub batch: Batch,
}
