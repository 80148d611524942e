//! Memory snapshot note: a human-readable markdown summary followed by a
//! `## Canonical JSON` block that [`super::memory`] parses back.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use super::{
    ContextDocument, ContextPayload, DocStats, MemoryPacket, MemoryWrite, Relevance, Scope,
    WriteStatus, SNAPSHOT_SCHEMA_VERSION,
};
use crate::vault::{sha256_hex, VaultManager};

const MAX_LISTED_FACTS: usize = 8;
const MAX_LISTED_REFS: usize = 10;

#[derive(Serialize)]
struct HashedDocument<'a> {
    #[serde(rename = "fullPath")]
    full_path: &'a str,
    doc_hash: &'a str,
    title: &'a str,
    tags: &'a [String],
    summary: &'a str,
    relevance: Relevance,
    #[serde(rename = "contentLength")]
    content_length: usize,
    backlinks_count: usize,
    truncated: bool,
}

#[derive(Serialize)]
struct HashedPayload<'a> {
    scope: Scope,
    topic: Option<&'a str>,
    matched_total: usize,
    documents: Vec<HashedDocument<'a>>,
    memory_packet: &'a MemoryPacket,
}

/// SHA-256 over the fields that define what a snapshot says. Batch and
/// cache bookkeeping are excluded.
pub fn source_hash(payload: &ContextPayload) -> String {
    let hashed = HashedPayload {
        scope: payload.scope,
        topic: payload.topic.as_deref(),
        matched_total: payload.matched_total,
        documents: payload
            .documents
            .iter()
            .map(|doc| HashedDocument {
                full_path: &doc.full_path,
                doc_hash: &doc.doc_hash,
                title: &doc.title,
                tags: &doc.tags,
                summary: &doc.summary,
                relevance: doc.relevance,
                content_length: doc.stats.content_length,
                backlinks_count: doc.backlinks_count,
                truncated: doc.truncated,
            })
            .collect(),
        memory_packet: &payload.memory_packet,
    };
    sha256_hex(&serde_json::to_string(&hashed).unwrap_or_default())
}

#[derive(Serialize)]
struct CanonicalDocument<'a> {
    #[serde(rename = "fullPath")]
    full_path: &'a str,
    doc_hash: &'a str,
    title: &'a str,
    tags: &'a [String],
    relevance: Relevance,
    summary: &'a str,
    evidence_snippets: &'a [String],
    stats: DocStats,
    backlinks_count: usize,
    truncated: bool,
}

impl<'a> From<&'a ContextDocument> for CanonicalDocument<'a> {
    fn from(doc: &'a ContextDocument) -> Self {
        Self {
            full_path: &doc.full_path,
            doc_hash: &doc.doc_hash,
            title: &doc.title,
            tags: &doc.tags,
            relevance: doc.relevance,
            summary: &doc.summary,
            evidence_snippets: &doc.evidence_snippets,
            stats: doc.stats,
            backlinks_count: doc.backlinks_count,
            truncated: doc.truncated,
        }
    }
}

#[derive(Serialize)]
struct Canonical<'a> {
    schema_version: &'a str,
    generated_at: &'a str,
    source_hash: &'a str,
    note_path: &'a str,
    action: &'a str,
    scope: Scope,
    topic: Option<&'a str>,
    matched_total: usize,
    total_in_vault: usize,
    documents: Vec<CanonicalDocument<'a>>,
    memory_packet: &'a MemoryPacket,
}

fn bullet_list<'a>(items: impl Iterator<Item = &'a String>) -> String {
    let listed: Vec<String> = items.map(|item| format!("- {item}")).collect();
    if listed.is_empty() {
        "- None".to_string()
    } else {
        listed.join("\n")
    }
}

/// Render the snapshot note for `payload`.
pub fn render_markdown(
    payload: &ContextPayload,
    generated_at: &str,
    source_hash: &str,
    note_path: &str,
) -> String {
    let packet = &payload.memory_packet;
    let topic = payload.topic.as_deref().unwrap_or("null");
    let scope = match payload.scope {
        Scope::Topic => "topic",
        Scope::All => "all",
    };

    let source_refs: Vec<String> = packet
        .source_refs
        .iter()
        .take(MAX_LISTED_REFS)
        .map(|r| {
            let relevance = match r.relevance {
                Relevance::High => "high",
                Relevance::Medium => "medium",
                Relevance::Low => "low",
            };
            let mut line = format!("- [{relevance}] {} ({})", r.title, r.file_path);
            for snippet in &r.evidence_snippets {
                line.push_str("\n  - ");
                line.push_str(snippet);
            }
            line
        })
        .collect();
    let source_refs = if source_refs.is_empty() {
        "- None".to_string()
    } else {
        source_refs.join("\n")
    };

    let canonical = Canonical {
        schema_version: SNAPSHOT_SCHEMA_VERSION,
        generated_at,
        source_hash,
        note_path,
        action: "collect_context",
        scope: payload.scope,
        topic: payload.topic.as_deref(),
        matched_total: payload.matched_total,
        total_in_vault: payload.total_in_vault,
        documents: payload.documents.iter().map(CanonicalDocument::from).collect(),
        memory_packet: packet,
    };
    let canonical_json = serde_json::to_string_pretty(&canonical).unwrap_or_default();

    let topic_summary = if packet.topic_summary.is_empty() {
        "(empty)"
    } else {
        packet.topic_summary.as_str()
    };

    [
        "# Context Memory Snapshot v1".to_string(),
        String::new(),
        format!("- generated_at: {generated_at}"),
        format!("- source_hash: {source_hash}"),
        format!("- schema_version: {SNAPSHOT_SCHEMA_VERSION}"),
        format!("- topic: {topic}"),
        format!("- scope: {scope}"),
        format!("- matched_total: {}", payload.matched_total),
        format!("- total_in_vault: {}", payload.total_in_vault),
        String::new(),
        "## Topic Summary".to_string(),
        topic_summary.to_string(),
        String::new(),
        "## Key Facts".to_string(),
        bullet_list(packet.key_facts.iter().take(MAX_LISTED_FACTS)),
        String::new(),
        "## Experience Bullets".to_string(),
        bullet_list(packet.experience_bullets.iter().take(MAX_LISTED_FACTS)),
        String::new(),
        "## Source Refs".to_string(),
        source_refs,
        String::new(),
        "## Open Questions".to_string(),
        bullet_list(packet.open_questions.iter()),
        String::new(),
        "## Confidence".to_string(),
        packet.confidence.to_string(),
        String::new(),
        "## Canonical JSON".to_string(),
        "```json".to_string(),
        canonical_json,
        "```".to_string(),
        String::new(),
    ]
    .join("\n")
}

/// Render and write the snapshot note. Write failures are reported in the
/// returned [`MemoryWrite`], never raised.
pub async fn write_snapshot(vault: &VaultManager, payload: &ContextPayload, note_path: &str) -> MemoryWrite {
    let generated_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    let source_hash = source_hash(payload);
    let markdown = render_markdown(payload, &generated_at, &source_hash, note_path);

    let mut write = MemoryWrite {
        requested: true,
        status: WriteStatus::Written,
        note_path: Some(note_path.to_string()),
        generated_at: Some(generated_at),
        source_hash: Some(source_hash),
        reason: None,
    };
    match vault.write_raw_document(note_path, &markdown).await {
        Ok(path) => {
            tracing::debug!(path = %path.display(), "memory snapshot written");
        }
        Err(e) => {
            tracing::warn!(note_path, error = %e, "memory snapshot write failed");
            write.status = WriteStatus::Failed;
            write.reason = Some(e.to_string());
        }
    }
    write
}
