//! `collect_context` orchestration.

use super::cache::{cache_key, doc_hash, CacheKeyParts};
use super::document::build_document;
use super::guardrails::{reduce_documents_until, trim_payload};
use super::snapshot::write_snapshot;
use super::{
    packet, Batch, CacheInfo, ContextCache, ContextDocument, ContextPayload, ContinuationToken,
    MemoryMode, MemoryWrite, Scope, DEFAULT_MAX_CHARS_PER_DOC, DEFAULT_MAX_DOCS,
    SNAPSHOT_NOTE_PATH, SNAPSHOT_SCHEMA_VERSION,
};
use crate::compression::{
    finalize, json_len, BudgetedAction, Compressed, CompressionMode, CompressionSummary,
};
use crate::error::{Result, VaultError};
use crate::vault::{DocumentInfoOptions, VaultManager};

const EXPAND_HINT: &str = "If has_more is true, call collect_context again with continuationToken.";
const EMPTY_EXPAND_HINT: &str =
    "If more context is needed, rerun collect_context with broader scope or topic.";

/// Caller parameters. Values carried by a continuation token take
/// precedence over the matching fields here.
#[derive(Debug, Clone)]
pub struct CollectRequest {
    pub topic: Option<String>,
    pub scope: Option<Scope>,
    pub max_docs: Option<usize>,
    pub max_chars_per_doc: Option<usize>,
    pub memory_mode: Option<MemoryMode>,
    pub continuation_token: Option<String>,
    pub compression_mode: CompressionMode,
    pub max_output_chars: Option<usize>,
    /// Vault-relative path of the snapshot note.
    pub note_path: String,
}

impl Default for CollectRequest {
    fn default() -> Self {
        Self {
            topic: None,
            scope: None,
            max_docs: None,
            max_chars_per_doc: None,
            memory_mode: None,
            continuation_token: None,
            compression_mode: CompressionMode::default(),
            max_output_chars: None,
            note_path: SNAPSHOT_NOTE_PATH.to_string(),
        }
    }
}

/// Batch parameters after token and defaults are applied.
#[derive(Debug, Clone)]
struct Resolved {
    scope: Scope,
    topic: Option<String>,
    max_docs: usize,
    max_chars_per_doc: usize,
    memory_mode: MemoryMode,
    start_cursor: usize,
}

impl Resolved {
    fn from_request(req: &CollectRequest) -> Result<Self> {
        let token = req
            .continuation_token
            .as_deref()
            .map(ContinuationToken::decode)
            .transpose()?;

        let resolved = match token {
            Some(token) => Self {
                scope: token.scope,
                topic: token.topic,
                max_docs: token.max_docs,
                max_chars_per_doc: token.max_chars_per_doc,
                memory_mode: token.memory_mode,
                start_cursor: token.cursor,
            },
            None => Self {
                scope: req.scope.unwrap_or_default(),
                topic: req
                    .topic
                    .as_deref()
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string),
                max_docs: req.max_docs.unwrap_or(DEFAULT_MAX_DOCS),
                max_chars_per_doc: req.max_chars_per_doc.unwrap_or(DEFAULT_MAX_CHARS_PER_DOC),
                memory_mode: req.memory_mode.unwrap_or_default(),
                start_cursor: 0,
            },
        };

        if resolved.scope == Scope::Topic && resolved.topic.is_none() {
            return Err(VaultError::TopicRequired);
        }
        Ok(resolved)
    }

    fn cache_info(&self, doc_hash: &str) -> CacheInfo {
        let key = cache_key(&CacheKeyParts {
            scope: self.scope,
            topic: self.topic.as_deref(),
            doc_hash,
            mode: self.memory_mode,
            start_cursor: self.start_cursor,
            max_docs: self.max_docs,
            max_chars_per_doc: self.max_chars_per_doc,
        });
        CacheInfo {
            key,
            hit: false,
            schema_version: SNAPSHOT_SCHEMA_VERSION.to_string(),
            topic: self.topic.clone(),
            doc_hash: doc_hash.to_string(),
            mode: self.memory_mode,
        }
    }

    fn token_at(&self, cursor: usize) -> String {
        ContinuationToken::new(
            cursor,
            self.scope,
            self.topic.clone(),
            self.max_docs,
            self.max_chars_per_doc,
            self.memory_mode,
        )
        .encode()
    }
}

/// Counters that vary per payload build.
struct Progress {
    matched_total: usize,
    total_in_vault: usize,
    consumed: usize,
    has_more: bool,
    continuation_token: Option<String>,
}

fn build_payload(
    resolved: &Resolved,
    documents: Vec<ContextDocument>,
    progress: Progress,
    cache: Option<CacheInfo>,
) -> ContextPayload {
    ContextPayload {
        action: "collect_context".to_string(),
        scope: resolved.scope,
        topic: resolved.topic.clone(),
        matched_total: progress.matched_total,
        total_in_vault: progress.total_in_vault,
        memory_packet: packet::build_packet(resolved.topic.as_deref(), &documents),
        batch: Batch {
            start_cursor: resolved.start_cursor,
            processed_docs: documents.len(),
            consumed_candidates: progress.consumed,
            max_docs: resolved.max_docs,
            max_chars_per_doc: resolved.max_chars_per_doc,
            has_more: progress.has_more,
            continuation_token: progress.continuation_token,
        },
        documents,
        memory_mode: resolved.memory_mode,
        memory_write: MemoryWrite::not_requested(),
        cache,
    }
}

fn mark_hit(payload: &mut ContextPayload, hit: bool) {
    if let Some(cache) = payload.cache.as_mut() {
        cache.hit = hit;
    }
}

/// Collect a bounded batch of evidence about a topic (or the whole vault)
/// and distill it into a memory packet.
///
/// A batch is identified by its resolved parameters and the content hashes
/// of the documents it scanned; repeating a request over unchanged files is
/// served from `cache`.
pub async fn collect_context(
    vault: &VaultManager,
    cache: &ContextCache,
    req: &CollectRequest,
) -> Result<Compressed<ContextPayload>> {
    vault.initialize().await?;
    let resolved = Resolved::from_request(req)?;
    let mode = req.compression_mode;
    let max_output_chars = mode.max_output_chars(BudgetedAction::CollectContext, req.max_output_chars);

    let all = vault.all_documents().await?;
    let mut candidates = match (resolved.scope, resolved.topic.as_deref()) {
        (Scope::Topic, Some(topic)) => vault.search_documents(topic).await?,
        _ => all.clone(),
    };
    candidates.sort_by(|a, b| a.file_path.cmp(&b.file_path));

    if candidates.is_empty() || resolved.start_cursor >= candidates.len() {
        return collect_empty(vault, cache, req, &resolved, candidates.len(), all.len(), max_output_chars).await;
    }

    let progress = |consumed: usize, has_more: bool, token: Option<String>| Progress {
        matched_total: candidates.len(),
        total_in_vault: all.len(),
        consumed,
        has_more,
        continuation_token: token,
    };

    let options = DocumentInfoOptions {
        include_stats: true,
        include_backlinks: true,
        max_content_preview: Some(resolved.max_chars_per_doc),
        include_content_hash: true,
    };

    let mut documents: Vec<ContextDocument> = Vec::new();
    let mut source_chars = 0usize;
    let mut consumed = 0usize;
    let mut scanned = resolved.start_cursor;
    let mut clamped = false;

    while scanned < candidates.len() && documents.len() < resolved.max_docs {
        let candidate = &candidates[scanned];
        scanned += 1;
        consumed += 1;

        let path = candidate.file_path.to_string_lossy();
        let Some(enriched) = vault.get_document_info(&path, options).await? else {
            continue;
        };
        let doc = build_document(&enriched, resolved.max_chars_per_doc, resolved.topic.as_deref());
        source_chars += doc.stats.content_length;
        documents.push(doc);

        let Some(max) = max_output_chars else {
            continue;
        };
        let has_more = scanned < candidates.len();
        let over_budget = |docs: &[ContextDocument]| {
            json_len(&build_payload(&resolved, docs.to_vec(), progress(consumed, has_more, None), None)) > max
        };
        if !over_budget(&documents) {
            continue;
        }

        clamped = true;
        reduce_documents_until(&mut documents, &over_budget);
        if over_budget(&documents) {
            if documents.len() > 1 {
                if let Some(removed) = documents.pop() {
                    source_chars -= removed.stats.content_length;
                }
                consumed -= 1;
                scanned -= 1;
            }
            tracing::debug!(kept = documents.len(), max, "collect_context scan stopped at output budget");
            break;
        }
    }

    let next_cursor = resolved.start_cursor + consumed;
    let has_more = next_cursor < candidates.len();
    let continuation_token = has_more.then(|| resolved.token_at(next_cursor));

    let info = resolved.cache_info(&doc_hash(&documents));
    let any_truncated = documents.iter().any(|d| d.truncated);
    let key = info.key.clone();
    let (mut payload, hit) = cache.get_or_insert_with(&key, || {
        build_payload(&resolved, documents, progress(consumed, has_more, continuation_token), Some(info))
    });
    mark_hit(&mut payload, hit);
    tracing::debug!(hit, docs = payload.documents.len(), "collect_context batch resolved");

    if resolved.memory_mode.writes_note() {
        payload.memory_write = write_snapshot(vault, &payload, &req.note_path).await;
    }

    if let Some(max) = max_output_chars {
        let (trimmed, trim_clamped) = trim_payload(payload, max);
        payload = trimmed;
        clamped |= trim_clamped;
    }

    Ok(finalize(
        payload,
        CompressionSummary {
            mode,
            source_chars,
            max_output_chars,
            truncated: has_more || any_truncated || clamped,
            expand_hint: EXPAND_HINT,
        },
    ))
}

async fn collect_empty(
    vault: &VaultManager,
    cache: &ContextCache,
    req: &CollectRequest,
    resolved: &Resolved,
    matched_total: usize,
    total_in_vault: usize,
    max_output_chars: Option<usize>,
) -> Result<Compressed<ContextPayload>> {
    let info = resolved.cache_info(&doc_hash(&[]));
    let key = info.key.clone();
    let (mut payload, hit) = cache.get_or_insert_with(&key, || {
        let progress = Progress {
            matched_total,
            total_in_vault,
            consumed: 0,
            has_more: false,
            continuation_token: None,
        };
        build_payload(resolved, Vec::new(), progress, Some(info))
    });
    mark_hit(&mut payload, hit);

    if resolved.memory_mode.writes_note() {
        payload.memory_write = write_snapshot(vault, &payload, &req.note_path).await;
    }

    Ok(finalize(
        payload,
        CompressionSummary {
            mode: req.compression_mode,
            source_chars: 0,
            max_output_chars,
            truncated: false,
            expand_hint: EMPTY_EXPAND_HINT,
        },
    ))
}
