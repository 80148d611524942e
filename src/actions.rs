//! # Vault Actions
//!
//! The tool-invocation surface. A single [`VaultParams`] object names an
//! action and carries its parameters; [`execute`] dispatches it and returns a
//! [`ToolResponse`] ready to be rendered as JSON text.
//!
//! | Action | Backed by |
//! |--------|-----------|
//! | `search` | [`VaultManager::search_documents`] plus content previews |
//! | `read` | [`VaultManager::get_document_info`] with stats and backlinks |
//! | `list_all` | [`VaultManager::all_documents`] |
//! | `stats` | [`VaultManager::stats`] |
//! | `collect_context` | [`crate::context::collect_context`] |
//! | `load_memory` | [`crate::context::load_memory`] |
//!
//! Every non-quiet `search`, `read`, `collect_context` and `load_memory`
//! response carries a `compression` envelope. Failures never escape as Rust
//! errors; they become [`ToolResponse::Error`] or [`ToolResponse::NotFound`].

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::app::AppContext;
use crate::compression::{
    finalize, json_len, take_chars, BudgetedAction, CompressionMode, CompressionSummary,
};
use crate::context::{
    collect_context, load_memory, CollectRequest, LoadMemoryOutcome, LoadMemoryRequest,
    MemoryMode, Scope,
};
use crate::error::VaultError;
use crate::models::{DocumentIndex, DocumentStats, EnrichedDocument};
use crate::vault::{DocumentInfoOptions, VaultManager};

const LIST_DEFAULT_LIMIT: usize = 50;
const LIST_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VaultAction {
    Search,
    Read,
    ListAll,
    Stats,
    CollectContext,
    LoadMemory,
}

impl VaultAction {
    pub fn as_str(self) -> &'static str {
        match self {
            VaultAction::Search => "search",
            VaultAction::Read => "read",
            VaultAction::ListAll => "list_all",
            VaultAction::Stats => "stats",
            VaultAction::CollectContext => "collect_context",
            VaultAction::LoadMemory => "load_memory",
        }
    }
}

/// Parameters of one tool call, in the camelCase JSON shape agents send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultParams {
    pub action: VaultAction,
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub include_content: Option<bool>,
    /// Accepted for wire compatibility; frontmatter is always included.
    #[serde(default)]
    pub include_frontmatter: Option<bool>,
    #[serde(default)]
    pub excerpt_length: Option<usize>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub scope: Option<Scope>,
    #[serde(default)]
    pub max_docs: Option<usize>,
    #[serde(default)]
    pub max_chars_per_doc: Option<usize>,
    #[serde(default)]
    pub memory_mode: Option<MemoryMode>,
    #[serde(default)]
    pub continuation_token: Option<String>,
    #[serde(default)]
    pub memory_path: Option<String>,
    #[serde(default)]
    pub compression_mode: Option<CompressionMode>,
    #[serde(default)]
    pub max_output_chars: Option<usize>,
    #[serde(default)]
    pub quiet: Option<bool>,
}

impl VaultParams {
    pub fn new(action: VaultAction) -> Self {
        Self {
            action,
            keyword: None,
            filename: None,
            limit: None,
            include_content: None,
            include_frontmatter: None,
            excerpt_length: None,
            topic: None,
            scope: None,
            max_docs: None,
            max_chars_per_doc: None,
            memory_mode: None,
            continuation_token: None,
            memory_path: None,
            compression_mode: None,
            max_output_chars: None,
            quiet: None,
        }
    }

    /// Parse a JSON parameter object and check numeric ranges.
    pub fn from_json(raw: &str) -> Result<Self, ToolResponse> {
        let params: VaultParams = serde_json::from_str(raw).map_err(|e| {
            ToolResponse::error(
                format!("Invalid parameters: {e}"),
                Some("Valid actions are: search, read, list_all, stats, collect_context, load_memory"),
            )
        })?;
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), ToolResponse> {
        let ranges = [
            ("limit", self.limit, 1, 100),
            ("excerptLength", self.excerpt_length, 100, 2000),
            ("maxDocs", self.max_docs, 1, 100),
            ("maxCharsPerDoc", self.max_chars_per_doc, 200, 8000),
            ("maxOutputChars", self.max_output_chars, 500, 12000),
        ];
        for (name, value, min, max) in ranges {
            if let Some(value) = value {
                if !(min..=max).contains(&value) {
                    return Err(ToolResponse::error(
                        format!("Invalid parameters: {name} must be between {min} and {max} (got {value})"),
                        None,
                    ));
                }
            }
        }
        if self.continuation_token.as_deref() == Some("") {
            return Err(ToolResponse::error(
                "Invalid parameters: continuationToken must not be empty",
                None,
            ));
        }
        Ok(())
    }

    fn mode(&self) -> CompressionMode {
        self.compression_mode.unwrap_or_default()
    }

    fn include_content(&self) -> bool {
        self.include_content.unwrap_or(true)
    }

    fn quiet(&self) -> bool {
        self.quiet.unwrap_or(false)
    }
}

/// Result of a tool call.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolResponse {
    /// Full payload, rendered as pretty JSON.
    Success(Value),
    /// Minimal payload, rendered as compact JSON.
    Quiet(Value),
    NotFound {
        error: String,
        suggestion: String,
    },
    Error {
        error: String,
        suggestion: Option<String>,
    },
}

impl ToolResponse {
    pub fn error(error: impl Into<String>, suggestion: Option<&str>) -> Self {
        ToolResponse::Error {
            error: error.into(),
            suggestion: suggestion.map(str::to_string),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ToolResponse::NotFound { .. } | ToolResponse::Error { .. })
    }

    /// The JSON body of the response.
    pub fn body(&self) -> Value {
        match self {
            ToolResponse::Success(value) | ToolResponse::Quiet(value) => value.clone(),
            ToolResponse::NotFound { error, suggestion } => {
                json!({ "error": error, "suggestion": suggestion })
            }
            ToolResponse::Error { error, suggestion } => match suggestion {
                Some(suggestion) => json!({ "error": error, "suggestion": suggestion }),
                None => json!({ "error": error }),
            },
        }
    }

    /// Text form handed back to the caller.
    pub fn render(&self) -> String {
        let body = self.body();
        let rendered = match self {
            ToolResponse::Quiet(_) => serde_json::to_string(&body),
            _ => serde_json::to_string_pretty(&body),
        };
        rendered.unwrap_or_else(|_| body.to_string())
    }
}

fn success<T: Serialize>(payload: &T) -> ToolResponse {
    match serde_json::to_value(payload) {
        Ok(value) => ToolResponse::Success(value),
        Err(e) => ToolResponse::error(format!("Execution failed: {e}"), None),
    }
}

fn quiet<T: Serialize>(payload: &T) -> ToolResponse {
    match serde_json::to_value(payload) {
        Ok(value) => ToolResponse::Quiet(value),
        Err(e) => ToolResponse::error(format!("Execution failed: {e}"), None),
    }
}

// ============ Document formatting ============

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentMetadata {
    pub title: String,
    pub tags: Vec<String>,
}

/// Index-only statistics, used when content was not loaded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub content_length: usize,
    pub has_content: bool,
    pub word_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FormattedStats {
    Full(DocumentStats),
    Index(IndexStats),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DocumentContent {
    Loaded { full: String, excerpt: String },
    NotLoaded { preview: String, note: String },
}

/// A document as listed by `search` and `list_all`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormattedDocument {
    pub filename: String,
    #[serde(rename = "fullPath")]
    pub full_path: String,
    pub metadata: DocumentMetadata,
    pub stats: FormattedStats,
    pub content: DocumentContent,
    pub content_is_truncated: bool,
}

/// Shape an index entry, optionally with loaded content, for a listing.
///
/// The excerpt is the first `excerpt_length` chars plus `...` when the
/// content is longer. `content_is_truncated` reports whether the loaded
/// content is shorter than the whole document.
pub fn format_document(
    index: &DocumentIndex,
    loaded: Option<&EnrichedDocument>,
    excerpt_length: Option<usize>,
) -> FormattedDocument {
    let stats = match loaded.and_then(|doc| doc.stats) {
        Some(stats) => FormattedStats::Full(stats),
        None => FormattedStats::Index(IndexStats {
            content_length: index.content_length,
            has_content: loaded.is_some(),
            word_count: 0,
        }),
    };
    let source_len = match &stats {
        FormattedStats::Full(s) => s.content_length,
        FormattedStats::Index(s) => s.content_length,
    };
    let excerpt_length = excerpt_length.filter(|&n| n > 0);

    let (content, content_is_truncated) = match loaded {
        Some(doc) => {
            let content_chars = doc.content.chars().count();
            let excerpt = match excerpt_length {
                Some(n) if content_chars > n => format!("{}...", take_chars(&doc.content, n)),
                _ => doc.content.clone(),
            };
            (
                DocumentContent::Loaded {
                    full: doc.content.clone(),
                    excerpt,
                },
                excerpt_length.is_some() && source_len > content_chars,
            )
        }
        None => (
            DocumentContent::NotLoaded {
                preview: "(Content not loaded)".to_string(),
                note: "Full content available with includeContent=true".to_string(),
            },
            false,
        ),
    };

    FormattedDocument {
        filename: index.filename(),
        full_path: index.file_path.to_string_lossy().into_owned(),
        metadata: DocumentMetadata {
            title: index
                .frontmatter
                .title
                .clone()
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "Untitled".to_string()),
            tags: index.frontmatter.tags().to_vec(),
        },
        stats,
        content,
        content_is_truncated,
    }
}

async fn load_formatted(
    vault: &VaultManager,
    index: &DocumentIndex,
    include_content: bool,
    preview: Option<usize>,
) -> crate::error::Result<FormattedDocument> {
    if !include_content {
        return Ok(format_document(index, None, None));
    }
    let options = DocumentInfoOptions {
        include_stats: true,
        max_content_preview: preview,
        ..Default::default()
    };
    let path = index.file_path.to_string_lossy();
    let loaded = vault.get_document_info(&path, options).await?;
    Ok(format_document(index, loaded.as_ref(), preview))
}

// ============ search ============

#[derive(Debug, Clone, Serialize)]
struct SearchPayload {
    query: String,
    found: usize,
    matched_total: usize,
    total_in_vault: usize,
    documents: Vec<FormattedDocument>,
}

fn clamp_search(mut payload: SearchPayload, max_output_chars: usize) -> (SearchPayload, bool) {
    let over = |p: &SearchPayload| json_len(p) > max_output_chars;
    let mut clamped = false;

    while over(&payload) && payload.documents.len() > 1 {
        payload.documents.pop();
        payload.found = payload.documents.len();
        clamped = true;
    }
    if !over(&payload) {
        return (payload, clamped);
    }

    for doc in payload.documents.iter_mut() {
        if let DocumentContent::Loaded { full, excerpt } = &mut doc.content {
            if full.chars().count() > 600 {
                *full = format!("{}...", take_chars(full, 600));
            }
            if excerpt.chars().count() > 300 {
                *excerpt = format!("{}...", take_chars(excerpt, 300));
            }
            clamped = true;
        }
    }
    (payload, clamped)
}

async fn search(ctx: &AppContext, params: &VaultParams) -> crate::error::Result<ToolResponse> {
    let Some(keyword) = params.keyword.as_deref().filter(|k| !k.trim().is_empty()) else {
        return Ok(ToolResponse::error(
            "keyword parameter is required for search action",
            Some(r#"Provide a keyword, e.g. { action: "search", keyword: "project" }"#),
        ));
    };
    let mode = params.mode();
    let results = ctx.vault.search_documents(keyword).await?;

    if params.quiet() {
        let filenames: Vec<String> = results.iter().map(DocumentIndex::filename).collect();
        return Ok(quiet(&json!({ "found": results.len(), "filenames": filenames })));
    }

    let limit = params.limit.or(mode.search_limit()).unwrap_or(results.len());
    let limited = &results[..limit.min(results.len())];
    let excerpt = params.excerpt_length.or(mode.search_excerpt());

    let mut documents = Vec::with_capacity(limited.len());
    for doc in limited {
        documents.push(load_formatted(&ctx.vault, doc, params.include_content(), excerpt).await?);
    }
    let any_truncated = documents.iter().any(|d| d.content_is_truncated);
    let source_chars = limited.iter().map(|d| d.content_length).sum();

    let mut payload = SearchPayload {
        query: keyword.to_string(),
        found: documents.len(),
        matched_total: results.len(),
        total_in_vault: ctx.vault.all_documents().await?.len(),
        documents,
    };
    let max_output_chars = mode.max_output_chars(BudgetedAction::Search, params.max_output_chars);
    let mut clamped = false;
    if let Some(max) = max_output_chars {
        (payload, clamped) = clamp_search(payload, max);
    }

    Ok(success(&finalize(
        payload,
        CompressionSummary {
            mode,
            source_chars,
            max_output_chars,
            truncated: limited.len() < results.len() || any_truncated || clamped,
            expand_hint: "If you need full raw text, call vault action='read' with compressionMode='none'.",
        },
    )))
}

// ============ read ============

fn clamp_read(mut doc: EnrichedDocument, max_output_chars: usize) -> (EnrichedDocument, bool) {
    let over = |d: &EnrichedDocument| json_len(d) > max_output_chars;
    let mut clamped = false;

    while over(&doc) && doc.backlinks.as_ref().is_some_and(|b| b.len() > 3) {
        if let Some(backlinks) = doc.backlinks.as_mut() {
            backlinks.pop();
        }
        clamped = true;
    }
    while over(&doc) {
        let len = doc.content.chars().count();
        if len <= 400 {
            break;
        }
        let keep = (len as f64 * 0.7).floor() as usize;
        doc.content = format!("{}...", take_chars(&doc.content, keep));
        clamped = true;
    }
    (doc, clamped)
}

async fn read(ctx: &AppContext, params: &VaultParams) -> crate::error::Result<ToolResponse> {
    let Some(filename) = params.filename.as_deref().filter(|f| !f.trim().is_empty()) else {
        return Ok(ToolResponse::error(
            "filename parameter is required for read action",
            Some(r#"Provide a filename, e.g. { action: "read", filename: "meeting-notes.md" }"#),
        ));
    };
    let mode = params.mode();
    let options = DocumentInfoOptions {
        include_stats: true,
        include_backlinks: true,
        ..Default::default()
    };
    let Some(mut doc) = ctx.vault.get_document_info(filename, options).await? else {
        return Ok(ToolResponse::NotFound {
            error: format!("Document not found: {filename}"),
            suggestion: "Check the filename and try again. Use the vault tool with 'list_all' action to see available documents.".to_string(),
        });
    };

    let source_chars = doc.content.chars().count();
    let cap = params.excerpt_length.or(mode.read_content_cap());
    let content_truncated = cap.is_some_and(|cap| source_chars > cap);
    if let Some(cap) = cap.filter(|_| content_truncated) {
        doc.content = format!("{}...", take_chars(&doc.content, cap));
    }

    let mut backlinks_truncated = false;
    if let (Some(limit), Some(backlinks)) = (mode.read_backlink_cap(), doc.backlinks.as_mut()) {
        backlinks_truncated = backlinks.len() > limit;
        backlinks.truncate(limit);
    }

    let max_output_chars = mode.max_output_chars(BudgetedAction::Read, params.max_output_chars);
    let mut clamped = false;
    if let Some(max) = max_output_chars {
        (doc, clamped) = clamp_read(doc, max);
    }

    Ok(success(&finalize(
        doc,
        CompressionSummary {
            mode,
            source_chars,
            max_output_chars,
            truncated: content_truncated || backlinks_truncated || clamped,
            expand_hint: "If you need complete raw text, call vault action='read' with compressionMode='none'.",
        },
    )))
}

// ============ list_all / stats ============

async fn list_all(ctx: &AppContext, params: &VaultParams) -> crate::error::Result<ToolResponse> {
    let all = ctx.vault.all_documents().await?;

    if params.quiet() {
        let filenames: Vec<String> = all.iter().map(DocumentIndex::filename).collect();
        return Ok(quiet(&json!({ "total_documents": all.len(), "filenames": filenames })));
    }

    let limit = params.limit.unwrap_or(LIST_DEFAULT_LIMIT);
    let shown = &all[..limit.min(all.len())];
    let mut documents = Vec::with_capacity(shown.len());
    for doc in shown {
        documents.push(
            load_formatted(&ctx.vault, doc, params.include_content(), Some(LIST_PREVIEW_CHARS)).await?,
        );
    }

    Ok(success(&json!({
        "vault_overview": {
            "total_documents": all.len(),
            "showing": shown.len(),
        },
        "documents": documents,
    })))
}

async fn stats(ctx: &AppContext) -> crate::error::Result<ToolResponse> {
    ctx.vault.initialize().await?;
    Ok(success(&ctx.vault.stats()))
}

// ============ collect_context / load_memory ============

async fn collect(ctx: &AppContext, params: &VaultParams) -> crate::error::Result<ToolResponse> {
    let req = CollectRequest {
        topic: params.topic.clone(),
        scope: params.scope,
        max_docs: params.max_docs,
        max_chars_per_doc: params.max_chars_per_doc,
        memory_mode: params.memory_mode,
        continuation_token: params.continuation_token.clone(),
        compression_mode: params.mode(),
        max_output_chars: params.max_output_chars,
        note_path: ctx.config.context.snapshot_path.clone(),
    };
    let out = collect_context(&ctx.vault, &ctx.cache, &req).await?;
    Ok(success(&out))
}

async fn load(ctx: &AppContext, params: &VaultParams) -> crate::error::Result<ToolResponse> {
    let req = LoadMemoryRequest {
        memory_path: params.memory_path.clone(),
        include_content: params.include_content(),
        excerpt_length: params.excerpt_length,
        quiet: params.quiet(),
        compression_mode: params.mode(),
        max_output_chars: params.max_output_chars,
        default_path: ctx.config.context.snapshot_path.clone(),
    };
    Ok(match load_memory(&ctx.vault, &req).await? {
        LoadMemoryOutcome::NotFound { path } => ToolResponse::NotFound {
            error: format!("Memory note not found: {path}"),
            suggestion: "Run collect_context with memoryMode='vault_note' or 'both' first.".to_string(),
        },
        LoadMemoryOutcome::Quiet(payload) => quiet(&payload),
        LoadMemoryOutcome::Full(payload) => success(&payload),
    })
}

fn map_error(err: VaultError) -> ToolResponse {
    match err {
        VaultError::InvalidContinuationToken(reason) => {
            tracing::debug!(%reason, "rejected continuation token");
            ToolResponse::error(
                "Invalid continuationToken for collect_context action",
                Some("Use the continuation_token value returned by a previous collect_context call."),
            )
        }
        VaultError::TopicRequired => ToolResponse::error(
            err.to_string(),
            Some(r#"Provide a topic, e.g. { action: "collect_context", topic: "next.js", scope: "topic" }"#),
        ),
        VaultError::VaultMissing(_) => ToolResponse::error(
            format!("Execution failed: {err}"),
            Some("Set VAULT_DIR_PATH to your Obsidian vault directory"),
        ),
        other => ToolResponse::error(format!("Execution failed: {other}"), None),
    }
}

/// Run one tool call. Successful payloads are recorded to the metrics sink
/// when one is configured.
pub async fn execute(ctx: &AppContext, params: VaultParams) -> ToolResponse {
    if let Err(response) = params.validate() {
        return response;
    }
    let action = params.action;
    let result = match action {
        VaultAction::Search => search(ctx, &params).await,
        VaultAction::Read => read(ctx, &params).await,
        VaultAction::ListAll => list_all(ctx, &params).await,
        VaultAction::Stats => stats(ctx).await,
        VaultAction::CollectContext => collect(ctx, &params).await,
        VaultAction::LoadMemory => load(ctx, &params).await,
    };
    let response = result.unwrap_or_else(map_error);

    if response.is_error() {
        tracing::debug!(action = action.as_str(), "vault action returned an error response");
    }
    if let (Some(sink), ToolResponse::Success(payload)) = (&ctx.metrics, &response) {
        sink.record(action, payload).await;
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FrontMatter;
    use std::path::PathBuf;

    fn index(content_length: usize) -> DocumentIndex {
        DocumentIndex {
            file_path: PathBuf::from("/vault/notes/Meeting Notes.md"),
            frontmatter: FrontMatter {
                title: Some("Meeting Notes".into()),
                tags: Some(vec!["meeting".into()]),
                ..Default::default()
            },
            content_length,
            image_links: vec![],
            document_links: vec![],
        }
    }

    fn loaded(content: &str, full: &str) -> EnrichedDocument {
        EnrichedDocument {
            index: index(full.len()),
            content: content.to_string(),
            content_hash: None,
            stats: Some(DocumentStats::of(full)),
            backlinks: None,
        }
    }

    #[test]
    fn test_params_parse_camel_case() {
        let params = VaultParams::from_json(
            r#"{"action":"collect_context","topic":"rust","maxDocs":2,"memoryMode":"both","compressionMode":"aggressive"}"#,
        )
        .unwrap();
        assert_eq!(params.action, VaultAction::CollectContext);
        assert_eq!(params.max_docs, Some(2));
        assert_eq!(params.memory_mode, Some(MemoryMode::Both));
        assert_eq!(params.compression_mode, Some(CompressionMode::Aggressive));
    }

    #[test]
    fn test_params_reject_out_of_range_and_unknown_action() {
        let err = VaultParams::from_json(r#"{"action":"search","limit":0}"#).unwrap_err();
        assert!(err.is_error());
        let err = VaultParams::from_json(r#"{"action":"read","maxOutputChars":100}"#).unwrap_err();
        assert!(err.body()["error"].as_str().unwrap().contains("maxOutputChars"));
        let err = VaultParams::from_json(r#"{"action":"delete"}"#).unwrap_err();
        assert!(err.body()["suggestion"].as_str().unwrap().contains("list_all"));
    }

    #[test]
    fn test_response_rendering() {
        let quiet = ToolResponse::Quiet(json!({"found": 1}));
        assert_eq!(quiet.render(), r#"{"found":1}"#);
        assert!(!quiet.is_error());

        let err = ToolResponse::error("boom", None);
        assert!(err.is_error());
        assert_eq!(err.body(), json!({"error": "boom"}));
        assert!(err.render().contains("\n"));

        let nf = ToolResponse::NotFound {
            error: "missing".into(),
            suggestion: "look".into(),
        };
        assert_eq!(nf.body()["suggestion"], "look");
    }

    #[test]
    fn test_format_document_without_content() {
        let doc = format_document(&index(42), None, None);
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["filename"], "Meeting Notes.md");
        assert_eq!(json["metadata"]["title"], "Meeting Notes");
        assert_eq!(json["stats"], json!({"contentLength": 42, "hasContent": false, "wordCount": 0}));
        assert_eq!(json["content"]["preview"], "(Content not loaded)");
        assert_eq!(json["content_is_truncated"], false);
    }

    #[test]
    fn test_format_document_with_preview() {
        let full = "a".repeat(300);
        let preview: String = full.chars().take(200).collect();
        let doc = format_document(&index(300), Some(&loaded(&preview, &full)), Some(200));
        assert!(doc.content_is_truncated);
        match &doc.content {
            DocumentContent::Loaded { full, excerpt } => {
                assert_eq!(full.len(), 200);
                assert_eq!(excerpt, full);
            }
            other => panic!("unexpected content {other:?}"),
        }

        let doc = format_document(&index(50), Some(&loaded(&"b".repeat(50), &"b".repeat(50))), Some(20));
        assert!(!doc.content_is_truncated);
        match &doc.content {
            DocumentContent::Loaded { excerpt, .. } => assert_eq!(excerpt.len(), 23),
            other => panic!("unexpected content {other:?}"),
        }
    }

    #[test]
    fn test_read_clamp_order() {
        let mut doc = loaded(&"x".repeat(3000), &"x".repeat(3000));
        doc.backlinks = Some(
            (0..8)
                .map(|i| crate::models::Backlink {
                    file_path: PathBuf::from(format!("/vault/b{i}.md")),
                    title: format!("B{i}"),
                })
                .collect(),
        );
        let (clamped, changed) = clamp_read(doc, 900);
        assert!(changed);
        assert_eq!(clamped.backlinks.unwrap().len(), 3);
        assert!(clamped.content.chars().count() <= 403);
        assert!(clamped.content.ends_with("..."));
    }

    #[test]
    fn test_error_mapping() {
        let token = map_error(VaultError::InvalidContinuationToken("bad".into()));
        assert_eq!(token.body()["error"], "Invalid continuationToken for collect_context action");
        let topic = map_error(VaultError::TopicRequired);
        assert_eq!(
            topic.body()["error"],
            "topic parameter is required for collect_context when scope='topic'"
        );
        let missing = map_error(VaultError::VaultMissing(PathBuf::from("/nope")));
        assert!(missing.body()["error"].as_str().unwrap().starts_with("Execution failed:"));
        assert_eq!(missing.body()["suggestion"], "Set VAULT_DIR_PATH to your Obsidian vault directory");
    }
}
