//! In-memory inverted index and backlink graph.
//!
//! # Tokens
//!
//! Every document contributes these lowercased tokens:
//!
//! | Source | Rule |
//! |--------|------|
//! | path | split on `/`, `-`, `.` and whitespace |
//! | file stem | whole stem, e.g. `meeting notes` |
//! | title | whitespace-separated words |
//! | tags | each tag verbatim |
//! | body | every run of letters and digits |
//! | headers | the full text of each `#` header line |
//!
//! # Consistency
//!
//! A build assembles a complete [`IndexSnapshot`] off-lock and swaps it in
//! with one write. Readers clone the current `Arc` and never see a partially
//! built index.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use regex::Regex;
use tokio::task::JoinSet;

use crate::frontmatter;
use crate::links;
use crate::models::{file_name_of, DocumentIndex};
use crate::semaphore::IoSemaphore;

static PATH_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[/\\\s\-.]+").expect("valid separator regex"));
static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{L}\p{N}]+").expect("valid word regex"));
static HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#+\s+(.*)").expect("valid header regex"));

/// One immutable generation of the index.
#[derive(Debug, Default)]
pub struct IndexSnapshot {
    documents: BTreeMap<PathBuf, DocumentIndex>,
    inverted: HashMap<String, BTreeSet<PathBuf>>,
    backlinks: HashMap<String, BTreeSet<PathBuf>>,
}

impl IndexSnapshot {
    fn insert(&mut self, index: DocumentIndex, tokens: HashSet<String>) {
        for token in tokens {
            self.inverted
                .entry(token)
                .or_default()
                .insert(index.file_path.clone());
        }
        self.documents.insert(index.file_path.clone(), index);
    }

    fn link_backlinks(&mut self) {
        self.backlinks.clear();
        for (source, doc) in &self.documents {
            for target in &doc.document_links {
                self.backlinks
                    .entry(links::normalize_target(target))
                    .or_default()
                    .insert(source.clone());
            }
        }
    }

    fn search(&self, keyword: &str) -> Vec<DocumentIndex> {
        let lowered = keyword.to_lowercase();
        let mut tokens = lowered.split_whitespace();

        let Some(first) = tokens.next() else {
            return Vec::new();
        };
        let Some(first_postings) = self.inverted.get(first) else {
            return Vec::new();
        };

        let mut matched: BTreeSet<&PathBuf> = first_postings.iter().collect();
        for token in tokens {
            let Some(postings) = self.inverted.get(token) else {
                return Vec::new();
            };
            matched.retain(|path| postings.contains(*path));
            if matched.is_empty() {
                return Vec::new();
            }
        }

        matched
            .into_iter()
            .filter_map(|path| self.documents.get(path).cloned())
            .collect()
    }

    fn backlinks_of(&self, path: &Path) -> Vec<PathBuf> {
        let target = links::normalize_target(&file_name_of(path));
        if target.is_empty() {
            return Vec::new();
        }
        self.backlinks
            .get(&target)
            .map(|sources| sources.iter().cloned().collect())
            .unwrap_or_default()
    }
}

/// Inverted index over a set of markdown files.
#[derive(Debug, Default)]
pub struct Indexer {
    current: RwLock<Arc<IndexSnapshot>>,
}

impl Indexer {
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot(&self) -> Arc<IndexSnapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn swap(&self, next: IndexSnapshot) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(next);
    }

    /// Index `paths` concurrently, each read holding one permit, then
    /// replace the current index. Unreadable files are logged and skipped.
    pub async fn build(&self, paths: &[PathBuf], sem: &IoSemaphore) {
        let mut tasks = JoinSet::new();
        for path in paths {
            let path = path.clone();
            let sem = sem.clone();
            tasks.spawn(async move { index_file(path, sem).await });
        }

        let mut next = IndexSnapshot::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some((index, tokens))) => next.insert(index, tokens),
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "indexing task failed"),
            }
        }
        next.link_backlinks();

        tracing::debug!(
            files = next.documents.len(),
            tokens = next.inverted.len(),
            "index built"
        );
        self.swap(next);
    }

    /// AND search across whitespace-separated tokens, sorted by path.
    /// Blank keywords match nothing.
    pub fn search(&self, keyword: &str) -> Vec<DocumentIndex> {
        self.snapshot().search(keyword)
    }

    pub fn document(&self, path: &Path) -> Option<DocumentIndex> {
        self.snapshot().documents.get(path).cloned()
    }

    /// Every indexed document, sorted by path.
    pub fn all_documents(&self) -> Vec<DocumentIndex> {
        self.snapshot().documents.values().cloned().collect()
    }

    /// Sources linking to `path`.
    ///
    /// Keyed on the basename only: `a/note.md` and `b/note.md` share one
    /// backlink set.
    pub fn backlinks(&self, path: &Path) -> Vec<PathBuf> {
        self.snapshot().backlinks_of(path)
    }

    pub fn total_files(&self) -> usize {
        self.snapshot().documents.len()
    }

    pub fn clear(&self) {
        self.swap(IndexSnapshot::default());
    }
}

async fn index_file(path: PathBuf, sem: IoSemaphore) -> Option<(DocumentIndex, HashSet<String>)> {
    let text = {
        let _permit = sem.acquire().await;
        tokio::fs::read_to_string(&path).await
    };
    let text = match text {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to read file for indexing");
            return None;
        }
    };

    let parsed = frontmatter::parse(&text);
    let index = DocumentIndex {
        file_path: path,
        content_length: parsed.body.chars().count(),
        image_links: links::image_links(&parsed.body),
        document_links: links::document_links(&parsed.body),
        frontmatter: parsed.frontmatter,
    };
    let tokens = tokenize(&index, &parsed.body);
    Some((index, tokens))
}

/// All index tokens for one document.
pub fn tokenize(index: &DocumentIndex, body: &str) -> HashSet<String> {
    let mut tokens = HashSet::new();

    let path = index.file_path.to_string_lossy().to_lowercase();
    tokens.extend(
        PATH_SEPARATORS
            .split(&path)
            .filter(|t| !t.is_empty())
            .map(str::to_string),
    );

    if let Some(stem) = index.file_path.file_stem() {
        tokens.insert(stem.to_string_lossy().to_lowercase());
    }

    if let Some(title) = &index.frontmatter.title {
        tokens.extend(title.to_lowercase().split_whitespace().map(str::to_string));
    }
    tokens.extend(index.frontmatter.tags().iter().map(|t| t.to_lowercase()));

    let lowered = body.to_lowercase();
    tokens.extend(WORD.find_iter(&lowered).map(|m| m.as_str().to_string()));

    for caps in HEADER.captures_iter(body) {
        if let Some(text) = caps.get(1) {
            let header = text.as_str().trim().to_lowercase();
            if !header.is_empty() {
                tokens.insert(header);
            }
        }
    }

    tokens
}
