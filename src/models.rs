//! Core data models shared by the indexer, the vault manager and the
//! action layer.
//!
//! Wire names follow the JSON contract consumed by agents (`filePath`,
//! `contentLength`, `imageLinks`, ...), hence the camelCase renames.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Post category accepted in frontmatter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Web,
    Algorithm,
    Cs,
    Code,
}

impl Category {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "web" => Some(Category::Web),
            "algorithm" => Some(Category::Algorithm),
            "cs" => Some(Category::Cs),
            "code" => Some(Category::Code),
            _ => None,
        }
    }
}

/// Typed view over a document's YAML frontmatter. Every field is optional;
/// unknown keys are ignored at parse time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrontMatter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl FrontMatter {
    /// Tags, or an empty slice when the field is absent.
    pub fn tags(&self) -> &[String] {
        self.tags.as_deref().unwrap_or(&[])
    }
}

/// One indexed document. Identity is the absolute `file_path`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentIndex {
    pub file_path: PathBuf,
    pub frontmatter: FrontMatter,
    /// Length of the body (frontmatter excluded), in chars.
    pub content_length: usize,
    pub image_links: Vec<String>,
    pub document_links: Vec<String>,
}

impl DocumentIndex {
    /// Last path component, e.g. `Meeting Notes.md`.
    pub fn filename(&self) -> String {
        file_name_of(&self.file_path)
    }
}

/// Whole-file statistics computed on the full raw content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentStats {
    pub word_count: usize,
    pub line_count: usize,
    pub character_count: usize,
    pub content_length: usize,
    pub has_content: bool,
}

impl DocumentStats {
    pub fn of(content: &str) -> Self {
        let chars = content.chars().count();
        Self {
            word_count: content.split_whitespace().count(),
            line_count: content.split('\n').count(),
            character_count: chars,
            content_length: chars,
            has_content: !content.trim().is_empty(),
        }
    }
}

/// A document linking to another one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Backlink {
    pub file_path: PathBuf,
    pub title: String,
}

/// A [`DocumentIndex`] materialized with content and optional extras.
/// Built per request and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedDocument {
    #[serde(flatten)]
    pub index: DocumentIndex,
    /// Raw file content, possibly cut to the requested preview length.
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<DocumentStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backlinks: Option<Vec<Backlink>>,
}

/// Snapshot of vault manager state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VaultStats {
    pub total_files: usize,
    pub is_initialized: bool,
    pub vault_path: PathBuf,
}

pub(crate) fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
