//! Per-document extraction: excerpt, evidence snippets, summary, relevance.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use super::{ContextDocument, DocStats, Relevance};
use crate::compression::{normalize_whitespace, trim_with_ellipsis};
use crate::frontmatter::strip_block;
use crate::models::EnrichedDocument;
use crate::vault::sha256_hex;

/// Lines shorter than this never become evidence.
const MIN_EVIDENCE_LINE_CHARS: usize = 24;
const MAX_SNIPPET_CHARS: usize = 220;
const MAX_SNIPPETS: usize = 2;

static LIST_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([-*]|\d+[.)])\s+").expect("valid list regex"));
static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#{1,6}\s+").expect("valid heading regex"));
static BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-*]\s+").expect("valid bullet regex"));
static MDX_EXTENSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.mdx?$").expect("valid extension regex"));

/// Up to `max` evidence lines: list items first, then headings, then prose.
pub fn pick_evidence_snippets(content: &str, max: usize) -> Vec<String> {
    let lines: Vec<&str> = strip_block(content)
        .split('\n')
        .map(str::trim)
        .filter(|line| line.chars().count() >= MIN_EVIDENCE_LINE_CHARS)
        .collect();

    let lists = lines.iter().filter(|l| LIST_ITEM.is_match(l));
    let headings = lines.iter().filter(|l| HEADING.is_match(l));
    let prose = lines
        .iter()
        .filter(|l| !LIST_ITEM.is_match(l) && !HEADING.is_match(l));

    let mut seen = HashSet::new();
    lists
        .chain(headings)
        .chain(prose)
        .filter(|line| seen.insert(**line))
        .map(|line| {
            let line = HEADING.replace(line, "");
            let line = BULLET.replace(&line, "");
            normalize_whitespace(&line)
        })
        .take(max)
        .map(|line| trim_with_ellipsis(&line, MAX_SNIPPET_CHARS))
        .collect()
}

/// `high` when the topic occurs in the title or a tag, `medium` when it
/// occurs in the excerpt or no topic was given, `low` otherwise.
pub fn infer_relevance(title: &str, tags: &[String], excerpt: &str, topic: Option<&str>) -> Relevance {
    let Some(topic) = topic else {
        return Relevance::Medium;
    };
    let topic = topic.to_lowercase();
    if title.to_lowercase().contains(&topic)
        || tags.iter().any(|tag| tag.to_lowercase().contains(&topic))
    {
        Relevance::High
    } else if excerpt.to_lowercase().contains(&topic) {
        Relevance::Medium
    } else {
        Relevance::Low
    }
}

/// Build the payload entry for one enriched document. `doc.content` is
/// expected to already be cut to the per-document budget.
pub fn build_document(doc: &EnrichedDocument, max_chars_per_doc: usize, topic: Option<&str>) -> ContextDocument {
    let filename = doc.index.filename();
    let title = doc
        .index
        .frontmatter
        .title
        .clone()
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| MDX_EXTENSION.replace(&filename, "").into_owned());
    let tags = doc.index.frontmatter.tags().to_vec();

    let source = strip_block(&doc.content);
    let excerpt = trim_with_ellipsis(&normalize_whitespace(source), max_chars_per_doc);
    let evidence_snippets = pick_evidence_snippets(source, MAX_SNIPPETS);

    let joined = evidence_snippets.join(" ");
    let summary = if !joined.trim().is_empty() {
        joined.trim().to_string()
    } else if !excerpt.is_empty() {
        trim_with_ellipsis(&excerpt, MAX_SNIPPET_CHARS)
    } else {
        title.clone()
    };

    let stats = match doc.stats {
        Some(stats) => DocStats {
            content_length: stats.content_length,
            word_count: stats.word_count,
            has_content: stats.has_content,
        },
        None => DocStats {
            content_length: source.chars().count(),
            word_count: 0,
            has_content: !source.trim().is_empty(),
        },
    };
    let doc_hash = doc
        .content_hash
        .clone()
        .unwrap_or_else(|| sha256_hex(source));
    let relevance = infer_relevance(&title, &tags, &excerpt, topic);
    let truncated = stats.content_length > excerpt.chars().count();

    ContextDocument {
        filename,
        full_path: doc.index.file_path.to_string_lossy().into_owned(),
        title,
        tags,
        doc_hash,
        summary,
        excerpt,
        evidence_snippets,
        relevance,
        stats,
        backlinks_count: doc.backlinks.as_ref().map_or(0, Vec::len),
        truncated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Backlink, DocumentIndex, DocumentStats, FrontMatter};
    use std::path::PathBuf;

    fn enriched(content: &str, title: Option<&str>, tags: &[&str]) -> EnrichedDocument {
        EnrichedDocument {
            index: DocumentIndex {
                file_path: PathBuf::from("/vault/nextjs-project.md"),
                frontmatter: FrontMatter {
                    title: title.map(str::to_string),
                    tags: Some(tags.iter().map(|t| t.to_string()).collect()),
                    ..Default::default()
                },
                content_length: content.len(),
                image_links: vec![],
                document_links: vec![],
            },
            content: content.to_string(),
            content_hash: Some("abc123".into()),
            stats: Some(DocumentStats::of(content)),
            backlinks: Some(vec![Backlink {
                file_path: PathBuf::from("/vault/other.md"),
                title: "Other".into(),
            }]),
        }
    }

    #[test]
    fn test_evidence_priority_and_cleanup() {
        let content = "Plain prose line that is long enough to count.\n## A heading that is long enough\n- a list item that is long enough here\nshort\n- a list item that is long enough here";
        let snippets = pick_evidence_snippets(content, 3);
        assert_eq!(
            snippets,
            vec![
                "a list item that is long enough here",
                "A heading that is long enough",
                "Plain prose line that is long enough to count.",
            ]
        );
    }

    #[test]
    fn test_evidence_numbered_items_first_and_trimmed() {
        let long = "x".repeat(300);
        let content = format!("{long}\n1. numbered entry comes before prose");
        let snippets = pick_evidence_snippets(&content, 2);
        assert_eq!(snippets[0], "1. numbered entry comes before prose");
        assert_eq!(snippets[1].chars().count(), 223);
    }

    #[test]
    fn test_relevance() {
        let tags = vec!["next.js".to_string()];
        assert_eq!(infer_relevance("Other", &tags, "", Some("Next.JS")), Relevance::High);
        assert_eq!(infer_relevance("Other", &[], "uses next.js", Some("next.js")), Relevance::Medium);
        assert_eq!(infer_relevance("Other", &[], "nothing", Some("next.js")), Relevance::Low);
        assert_eq!(infer_relevance("Other", &[], "nothing", None), Relevance::Medium);
    }

    #[test]
    fn test_build_document() {
        let content = "---\ntitle: Next.js Project\n---\nBuilt SSR dashboard with Next.js and optimized page load.";
        let doc = build_document(&enriched(content, Some("Next.js Project"), &["frontend"]), 300, Some("next.js"));

        assert_eq!(doc.filename, "nextjs-project.md");
        assert_eq!(doc.title, "Next.js Project");
        assert_eq!(doc.excerpt, "Built SSR dashboard with Next.js and optimized page load.");
        assert_eq!(doc.summary, doc.excerpt);
        assert_eq!(doc.relevance, Relevance::High);
        assert_eq!(doc.doc_hash, "abc123");
        assert_eq!(doc.backlinks_count, 1);
        assert!(doc.truncated, "frontmatter makes the source longer than the excerpt");
    }

    #[test]
    fn test_title_falls_back_to_filename() {
        let doc = build_document(&enriched("tiny", None, &[]), 300, None);
        assert_eq!(doc.title, "nextjs-project");
        assert_eq!(doc.summary, "tiny");
        assert!(!doc.truncated);
    }
}
