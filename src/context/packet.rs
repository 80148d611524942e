//! Memory packet synthesis.

use super::{ContextDocument, MemoryPacket, SourceRef};
use crate::compression::trim_with_ellipsis;

const MAX_KEY_FACTS: usize = 10;
const MAX_BULLETS: usize = 8;
const MAX_SOURCE_REFS: usize = 10;
const BULLET_SUMMARY_CHARS: usize = 180;
const TOPIC_SUMMARY_DOCS: usize = 3;
const TOPIC_SUMMARY_CHARS: usize = 550;

/// Confidence is highest with many whole documents and drops with the share
/// of truncated ones.
pub fn confidence(documents: &[ContextDocument]) -> f64 {
    let n = documents.len();
    let (base, truncation_ratio) = if n == 0 {
        (0.25, 1.0)
    } else {
        let truncated = documents.iter().filter(|d| d.truncated).count();
        (
            (0.45 + n as f64 * 0.08).min(0.9),
            truncated as f64 / n as f64,
        )
    };
    let raw = (base - truncation_ratio * 0.2).clamp(0.1, 0.95);
    (raw * 100.0).round() / 100.0
}

pub fn build_packet(topic: Option<&str>, documents: &[ContextDocument]) -> MemoryPacket {
    let key_facts = documents
        .iter()
        .flat_map(|doc| {
            doc.evidence_snippets
                .iter()
                .map(move |snippet| format!("{}: {}", doc.title, snippet))
        })
        .take(MAX_KEY_FACTS)
        .collect();

    let experience_bullets = documents
        .iter()
        .take(MAX_BULLETS)
        .map(|doc| {
            format!(
                "{}: {}",
                doc.title,
                trim_with_ellipsis(&doc.summary, BULLET_SUMMARY_CHARS)
            )
        })
        .collect();

    let source_refs = documents
        .iter()
        .take(MAX_SOURCE_REFS)
        .map(|doc| SourceRef {
            file_path: doc.full_path.clone(),
            title: doc.title.clone(),
            relevance: doc.relevance,
            evidence_snippets: doc.evidence_snippets.iter().take(2).cloned().collect(),
        })
        .collect();

    let topic_summary = if documents.is_empty() {
        match topic {
            Some(topic) => format!("No evidence was collected for topic \"{topic}\"."),
            None => "No documents were collected.".to_string(),
        }
    } else {
        let joined = documents
            .iter()
            .take(TOPIC_SUMMARY_DOCS)
            .map(|doc| format!("{}: {}", doc.title, doc.summary))
            .collect::<Vec<_>>()
            .join(" ");
        trim_with_ellipsis(&joined, TOPIC_SUMMARY_CHARS)
    };

    let mut open_questions = Vec::new();
    if documents.is_empty() {
        open_questions.push(match topic {
            Some(topic) => format!("Should we widen the query beyond \"{topic}\"?"),
            None => "Should we provide a narrower topic for better precision?".to_string(),
        });
    }
    if documents.iter().any(|d| d.truncated) {
        open_questions.push(
            "Some excerpts were truncated. Do we need full reads for high-priority notes?"
                .to_string(),
        );
    }
    if (1..3).contains(&documents.len()) {
        open_questions.push(
            "Do we need additional sources before using this as final memory context?".to_string(),
        );
    }

    MemoryPacket {
        topic_summary,
        key_facts,
        experience_bullets,
        source_refs,
        open_questions,
        confidence: confidence(documents),
    }
}
