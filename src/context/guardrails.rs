//! Staged shrinking of `collect_context` output under a char budget.
//!
//! Stages always run in the same order and each one only fires while the
//! payload is still over budget: backlink tiers, per-document shrink, drop
//! trailing documents, then packet lists.

use super::{packet, ContextDocument, ContextPayload, ContinuationToken};
use crate::compression::{json_len, trim_with_ellipsis};

const MIN_EXCERPT_CHARS: usize = 220;
const MIN_SUMMARY_CHARS: usize = 120;
const MIN_EVIDENCE_CHARS: usize = 80;

/// Step every document's backlink count down one tier
/// (`>10 → 10`, `>5 → 5`, `>3 → 3`, otherwise `0`).
pub fn reduce_backlinks(documents: &mut [ContextDocument]) -> bool {
    let mut changed = false;
    for doc in documents.iter_mut().filter(|d| d.backlinks_count > 0) {
        let next = match doc.backlinks_count {
            n if n > 10 => 10,
            n if n > 5 => 5,
            n if n > 3 => 3,
            _ => 0,
        };
        if next != doc.backlinks_count {
            doc.backlinks_count = next;
            changed = true;
        }
    }
    changed
}

fn shrink(value: &str, factor: f64, floor: usize) -> Option<String> {
    let len = value.chars().count();
    if len <= floor {
        return None;
    }
    let target = ((len as f64 * factor).floor() as usize).max(floor);
    let next = trim_with_ellipsis(value, target);
    (next != value).then_some(next)
}

/// One multiplicative shrink round over excerpt, summary and evidence.
/// Returns `false` once nothing can shrink any further.
pub fn shrink_documents(documents: &mut [ContextDocument]) -> bool {
    let mut changed = false;
    for doc in documents.iter_mut() {
        if let Some(excerpt) = shrink(&doc.excerpt, 0.8, MIN_EXCERPT_CHARS) {
            doc.excerpt = excerpt;
            doc.truncated = true;
            changed = true;
        }
        if let Some(summary) = shrink(&doc.summary, 0.85, MIN_SUMMARY_CHARS) {
            doc.summary = summary;
            doc.truncated = true;
            changed = true;
        }
        let mut evidence_changed = false;
        for snippet in doc.evidence_snippets.iter_mut() {
            if let Some(next) = shrink(snippet, 0.8, MIN_EVIDENCE_CHARS) {
                *snippet = next;
                evidence_changed = true;
            }
        }
        if evidence_changed {
            doc.truncated = true;
            changed = true;
        }
    }
    changed
}

/// Backlink tier plus shrink rounds while `over_budget` holds and something
/// can still shrink. Returns whether anything was reduced.
pub fn reduce_documents_until<F>(documents: &mut [ContextDocument], mut over_budget: F) -> bool
where
    F: FnMut(&[ContextDocument]) -> bool,
{
    let mut clamped = false;
    if over_budget(documents) && reduce_backlinks(documents) {
        clamped = true;
    }
    while over_budget(documents) {
        if !shrink_documents(documents) {
            break;
        }
        clamped = true;
    }
    clamped
}

/// Final pass over a built payload. Returns the trimmed payload and whether
/// anything was cut.
///
/// Dropping documents moves the continuation cursor back so the dropped
/// ones are served by the next batch, and rebuilds the packet from what
/// remains so it never cites a document the response no longer carries.
pub fn trim_payload(mut payload: ContextPayload, max_output_chars: usize) -> (ContextPayload, bool) {
    let over = |p: &ContextPayload| json_len(p) > max_output_chars;
    let mut clamped = false;

    if over(&payload) && reduce_backlinks(&mut payload.documents) {
        clamped = true;
    }
    while over(&payload) {
        if !shrink_documents(&mut payload.documents) {
            break;
        }
        clamped = true;
    }

    let mut dropped = 0;
    while over(&payload) && payload.documents.len() > 1 {
        payload.documents.pop();
        dropped += 1;
        clamped = true;
    }
    if dropped > 0 {
        let batch = &mut payload.batch;
        batch.processed_docs = payload.documents.len();
        batch.consumed_candidates = batch.consumed_candidates.saturating_sub(dropped);
        batch.has_more = true;
        batch.continuation_token = Some(
            ContinuationToken::new(
                batch.start_cursor + batch.consumed_candidates,
                payload.scope,
                payload.topic.clone(),
                batch.max_docs,
                batch.max_chars_per_doc,
                payload.memory_mode,
            )
            .encode(),
        );
        payload.memory_packet = packet::build_packet(payload.topic.as_deref(), &payload.documents);
    }

    macro_rules! pop_while_over {
        ($field:ident, $keep:expr) => {
            while over(&payload) && payload.memory_packet.$field.len() > $keep {
                payload.memory_packet.$field.pop();
                clamped = true;
            }
        };
    }
    pop_while_over!(key_facts, 3);
    pop_while_over!(experience_bullets, 3);
    pop_while_over!(source_refs, 2);
    pop_while_over!(open_questions, 1);

    if over(&payload) && payload.memory_packet.topic_summary.chars().count() > 200 {
        payload.memory_packet.topic_summary = trim_with_ellipsis(&payload.memory_packet.topic_summary, 200);
        clamped = true;
    }

    (payload, clamped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Batch, DocStats, MemoryMode, MemoryWrite, Relevance, Scope};

    fn doc(i: usize, body_chars: usize, backlinks: usize) -> ContextDocument {
        let body = "word ".repeat(body_chars / 5);
        ContextDocument {
            filename: format!("d{i}.md"),
            full_path: format!("/vault/d{i}.md"),
            title: format!("Doc {i}"),
            tags: vec![],
            doc_hash: format!("{i:064}"),
            summary: body.clone(),
            excerpt: body.clone(),
            evidence_snippets: vec![body.clone(), body],
            relevance: Relevance::Medium,
            stats: DocStats {
                content_length: body_chars,
                word_count: body_chars / 5,
                has_content: true,
            },
            backlinks_count: backlinks,
            truncated: false,
        }
    }

    fn payload(documents: Vec<ContextDocument>) -> ContextPayload {
        let n = documents.len();
        ContextPayload {
            action: "collect_context".into(),
            scope: Scope::Topic,
            topic: Some("word".into()),
            matched_total: n + 5,
            total_in_vault: n + 5,
            memory_packet: packet::build_packet(Some("word"), &documents),
            documents,
            memory_mode: MemoryMode::ResponseOnly,
            memory_write: MemoryWrite::not_requested(),
            cache: None,
            batch: Batch {
                start_cursor: 2,
                processed_docs: n,
                consumed_candidates: n,
                max_docs: n,
                max_chars_per_doc: 1800,
                has_more: true,
                continuation_token: None,
            },
        }
    }

    #[test]
    fn test_backlink_tiers() {
        let mut docs = vec![doc(0, 10, 12), doc(1, 10, 7), doc(2, 10, 4), doc(3, 10, 2), doc(4, 10, 0)];
        assert!(reduce_backlinks(&mut docs));
        let counts: Vec<_> = docs.iter().map(|d| d.backlinks_count).collect();
        assert_eq!(counts, vec![10, 5, 3, 0, 0]);
        assert!(reduce_backlinks(&mut docs));
        let counts: Vec<_> = docs.iter().map(|d| d.backlinks_count).collect();
        assert_eq!(counts, vec![5, 3, 0, 0, 0]);
    }

    #[test]
    fn test_shrink_converges_at_floors() {
        let mut docs = vec![doc(0, 2000, 0)];
        let mut rounds = 0;
        while shrink_documents(&mut docs) {
            rounds += 1;
            assert!(rounds < 100, "shrink must terminate");
        }
        let d = &docs[0];
        assert!(d.truncated);
        assert_eq!(d.excerpt.chars().count(), MIN_EXCERPT_CHARS + 3);
        assert_eq!(d.summary.chars().count(), MIN_SUMMARY_CHARS + 3);
        assert!(d.evidence_snippets.iter().all(|s| s.chars().count() == MIN_EVIDENCE_CHARS + 3));
    }

    #[test]
    fn test_short_documents_do_not_shrink() {
        let mut docs = vec![doc(0, 50, 0)];
        assert!(!shrink_documents(&mut docs));
        assert!(!docs[0].truncated);
    }

    #[test]
    fn test_trim_within_budget_is_noop() {
        let original = payload(vec![doc(0, 50, 2)]);
        let (trimmed, clamped) = trim_payload(original.clone(), 100_000);
        assert!(!clamped);
        assert_eq!(trimmed, original);
    }

    #[test]
    fn test_trim_drops_documents_and_rewinds_cursor() {
        let original = payload((0..4).map(|i| doc(i, 2000, 0)).collect());
        let (trimmed, clamped) = trim_payload(original, 1400);

        assert!(clamped);
        assert_eq!(trimmed.documents.len(), 1);
        assert_eq!(trimmed.batch.processed_docs, 1);
        assert_eq!(trimmed.batch.consumed_candidates, 1);
        assert!(trimmed.batch.has_more);

        let token = ContinuationToken::decode(trimmed.batch.continuation_token.as_deref().unwrap()).unwrap();
        assert_eq!(token.cursor, 3);
        assert_eq!(token.topic.as_deref(), Some("word"));
        assert_eq!(trimmed.memory_packet.source_refs.len(), 1);
        assert!(trimmed.memory_packet.key_facts.len() <= 3);
    }
}
