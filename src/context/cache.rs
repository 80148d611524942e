//! Content-addressed cache of built `collect_context` payloads.
//!
//! Keys hash the request shape together with the hash of every scanned
//! document's content, so any edit to a scanned document produces a new key
//! and stale entries simply age out of the LRU.

use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};

use lru::LruCache;
use serde::Serialize;

use super::{ContextDocument, ContextPayload, MemoryMode, Scope, SNAPSHOT_SCHEMA_VERSION};
use crate::vault::sha256_hex;

/// Request shape folded into a cache key.
#[derive(Debug, Clone, Serialize)]
pub struct CacheKeyParts<'a> {
    pub scope: Scope,
    pub topic: Option<&'a str>,
    pub doc_hash: &'a str,
    pub mode: MemoryMode,
    pub start_cursor: usize,
    pub max_docs: usize,
    pub max_chars_per_doc: usize,
}

#[derive(Serialize)]
struct CanonicalKey<'a> {
    doc_hash: &'a str,
    max_chars_per_doc: usize,
    max_docs: usize,
    mode: MemoryMode,
    schema_version: &'a str,
    scope: Scope,
    start_cursor: usize,
    topic: Option<&'a str>,
}

/// SHA-256 over the key-sorted JSON of the request shape.
pub fn cache_key(parts: &CacheKeyParts<'_>) -> String {
    let canonical = CanonicalKey {
        doc_hash: parts.doc_hash,
        max_chars_per_doc: parts.max_chars_per_doc,
        max_docs: parts.max_docs,
        mode: parts.mode,
        schema_version: SNAPSHOT_SCHEMA_VERSION,
        scope: parts.scope,
        start_cursor: parts.start_cursor,
        topic: parts.topic,
    };
    sha256_hex(&serde_json::to_string(&canonical).unwrap_or_default())
}

#[derive(Serialize)]
struct DocHashEntry<'a> {
    #[serde(rename = "fullPath")]
    full_path: &'a str,
    doc_hash: &'a str,
}

/// SHA-256 over the ordered `[{fullPath, doc_hash}]` list.
pub fn doc_hash(documents: &[ContextDocument]) -> String {
    let entries: Vec<DocHashEntry<'_>> = documents
        .iter()
        .map(|doc| DocHashEntry {
            full_path: &doc.full_path,
            doc_hash: &doc.doc_hash,
        })
        .collect();
    sha256_hex(&serde_json::to_string(&entries).unwrap_or_default())
}

/// Bounded LRU of payloads. Lookup, build and insert happen under one lock
/// with no suspension point, so two identical requests can never both miss.
#[derive(Debug)]
pub struct ContextCache {
    entries: Mutex<LruCache<String, ContextPayload>>,
}

impl ContextCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Return the cached payload for `key`, or build, store and return a
    /// fresh one. The flag is `true` on a hit.
    pub fn get_or_insert_with<F>(&self, key: &str, build: F) -> (ContextPayload, bool)
    where
        F: FnOnce() -> ContextPayload,
    {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(found) = entries.get(key) {
            return (found.clone(), true);
        }
        let payload = build();
        entries.put(key.to_string(), payload.clone());
        (payload, false)
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Default for ContextCache {
    fn default() -> Self {
        Self::new(super::DEFAULT_CACHE_CAPACITY)
    }
}
