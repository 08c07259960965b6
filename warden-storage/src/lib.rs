//! WARDEN Storage - Collaborator Traits and In-Memory Implementations
//!
//! Defines the three external collaborator contracts the guard layer
//! depends on (document store, cache, audit sink) plus reference
//! implementations backed by process memory, used in tests and for
//! embedding the engine without external services.

pub mod audit;
pub mod cache;

pub use audit::{AuditAction, AuditEvent, AuditSink, MemoryAuditSink, StoreAuditSink};
pub use cache::{CacheBackend, MemoryCache};

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use warden_core::{
    fields, id_value, new_record_id, Document, Filter, FindOptions, StoreError, WardenError,
    WardenResult,
};

/// Document store contract: CRUD primitives over named collections.
///
/// All operations may fail with a transport error (`StoreError::Connection`),
/// always surfaced, never silently retried by the guard layer.
pub trait DocumentStore: Send + Sync {
    /// Find the first document matching the filter.
    fn find_one(&self, collection: &str, filter: &Filter) -> WardenResult<Option<Document>>;

    /// Find matching documents, ordered and paged per the options.
    fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> WardenResult<Vec<Document>>;

    /// Count matching documents.
    fn count(&self, collection: &str, filter: &Filter) -> WardenResult<u64>;

    /// Insert documents, returning the inserted count.
    fn insert_many(&self, collection: &str, docs: &[Document]) -> WardenResult<u64>;

    /// Apply a patch to the first matching document, returning the modified
    /// count.
    fn update_one(&self, collection: &str, filter: &Filter, patch: &Document) -> WardenResult<u64>;

    /// Apply a patch to every matching document, returning the modified
    /// count.
    fn update_many(
        &self,
        collection: &str,
        filter: &Filter,
        patch: &Document,
    ) -> WardenResult<u64>;

    /// Delete every matching document, returning the deleted count.
    fn delete_many(&self, collection: &str, filter: &Filter) -> WardenResult<u64>;
}

fn poisoned() -> WardenError {
    WardenError::Store(StoreError::Connection {
        reason: "storage lock poisoned".to_string(),
    })
}

/// In-memory document store for tests and embedded use.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: Arc<RwLock<HashMap<String, Vec<Document>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all stored data.
    pub fn clear(&self) {
        if let Ok(mut map) = self.collections.write() {
            map.clear();
        }
    }

    /// Number of documents in a collection.
    pub fn collection_len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .map(|map| map.get(collection).map(Vec::len).unwrap_or(0))
            .unwrap_or(0)
    }

    /// Seed a collection with documents, assigning `_id`s where missing.
    pub fn seed(&self, collection: &str, docs: Vec<Document>) -> WardenResult<()> {
        self.insert_many(collection, &docs).map(|_| ())
    }
}

impl DocumentStore for MemoryStore {
    fn find_one(&self, collection: &str, filter: &Filter) -> WardenResult<Option<Document>> {
        let map = self.collections.read().map_err(|_| poisoned())?;
        Ok(map
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| filter.matches(d)).cloned()))
    }

    fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> WardenResult<Vec<Document>> {
        let map = self.collections.read().map_err(|_| poisoned())?;
        let mut matched: Vec<Document> = map
            .get(collection)
            .map(|docs| docs.iter().filter(|d| filter.matches(d)).cloned().collect())
            .unwrap_or_default();
        if !options.sort.is_empty() {
            matched.sort_by(|a, b| options.compare(a, b));
        }
        let skipped = matched.into_iter().skip(options.skip as usize);
        let paged: Vec<Document> = match options.limit {
            Some(limit) => skipped.take(limit as usize).collect(),
            None => skipped.collect(),
        };
        Ok(paged.iter().map(|d| options.project(d)).collect())
    }

    fn count(&self, collection: &str, filter: &Filter) -> WardenResult<u64> {
        let map = self.collections.read().map_err(|_| poisoned())?;
        Ok(map
            .get(collection)
            .map(|docs| docs.iter().filter(|d| filter.matches(d)).count() as u64)
            .unwrap_or(0))
    }

    fn insert_many(&self, collection: &str, docs: &[Document]) -> WardenResult<u64> {
        let mut map = self.collections.write().map_err(|_| poisoned())?;
        let stored = map.entry(collection.to_string()).or_default();
        for doc in docs {
            let mut doc = doc.clone();
            if !warden_core::has_concrete_id(&doc) {
                doc.insert(fields::ID.to_string(), id_value(new_record_id()));
            }
            stored.push(doc);
        }
        Ok(docs.len() as u64)
    }

    fn update_one(&self, collection: &str, filter: &Filter, patch: &Document) -> WardenResult<u64> {
        let mut map = self.collections.write().map_err(|_| poisoned())?;
        let Some(stored) = map.get_mut(collection) else {
            return Ok(0);
        };
        for doc in stored.iter_mut() {
            if filter.matches(doc) {
                apply_patch(doc, patch);
                return Ok(1);
            }
        }
        Ok(0)
    }

    fn update_many(
        &self,
        collection: &str,
        filter: &Filter,
        patch: &Document,
    ) -> WardenResult<u64> {
        let mut map = self.collections.write().map_err(|_| poisoned())?;
        let Some(stored) = map.get_mut(collection) else {
            return Ok(0);
        };
        let mut modified = 0;
        for doc in stored.iter_mut() {
            if filter.matches(doc) {
                apply_patch(doc, patch);
                modified += 1;
            }
        }
        Ok(modified)
    }

    fn delete_many(&self, collection: &str, filter: &Filter) -> WardenResult<u64> {
        let mut map = self.collections.write().map_err(|_| poisoned())?;
        let Some(stored) = map.get_mut(collection) else {
            return Ok(0);
        };
        let before = stored.len();
        stored.retain(|doc| !filter.matches(doc));
        Ok((before - stored.len()) as u64)
    }
}

/// Set-style patch semantics: each patch field replaces or adds the
/// corresponding document field. `_id` is never patched.
fn apply_patch(doc: &mut Document, patch: &Document) {
    for (field, value) in patch {
        if field == fields::ID {
            continue;
        }
        doc.insert(field.clone(), value.clone());
    }
}
