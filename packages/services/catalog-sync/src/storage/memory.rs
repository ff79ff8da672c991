use std::collections::{BTreeSet, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;

use crate::models::*;
use crate::storage::{CatalogStore, DocumentFilter};

/// One call made against the in-memory store, with the size of its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    FindKeys,
    BulkUpsert(usize),
    BulkInsert(usize),
    MarkDeleted(usize),
    DropIndexes,
    CreateIndex(String),
    Count(DocumentFilter),
}

#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub key: Option<RecordKey>,
    pub body: Value,
}

impl StoredDocument {
    pub fn is_deleted(&self) -> bool {
        self.body.get("deleted").and_then(Value::as_bool) == Some(true)
    }

    fn is_active(&self) -> bool {
        self.body.get("deleted").and_then(Value::as_bool) == Some(false)
    }
}

#[derive(Default)]
struct MemoryState {
    documents: Vec<StoredDocument>,
    indexes: BTreeSet<String>,
    calls: Vec<StoreCall>,
    fail_find_keys: bool,
    fail_inserts_after: Option<usize>,
    failing_indexes: HashSet<String>,
}

/// Process-local `CatalogStore` with MongoDB-like semantics for the
/// operations the engine uses. Records every call for inspection.
#[derive(Default)]
pub struct InMemoryCatalogStore {
    state: Mutex<MemoryState>,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        // A panic inside a test while holding the lock leaves plain data behind.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Seed with raw documents; keys are resolved with `key`.
    pub fn seed(&self, key: &KeySpec, documents: impl IntoIterator<Item = Value>) {
        let mut state = self.lock();
        for body in documents {
            let k = body.as_object().and_then(|o| key.extract(o));
            state.documents.push(StoredDocument { key: k, body });
        }
    }

    pub fn fail_find_keys(&self) {
        self.lock().fail_find_keys = true;
    }

    /// Let the first `n` bulk inserts succeed, then fail every later one.
    pub fn fail_inserts_after(&self, n: usize) {
        self.lock().fail_inserts_after = Some(n);
    }

    pub fn fail_index(&self, field: &str) {
        self.lock().failing_indexes.insert(field.to_string());
    }

    pub fn documents(&self) -> Vec<StoredDocument> {
        self.lock().documents.clone()
    }

    pub fn document(&self, key: &RecordKey) -> Option<Value> {
        self.lock()
            .documents
            .iter()
            .find(|d| d.key.as_ref() == Some(key))
            .map(|d| d.body.clone())
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn indexes(&self) -> Vec<String> {
        self.lock().indexes.iter().cloned().collect()
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn find_keys(&self, _key: &KeySpec) -> Result<Vec<RecordKey>> {
        let mut state = self.lock();
        state.calls.push(StoreCall::FindKeys);
        if state.fail_find_keys {
            return Err(SyncError::Write("find_keys unavailable".to_string()));
        }
        Ok(state.documents.iter().filter_map(|d| d.key.clone()).collect())
    }

    async fn bulk_upsert_by_key(&self, _key: &KeySpec, records: &[CatalogRecord]) -> Result<u64> {
        let mut state = self.lock();
        state.calls.push(StoreCall::BulkUpsert(records.len()));
        for record in records {
            let body = serde_json::to_value(record)?;
            match state.documents.iter().position(|d| d.key.as_ref() == Some(&record.key)) {
                Some(i) => state.documents[i].body = body,
                None => state.documents.push(StoredDocument { key: Some(record.key.clone()), body }),
            }
        }
        Ok(records.len() as u64)
    }

    async fn bulk_insert(&self, records: &[CatalogRecord]) -> Result<u64> {
        let mut state = self.lock();
        let prior_inserts = state.calls.iter().filter(|c| matches!(c, StoreCall::BulkInsert(_))).count();
        state.calls.push(StoreCall::BulkInsert(records.len()));
        if let Some(limit) = state.fail_inserts_after {
            if prior_inserts >= limit {
                return Err(SyncError::Write("insert rejected".to_string()));
            }
        }
        for record in records {
            let body = serde_json::to_value(record)?;
            state.documents.push(StoredDocument { key: Some(record.key.clone()), body });
        }
        Ok(records.len() as u64)
    }

    async fn mark_deleted(&self, _key: &KeySpec, keys: &[RecordKey]) -> Result<u64> {
        let mut state = self.lock();
        state.calls.push(StoreCall::MarkDeleted(keys.len()));
        let targets: HashSet<&RecordKey> = keys.iter().collect();
        let mut modified = 0u64;
        for doc in state.documents.iter_mut() {
            let hit = doc.key.as_ref().map(|k| targets.contains(k)).unwrap_or(false);
            if hit && !doc.is_deleted() {
                if let Some(obj) = doc.body.as_object_mut() {
                    obj.insert("deleted".to_string(), Value::Bool(true));
                    modified += 1;
                }
            }
        }
        Ok(modified)
    }

    async fn drop_indexes(&self) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(StoreCall::DropIndexes);
        state.indexes.clear();
        Ok(())
    }

    async fn create_index(&self, field: &str) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(StoreCall::CreateIndex(field.to_string()));
        if state.failing_indexes.contains(field) {
            return Err(SyncError::Write(format!("cannot index {}", field)));
        }
        state.indexes.insert(field.to_string());
        Ok(())
    }

    async fn count(&self, filter: DocumentFilter) -> Result<u64> {
        let mut state = self.lock();
        state.calls.push(StoreCall::Count(filter));
        let n = state
            .documents
            .iter()
            .filter(|d| match filter {
                DocumentFilter::All => true,
                DocumentFilter::Active => d.is_active(),
                DocumentFilter::Deleted => d.is_deleted(),
            })
            .count();
        Ok(n as u64)
    }
}
