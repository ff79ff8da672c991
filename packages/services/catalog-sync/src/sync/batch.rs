use std::collections::{HashMap, HashSet};

use crate::models::*;
use crate::storage::CatalogStore;

/// A classified record waiting to be written.
#[derive(Debug, Clone)]
pub enum WriteOp {
    Update(CatalogRecord),
    Insert(CatalogRecord),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushStats {
    pub update_flushes: u64,
    pub insert_flushes: u64,
    pub upserted: u64,
    pub inserted: u64,
}

/// Buffers update and insert operations and writes each buffer in one bulk
/// request once it holds `batch_size` operations.
///
/// A repeat of a key whose insert is still buffered replaces the buffered
/// document; a repeat after that insert was flushed becomes an upsert. Either
/// way the store never receives two raw inserts for one key.
pub struct BatchWriter<'a, S: CatalogStore + ?Sized> {
    store: &'a S,
    key: &'a KeySpec,
    batch_size: usize,
    updates: Vec<CatalogRecord>,
    inserts: Vec<CatalogRecord>,
    pending_inserts: HashMap<RecordKey, usize>,
    flushed_inserts: HashSet<RecordKey>,
    stats: FlushStats,
}

impl<'a, S: CatalogStore + ?Sized> BatchWriter<'a, S> {
    pub fn new(store: &'a S, key: &'a KeySpec, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            store,
            key,
            batch_size,
            updates: Vec::with_capacity(batch_size),
            inserts: Vec::with_capacity(batch_size),
            pending_inserts: HashMap::new(),
            flushed_inserts: HashSet::new(),
            stats: FlushStats::default(),
        }
    }

    /// In-memory only; never touches the store.
    pub fn enqueue(&mut self, op: WriteOp) {
        match op {
            WriteOp::Update(record) => self.updates.push(record),
            WriteOp::Insert(record) => {
                if let Some(&slot) = self.pending_inserts.get(&record.key) {
                    self.inserts[slot] = record;
                } else if self.flushed_inserts.contains(&record.key) {
                    self.updates.push(record);
                } else {
                    self.pending_inserts.insert(record.key.clone(), self.inserts.len());
                    self.inserts.push(record);
                }
            }
        }
    }

    pub fn len(&self, kind: BatchKind) -> usize {
        match kind {
            BatchKind::Update => self.updates.len(),
            BatchKind::Insert => self.inserts.len(),
        }
    }

    pub fn is_full(&self, kind: BatchKind) -> bool {
        self.len(kind) >= self.batch_size
    }

    pub fn stats(&self) -> &FlushStats {
        &self.stats
    }

    /// Write the buffer of `kind` and clear it. An empty buffer is a no-op.
    pub async fn flush(&mut self, kind: BatchKind) -> Result<u64> {
        let size = self.len(kind);
        if size == 0 {
            return Ok(0);
        }
        let wrap = |e: SyncError| SyncError::Flush { kind, size, cause: Box::new(e) };
        match kind {
            BatchKind::Update => {
                let applied = self.store.bulk_upsert_by_key(self.key, &self.updates).await.map_err(wrap)?;
                self.updates.clear();
                self.stats.update_flushes += 1;
                self.stats.upserted += applied;
                tracing::info!(batch_size = size, upserted_total = self.stats.upserted, "Flushed update batch");
                Ok(applied)
            }
            BatchKind::Insert => {
                let inserted = self.store.bulk_insert(&self.inserts).await.map_err(wrap)?;
                self.inserts.clear();
                self.flushed_inserts.extend(self.pending_inserts.drain().map(|(k, _)| k));
                self.stats.insert_flushes += 1;
                self.stats.inserted += inserted;
                tracing::info!(batch_size = size, inserted_total = self.stats.inserted, "Flushed insert batch");
                Ok(inserted)
            }
        }
    }

    /// Flush whichever buffers reached the batch size. Buffers flush
    /// independently of each other.
    pub async fn flush_full(&mut self) -> Result<()> {
        for kind in [BatchKind::Update, BatchKind::Insert] {
            if self.is_full(kind) {
                self.flush(kind).await?;
            }
        }
        Ok(())
    }

    /// Flush both buffers regardless of size.
    pub async fn flush_all(&mut self) -> Result<()> {
        // Inserts first so a repeat routed to the update buffer lands after
        // the document it replaces.
        self.flush(BatchKind::Insert).await?;
        self.flush(BatchKind::Update).await?;
        Ok(())
    }
}
