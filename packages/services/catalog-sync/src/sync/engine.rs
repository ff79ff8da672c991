use std::collections::HashSet;
use std::sync::Arc;

use futures::StreamExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::clients::*;
use crate::handlers::RecordStream;
use crate::models::*;
use crate::storage::*;
use crate::sync::batch::{BatchWriter, WriteOp};
use crate::sync::indexes::maintain_indexes;
use crate::sync::key_index::KeyIndex;

pub const DEFAULT_EMBEDDING_PARALLELISM: usize = 4;

#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    pub run_id: String,
    /// Embedding requests allowed in flight at once. Results are still
    /// consumed in source order.
    pub embedding_parallelism: usize,
    pub cancel: CancellationToken,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            run_id: generate_run_id(),
            embedding_parallelism: DEFAULT_EMBEDDING_PARALLELISM,
            cancel: CancellationToken::new(),
        }
    }
}

pub fn generate_run_id() -> String {
    format!("sync_{}", Uuid::new_v4().simple())
}

enum Prepared {
    Skipped(SkipReason),
    Ready { record: CatalogRecord, fallback: bool },
}

fn enter(summary: &mut SyncSummary, phase: SyncPhase) {
    debug_assert_eq!(summary.phase.next(), phase);
    summary.phase = phase;
    tracing::info!(run_id = %summary.run_id, collection = %summary.collection, phase = ?phase, "Sync phase");
}

/// Reconcile `records` against the pre-run snapshot `existing`.
///
/// Streams, classifies and writes every keyed record, flushes the tail,
/// soft-deletes stale keys, rebuilds indexes and returns the counts. Any
/// store write or source failure aborts the run; earlier flushes stay
/// persisted.
pub async fn reconcile(
    records: RecordStream,
    existing: &KeyIndex,
    store: &dyn CatalogStore,
    embedder: Option<&dyn EmbeddingProvider>,
    profile: &SyncProfile,
    options: &ReconcileOptions,
) -> Result<SyncSummary> {
    let start = Instant::now();
    let mut summary = SyncSummary::new(options.run_id.clone(), &profile.name, &profile.collection);
    enter(&mut summary, SyncPhase::Streaming);

    let stamp_last_updated = profile.stamp_last_updated;
    let mut prepared = records
        .map(move |item| async move {
            let value = item?;
            let mut record = match CatalogRecord::from_value(value, profile) {
                Ok(r) => r,
                Err(reason) => return Ok(Prepared::Skipped(reason)),
            };
            let mut fallback = false;
            if let Some(embedder) = embedder {
                let outcome = embed_or_zero(embedder, &record.embedding_text()).await;
                fallback = outcome.is_fallback();
                record.embedding = Some(outcome.into_vector());
            }
            if stamp_last_updated {
                record.last_updated = Some(chrono::Utc::now().to_rfc3339());
            }
            Ok::<_, SyncError>(Prepared::Ready { record, fallback })
        })
        .buffered(options.embedding_parallelism.max(1))
        .boxed();

    let mut processed: HashSet<RecordKey> = HashSet::new();
    let mut writer = BatchWriter::new(store, &profile.key, profile.batch_size);

    loop {
        let next = tokio::select! {
            biased;
            _ = options.cancel.cancelled() => {
                summary.cancelled = true;
                None
            }
            item = prepared.next() => item,
        };
        let Some(item) = next else { break };
        match item? {
            Prepared::Skipped(reason) => {
                summary.skipped += 1;
                tracing::debug!(reason = ?reason, "Skipping record");
            }
            Prepared::Ready { record, fallback } => {
                if fallback {
                    summary.embedding_fallbacks += 1;
                }
                processed.insert(record.key.clone());
                if existing.contains(&record.key) {
                    summary.updates += 1;
                    writer.enqueue(WriteOp::Update(record));
                } else {
                    summary.inserts += 1;
                    writer.enqueue(WriteOp::Insert(record));
                }
                writer.flush_full().await?;
            }
        }
    }
    // Stops the source reader and any embedding still in flight.
    drop(prepared);

    enter(&mut summary, SyncPhase::FlushingTail);
    writer.flush_all().await?;
    let stats = writer.stats().clone();
    summary.update_flushes = stats.update_flushes;
    summary.insert_flushes = stats.insert_flushes;

    if summary.cancelled {
        tracing::warn!(
            run_id = %summary.run_id,
            updates = summary.updates,
            inserts = summary.inserts,
            "Sync cancelled; enqueued batches flushed, soft-delete and index maintenance skipped"
        );
    } else {
        enter(&mut summary, SyncPhase::MarkingStale);
        if profile.soft_delete {
            let stale = existing.stale_keys(&processed);
            if !stale.is_empty() {
                summary.marked_deleted = store.mark_deleted(&profile.key, &stale).await?;
                tracing::info!(stale_keys = stale.len(), marked_deleted = summary.marked_deleted, "Marked stale documents as deleted");
            }
        }

        enter(&mut summary, SyncPhase::MaintainingIndexes);
        summary.index_failures = maintain_indexes(store, &profile.index_fields).await;
    }

    summary.total_documents = store.count(DocumentFilter::All).await?;
    summary.total_active = store.count(DocumentFilter::Active).await?;
    summary.total_deleted = store.count(DocumentFilter::Deleted).await?;
    if !summary.cancelled {
        enter(&mut summary, SyncPhase::Done);
    }
    summary.duration_ms = start.elapsed().as_millis() as u64;

    tracing::info!(
        run_id = %summary.run_id,
        collection = %summary.collection,
        updates = summary.updates,
        inserts = summary.inserts,
        marked_deleted = summary.marked_deleted,
        skipped = summary.skipped,
        embedding_fallbacks = summary.embedding_fallbacks,
        total_documents = summary.total_documents,
        total_active = summary.total_active,
        total_deleted = summary.total_deleted,
        index_failures = summary.index_failures.len(),
        duration_ms = summary.duration_ms,
        "Sync complete"
    );
    Ok(summary)
}

/// Entry point for one reconciliation run against a store and embedder.
#[derive(Clone)]
pub struct SyncEngine {
    store: Arc<dyn CatalogStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    embedding_parallelism: usize,
}

impl SyncEngine {
    pub fn new(store: Arc<dyn CatalogStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            store,
            embedder,
            embedding_parallelism: DEFAULT_EMBEDDING_PARALLELISM,
        }
    }

    pub fn with_embedding_parallelism(mut self, parallelism: usize) -> Self {
        self.embedding_parallelism = parallelism.max(1);
        self
    }

    pub async fn execute_sync(&self, profile: &SyncProfile, records: RecordStream) -> Result<SyncSummary> {
        self.execute_sync_cancellable(profile, records, CancellationToken::new()).await
    }

    /// Same as [`SyncEngine::execute_sync`], stopping early once `cancel`
    /// fires. Whatever was already enqueued is flushed before returning.
    pub async fn execute_sync_cancellable(
        &self,
        profile: &SyncProfile,
        records: RecordStream,
        cancel: CancellationToken,
    ) -> Result<SyncSummary> {
        let start = Instant::now();
        let options = ReconcileOptions {
            run_id: generate_run_id(),
            embedding_parallelism: self.embedding_parallelism,
            cancel,
        };
        tracing::info!(
            run_id = %options.run_id,
            profile = %profile.name,
            collection = %profile.collection,
            batch_size = profile.batch_size,
            phase = ?SyncPhase::LoadingKeys,
            "Starting sync execution"
        );

        let existing = KeyIndex::load(self.store.as_ref(), &profile.key).await?;
        tracing::info!(run_id = %options.run_id, existing_keys = existing.len(), "Loaded key index");

        let embedder = if profile.embed { Some(self.embedder.as_ref()) } else { None };
        let mut summary = reconcile(records, &existing, self.store.as_ref(), embedder, profile, &options).await?;
        summary.duration_ms = start.elapsed().as_millis() as u64;
        Ok(summary)
    }
}
