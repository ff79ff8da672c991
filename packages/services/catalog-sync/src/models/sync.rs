use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BatchKind {
    Update,
    Insert,
}

impl fmt::Display for BatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchKind::Update => f.write_str("update"),
            BatchKind::Insert => f.write_str("insert"),
        }
    }
}

/// Stages of one reconciliation run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SyncPhase {
    LoadingKeys,
    Streaming,
    FlushingTail,
    MarkingStale,
    MaintainingIndexes,
    Done,
}

impl SyncPhase {
    pub fn next(self) -> Self {
        match self {
            SyncPhase::LoadingKeys => SyncPhase::Streaming,
            SyncPhase::Streaming => SyncPhase::FlushingTail,
            SyncPhase::FlushingTail => SyncPhase::MarkingStale,
            SyncPhase::MarkingStale => SyncPhase::MaintainingIndexes,
            SyncPhase::MaintainingIndexes | SyncPhase::Done => SyncPhase::Done,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexFailure {
    pub field: String,
    pub message: String,
}

/// Structured end-of-run report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSummary {
    pub run_id: String,
    pub profile: String,
    pub collection: String,
    pub updates: u64,
    pub inserts: u64,
    pub marked_deleted: u64,
    pub skipped: u64,
    pub embedding_fallbacks: u64,
    pub update_flushes: u64,
    pub insert_flushes: u64,
    pub total_documents: u64,
    pub total_active: u64,
    pub total_deleted: u64,
    pub index_failures: Vec<IndexFailure>,
    pub cancelled: bool,
    pub phase: SyncPhase,
    pub duration_ms: u64,
}

impl SyncSummary {
    pub fn new(run_id: String, profile: &str, collection: &str) -> Self {
        Self {
            run_id,
            profile: profile.to_string(),
            collection: collection.to_string(),
            updates: 0,
            inserts: 0,
            marked_deleted: 0,
            skipped: 0,
            embedding_fallbacks: 0,
            update_flushes: 0,
            insert_flushes: 0,
            total_documents: 0,
            total_active: 0,
            total_deleted: 0,
            index_failures: Vec::new(),
            cancelled: false,
            phase: SyncPhase::LoadingKeys,
            duration_ms: 0,
        }
    }

    /// True when every index was recreated.
    pub fn fully_indexed(&self) -> bool {
        self.index_failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_advance_without_skipping() {
        let mut phase = SyncPhase::LoadingKeys;
        let mut seen = vec![phase];
        while phase != SyncPhase::Done {
            phase = phase.next();
            seen.push(phase);
        }
        assert_eq!(
            seen,
            vec![
                SyncPhase::LoadingKeys,
                SyncPhase::Streaming,
                SyncPhase::FlushingTail,
                SyncPhase::MarkingStale,
                SyncPhase::MaintainingIndexes,
                SyncPhase::Done,
            ]
        );
        assert_eq!(SyncPhase::Done.next(), SyncPhase::Done);
    }
}
