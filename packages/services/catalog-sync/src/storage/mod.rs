pub mod memory;
pub mod mongo;

pub use memory::*;
pub use mongo::*;

use async_trait::async_trait;
use bson::{doc, Document};

use crate::models::*;

/// Document subsets the run summary counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFilter {
    All,
    Active,
    Deleted,
}

impl DocumentFilter {
    pub fn to_document(self) -> Document {
        match self {
            DocumentFilter::All => doc! {},
            DocumentFilter::Active => doc! { "deleted": false },
            DocumentFilter::Deleted => doc! { "deleted": true },
        }
    }
}

/// Operations the sync engine needs from a keyed document collection.
///
/// Implementations provide per-document atomicity only; nothing here is
/// transactional across documents or calls.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Key of every stored document. Documents whose key fields do not
    /// resolve are left out.
    async fn find_keys(&self, key: &KeySpec) -> Result<Vec<RecordKey>>;

    /// Replace-or-insert each record matched by key, in one request.
    async fn bulk_upsert_by_key(&self, key: &KeySpec, records: &[CatalogRecord]) -> Result<u64>;

    async fn bulk_insert(&self, records: &[CatalogRecord]) -> Result<u64>;

    /// Set `deleted = true` on every document whose key is in `keys`.
    /// Returns the number of documents actually modified.
    ///
    /// The MongoDB store splits `keys` into chunks of 10,000 and issues one
    /// `update_many` per chunk to stay under the server's document size
    /// limit, so a large stale set is not applied atomically.
    async fn mark_deleted(&self, key: &KeySpec, keys: &[RecordKey]) -> Result<u64>;

    /// Drop every index except the identity index.
    async fn drop_indexes(&self) -> Result<()>;

    async fn create_index(&self, field: &str) -> Result<()>;

    async fn count(&self, filter: DocumentFilter) -> Result<u64>;
}
