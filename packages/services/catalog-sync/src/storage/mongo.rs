use async_trait::async_trait;
use futures::StreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::{ClientOptions, FindOptions, InsertManyOptions};
use mongodb::{Client as MongoClient, Collection, Database, IndexModel};

use crate::config::Config;
use crate::models::*;
use crate::storage::{CatalogStore, DocumentFilter};

/// Upper bound on keys per soft-delete statement so the filter stays well
/// under the server's document size limit.
const MARK_DELETED_CHUNK: usize = 10_000;

/// Connect to the configured database and verify the server answers.
pub async fn connect_database(cfg: &Config) -> Result<Database> {
    // Some deployments require retryWrites=false explicitly in the URI.
    let mut effective_uri = cfg.mongodb_uri.clone();
    if !cfg.mongodb_retry_writes {
        if effective_uri.contains("retryWrites=") {
            effective_uri = effective_uri
                .replace("retryWrites=true", "retryWrites=false")
                .replace("retryWrites=1", "retryWrites=false");
        } else if effective_uri.contains('?') {
            effective_uri.push_str("&retryWrites=false");
        } else {
            effective_uri.push_str("?retryWrites=false");
        }
    }
    let mut client_options = ClientOptions::parse(&effective_uri).await?;
    client_options.retry_writes = Some(cfg.mongodb_retry_writes);
    client_options.app_name = Some("catalog-sync".to_string());
    let client = MongoClient::with_options(client_options)?;
    let db = client.database(&cfg.database_name);
    db.run_command(doc! { "ping": 1 }, None).await?;
    tracing::info!(database = %cfg.database_name, "Connected to MongoDB");
    Ok(db)
}

#[derive(Clone)]
pub struct MongoCatalogStore {
    pub(crate) db: Database,
    collection: Collection<Document>,
}

impl MongoCatalogStore {
    pub fn with_db(db: Database, collection: &str) -> Self {
        let collection = db.collection::<Document>(collection);
        Self { db, collection }
    }

    pub fn collection_name(&self) -> &str {
        self.collection.name()
    }
}

fn to_documents(records: &[CatalogRecord]) -> Result<Vec<Document>> {
    records
        .iter()
        .map(|r| bson::to_document(r).map_err(SyncError::from))
        .collect()
}

fn count_field(reply: &Document, field: &str) -> u64 {
    match reply.get(field) {
        Some(Bson::Int32(n)) => (*n).max(0) as u64,
        Some(Bson::Int64(n)) => (*n).max(0) as u64,
        Some(Bson::Double(n)) => n.max(0.0) as u64,
        _ => 0,
    }
}

fn is_namespace_missing(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        mongodb::error::ErrorKind::Command(c) => c.code == 26,
        _ => false,
    }
}

#[async_trait]
impl CatalogStore for MongoCatalogStore {
    async fn find_keys(&self, key: &KeySpec) -> Result<Vec<RecordKey>> {
        let options = FindOptions::builder().projection(key.projection()).build();
        let mut cursor = self.collection.find(doc! {}, options).await?;
        let mut keys = Vec::new();
        let mut unkeyed = 0usize;
        while let Some(doc) = cursor.next().await {
            match key.extract_bson(&doc?) {
                Some(k) => keys.push(k),
                None => unkeyed += 1,
            }
        }
        if unkeyed > 0 {
            tracing::debug!(collection = %self.collection_name(), unkeyed = unkeyed, "Ignoring stored documents without a usable key");
        }
        Ok(keys)
    }

    async fn bulk_upsert_by_key(&self, key: &KeySpec, records: &[CatalogRecord]) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }
        let mut statements = Vec::with_capacity(records.len());
        for (record, replacement) in records.iter().zip(to_documents(records)?) {
            statements.push(Bson::Document(doc! {
                "q": key.filter_for(&record.key),
                "u": replacement,
                "upsert": true,
                "multi": false,
            }));
        }
        let command = doc! {
            "update": self.collection_name(),
            "updates": statements,
            "ordered": true,
        };
        let reply = self.db.run_command(command, None).await?;
        if let Ok(errors) = reply.get_array("writeErrors") {
            if !errors.is_empty() {
                return Err(SyncError::Write(format!(
                    "{} of {} upserts rejected; first: {}",
                    errors.len(),
                    records.len(),
                    errors[0]
                )));
            }
        }
        if let Ok(wc) = reply.get_document("writeConcernError") {
            return Err(SyncError::Write(format!("write concern error: {}", wc)));
        }
        let applied = count_field(&reply, "n");
        tracing::debug!(
            collection = %self.collection_name(),
            requested = records.len(),
            applied = applied,
            modified = count_field(&reply, "nModified"),
            "Bulk upsert applied"
        );
        Ok(applied)
    }

    async fn bulk_insert(&self, records: &[CatalogRecord]) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }
        let documents = to_documents(records)?;
        let options = InsertManyOptions::builder().ordered(true).build();
        let result = self.collection.insert_many(documents, options).await?;
        let inserted = result.inserted_ids.len();
        if inserted != records.len() {
            tracing::warn!(expected_count = records.len(), inserted_count = inserted, collection = %self.collection_name(), "Partial insert result");
        }
        Ok(inserted as u64)
    }

    async fn mark_deleted(&self, key: &KeySpec, keys: &[RecordKey]) -> Result<u64> {
        let mut modified = 0u64;
        for chunk in keys.chunks(MARK_DELETED_CHUNK) {
            let filter = key.filter_for_any(chunk);
            let update = doc! { "$set": { "deleted": true } };
            let result = self.collection.update_many(filter, update, None).await?;
            modified += result.modified_count;
        }
        Ok(modified)
    }

    async fn drop_indexes(&self) -> Result<()> {
        match self.collection.drop_indexes(None).await {
            Ok(()) => Ok(()),
            // Collection not created yet: nothing to drop.
            Err(e) if is_namespace_missing(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_index(&self, field: &str) -> Result<()> {
        let mut keys = Document::new();
        keys.insert(field, 1);
        self.collection
            .create_index(IndexModel::builder().keys(keys).build(), None)
            .await?;
        Ok(())
    }

    async fn count(&self, filter: DocumentFilter) -> Result<u64> {
        let n = self.collection.count_documents(filter.to_document(), None).await?;
        Ok(n)
    }
}
