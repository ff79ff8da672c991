use bson::{doc, Bson, Document};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::RecordKey;

/// Dotted field paths that together form a record's natural key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySpec {
    paths: Vec<String>,
}

impl KeySpec {
    pub fn single(path: impl Into<String>) -> Self {
        Self { paths: vec![path.into()] }
    }

    pub fn composite<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { paths: paths.into_iter().map(Into::into).collect() }
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    /// Extract the key from a source record. Every path must resolve to a
    /// non-blank string, otherwise the record has no key.
    pub fn extract(&self, record: &Map<String, Value>) -> Option<RecordKey> {
        let mut parts = Vec::with_capacity(self.paths.len());
        for path in &self.paths {
            let mut segments = path.split('.');
            let first = segments.next()?;
            let mut current = record.get(first)?;
            for segment in segments {
                current = current.as_object()?.get(segment)?;
            }
            let s = current.as_str()?;
            if s.trim().is_empty() {
                return None;
            }
            parts.push(s.to_string());
        }
        Some(RecordKey::from_parts(parts))
    }

    /// Same as [`KeySpec::extract`] for a stored document.
    pub fn extract_bson(&self, document: &Document) -> Option<RecordKey> {
        let mut parts = Vec::with_capacity(self.paths.len());
        for path in &self.paths {
            let segments: Vec<&str> = path.split('.').collect();
            let (last, parents) = segments.split_last()?;
            let mut current = document;
            for segment in parents {
                current = current.get_document(segment).ok()?;
            }
            let s = current.get_str(last).ok()?;
            if s.trim().is_empty() {
                return None;
            }
            parts.push(s.to_string());
        }
        Some(RecordKey::from_parts(parts))
    }

    /// Filter matching the single document with this key.
    pub fn filter_for(&self, key: &RecordKey) -> Document {
        let mut filter = Document::new();
        for (path, part) in self.paths.iter().zip(key.parts()) {
            filter.insert(path.clone(), part.clone());
        }
        filter
    }

    /// Filter matching every document whose key is one of `keys`.
    pub fn filter_for_any(&self, keys: &[RecordKey]) -> Document {
        if let [path] = self.paths.as_slice() {
            let values: Vec<Bson> = keys
                .iter()
                .filter_map(|k| k.parts().first().cloned())
                .map(Bson::String)
                .collect();
            let mut filter = Document::new();
            filter.insert(path.clone(), doc! { "$in": values });
            return filter;
        }
        let clauses: Vec<Bson> = keys.iter().map(|k| Bson::Document(self.filter_for(k))).collect();
        doc! { "$or": clauses }
    }

    /// Projection keeping only the key fields.
    pub fn projection(&self) -> Document {
        let mut projection = doc! { "_id": 0 };
        for path in &self.paths {
            projection.insert(path.clone(), 1);
        }
        projection
    }
}

/// Per-collection sync settings. Products and carousel slides share the engine
/// but differ in key shape, batch size and enrichment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncProfile {
    pub name: String,
    pub collection: String,
    pub key: KeySpec,
    pub batch_size: usize,
    pub numeric_fields: Vec<String>,
    pub embed: bool,
    pub soft_delete: bool,
    pub stamp_last_updated: bool,
    pub index_fields: Vec<String>,
}

pub const PRODUCT_BATCH_SIZE: usize = 1000;
pub const CAROUSEL_BATCH_SIZE: usize = 100;

impl SyncProfile {
    pub fn products() -> Self {
        Self {
            name: "products".to_string(),
            collection: "products".to_string(),
            key: KeySpec::single("sku"),
            batch_size: PRODUCT_BATCH_SIZE,
            numeric_fields: vec!["price".to_string(), "original_price".to_string()],
            embed: true,
            soft_delete: true,
            stamp_last_updated: false,
            index_fields: [
                "title",
                "sku",
                "main_category",
                "sub_category",
                "product_type",
                "availability",
                "deleted",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }

    pub fn carousel() -> Self {
        Self {
            name: "carousel".to_string(),
            collection: "carousel".to_string(),
            key: KeySpec::composite(["desktop.url", "mobile.url"]),
            batch_size: CAROUSEL_BATCH_SIZE,
            numeric_fields: Vec::new(),
            embed: false,
            soft_delete: false,
            stamp_last_updated: true,
            index_fields: vec!["timestamp".to_string(), "params.category_id".to_string()],
        }
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}
