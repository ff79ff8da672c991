use serde::{Deserialize, Serialize};

use crate::clients::DEFAULT_EMBEDDING_DIMENSION;
use crate::handlers::DEFAULT_CHANNEL_CAPACITY;
use crate::models::{SyncProfile, CAROUSEL_BATCH_SIZE, PRODUCT_BATCH_SIZE};
use crate::sync::DEFAULT_EMBEDDING_PARALLELISM;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub mongodb_uri: String,
    pub mongodb_retry_writes: bool,
    pub database_name: String,
    pub embeddings_service_url: String,
    pub embedding_dimension: usize,
    pub http_timeout_ms: u64,
    pub embedding_parallelism: usize,
    pub product_batch_size: usize,
    pub carousel_batch_size: usize,
    pub products_collection: String,
    pub carousel_collection: String,
    // Records buffered between the file reader and the reconciler
    pub record_channel_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup<F>(get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mongodb_uri = get("MONGODB_URI").unwrap_or_else(|| "mongodb://localhost:27017".to_string());
        let mongodb_retry_writes: bool = get("MONGODB_RETRY_WRITES").and_then(|s| s.parse().ok()).unwrap_or(true);
        let database_name = get("DATABASE_NAME").unwrap_or_else(|| "abc_electronics".to_string());
        let embeddings_service_url = get("EMBEDDINGS_SERVICE_URL").unwrap_or_else(|| "http://localhost:8090".to_string());
        let embedding_dimension: usize = get("EMBEDDING_DIMENSION").and_then(|s| s.parse().ok()).filter(|d| *d > 0).unwrap_or(DEFAULT_EMBEDDING_DIMENSION);
        let http_timeout_ms: u64 = get("HTTP_TIMEOUT_MS").and_then(|s| s.parse().ok()).unwrap_or(30000);
        let embedding_parallelism: usize = get("EMBEDDING_PARALLELISM").and_then(|s| s.parse().ok()).unwrap_or(DEFAULT_EMBEDDING_PARALLELISM).max(1);
        let product_batch_size: usize = get("PRODUCT_BATCH_SIZE").and_then(|s| s.parse().ok()).unwrap_or(PRODUCT_BATCH_SIZE).max(1);
        let carousel_batch_size: usize = get("CAROUSEL_BATCH_SIZE").and_then(|s| s.parse().ok()).unwrap_or(CAROUSEL_BATCH_SIZE).max(1);
        let products_collection = get("PRODUCTS_COLLECTION").unwrap_or_else(|| "products".to_string());
        let carousel_collection = get("CAROUSEL_COLLECTION").unwrap_or_else(|| "carousel".to_string());
        let record_channel_capacity: usize = get("RECORD_CHANNEL_CAPACITY").and_then(|s| s.parse().ok()).unwrap_or(DEFAULT_CHANNEL_CAPACITY).max(1);

        Self {
            mongodb_uri,
            mongodb_retry_writes,
            database_name,
            embeddings_service_url,
            embedding_dimension,
            http_timeout_ms,
            embedding_parallelism,
            product_batch_size,
            carousel_batch_size,
            products_collection,
            carousel_collection,
            record_channel_capacity,
        }
    }

    pub fn products_profile(&self) -> SyncProfile {
        SyncProfile::products()
            .with_collection(self.products_collection.clone())
            .with_batch_size(self.product_batch_size)
    }

    pub fn carousel_profile(&self) -> SyncProfile {
        SyncProfile::carousel()
            .with_collection(self.carousel_collection.clone())
            .with_batch_size(self.carousel_batch_size)
    }
}
