pub mod profile;
pub mod record;
pub mod sync;

pub use profile::*;
pub use record::*;
pub use sync::*;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("BSON serialization error: {0}")]
    BsonSerialization(#[from] bson::ser::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Record source error: {0}")]
    Source(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Failed to load key index: {0}")]
    KeyIndex(#[source] Box<SyncError>),

    #[error("Failed to flush {kind} batch of {size} operations: {cause}")]
    Flush {
        kind: BatchKind,
        size: usize,
        #[source]
        cause: Box<SyncError>,
    },

    #[error("Store write error: {0}")]
    Write(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;
