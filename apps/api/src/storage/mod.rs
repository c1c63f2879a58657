//! Object storage — the only persistence the service has.
//!
//! Handlers talk to an `Arc<dyn ObjectStore>` held in `AppState`. Production
//! uses `S3Store`; tests inject `memory::MemoryStore`.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub mod keys;
pub mod s3;

#[cfg(test)]
pub mod memory;

pub use s3::S3Store;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {key}")]
    NotFound { key: String },

    #[error("failed to read {key}: {message}")]
    Read { key: String, message: String },

    #[error("failed to write {key}: {message}")]
    Write { key: String, message: String },

    #[error("failed to list {prefix}: {message}")]
    List { prefix: String, message: String },
}

/// Minimal object-store surface: last-write-wins puts, whole-object gets,
/// and prefix listing. No retries beyond what the backend SDK performs.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(
        &self,
        key: &str,
        body: Bytes,
        content_type: Option<&str>,
    ) -> Result<(), StorageError>;

    async fn get(&self, key: &str) -> Result<Bytes, StorageError>;

    /// Returns full keys of every object whose key starts with `prefix`,
    /// in the store's lexicographic order.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}

/// Reads an object and decodes it as text. Invalid UTF-8 sequences are
/// replaced rather than rejected.
pub async fn read_text(store: &dyn ObjectStore, key: &str) -> Result<String, StorageError> {
    let body = store.get(key).await?;
    Ok(String::from_utf8_lossy(&body).into_owned())
}
