//! Object storage for uploaded document bytes.
//!
//! Production runs against S3 (or any S3-compatible endpoint); tests and local
//! development use the in-memory store.

mod memory;
mod s3;

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::config::{StorageBackend, StorageConfig};

pub use memory::MemoryObjectStore;
pub use s3::S3ObjectStore;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("upload failed for {key}: {message}")]
    Upload { key: String, message: String },

    #[error("delete failed for {key}: {message}")]
    Delete { key: String, message: String },

    #[error("presign failed for {key}: {message}")]
    Presign { key: String, message: String },
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<(), StorageError>;

    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Time-limited URL the client can download the object from.
    async fn download_url(&self, key: &str, file_name: &str) -> Result<String, StorageError>;
}

pub async fn connect(config: &StorageConfig) -> anyhow::Result<Arc<dyn ObjectStore>> {
    match config.backend {
        StorageBackend::S3 => {
            let store = S3ObjectStore::from_config(config).await?;
            tracing::info!(bucket = %config.bucket, "S3 object store ready");
            Ok(Arc::new(store))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory object store; uploads are lost on restart");
            Ok(Arc::new(MemoryObjectStore::new(config.public_base_url.clone())))
        }
    }
}

/// Key layout: `documents/<owner>/<sha256>-<upload>.<ext>`. The upload id keeps
/// two racing uploads of the same file from sharing an object.
pub fn document_key(owner_id: Uuid, sha256: &str, upload_id: Uuid, extension: &str) -> String {
    format!("documents/{}/{}-{}.{}", owner_id, sha256, upload_id.simple(), extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_keys_are_scoped_by_owner() {
        let owner = Uuid::nil();
        assert_eq!(
            document_key(owner, "abc123", Uuid::nil(), "pdf"),
            "documents/00000000-0000-0000-0000-000000000000/abc123-00000000000000000000000000000000.pdf"
        );
    }

    #[tokio::test]
    async fn failed_duplicate_upload_leaves_the_first_object_alone() {
        let store = MemoryObjectStore::new("http://localhost/files");
        let owner = Uuid::new_v4();
        let first = document_key(owner, "abc123", Uuid::new_v4(), "pdf");
        let second = document_key(owner, "abc123", Uuid::new_v4(), "pdf");
        assert_ne!(first, second);

        store.put(&first, b"%PDF-1.4".to_vec(), "application/pdf").await.unwrap();
        store.put(&second, b"%PDF-1.4".to_vec(), "application/pdf").await.unwrap();
        // the losing insert cleans up only its own object
        store.delete(&second).await.unwrap();

        assert!(store.get(&first).await.is_some());
        assert_eq!(store.len().await, 1);
    }
}
