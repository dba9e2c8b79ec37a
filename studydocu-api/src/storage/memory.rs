use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ObjectStore, StorageError};

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: String,
}

pub struct MemoryObjectStore {
    base_url: String,
    objects: RwLock<HashMap<String, StoredObject>>,
}

impl MemoryObjectStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            objects: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.read().await.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<(), StorageError> {
        self.objects.write().await.insert(
            key.to_string(),
            StoredObject {
                body,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.objects.write().await.remove(key);
        Ok(())
    }

    async fn download_url(&self, key: &str, _file_name: &str) -> Result<String, StorageError> {
        if !self.objects.read().await.contains_key(key) {
            return Err(StorageError::NotFound(key.to_string()));
        }
        Ok(format!("{}/{}", self.base_url.trim_end_matches('/'), key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_delete() {
        let store = MemoryObjectStore::new("http://localhost/files/");
        store
            .put("documents/a/b.pdf", b"%PDF-1.4".to_vec(), "application/pdf")
            .await
            .unwrap();

        let url = store.download_url("documents/a/b.pdf", "b.pdf").await.unwrap();
        assert_eq!(url, "http://localhost/files/documents/a/b.pdf");
        assert_eq!(store.get("documents/a/b.pdf").await.unwrap().content_type, "application/pdf");

        store.delete("documents/a/b.pdf").await.unwrap();
        assert_eq!(store.len().await, 0);
        assert!(matches!(
            store.download_url("documents/a/b.pdf", "b.pdf").await,
            Err(StorageError::NotFound(_))
        ));
    }
}
