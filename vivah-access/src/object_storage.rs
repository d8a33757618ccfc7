use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::RwLock;

use vivah_shared::clients::minio::MinioClient;
use vivah_shared::errors::{AppError, AppResult, ErrorCode};

/// Binary store for photo bytes. `put` returns the URL the object is served from.
#[async_trait::async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> AppResult<String>;
    async fn delete(&self, key: &str) -> AppResult<()>;
}

fn storage_error(message: String) -> AppError {
    AppError::new(ErrorCode::StorageFailure, message)
}

#[async_trait::async_trait]
impl ObjectStorage for MinioClient {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> AppResult<String> {
        self.upload(key, bytes, content_type).await.map_err(storage_error)
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        MinioClient::delete(self, key).await.map_err(storage_error)
    }
}

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// In-memory object store with switchable failures, for tests.
#[derive(Debug, Default)]
pub struct MemoryObjectStorage {
    objects: RwLock<HashMap<String, StoredObject>>,
    fail_puts: AtomicBool,
    fail_deletes: AtomicBool,
    puts: AtomicUsize,
}

impl MemoryObjectStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.read().get(key).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// Number of `put` calls attempted, including failed ones.
    pub fn put_attempts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ObjectStorage for MemoryObjectStorage {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> AppResult<String> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(storage_error(format!("put {key} refused")));
        }
        self.objects.write().insert(
            key.to_string(),
            StoredObject { bytes, content_type: content_type.to_string() },
        );
        Ok(format!("memory://{key}"))
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(storage_error(format!("delete {key} refused")));
        }
        self.objects.write().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_delete() {
        let storage = MemoryObjectStorage::new();
        let url = storage.put("users/a/1.jpg", vec![1, 2, 3], "image/jpeg").await.unwrap();
        assert_eq!(url, "memory://users/a/1.jpg");
        assert_eq!(storage.get("users/a/1.jpg").unwrap().content_type, "image/jpeg");

        storage.delete("users/a/1.jpg").await.unwrap();
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn injected_failure_reports_storage_error() {
        let storage = MemoryObjectStorage::new();
        storage.fail_puts(true);
        let err = storage.put("k", vec![0], "image/jpeg").await.unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::StorageFailure));
        assert_eq!(storage.put_attempts(), 1);
        assert!(storage.is_empty());
    }
}
