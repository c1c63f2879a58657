use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;

use crate::storage::{ObjectStore, StorageError};

/// In-process `ObjectStore` for tests. Keys are kept sorted like S3 listings.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, Bytes>>,
    fail_writes_for: Mutex<Option<String>>,
    fail_lists: Mutex<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `put` to `key` fail with `StorageError::Write`.
    pub fn fail_writes_for(&self, key: &str) {
        *self.fail_writes_for.lock().unwrap() = Some(key.to_string());
    }

    /// Makes every subsequent `list` fail with `StorageError::List`.
    pub fn fail_lists(&self) {
        *self.fail_lists.lock().unwrap() = true;
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(
        &self,
        key: &str,
        body: Bytes,
        _content_type: Option<&str>,
    ) -> Result<(), StorageError> {
        if self.fail_writes_for.lock().unwrap().as_deref() == Some(key) {
            return Err(StorageError::Write {
                key: key.to_string(),
                message: "injected failure".to_string(),
            });
        }
        self.objects.lock().unwrap().insert(key.to_string(), body);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, StorageError> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                key: key.to_string(),
            })
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        if *self.fail_lists.lock().unwrap() {
            return Err(StorageError::List {
                prefix: prefix.to_string(),
                message: "injected failure".to_string(),
            });
        }
        Ok(self
            .objects
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}
