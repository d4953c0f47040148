use super::{CacheEntry, StorageBackend, StorageKind, key_pattern};
use crate::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Process-local storage, used for tests and for `storage = "memory"`.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    fn kind(&self) -> StorageKind {
        StorageKind::Memory
    }

    async fn put_entry(&self, entry: CacheEntry) -> Result<()> {
        _ = self.lock().insert(entry.key.clone(), entry);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.is_valid_at(Utc::now()) => Ok(Some(entry.clone())),
            Some(_) => {
                _ = entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.lock().remove(key).is_some())
    }

    async fn invalidate(&self, pattern: &str) -> Result<usize> {
        let pattern = key_pattern(pattern)?;
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|key, _| !pattern.matches(key));
        Ok(before - entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;
    use serde_json::json;

    #[tokio::test]
    async fn put_get_delete() {
        let storage = MemoryStorage::new();
        storage.put("a", json!({"x": 1}), Duration::from_secs(60)).await.unwrap();

        let entry = storage.get("a").await.unwrap().unwrap();
        assert_eq!(entry.value, json!({"x": 1}));
        assert!(storage.exists("a").await.unwrap());

        assert!(storage.delete("a").await.unwrap());
        assert!(!storage.delete("a").await.unwrap());
        assert!(storage.get("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn zero_ttl_reads_as_miss() {
        let storage = MemoryStorage::new();
        storage.put("a", json!(1), Duration::ZERO).await.unwrap();

        assert!(storage.get("a").await.unwrap().is_none());
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn last_write_wins() {
        let storage = MemoryStorage::new();
        storage.put("a", json!(1), Duration::from_secs(60)).await.unwrap();
        storage.put("a", json!(2), Duration::from_secs(60)).await.unwrap();

        assert_eq!(storage.get("a").await.unwrap().unwrap().value, json!(2));
        assert_eq!(storage.len(), 1);
    }

    #[tokio::test]
    async fn invalidate_by_pattern() {
        let storage = MemoryStorage::new();
        for key in ["trends:2024-05-01", "trends:2024-05-02", "reddit:2024-05-01:ab"] {
            storage.put(key, json!(0), Duration::from_secs(60)).await.unwrap();
        }

        assert_eq!(storage.invalidate("trends:*").await.unwrap(), 2);
        assert!(storage.exists("reddit:2024-05-01:ab").await.unwrap());
        assert_eq!(storage.invalidate("*").await.unwrap(), 1);
    }
}
