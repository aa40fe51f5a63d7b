//! In-Memory Storage
//!
//! HashMap-backed storage. Data does not survive a restart.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::StorageBackend;
use crate::cache::CacheRecord;
use crate::error::Result;

// == In-Memory Storage ==
/// Process-local storage backend.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    entries: RwLock<HashMap<String, CacheRecord>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held, independent of the cache's counter.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl StorageBackend for InMemoryStorage {
    async fn insert(&self, key: &str, record: CacheRecord) -> Result<()> {
        self.entries.write().await.insert(key.to_string(), record);
        Ok(())
    }

    async fn find(&self, key: &str) -> Result<Option<CacheRecord>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn each(&self, visit: &mut (dyn FnMut(Result<(String, CacheRecord)>) + Send)) {
        // Snapshot first so the visitor never runs under the lock
        let mut snapshot: Vec<(String, CacheRecord)> = {
            let entries = self.entries.read().await;
            entries
                .iter()
                .map(|(key, record)| (key.clone(), record.clone()))
                .collect()
        };
        snapshot.sort_by(|a, b| a.0.cmp(&b.0));

        for entry in snapshot {
            visit(Ok(entry));
        }
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CachedBody;

    fn record(body: &str, expires_at: i64) -> CacheRecord {
        CacheRecord {
            body: CachedBody::from(body),
            expires_at,
        }
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let storage = InMemoryStorage::new();
        storage.insert("/a", record("a", 10)).await.unwrap();

        let found = storage.find("/a").await.unwrap();
        assert_eq!(found, Some(record("a", 10)));
        assert_eq!(storage.len().await, 1);
    }

    #[tokio::test]
    async fn test_find_missing_is_none() {
        let storage = InMemoryStorage::new();
        assert!(storage.find("/missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_overwrites() {
        let storage = InMemoryStorage::new();
        storage.insert("/a", record("old", 10)).await.unwrap();
        storage.insert("/a", record("new", 20)).await.unwrap();

        assert_eq!(storage.find("/a").await.unwrap(), Some(record("new", 20)));
        assert_eq!(storage.len().await, 1);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let storage = InMemoryStorage::new();
        storage.insert("/a", record("a", 10)).await.unwrap();

        storage.remove("/a").await.unwrap();
        storage.remove("/a").await.unwrap();
        storage.remove("/never-there").await.unwrap();

        assert!(storage.is_empty().await);
    }

    #[tokio::test]
    async fn test_each_visits_all_in_key_order() {
        let storage = InMemoryStorage::new();
        storage.insert("/b", record("b", 2)).await.unwrap();
        storage.insert("/a", record("a", 1)).await.unwrap();
        storage.insert("/c", record("c", 3)).await.unwrap();

        let mut visited = Vec::new();
        storage
            .each(&mut |entry| {
                let (key, record) = entry.unwrap();
                visited.push((key, record.expires_at));
            })
            .await;

        assert_eq!(
            visited,
            vec![
                ("/a".to_string(), 1),
                ("/b".to_string(), 2),
                ("/c".to_string(), 3)
            ]
        );
    }

    #[tokio::test]
    async fn test_each_on_empty_storage() {
        let storage = InMemoryStorage::new();
        let mut calls = 0;
        storage.each(&mut |_| calls += 1).await;
        assert_eq!(calls, 0);
    }
}
