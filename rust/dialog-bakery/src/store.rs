//! Root key and multi-op stores.

use std::{
    collections::HashMap,
    error::Error,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::RngCore;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::{Operation, RootKey};

/// Length of root keys minted by [`MemoryRootKeyStore`].
pub const ROOT_KEY_LENGTH: usize = 24;

/// Errors raised by stores.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The requested entry is absent or expired.
    #[error("not found")]
    NotFound,

    /// The backend failed.
    #[error("store backend error: {0}")]
    Backend(#[source] Arc<dyn Error + Send + Sync>),
}

impl StoreError {
    /// Wraps a backend failure.
    pub fn backend(error: impl Error + Send + Sync + 'static) -> Self {
        Self::Backend(Arc::new(error))
    }
}

/// Storage of root keys by storage id.
#[async_trait]
pub trait RootKeyStore: Send + Sync {
    /// Looks up a root key. `Ok(None)` means the key is unknown and tokens
    /// rooted in it are not trusted.
    async fn get(&self, storage_id: &[u8]) -> Result<Option<RootKey>, StoreError>;

    /// Creates and stores a fresh root key, returning it with its storage
    /// id.
    async fn new_root_key(&self) -> Result<(RootKey, Vec<u8>), StoreError>;
}

/// Storage of the operation sets behind multi-op entities.
#[async_trait]
pub trait MultiOpStore: Send + Sync {
    /// Records `operations` under `key` until `expiry`. Putting the same key
    /// again must leave the stored operations unchanged.
    async fn put(&self, key: &str, operations: &[Operation], expiry: DateTime<Utc>) -> Result<(), StoreError>;

    /// The operations stored under `key`, or [`StoreError::NotFound`] when
    /// absent or expired.
    async fn get(&self, key: &str) -> Result<Vec<Operation>, StoreError>;
}

/// A [`RootKeyStore`] that keeps keys in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryRootKeyStore {
    keys: Arc<RwLock<HashMap<Vec<u8>, RootKey>>>,
    next_id: Arc<AtomicU64>,
}

impl MemoryRootKeyStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `key` under `storage_id`.
    pub async fn insert(&self, storage_id: impl Into<Vec<u8>>, key: RootKey) {
        self.keys.write().await.insert(storage_id.into(), key);
    }

    /// Forgets the key under `storage_id`.
    pub async fn remove(&self, storage_id: &[u8]) -> Option<RootKey> {
        self.keys.write().await.remove(storage_id)
    }

    /// Number of stored keys.
    pub async fn len(&self) -> usize {
        self.keys.read().await.len()
    }

    /// True when no keys are stored.
    pub async fn is_empty(&self) -> bool {
        self.keys.read().await.is_empty()
    }
}

#[async_trait]
impl RootKeyStore for MemoryRootKeyStore {
    async fn get(&self, storage_id: &[u8]) -> Result<Option<RootKey>, StoreError> {
        Ok(self.keys.read().await.get(storage_id).cloned())
    }

    async fn new_root_key(&self) -> Result<(RootKey, Vec<u8>), StoreError> {
        let mut bytes = vec![0u8; ROOT_KEY_LENGTH];
        rand::thread_rng().fill_bytes(&mut bytes);
        let key = RootKey::new(bytes);

        let storage_id = self
            .next_id
            .fetch_add(1, Ordering::Relaxed)
            .to_string()
            .into_bytes();
        self.keys
            .write()
            .await
            .insert(storage_id.clone(), key.clone());
        Ok((key, storage_id))
    }
}

#[derive(Debug, Clone)]
struct MultiOpEntry {
    operations: Vec<Operation>,
    expiry: DateTime<Utc>,
}

/// A [`MultiOpStore`] that keeps entries in memory.
///
/// Expired entries are pruned whenever a new entry is put.
#[derive(Debug, Clone, Default)]
pub struct MemoryMultiOpStore {
    entries: Arc<RwLock<HashMap<String, MultiOpEntry>>>,
}

impl MemoryMultiOpStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including expired ones not yet pruned.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// True when no entries are stored.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// The expiry recorded for `key`, expired or not.
    pub async fn expiry(&self, key: &str) -> Option<DateTime<Utc>> {
        self.entries.read().await.get(key).map(|entry| entry.expiry)
    }
}

#[async_trait]
impl MultiOpStore for MemoryMultiOpStore {
    async fn put(&self, key: &str, operations: &[Operation], expiry: DateTime<Utc>) -> Result<(), StoreError> {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| now < entry.expiry);
        match entries.get_mut(key) {
            Some(entry) => entry.expiry = entry.expiry.max(expiry),
            None => {
                entries.insert(
                    key.to_string(),
                    MultiOpEntry {
                        operations: operations.to_vec(),
                        expiry,
                    },
                );
            }
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<Operation>, StoreError> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(entry) if Utc::now() < entry.expiry => Ok(entry.operations.clone()),
            _ => Err(StoreError::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use pretty_assertions::assert_eq;
    use testresult::TestResult;

    #[tokio::test]
    async fn it_mints_distinct_root_keys() -> TestResult {
        let store = MemoryRootKeyStore::new();
        let (first, first_id) = store.new_root_key().await?;
        let (second, second_id) = store.new_root_key().await?;

        assert_eq!(first.as_bytes().len(), ROOT_KEY_LENGTH);
        assert_ne!(first, second);
        assert_ne!(first_id, second_id);
        assert_eq!(store.get(&first_id).await?, Some(first));
        assert_eq!(store.get(b"missing").await?, None);
        assert_eq!(store.len().await, 2);
        Ok(())
    }

    #[tokio::test]
    async fn it_hides_expired_operation_sets() -> TestResult {
        let store = MemoryMultiOpStore::new();
        let ops = vec![Operation::new("e1", "read")];

        store.put("live", &ops, Utc::now() + TimeDelta::minutes(1)).await?;
        store.put("dead", &ops, Utc::now() - TimeDelta::seconds(1)).await?;

        assert_eq!(store.get("live").await?, ops);
        assert!(matches!(store.get("dead").await, Err(StoreError::NotFound)));
        assert!(matches!(store.get("absent").await, Err(StoreError::NotFound)));
        Ok(())
    }

    #[tokio::test]
    async fn it_prunes_expired_entries_on_put() -> TestResult {
        let store = MemoryMultiOpStore::new();
        let ops = vec![Operation::new("e1", "read")];

        store.put("dead", &ops, Utc::now() - TimeDelta::seconds(1)).await?;
        store.put("live", &ops, Utc::now() + TimeDelta::minutes(1)).await?;

        assert_eq!(store.len().await, 1);
        assert_eq!(store.expiry("dead").await, None);
        assert_eq!(store.get("live").await?, ops);
        Ok(())
    }

    #[tokio::test]
    async fn it_extends_expiry_on_repeated_puts() -> TestResult {
        let store = MemoryMultiOpStore::new();
        let ops = vec![Operation::new("e1", "read")];
        let soon = Utc::now() + TimeDelta::minutes(1);
        let later = soon + TimeDelta::minutes(5);

        store.put("key", &ops, later).await?;
        store.put("key", &[], soon).await?;

        assert_eq!(store.expiry("key").await, Some(later));
        assert_eq!(store.get("key").await?, ops);
        Ok(())
    }
}
