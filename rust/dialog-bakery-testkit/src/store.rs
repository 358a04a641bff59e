use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dialog_bakery::{MultiOpStore, Operation, RootKey, RootKeyStore, StoreError};
use thiserror::Error;

/// The failure [`BrokenStore`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("store unavailable")]
pub struct Unavailable;

/// A root key and multi-op store whose backend is always down.
#[derive(Debug, Clone, Default)]
pub struct BrokenStore {
    calls: Arc<AtomicUsize>,
}

impl BrokenStore {
    /// A fresh broken store.
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times the store was called.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail<T>(&self) -> Result<T, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::backend(Unavailable))
    }
}

#[async_trait]
impl RootKeyStore for BrokenStore {
    async fn get(&self, _storage_id: &[u8]) -> Result<Option<RootKey>, StoreError> {
        self.fail()
    }

    async fn new_root_key(&self) -> Result<(RootKey, Vec<u8>), StoreError> {
        self.fail()
    }
}

#[async_trait]
impl MultiOpStore for BrokenStore {
    async fn put(&self, _key: &str, _operations: &[Operation], _expiry: DateTime<Utc>) -> Result<(), StoreError> {
        self.fail()
    }

    async fn get(&self, _key: &str) -> Result<Vec<Operation>, StoreError> {
        self.fail()
    }
}
