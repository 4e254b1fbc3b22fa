use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::model::SecretRecord;
use super::{SecretStore, StoreError, StoreResult};

/// In-process store with the same contract as [`super::RedbStore`].
/// Deterministic and dependency-free, which makes it the default for tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Arc<Mutex<BTreeMap<String, SecretRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, BTreeMap<String, SecretRecord>>> {
        self.records
            .lock()
            .map_err(|_| StoreError::Backend(anyhow::anyhow!("memory store lock poisoned")))
    }
}

#[async_trait]
impl SecretStore for MemoryStore {
    async fn get(&self, id: &str) -> StoreResult<SecretRecord> {
        self.lock()?.get(id).cloned().ok_or(StoreError::NotFound)
    }

    async fn put(&self, record: SecretRecord) -> StoreResult<()> {
        let mut records = self.lock()?;
        if records.contains_key(&record.id) {
            return Err(StoreError::AlreadyExists(record.id));
        }
        records.insert(record.id.clone(), record);
        Ok(())
    }

    async fn delete(&self, id: &str) -> StoreResult<SecretRecord> {
        self.lock()?.remove(id).ok_or(StoreError::NotFound)
    }

    async fn count(&self) -> StoreResult<usize> {
        Ok(self.lock()?.len())
    }
}
