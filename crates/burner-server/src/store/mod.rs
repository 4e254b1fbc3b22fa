pub mod db;
pub mod memory;
pub mod model;

use async_trait::async_trait;

pub use db::RedbStore;
pub use memory::MemoryStore;
pub use model::{SecretMeta, SecretRecord};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("secret not found")]
    NotFound,
    #[error("secret {0} already exists")]
    AlreadyExists(String),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Durable keyed storage of secret records.
///
/// Every operation reports a missing record as [`StoreError::NotFound`],
/// distinct from backend failures.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get(&self, id: &str) -> StoreResult<SecretRecord>;

    /// Persist a new record. Fails with `AlreadyExists` instead of overwriting.
    async fn put(&self, record: SecretRecord) -> StoreResult<()>;

    /// Atomically remove a record and return what was stored.
    ///
    /// When several callers race on the same id, exactly one receives the
    /// record and the rest see `NotFound`. The burn protocol relies on this.
    async fn delete(&self, id: &str) -> StoreResult<SecretRecord>;

    async fn count(&self) -> StoreResult<usize>;
}
