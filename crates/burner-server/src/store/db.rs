use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use redb::{Database, ReadableTable, TableDefinition};
use tracing::debug;

use super::model::SecretRecord;
use super::{SecretStore, StoreError, StoreResult};

const SECRETS: TableDefinition<&str, &[u8]> = TableDefinition::new("secrets");

/// Leading byte of every stored value, ahead of the bincode payload.
const RECORD_V1_MARKER: u8 = 0x01;

/// Thread-safe handle to the redb store.
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path).context("open redb database")?;

        let write_txn = db.begin_write()?;
        write_txn.open_table(SECRETS)?;
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    fn load(&self, id: &str) -> Result<Option<SecretRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SECRETS)?;
        let raw_bytes: Option<Vec<u8>> = table.get(id)?.map(|guard| guard.value().to_vec());
        raw_bytes.as_deref().map(decode).transpose()
    }

    /// Insert `record` unless its id is taken. Returns false on collision.
    fn insert_new(&self, record: &SecretRecord) -> Result<bool> {
        let bytes = encode(record)?;
        let write_txn = self.db.begin_write()?;
        let inserted = {
            let mut table = write_txn.open_table(SECRETS)?;
            let taken = table.get(record.id.as_str())?.is_some();
            if !taken {
                table.insert(record.id.as_str(), bytes.as_slice())?;
            }
            !taken
        };
        write_txn.commit()?;
        Ok(inserted)
    }

    /// Remove a record inside one write transaction, returning its prior value.
    /// redb serializes write transactions, so concurrent callers cannot both
    /// observe the same row.
    fn take(&self, id: &str) -> Result<Option<SecretRecord>> {
        let write_txn = self.db.begin_write()?;
        let removed: Option<Vec<u8>> = {
            let mut table = write_txn.open_table(SECRETS)?;
            let removed = table.remove(id)?.map(|guard| guard.value().to_vec());
            removed
        };
        write_txn.commit()?;
        removed.as_deref().map(decode).transpose()
    }

    fn len(&self) -> Result<usize> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SECRETS)?;
        let mut n = 0usize;
        for item in table.iter()? {
            item?;
            n += 1;
        }
        Ok(n)
    }
}

#[async_trait]
impl SecretStore for RedbStore {
    async fn get(&self, id: &str) -> StoreResult<SecretRecord> {
        self.load(id)?.ok_or(StoreError::NotFound)
    }

    async fn put(&self, record: SecretRecord) -> StoreResult<()> {
        if !self.insert_new(&record)? {
            return Err(StoreError::AlreadyExists(record.id));
        }
        debug!(id = %record.id, "stored secret");
        Ok(())
    }

    async fn delete(&self, id: &str) -> StoreResult<SecretRecord> {
        let record = self.take(id)?.ok_or(StoreError::NotFound)?;
        debug!(id = %id, "removed secret");
        Ok(record)
    }

    async fn count(&self) -> StoreResult<usize> {
        Ok(self.len()?)
    }
}

/// Encode a record as `[RECORD_V1_MARKER] + bincode(record)`.
fn encode(record: &SecretRecord) -> Result<Vec<u8>> {
    let payload = bincode::serde::encode_to_vec(record, bincode::config::standard())
        .context("bincode encode")?;
    let mut out = Vec::with_capacity(1 + payload.len());
    out.push(RECORD_V1_MARKER);
    out.extend_from_slice(&payload);
    Ok(out)
}

fn decode(bytes: &[u8]) -> Result<SecretRecord> {
    match bytes.split_first() {
        None => anyhow::bail!("empty record"),
        Some((&RECORD_V1_MARKER, payload)) => {
            let (record, _) =
                bincode::serde::decode_from_slice(payload, bincode::config::standard())
                    .context("bincode decode")?;
            Ok(record)
        }
        Some((marker, _)) => anyhow::bail!("unknown record format {marker:#04x}"),
    }
}
