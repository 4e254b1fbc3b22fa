use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored in redb as bincode-encoded bytes.
/// `ciphertext` is a signed token that carries its own creation timestamp;
/// the remaining fields are plaintext so metadata lookups never decrypt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretRecord {
    /// Public code handed to the creator. Never reused.
    pub id: String,
    /// Token produced by `crypto::token`. Never mutated after creation.
    pub ciphertext: String,
    /// Validity window checked against the token's embedded timestamp.
    pub ttl_seconds: u64,
    /// Unix timestamp (seconds). Bookkeeping only.
    pub created_at: i64,
    /// Unix timestamp (seconds). Bookkeeping only.
    pub updated_at: i64,
}

impl SecretRecord {
    /// Unix timestamp after which the token no longer verifies.
    pub fn expires_at(&self) -> i64 {
        let ttl = i64::try_from(self.ttl_seconds).unwrap_or(i64::MAX);
        self.created_at.saturating_add(ttl)
    }
}

/// Metadata returned by lookup and delete endpoints. Never includes the token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretMeta {
    pub id: String,
    pub ttl_seconds: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<&SecretRecord> for SecretMeta {
    fn from(record: &SecretRecord) -> Self {
        Self {
            id: record.id.clone(),
            ttl_seconds: record.ttl_seconds,
            created_at: to_datetime(record.created_at),
            updated_at: to_datetime(record.updated_at),
            expires_at: to_datetime(record.expires_at()),
        }
    }
}

fn to_datetime(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}
