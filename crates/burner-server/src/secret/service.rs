//! Secret lifecycle: create, inspect, read-and-burn, delete.
//!
//! A secret lives from `create` until either one successful
//! [`SecretService::read_and_burn`] or an explicit [`SecretService::delete`].
//! Expired secrets are not swept; they stay stored, unreadable, until touched.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};
use zeroize::Zeroizing;

use super::validate::{self, Limits};
use crate::crypto::{kdf, token, DerivedKey, TokenError};
use crate::error::ServiceError;
use crate::store::{SecretMeta, SecretRecord, SecretStore, StoreError};

/// Body of every failed read, whatever the cause.
pub const UNAVAILABLE_MESSAGE: &str = "Secret doesn't exist or was already read";

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSecretRequest {
    #[serde(default)]
    pub secret: String,
    #[serde(default)]
    pub passphrase: String,
    /// Seconds.
    #[serde(default)]
    pub ttl: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSecretResponse {
    pub code: String,
    pub secret: String,
    pub expires_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReadSecretRequest {
    #[serde(default)]
    pub passphrase: String,
}

/// Why a read produced nothing. Kept for logs only; callers all see the same
/// response so the API cannot be used to probe which ids exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnavailableReason {
    Missing,
    Rejected(TokenError),
    InvalidUtf8,
    /// Verified, but another reader burned it first.
    LostRace,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Revealed(String),
    Unavailable(UnavailableReason),
}

impl ReadOutcome {
    pub fn is_revealed(&self) -> bool {
        matches!(self, Self::Revealed(_))
    }
}

/// Wire form of a [`ReadOutcome`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReadResponse {
    Message { message: String },
    Failure { code: u16, error: String },
}

impl From<ReadOutcome> for ReadResponse {
    fn from(outcome: ReadOutcome) -> Self {
        match outcome {
            ReadOutcome::Revealed(message) => Self::Message { message },
            ReadOutcome::Unavailable(_) => Self::Failure {
                code: 404,
                error: UNAVAILABLE_MESSAGE.to_owned(),
            },
        }
    }
}

/// New public secret code: a UUIDv7, so ids sort by creation time.
pub fn generate_id() -> String {
    uuid7::uuid7().to_string()
}

#[derive(Clone)]
pub struct SecretService {
    store: Arc<dyn SecretStore>,
    salt: Arc<str>,
    limits: Limits,
    clock: Arc<dyn Clock>,
}

impl SecretService {
    pub fn new(store: Arc<dyn SecretStore>, salt: impl Into<String>, limits: Limits) -> Self {
        Self {
            store,
            salt: Arc::from(salt.into()),
            limits,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Validate, encrypt and persist a new secret.
    pub async fn create(
        &self,
        req: CreateSecretRequest,
    ) -> Result<CreateSecretResponse, ServiceError> {
        let now = self.clock.now();
        let ttl = validate::check_create(&req.secret, req.ttl, &self.limits, now)?;

        let id = generate_id();
        let key = self.key_for(&req.passphrase).await?;
        let ciphertext = token::encrypt_at(
            req.secret.as_bytes(),
            &key,
            now.timestamp(),
            &token::random_iv(),
        )
        .map_err(|e| ServiceError::Internal(format!("encrypt secret: {e}")))?;

        self.store
            .put(SecretRecord {
                id: id.clone(),
                ciphertext,
                ttl_seconds: ttl.seconds,
                created_at: now.timestamp(),
                updated_at: now.timestamp(),
            })
            .await
            .map_err(ServiceError::Storage)?;

        info!(id = %id, ttl_seconds = ttl.seconds, "secret created");
        Ok(CreateSecretResponse {
            code: id,
            secret: req.secret,
            expires_at: ttl.expires_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        })
    }

    /// Metadata only. Never decrypts and never burns.
    pub async fn get(&self, id: &str) -> Result<SecretMeta, ServiceError> {
        let record = self.store.get(id).await?;
        Ok(SecretMeta::from(&record))
    }

    /// Decrypt a secret and destroy it.
    ///
    /// Verification failures leave the record in place so a mistyped
    /// passphrase can be retried until the token expires. On success the
    /// plaintext is released only to the caller whose delete removed the row.
    pub async fn read_and_burn(
        &self,
        id: &str,
        req: ReadSecretRequest,
    ) -> Result<ReadOutcome, ServiceError> {
        // Derive before the lookup so unknown ids cost the same as known ones.
        let key = self.key_for(&req.passphrase).await?;
        let record = match self.store.get(id).await {
            Ok(record) => record,
            Err(StoreError::NotFound) => return Ok(unavailable(id, UnavailableReason::Missing)),
            Err(e) => return Err(ServiceError::Storage(e)),
        };

        let ttl = Duration::from_secs(record.ttl_seconds);
        let plaintext = match token::open(&record.ciphertext, ttl, &key, self.clock.now()) {
            Ok(bytes) => Zeroizing::new(bytes),
            Err(e) => return Ok(unavailable(id, UnavailableReason::Rejected(e))),
        };
        let Ok(message) = std::str::from_utf8(&plaintext).map(str::to_owned) else {
            return Ok(unavailable(id, UnavailableReason::InvalidUtf8));
        };

        match self.store.delete(id).await {
            Ok(_) => {
                info!(id = %id, "secret burned");
                Ok(ReadOutcome::Revealed(message))
            }
            Err(StoreError::NotFound) => Ok(unavailable(id, UnavailableReason::LostRace)),
            Err(source) => {
                error!(
                    id = %id,
                    error = %source,
                    "secret decrypted but not burned; reconcile the store manually"
                );
                Err(ServiceError::BurnFailed {
                    id: id.to_owned(),
                    source,
                })
            }
        }
    }

    /// Remove a secret unconditionally, returning what it looked like.
    pub async fn delete(&self, id: &str) -> Result<SecretMeta, ServiceError> {
        let record = self.store.delete(id).await?;
        info!(id = %id, "secret deleted");
        Ok(SecretMeta::from(&record))
    }

    pub async fn count(&self) -> Result<usize, ServiceError> {
        Ok(self.store.count().await?)
    }

    /// PBKDF2 is deliberately slow; keep it off the async workers.
    async fn key_for(&self, passphrase: &str) -> Result<DerivedKey, ServiceError> {
        let passphrase = Zeroizing::new(passphrase.to_owned());
        let salt = Arc::clone(&self.salt);
        tokio::task::spawn_blocking(move || kdf::derive_key(&passphrase, &salt))
            .await
            .map_err(|e| ServiceError::Internal(format!("key derivation task: {e}")))
    }
}

fn unavailable(id: &str, reason: UnavailableReason) -> ReadOutcome {
    debug!(id = %id, ?reason, "secret not revealed");
    ReadOutcome::Unavailable(reason)
}
