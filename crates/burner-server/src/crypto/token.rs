//! Self-verifying, self-expiring secret tokens.
//!
//! Layout (Fernet, version `0x80`), URL-safe base64 with padding on the wire:
//!
//! ```text
//! version (1) | timestamp (8, big-endian unix seconds) | IV (16)
//!     | AES-128-CBC ciphertext, PKCS#7 padded (16 * n) | HMAC-SHA256 (32)
//! ```
//!
//! The HMAC covers every byte before it. The validity window is not part of
//! the token: callers pass it in when opening, so the stored record's TTL and
//! the signed timestamp must agree for a token to be live.

use std::time::Duration;

use aes::Aes128;
use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;

use super::kdf::DerivedKey;

type HmacSha256 = Hmac<Sha256>;
type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

pub const VERSION: u8 = 0x80;
pub const IV_LEN: usize = 16;

/// Tokens stamped further than this into the future are rejected.
pub const MAX_CLOCK_SKEW_SECS: i64 = 60;

const TIMESTAMP_LEN: usize = 8;
const BLOCK_LEN: usize = 16;
const MAC_LEN: usize = 32;
const HEADER_LEN: usize = 1 + TIMESTAMP_LEN + IV_LEN;
const MIN_TOKEN_LEN: usize = HEADER_LEN + BLOCK_LEN + MAC_LEN;

/// Why a token could not be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token is not valid base64 or has a bad length")]
    Malformed,
    #[error("unsupported token version {0:#04x}")]
    UnsupportedVersion(u8),
    #[error("token has expired")]
    Expired,
    #[error("token timestamp is too far in the future")]
    FromTheFuture,
    #[error("token signature does not match")]
    BadSignature,
    #[error("token payload has invalid padding")]
    BadPadding,
    #[error("key material has the wrong length")]
    InvalidKey,
}

/// Fresh random IV from the OS RNG.
pub fn random_iv() -> [u8; IV_LEN] {
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);
    iv
}

/// Encrypt and sign `plaintext`, stamped with the current time.
pub fn encrypt(plaintext: &[u8], key: &DerivedKey) -> Result<String, TokenError> {
    encrypt_at(plaintext, key, Utc::now().timestamp(), &random_iv())
}

/// Encrypt and sign `plaintext` with an explicit timestamp and IV.
///
/// Only fails if the key halves have the wrong length, which a
/// [`DerivedKey`] rules out.
pub fn encrypt_at(
    plaintext: &[u8],
    key: &DerivedKey,
    timestamp: i64,
    iv: &[u8; IV_LEN],
) -> Result<String, TokenError> {
    let ciphertext = Aes128CbcEnc::new_from_slices(key.encryption_key(), iv)
        .map_err(|_| TokenError::InvalidKey)?
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut out = Vec::with_capacity(HEADER_LEN + ciphertext.len() + MAC_LEN);
    out.push(VERSION);
    // Pre-epoch timestamps have no representation; clamp to zero.
    out.extend_from_slice(&u64::try_from(timestamp).unwrap_or(0).to_be_bytes());
    out.extend_from_slice(iv);
    out.extend_from_slice(&ciphertext);

    let mut mac = signer(key)?;
    mac.update(&out);
    out.extend_from_slice(&mac.finalize().into_bytes());

    Ok(URL_SAFE.encode(out))
}

/// Verify and decrypt `token`, returning `None` on any failure.
pub fn verify_and_decrypt(
    token: &str,
    ttl: Duration,
    key: &DerivedKey,
    now: DateTime<Utc>,
) -> Option<Vec<u8>> {
    open(token, ttl, key, now).ok()
}

/// Verify and decrypt `token`, reporting why it was rejected.
///
/// The MAC is checked in constant time before any decryption happens, so a
/// wrong key never produces plaintext bytes or padding errors.
pub fn open(
    token: &str,
    ttl: Duration,
    key: &DerivedKey,
    now: DateTime<Utc>,
) -> Result<Vec<u8>, TokenError> {
    let raw = URL_SAFE
        .decode(token.trim())
        .map_err(|_| TokenError::Malformed)?;
    if raw.len() < MIN_TOKEN_LEN || (raw.len() - HEADER_LEN - MAC_LEN) % BLOCK_LEN != 0 {
        return Err(TokenError::Malformed);
    }
    if raw[0] != VERSION {
        return Err(TokenError::UnsupportedVersion(raw[0]));
    }

    let mut stamp = [0u8; TIMESTAMP_LEN];
    stamp.copy_from_slice(&raw[1..1 + TIMESTAMP_LEN]);
    let issued = i64::try_from(u64::from_be_bytes(stamp)).map_err(|_| TokenError::Malformed)?;
    let now = now.timestamp();
    let ttl = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
    if now > issued.saturating_add(ttl) {
        return Err(TokenError::Expired);
    }
    if issued > now.saturating_add(MAX_CLOCK_SKEW_SECS) {
        return Err(TokenError::FromTheFuture);
    }

    let (signed, tag) = raw.split_at(raw.len() - MAC_LEN);
    let mut mac = signer(key)?;
    mac.update(signed);
    mac.verify_slice(tag).map_err(|_| TokenError::BadSignature)?;

    let iv = &signed[1 + TIMESTAMP_LEN..HEADER_LEN];
    Aes128CbcDec::new_from_slices(key.encryption_key(), iv)
        .map_err(|_| TokenError::InvalidKey)?
        .decrypt_padded_vec_mut::<Pkcs7>(&signed[HEADER_LEN..])
        .map_err(|_| TokenError::BadPadding)
}

fn signer(key: &DerivedKey) -> Result<HmacSha256, TokenError> {
    HmacSha256::new_from_slice(key.signing_key()).map_err(|_| TokenError::InvalidKey)
}
