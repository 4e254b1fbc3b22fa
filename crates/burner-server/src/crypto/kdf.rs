use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use zeroize::ZeroizeOnDrop;

/// PBKDF2 work factor. Changing it makes every stored token unreadable.
pub const PBKDF2_ROUNDS: u32 = 4096;

/// Length of a derived key in bytes.
pub const KEY_LEN: usize = 32;

const HALF: usize = KEY_LEN / 2;

/// 32-byte key derived from a passphrase and the service salt.
///
/// The first half authenticates tokens, the second half encrypts them.
#[derive(Clone, ZeroizeOnDrop)]
pub struct DerivedKey([u8; KEY_LEN]);

impl DerivedKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// HMAC-SHA256 key.
    pub fn signing_key(&self) -> &[u8] {
        &self.0[..HALF]
    }

    /// AES-128 key.
    pub fn encryption_key(&self) -> &[u8] {
        &self.0[HALF..]
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DerivedKey(..)")
    }
}

/// Derive the symmetric key for `passphrase` with PBKDF2-HMAC-SHA256.
///
/// An empty passphrase is accepted and yields the default key for `salt`;
/// the secret id is still needed to address the record.
pub fn derive_key(passphrase: &str, salt: &str) -> DerivedKey {
    let mut key = DerivedKey([0u8; KEY_LEN]);
    pbkdf2_hmac::<Sha256>(
        passphrase.as_bytes(),
        salt.as_bytes(),
        PBKDF2_ROUNDS,
        &mut key.0,
    );
    key
}
