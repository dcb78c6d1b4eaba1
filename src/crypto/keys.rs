//! Timevault - Key Management
//!
//! PBKDF2-HMAC-SHA256 key derivation and the per-session password secret.

use std::fmt;
use std::sync::Arc;

use pbkdf2::pbkdf2_hmac;
use secrecy::{ExposeSecret, SecretBox, SecretString};
use sha2::Sha256;

use crate::error::{VaultError, VaultResult};

/// Key length for AES-256
pub const KEY_LEN: usize = 32;

/// Nonce length for AES-GCM
pub const NONCE_LEN: usize = 12;

/// Salt length, fresh per encryption
pub const SALT_LEN: usize = 16;

/// PBKDF2 iteration count. Not stored in the envelope, so it cannot change
/// without breaking every existing vault.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Derived AES-256 key, zeroized on drop
pub struct VaultKey {
    inner: SecretBox<[u8; KEY_LEN]>,
}

impl VaultKey {
    /// Create a new vault key from bytes
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self {
            inner: SecretBox::new(Box::new(bytes)),
        }
    }

    /// Expose the key bytes (use with caution)
    pub fn expose(&self) -> &[u8; KEY_LEN] {
        self.inner.expose_secret()
    }
}

impl fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VaultKey([REDACTED])")
    }
}

/// Derive the AES-256 key for `password` and `salt`.
///
/// Deterministic: a stored salt lets a later session re-derive the same key.
pub fn derive_key(password: &str, salt: &[u8; SALT_LEN]) -> VaultKey {
    let mut okm = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, PBKDF2_ITERATIONS, &mut okm);
    let key = VaultKey::new(okm);
    zeroize::Zeroize::zeroize(&mut okm);
    key
}

/// Password-bound secret held for one unlocked session.
///
/// Every write derives a fresh key from it under a new salt, so no nonce is
/// ever used twice under the same key. Cloning shares the same secret.
#[derive(Clone)]
pub struct SessionKey {
    password: Arc<SecretString>,
}

impl SessionKey {
    pub fn new(password: &str) -> Self {
        Self {
            password: Arc::new(SecretString::from(password.to_owned())),
        }
    }

    /// Derive the encryption key for one envelope
    pub fn derive(&self, salt: &[u8; SALT_LEN]) -> VaultKey {
        derive_key(self.password.expose_secret(), salt)
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKey([REDACTED])")
    }
}

/// Fill `buf` from the OS CSPRNG
pub fn fill_random(buf: &mut [u8]) -> VaultResult<()> {
    getrandom::getrandom(buf)
        .map_err(|e| VaultError::PrimitiveUnavailable(format!("RNG failed: {}", e)))
}

/// Generate a random salt
pub fn generate_salt() -> VaultResult<[u8; SALT_LEN]> {
    let mut salt = [0u8; SALT_LEN];
    fill_random(&mut salt)?;
    Ok(salt)
}

/// Generate a random nonce for AES-GCM
pub fn generate_nonce() -> VaultResult<[u8; NONCE_LEN]> {
    let mut nonce = [0u8; NONCE_LEN];
    fill_random(&mut nonce)?;
    Ok(nonce)
}
