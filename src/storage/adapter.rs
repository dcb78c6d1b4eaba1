//! Encrypting storage adapter
//!
//! Sits between the task store and the device [`KeyValueStore`]. The
//! session key is passed in on every call and never cached here, so a lock
//! takes effect on the very next access.

use std::sync::Arc;

use tokio::task;
use tracing::{debug, error, warn};

use super::KeyValueStore;
use crate::crypto::{self, SessionKey};
use crate::error::VaultResult;

/// Result of a write request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Encrypted and stored
    Written,
    /// Dropped because no session key is held; nothing was written
    SkippedLocked,
}

/// What the store holds under a key, judged against a candidate password
#[derive(Debug)]
pub enum StoredVault {
    /// Nothing persisted yet
    Absent,
    /// Envelope decrypted with the candidate; carries the plaintext
    Verified(String),
}

#[derive(Clone)]
pub struct VaultStorage {
    store: Arc<dyn KeyValueStore>,
}

impl VaultStorage {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// The raw store underneath
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Raw stored envelope, no decryption
    pub fn read_raw(&self, name: &str) -> VaultResult<Option<String>> {
        self.store.get(name)
    }

    /// Read and decrypt, or `None` when there is nothing usable.
    ///
    /// Returns `None` without touching the cipher when no session key is
    /// held. Format and authentication failures are logged and reported as
    /// missing data.
    pub async fn get_item(&self, name: &str, session: Option<&SessionKey>) -> Option<String> {
        let Some(session) = session else {
            debug!(key = name, "read skipped: vault locked");
            return None;
        };

        match self.verify(name, session).await {
            Ok(StoredVault::Absent) => None,
            Ok(StoredVault::Verified(plaintext)) => Some(plaintext),
            Err(e) if e.is_security_critical() => {
                warn!(key = name, error = %e, "failed to decrypt stored vault");
                None
            }
            Err(e) => {
                error!(key = name, error = %e, "failed to read stored vault");
                None
            }
        }
    }

    /// Strict read: distinguishes "nothing stored" from a failed decryption
    pub async fn verify(&self, name: &str, session: &SessionKey) -> VaultResult<StoredVault> {
        let Some(raw) = self.store.get(name)? else {
            return Ok(StoredVault::Absent);
        };

        let session = session.clone();
        let plaintext = task::spawn_blocking(move || crypto::open_str(&raw, &session)).await??;
        Ok(StoredVault::Verified(plaintext))
    }

    /// Encrypt `value` under a fresh salt and nonce and store it.
    ///
    /// Never writes while locked and never writes plaintext.
    pub async fn set_item(
        &self,
        name: &str,
        value: &str,
        session: Option<&SessionKey>,
    ) -> VaultResult<WriteOutcome> {
        // Captured before the first await; a later lock cannot pull the key
        // out from under this write.
        let Some(session) = session.cloned() else {
            debug!(key = name, "write skipped: vault locked");
            return Ok(WriteOutcome::SkippedLocked);
        };

        let plaintext = value.to_string();
        let envelope = task::spawn_blocking(move || {
            crypto::seal(plaintext.as_bytes(), &session).map(|e| e.to_string())
        })
        .await??;

        self.store.set(name, &envelope)?;
        Ok(WriteOutcome::Written)
    }

    /// Remove the stored entry; allowed in any lock state
    pub fn remove_item(&self, name: &str) -> VaultResult<()> {
        self.store.remove(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Envelope;
    use crate::error::VaultError;
    use crate::storage::MemoryStore;

    const KEY: &str = "v2-vault-storage";

    fn storage() -> (Arc<MemoryStore>, VaultStorage) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), VaultStorage::new(store))
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let (raw, storage) = storage();
        let session = SessionKey::new("pw");

        let outcome = storage.set_item(KEY, "hello", Some(&session)).await.unwrap();
        assert_eq!(outcome, WriteOutcome::Written);

        let stored = raw.get(KEY).unwrap().unwrap();
        assert!(!stored.contains("hello"));
        assert!(Envelope::decode(&stored).is_ok());

        assert_eq!(storage.get_item(KEY, Some(&session)).await.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_set_while_locked_is_skipped() {
        let (raw, storage) = storage();

        let outcome = storage.set_item(KEY, "hello", None).await.unwrap();
        assert_eq!(outcome, WriteOutcome::SkippedLocked);
        assert!(raw.is_empty());
    }

    #[tokio::test]
    async fn test_get_while_locked_returns_none() {
        let (raw, storage) = storage();
        // Not even an envelope: would fail if decryption were attempted
        raw.set(KEY, "garbage").unwrap();
        assert!(storage.get_item(KEY, None).await.is_none());
    }

    #[tokio::test]
    async fn test_get_with_wrong_password_returns_none() {
        let (_raw, storage) = storage();
        storage.set_item(KEY, "hello", Some(&SessionKey::new("right"))).await.unwrap();

        assert!(storage.get_item(KEY, Some(&SessionKey::new("wrong"))).await.is_none());
        assert!(matches!(
            storage.verify(KEY, &SessionKey::new("wrong")).await,
            Err(VaultError::AuthFailure)
        ));
    }

    #[tokio::test]
    async fn test_get_malformed_returns_none() {
        let (raw, storage) = storage();
        raw.set(KEY, "a:b").unwrap();

        let session = SessionKey::new("pw");
        assert!(storage.get_item(KEY, Some(&session)).await.is_none());
        assert!(matches!(storage.verify(KEY, &session).await, Err(VaultError::Format(_))));
    }

    #[tokio::test]
    async fn test_get_missing() {
        let (_raw, storage) = storage();
        let session = SessionKey::new("pw");
        assert!(storage.get_item(KEY, Some(&session)).await.is_none());
        assert!(matches!(storage.verify(KEY, &session).await, Ok(StoredVault::Absent)));
    }

    #[tokio::test]
    async fn test_remove_works_while_locked() {
        let (raw, storage) = storage();
        storage.set_item(KEY, "hello", Some(&SessionKey::new("pw"))).await.unwrap();

        storage.remove_item(KEY).unwrap();
        assert!(raw.get(KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_each_write_uses_fresh_envelope() {
        let (raw, storage) = storage();
        let session = SessionKey::new("pw");

        storage.set_item(KEY, "same", Some(&session)).await.unwrap();
        let first = raw.get(KEY).unwrap().unwrap();
        storage.set_item(KEY, "same", Some(&session)).await.unwrap();
        let second = raw.get(KEY).unwrap().unwrap();

        assert_ne!(first, second);
    }
}
