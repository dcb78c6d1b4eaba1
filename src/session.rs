//! Timevault - Vault Session Controller
//!
//! Owns the session key and the LOCKED/UNLOCKED state machine. Only
//! [`VaultSession::unlock_vault`] and [`VaultSession::lock_vault`] change the
//! state. Plaintext tasks exist in memory only while unlocked.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::config::VaultConfig;
use crate::crypto::SessionKey;
use crate::error::{VaultError, VaultResult};
use crate::storage::adapter::StoredVault;
use crate::storage::{FileStore, KeyValueStore, VaultStorage, WriteOutcome};
use crate::tasks::{PersistedSnapshot, Task, TaskDuration, TaskList, TaskUpdate};

/// Vault state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultState {
    Locked,
    Unlocked,
}

/// Observable view of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionState {
    pub locked: bool,
    pub derived_key_present: bool,
}

pub struct VaultSession {
    storage: VaultStorage,
    storage_key: String,
    /// Present only while unlocked
    session: Option<SessionKey>,
    state: VaultState,
    tasks: TaskList,
}

impl VaultSession {
    // ═══════════════════════════════════════════════════════════════════════
    // INITIALIZATION
    // ═══════════════════════════════════════════════════════════════════════

    /// New session over `store`; starts locked
    pub fn new(store: Arc<dyn KeyValueStore>, storage_key: impl Into<String>) -> Self {
        Self {
            storage: VaultStorage::new(store),
            storage_key: storage_key.into(),
            session: None,
            state: VaultState::Locked,
            tasks: TaskList::new(),
        }
    }

    /// Session over the on-disk store described by `config`
    pub fn open(config: &VaultConfig) -> VaultResult<Self> {
        config.validate()?;
        let store = FileStore::open(&config.data_dir)?;
        Ok(Self::new(Arc::new(store), config.storage_key.clone()))
    }

    pub fn state(&self) -> VaultState {
        self.state
    }

    pub fn session_state(&self) -> SessionState {
        SessionState {
            locked: self.state == VaultState::Locked,
            derived_key_present: self.session.is_some(),
        }
    }

    pub fn is_unlocked(&self) -> bool {
        self.state == VaultState::Unlocked
    }

    /// In-memory tasks; always empty while locked
    pub fn tasks(&self) -> &[Task] {
        self.tasks.as_slice()
    }

    pub fn task_list(&self) -> &TaskList {
        &self.tasks
    }

    pub fn storage(&self) -> &VaultStorage {
        &self.storage
    }

    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    /// Whether an encrypted snapshot exists (no decryption)
    pub fn has_stored_vault(&self) -> VaultResult<bool> {
        Ok(self.storage.read_raw(&self.storage_key)?.is_some())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // UNLOCK / LOCK
    // ═══════════════════════════════════════════════════════════════════════

    /// Unlock with `password`; `false` on a wrong password or unusable data.
    ///
    /// With no stored snapshot the password is accepted as the new vault
    /// password (trust on first use). Never unlocks partially: the key and
    /// the tasks are installed only after the stored envelope decrypted.
    pub async fn unlock_vault(&mut self, password: &str) -> bool {
        match self.try_unlock(password).await {
            Ok(unlocked) => unlocked,
            Err(e) => {
                error!(error = %e, "unlock aborted");
                false
            }
        }
    }

    async fn try_unlock(&mut self, password: &str) -> VaultResult<bool> {
        let candidate = SessionKey::new(password);

        match self.storage.verify(&self.storage_key, &candidate).await {
            Ok(StoredVault::Absent) => {
                self.session = Some(candidate);
                self.tasks.clear();
                self.state = VaultState::Unlocked;
                info!("vault unlocked (first use, new password set)");
                Ok(true)
            }
            Ok(StoredVault::Verified(plaintext)) => {
                // Nothing below may fail: the transition is all or nothing
                let tasks = parse_snapshot(&plaintext);
                self.session = Some(candidate);
                self.tasks.set(tasks);
                self.state = VaultState::Unlocked;
                info!(count = self.tasks.len(), "vault unlocked");

                if let Err(e) = self.correct_history().await {
                    warn!(error = %e, "history correction not persisted; kept in memory");
                }
                Ok(true)
            }
            Err(e) if e.is_security_critical() => {
                warn!(error = %e, "unlock rejected");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Drop the session key and every decrypted task. Idempotent.
    pub fn lock_vault(&mut self) {
        if self.state == VaultState::Locked && self.session.is_none() {
            debug!("lock requested while already locked");
        }
        self.session = None;
        self.tasks.clear();
        self.state = VaultState::Locked;
        info!("vault locked");
    }

    /// Reload the task list from storage.
    ///
    /// Unusable data (locked, missing, undecryptable, unparseable) leaves an
    /// empty list.
    pub async fn rehydrate(&mut self) {
        let plaintext = self
            .storage
            .get_item(&self.storage_key, self.session.as_ref())
            .await;

        match plaintext {
            Some(json) => self.tasks.set(parse_snapshot(&json)),
            None => self.tasks.clear(),
        }
    }

    /// Book open tasks from earlier days; persists only when something changed
    async fn correct_history(&mut self) -> VaultResult<()> {
        let now = Utc::now();
        let changed = self.tasks.auto_correct_history(now.date_naive(), now);
        if changed > 0 {
            info!(changed, "auto-corrected open tasks from earlier days");
            self.persist().await?;
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // PASSWORD / RESET
    // ═══════════════════════════════════════════════════════════════════════

    /// Re-encrypt the vault under `new_password`.
    ///
    /// Requires an unlocked vault and the current password. Returns `false`
    /// when `current` does not open the stored snapshot; nothing changes then.
    pub async fn change_password(&mut self, current: &str, new_password: &str) -> VaultResult<bool> {
        self.ensure_unlocked()?;

        // Decryption is the only password check, so there must be an envelope
        if !self.has_stored_vault()? {
            self.persist().await?;
        }

        let check = SessionKey::new(current);
        match self.storage.verify(&self.storage_key, &check).await {
            Ok(_) => {}
            Err(e) if e.is_security_critical() => {
                warn!("password change rejected: current password did not verify");
                return Ok(false);
            }
            Err(e) => return Err(e),
        }

        // The session switches keys only once the new envelope is stored
        let next = SessionKey::new(new_password);
        self.write_snapshot(&next).await?;
        self.session = Some(next);
        info!("vault password changed");
        Ok(true)
    }

    /// Delete the stored snapshot and lock. The next unlock is a first use.
    pub fn reset_vault(&mut self) -> VaultResult<()> {
        self.storage.remove_item(&self.storage_key)?;
        self.lock_vault();
        warn!("vault reset: stored tasks removed");
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // TASK OPERATIONS
    // ═══════════════════════════════════════════════════════════════════════

    pub async fn add_task(&mut self, title: &str) -> VaultResult<String> {
        self.mutate(|tasks| Ok(tasks.add(title, Utc::now()))).await
    }

    pub async fn delete_task(&mut self, id: &str) -> VaultResult<()> {
        self.mutate(|tasks| tasks.delete(id)).await
    }

    pub async fn update_task(&mut self, id: &str, update: TaskUpdate) -> VaultResult<()> {
        self.mutate(|tasks| tasks.update(id, update)).await
    }

    pub async fn complete_task(&mut self, id: &str) -> VaultResult<TaskDuration> {
        self.mutate(|tasks| tasks.complete(id, Utc::now())).await
    }

    pub async fn add_sub_task(&mut self, task_id: &str, title: &str) -> VaultResult<String> {
        self.mutate(|tasks| tasks.add_sub_task(task_id, title)).await
    }

    pub async fn delete_sub_task(&mut self, task_id: &str, sub_task_id: &str) -> VaultResult<()> {
        self.mutate(|tasks| tasks.delete_sub_task(task_id, sub_task_id)).await
    }

    pub async fn set_tasks(&mut self, tasks: Vec<Task>) -> VaultResult<()> {
        self.mutate(|list| {
            list.set(tasks);
            Ok(())
        })
        .await
    }

    /// Run the history correction on demand; returns how many tasks changed
    pub async fn auto_correct_history(&mut self) -> VaultResult<usize> {
        let now = Utc::now();
        self.mutate(|tasks| Ok(tasks.auto_correct_history(now.date_naive(), now)))
            .await
    }

    // ═══════════════════════════════════════════════════════════════════════
    // HELPERS
    // ═══════════════════════════════════════════════════════════════════════

    /// Apply `f` to the in-memory list, then persist the snapshot
    async fn mutate<T, F>(&mut self, f: F) -> VaultResult<T>
    where
        F: FnOnce(&mut TaskList) -> VaultResult<T>,
    {
        self.ensure_unlocked()?;
        let result = f(&mut self.tasks)?;
        self.persist().await?;
        Ok(result)
    }

    async fn persist(&mut self) -> VaultResult<WriteOutcome> {
        let json = self.tasks.to_snapshot().to_json()?;
        let outcome = self
            .storage
            .set_item(&self.storage_key, &json, self.session.as_ref())
            .await?;

        if outcome == WriteOutcome::SkippedLocked {
            warn!("snapshot not persisted: no session key");
        }
        Ok(outcome)
    }

    /// Write the snapshot under an explicit key, whatever the session holds
    async fn write_snapshot(&self, key: &SessionKey) -> VaultResult<()> {
        let json = self.tasks.to_snapshot().to_json()?;
        self.storage
            .set_item(&self.storage_key, &json, Some(key))
            .await?;
        Ok(())
    }

    fn ensure_unlocked(&self) -> VaultResult<()> {
        if self.state != VaultState::Unlocked || self.session.is_none() {
            Err(VaultError::VaultLocked)
        } else {
            Ok(())
        }
    }
}

/// Tasks of a decrypted snapshot; unparseable data yields an empty list
fn parse_snapshot(json: &str) -> Vec<Task> {
    match PersistedSnapshot::from_json(json) {
        Ok(snapshot) => {
            debug!(count = snapshot.state.tasks.len(), "tasks rehydrated");
            snapshot.state.tasks
        }
        Err(e) => {
            error!(error = %e, "stored snapshot could not be parsed");
            Vec::new()
        }
    }
}
