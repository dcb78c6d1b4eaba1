//! Device key-value storage and the encrypting adapter on top of it

pub mod adapter;
pub mod memory;
pub mod secure_fs;

pub use adapter::{VaultStorage, WriteOutcome};
pub use memory::MemoryStore;
pub use secure_fs::FileStore;

use crate::error::VaultResult;

/// Raw persistent key-value store of the device.
///
/// Values are opaque strings; the store never sees plaintext task data
/// because everything reaching it has been through [`VaultStorage`].
pub trait KeyValueStore: Send + Sync {
    fn get(&self, name: &str) -> VaultResult<Option<String>>;

    fn set(&self, name: &str, value: &str) -> VaultResult<()>;

    /// Removing a missing entry is not an error
    fn remove(&self, name: &str) -> VaultResult<()>;
}
