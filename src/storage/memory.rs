//! In-memory store, used for ephemeral vaults and tests

use std::collections::HashMap;

use parking_lot::RwLock;

use super::KeyValueStore;
use crate::error::VaultResult;

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, name: &str) -> VaultResult<Option<String>> {
        Ok(self.entries.read().get(name).cloned())
    }

    fn set(&self, name: &str, value: &str) -> VaultResult<()> {
        self.entries.write().insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, name: &str) -> VaultResult<()> {
        self.entries.write().remove(name);
        Ok(())
    }
}
