//! Vault configuration
//!
//! Loaded from an optional JSON file. Cryptographic parameters are not
//! configurable: the envelope does not record them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{VaultError, VaultResult};

/// Persistence key the task snapshot lives under
pub const DEFAULT_STORAGE_KEY: &str = "v2-vault-storage";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Directory holding the encrypted entries
    pub data_dir: PathBuf,
    /// Key of the snapshot entry inside the store
    pub storage_key: String,
    /// `tracing` filter directive used by the CLI
    pub log_filter: String,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            log_filter: "warn".to_string(),
        }
    }
}

impl VaultConfig {
    /// Read a JSON config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> VaultResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let json = std::fs::read_to_string(path)?;
        let config: VaultConfig = serde_json::from_str(&json)
            .map_err(|e| VaultError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> VaultResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> VaultResult<()> {
        if self.storage_key.trim().is_empty() {
            return Err(VaultError::Config("storage_key must not be empty".into()));
        }
        Ok(())
    }

    /// Default location of the config file
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("timevault")
            .join("config.json")
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("timevault")
}
