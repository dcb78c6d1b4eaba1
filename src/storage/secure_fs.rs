//! Timevault - File-backed Key-Value Store
//!
//! One file per key under a root directory. Writes go through a temp file
//! and a rename; removal overwrites the old envelope before unlinking.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::KeyValueStore;
use crate::error::{VaultError, VaultResult};

/// File extension for stored entries
const ENTRY_EXT: &str = "vault";

/// Directory-backed store
#[derive(Debug, Clone)]
pub struct FileStore {
    /// Root directory
    root: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `root`, creating the directory if needed
    pub fn open(root: &Path) -> VaultResult<Self> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a key to its file, refusing anything that could escape the root
    fn entry_path(&self, name: &str) -> VaultResult<PathBuf> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
            && !name.starts_with('.');

        if !valid {
            return Err(VaultError::InvalidStorageKey(name.to_string()));
        }
        Ok(self.root.join(format!("{}.{}", name, ENTRY_EXT)))
    }

    /// Overwrite a file with zeros before it is unlinked
    fn scrub(path: &Path) {
        let Ok(metadata) = fs::metadata(path) else {
            return;
        };
        let size = metadata.len() as usize;
        if size == 0 {
            return;
        }
        if let Ok(mut file) = OpenOptions::new().write(true).open(path) {
            let zeros = vec![0u8; size.min(1024 * 1024)];
            let mut remaining = size;
            while remaining > 0 {
                let chunk = remaining.min(zeros.len());
                if file.write_all(&zeros[..chunk]).is_err() {
                    break;
                }
                remaining -= chunk;
            }
            let _ = file.sync_all();
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, name: &str) -> VaultResult<Option<String>> {
        let path = self.entry_path(name)?;

        if !path.exists() {
            return Ok(None);
        }

        let mut file = File::open(&path)?;
        let mut value = String::new();
        file.read_to_string(&mut value)?;
        Ok(Some(value))
    }

    fn set(&self, name: &str, value: &str) -> VaultResult<()> {
        let path = self.entry_path(name)?;
        let temp_path = path.with_extension("tmp");

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)?;

        file.write_all(value.as_bytes())?;
        file.sync_all()?;

        // Rename to final path (atomic on most filesystems)
        fs::rename(&temp_path, &path)?;
        debug!(key = name, bytes = value.len(), "entry written");
        Ok(())
    }

    fn remove(&self, name: &str) -> VaultResult<()> {
        let path = self.entry_path(name)?;

        if path.exists() {
            Self::scrub(&path);
            fs::remove_file(&path)?;
            debug!(key = name, "entry removed");
        }
        Ok(())
    }
}
