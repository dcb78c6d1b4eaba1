//! # Timevault
//!
//! Local-only time tracker whose task list is encrypted at rest with a
//! password supplied each session.
//!
//! ## Architecture
//!
//! ```text
//! password ──► PBKDF2-SHA256 (100k) ──► AES-256-GCM ──► salt:nonce:ciphertext
//!                                            ▲                   │
//!                     VaultSession ──► VaultStorage ──► KeyValueStore
//!                     (lock state,     (encrypt on write,  (memory / files)
//!                      session key)     decrypt on read)
//! ```
//!
//! ## Security Model
//!
//! - Fresh 16-byte salt and 12-byte nonce on every write
//! - Wrong password and tampered data both surface as a failed decryption
//! - No plaintext is written, and nothing is written while locked
//! - Locking drops the session key and every decrypted task

pub mod config;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod session;
pub mod storage;
pub mod tasks;

pub use config::{VaultConfig, DEFAULT_STORAGE_KEY};
pub use envelope::Envelope;
pub use error::{VaultError, VaultResult};
pub use session::{SessionState, VaultSession, VaultState};
pub use storage::{FileStore, KeyValueStore, MemoryStore, VaultStorage, WriteOutcome};
pub use tasks::{SubTask, Task, TaskDuration, TaskList, TaskUpdate};

/// Timevault version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
