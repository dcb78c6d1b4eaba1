//! Timevault - Error Types

use thiserror::Error;

/// Result type for vault operations
pub type VaultResult<T> = Result<T, VaultError>;

/// Vault error types
#[derive(Error, Debug)]
pub enum VaultError {
    // ═══════════════════════════════════════════════════════════════
    // CRYPTO ERRORS
    // ═══════════════════════════════════════════════════════════════

    /// Wrong password and tampered data are deliberately the same error.
    #[error("Authentication failed - wrong password or tampered data")]
    AuthFailure,

    #[error("Cryptographic primitive unavailable: {0}")]
    PrimitiveUnavailable(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    // ═══════════════════════════════════════════════════════════════
    // ENVELOPE ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Invalid envelope format: {0}")]
    Format(String),

    // ═══════════════════════════════════════════════════════════════
    // VAULT ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Vault is locked")]
    VaultLocked,

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Sub-task not found: {0}")]
    SubTaskNotFound(String),

    // ═══════════════════════════════════════════════════════════════
    // STORAGE ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid storage key: {0}")]
    InvalidStorageKey(String),

    #[error("Background task failed: {0}")]
    Background(String),

    // ═══════════════════════════════════════════════════════════════
    // SERIALIZATION / CONFIG ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Snapshot version mismatch: expected {expected}, got {got}")]
    VersionMismatch { expected: u32, got: u32 },

    #[error("Config error: {0}")]
    Config(String),
}

impl VaultError {
    /// Errors that mean the stored vault could not be trusted or opened
    pub fn is_security_critical(&self) -> bool {
        matches!(self, VaultError::AuthFailure | VaultError::Format(_))
    }

    /// Errors after which the process must not continue
    pub fn is_fatal(&self) -> bool {
        matches!(self, VaultError::PrimitiveUnavailable(_))
    }
}

impl From<tokio::task::JoinError> for VaultError {
    fn from(e: tokio::task::JoinError) -> Self {
        VaultError::Background(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(VaultError::AuthFailure.is_security_critical());
        assert!(VaultError::Format("a:b".into()).is_security_critical());
        assert!(!VaultError::VaultLocked.is_security_critical());

        assert!(VaultError::PrimitiveUnavailable("rng".into()).is_fatal());
        assert!(!VaultError::AuthFailure.is_fatal());
    }

    #[test]
    fn test_auth_failure_message_does_not_leak_cause() {
        let msg = VaultError::AuthFailure.to_string();
        assert!(msg.contains("wrong password or tampered data"));
    }
}
