//! Sync and store error types.

use thiserror::Error;
use vaultkeep_audit::AuditError;
use vaultkeep_core::ItemId;
use vaultkeep_crypto::CryptoError;

/// Errors reported by a [`VaultStore`](crate::store::VaultStore).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The record does not exist or was already deleted.
    #[error("Record not found: {0}")]
    NotFound(ItemId),

    /// The record belongs to another user.
    #[error("Record {0} belongs to another user")]
    Ownership(ItemId),

    /// The store cannot be reached.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Persistence failed.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Storage(e.to_string())
    }
}

/// Errors surfaced by the sync engine and sessions.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    /// No master password in the session. Needs re-authentication.
    #[error("Vault key unavailable: unlock the vault first")]
    KeyUnavailable,

    /// A record could not be decrypted with the session key.
    #[error("Decryption failed: {0}")]
    Decryption(String),

    /// The record was already removed remotely.
    #[error("Record not found: {0}")]
    NotFound(ItemId),

    /// The record belongs to another user.
    #[error("Record {0} belongs to another user")]
    Ownership(ItemId),

    /// Store or change feed unreachable. Retryable.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Malformed import document. Nothing was imported.
    #[error("Invalid import document: {0}")]
    ImportValidation(String),

    /// Key derivation failed (malformed salt or parameters).
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    /// Encrypting a record failed.
    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// The item violates an invariant.
    #[error("Invalid item: {0}")]
    InvalidItem(String),

    /// Persistence failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// JSON encoding or decoding failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The security analysis could not produce a result.
    #[error("Security analysis failed: {0}")]
    Analysis(#[from] AuditError),
}

impl SyncError {
    /// Whether retrying the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Connection(_))
    }
}

impl From<StoreError> for SyncError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => SyncError::NotFound(id),
            StoreError::Ownership(id) => SyncError::Ownership(id),
            StoreError::Connection(msg) => SyncError::Connection(msg),
            StoreError::Storage(msg) => SyncError::Storage(msg),
        }
    }
}

impl From<CryptoError> for SyncError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::KeyDerivation(msg) => SyncError::KeyDerivation(msg),
            CryptoError::Encryption(msg) => SyncError::Encryption(msg),
            CryptoError::Decryption(msg) => SyncError::Decryption(msg),
        }
    }
}

impl From<vaultkeep_core::Error> for SyncError {
    fn from(e: vaultkeep_core::Error) -> Self {
        match e {
            vaultkeep_core::Error::InvalidItem(msg) => SyncError::InvalidItem(msg),
            other => SyncError::Storage(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Serialization(e.to_string())
    }
}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
