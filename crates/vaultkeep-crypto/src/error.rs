//! Error types for key derivation and field encryption.

use thiserror::Error;

/// Errors that can occur during cryptographic operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Salt or parameters unusable for key derivation.
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// Wrong key, truncated data, or tampering. Never accompanied by output.
    #[error("Decryption failed: {0}")]
    Decryption(String),
}

/// Convenience result alias for cryptographic operations.
pub type Result<T> = std::result::Result<T, CryptoError>;
