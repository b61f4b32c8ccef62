//! Master password key derivation.
//!
//! PBKDF2-HMAC-SHA256 over the master password and the account salt produces
//! a master key, which [`SessionKey`] expands into its sub-keys. Neither the
//! password nor any intermediate key is logged, cached, or returned.

use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use tracing::debug;
use vaultkeep_core::config::{KdfConfig, MIN_KDF_ITERATIONS};
use vaultkeep_core::SecretString;
use zeroize::Zeroizing;

use crate::error::{CryptoError, Result};
use crate::key::{SessionKey, KEY_SIZE};

/// Salt length in bytes. Salts are generated once per account and are not secret.
pub const SALT_LEN: usize = 32;

/// Validated key derivation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    iterations: u32,
}

impl KdfParams {
    /// Parameters with `iterations` rounds; refuses anything below the minimum.
    pub fn new(iterations: u32) -> Result<Self> {
        if iterations < MIN_KDF_ITERATIONS {
            return Err(CryptoError::KeyDerivation(format!(
                "{iterations} iterations is below the minimum of {MIN_KDF_ITERATIONS}"
            )));
        }
        Ok(Self { iterations })
    }

    pub fn from_config(config: &KdfConfig) -> Result<Self> {
        Self::new(config.iterations)
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: KdfConfig::default().iterations,
        }
    }
}

/// Generate a new random account salt.
pub fn generate_salt() -> Vec<u8> {
    let mut salt = vec![0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Derive the session key for `password` and `salt`.
///
/// Deterministic: the same password and salt always give the same key. Slow
/// by construction, so async callers should run it on a blocking thread.
pub fn derive(password: &SecretString, salt: &[u8], params: &KdfParams) -> Result<SessionKey> {
    if salt.len() != SALT_LEN {
        return Err(CryptoError::KeyDerivation(format!(
            "salt must be {SALT_LEN} bytes, got {}",
            salt.len()
        )));
    }

    let mut master = Zeroizing::new([0u8; KEY_SIZE]);
    pbkdf2_hmac::<Sha256>(
        password.expose_secret().as_bytes(),
        salt,
        params.iterations,
        &mut master[..],
    );

    let key = SessionKey::from_master(&master[..])?;
    debug!(
        iterations = params.iterations,
        fingerprint = %key.fingerprint(),
        "derived session key"
    );
    Ok(key)
}
