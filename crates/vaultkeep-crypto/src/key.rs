//! The in-memory session key.
//!
//! A [`SessionKey`] is three independent 256-bit sub-keys expanded with
//! HKDF-SHA256 from the password-derived master key: one for AES-256-CBC,
//! one for the HMAC tag over each ciphertext, and one for search hashes.
//! All three are wiped when the key is dropped.

use hkdf::Hkdf;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::Zeroizing;

use crate::error::{CryptoError, Result};

/// Size of every sub-key in bytes.
pub const KEY_SIZE: usize = 32;

/// HKDF info strings used to domain-separate the sub-keys.
const ENC_INFO: &[u8] = b"vaultkeep-field-enc-v1";
const MAC_INFO: &[u8] = b"vaultkeep-field-mac-v1";
const SEARCH_INFO: &[u8] = b"vaultkeep-search-hash-v1";

type SubKey = Zeroizing<[u8; KEY_SIZE]>;

/// Symmetric key material for one unlocked vault session.
pub struct SessionKey {
    enc: SubKey,
    mac: SubKey,
    search: SubKey,
}

impl SessionKey {
    /// Expand a master key into the three sub-keys.
    pub(crate) fn from_master(master: &[u8]) -> Result<Self> {
        let hk = Hkdf::<Sha256>::new(None, master);
        let expand = |info: &[u8]| -> Result<SubKey> {
            let mut okm = Zeroizing::new([0u8; KEY_SIZE]);
            hk.expand(info, &mut okm[..])
                .map_err(|e| CryptoError::KeyDerivation(format!("hkdf expand: {e}")))?;
            Ok(okm)
        };

        Ok(Self {
            enc: expand(ENC_INFO)?,
            mac: expand(MAC_INFO)?,
            search: expand(SEARCH_INFO)?,
        })
    }

    /// A key of fresh random material, for tests and throwaway vaults.
    pub fn random() -> Self {
        let random = || {
            let mut key = Zeroizing::new([0u8; KEY_SIZE]);
            rand::thread_rng().fill_bytes(&mut key[..]);
            key
        };
        Self {
            enc: random(),
            mac: random(),
            search: random(),
        }
    }

    pub(crate) fn enc_key(&self) -> &[u8; KEY_SIZE] {
        &self.enc
    }

    pub(crate) fn mac_key(&self) -> &[u8; KEY_SIZE] {
        &self.mac
    }

    pub(crate) fn search_key(&self) -> &[u8; KEY_SIZE] {
        &self.search
    }

    /// Short public identifier of this key.
    ///
    /// Equal for keys derived from the same password and salt. Safe to log:
    /// a truncated one-way digest, not key material.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::new()
            .chain_update(b"vaultkeep-key-fingerprint")
            .chain_update(&self.mac[..])
            .finalize();
        hex::encode(&digest[..8])
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKey([REDACTED])")
    }
}
