//! Field encryption primitives.
//!
//! AES-256-CBC with PKCS#7 padding and a fresh random IV per call, followed
//! by an HMAC-SHA256 tag over the associated data, the IV and the ciphertext.
//! The tag is appended to the ciphertext and checked in constant time before
//! any decryption.
//!
//! Associated data is authenticated but not encrypted. A ciphertext only
//! opens under the same associated data it was sealed with, which is how
//! callers pin a ciphertext to the field and owner it belongs to.

use aes::Aes256;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use vaultkeep_core::EncryptedField;
use zeroize::Zeroizing;

use crate::error::{CryptoError, Result};
use crate::key::SessionKey;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;
type HmacSha256 = Hmac<Sha256>;

/// IV length in bytes (one AES block).
pub const IV_SIZE: usize = 16;

/// HMAC-SHA256 tag length in bytes.
pub const TAG_SIZE: usize = 32;

const BLOCK_SIZE: usize = 16;
const MAC_DOMAIN: &[u8] = b"vaultkeep-field-v2";

/// Encrypt `plaintext` under `key`, binding `associated_data` into the tag.
///
/// Returns `ciphertext || tag` and the IV used. Two calls with the same
/// input never return the same output.
pub fn encrypt(
    key: &SessionKey,
    plaintext: &[u8],
    associated_data: &[u8],
) -> Result<(Vec<u8>, [u8; IV_SIZE])> {
    let mut iv = [0u8; IV_SIZE];
    OsRng.fill_bytes(&mut iv);

    let mut output = Aes256CbcEnc::new_from_slices(key.enc_key(), &iv)
        .map_err(|e| CryptoError::Encryption(format!("cipher init: {e}")))?
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let tag = compute_tag(key, associated_data, &iv, &output)?;
    output.extend_from_slice(&tag);
    Ok((output, iv))
}

/// Decrypt `sealed` (`ciphertext || tag`) produced by [`encrypt`].
///
/// Fails with [`CryptoError::Decryption`] on a wrong key, a tampered or
/// truncated ciphertext, a malformed IV, or associated data that differs
/// from what the ciphertext was sealed with.
pub fn decrypt(
    key: &SessionKey,
    sealed: &[u8],
    iv: &[u8],
    associated_data: &[u8],
) -> Result<Vec<u8>> {
    if iv.len() != IV_SIZE {
        return Err(CryptoError::Decryption(format!(
            "iv must be {IV_SIZE} bytes, got {}",
            iv.len()
        )));
    }
    if sealed.len() < BLOCK_SIZE + TAG_SIZE || (sealed.len() - TAG_SIZE) % BLOCK_SIZE != 0 {
        return Err(CryptoError::Decryption("malformed ciphertext".to_string()));
    }

    let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_SIZE);
    tag_mac(key, associated_data, iv, ciphertext)?
        .verify_slice(tag)
        .map_err(|_| CryptoError::Decryption("authentication failed".to_string()))?;

    Aes256CbcDec::new_from_slices(key.enc_key(), iv)
        .map_err(|e| CryptoError::Decryption(format!("cipher init: {e}")))?
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CryptoError::Decryption("invalid padding".to_string()))
}

/// Keyed, deterministic hash of `value` for exact-match lookups.
///
/// Callers normalize first; see [`crate::codec::normalize_search_value`].
pub fn search_hash(key: &SessionKey, value: &str) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(key.search_key())
        .map_err(|e| CryptoError::Encryption(format!("mac init: {e}")))?;
    mac.update(value.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Encrypt a UTF-8 field into its stored form.
pub fn encrypt_field(
    key: &SessionKey,
    value: &str,
    associated_data: &[u8],
) -> Result<EncryptedField> {
    let (ciphertext, iv) = encrypt(key, value.as_bytes(), associated_data)?;
    Ok(EncryptedField {
        ciphertext: BASE64.encode(ciphertext),
        iv: BASE64.encode(iv),
    })
}

/// Decrypt a stored field back to its UTF-8 value.
pub fn decrypt_field(
    key: &SessionKey,
    field: &EncryptedField,
    associated_data: &[u8],
) -> Result<String> {
    let sealed = BASE64
        .decode(&field.ciphertext)
        .map_err(|e| CryptoError::Decryption(format!("invalid ciphertext encoding: {e}")))?;
    let iv = BASE64
        .decode(&field.iv)
        .map_err(|e| CryptoError::Decryption(format!("invalid iv encoding: {e}")))?;

    let plaintext = Zeroizing::new(decrypt(key, &sealed, &iv, associated_data)?);
    String::from_utf8(plaintext.to_vec())
        .map_err(|_| CryptoError::Decryption("plaintext is not valid UTF-8".to_string()))
}

fn new_mac(key: &SessionKey) -> Result<HmacSha256> {
    HmacSha256::new_from_slice(key.mac_key())
        .map_err(|e| CryptoError::Encryption(format!("mac init: {e}")))
}

/// MAC state over `domain || len(ad) || ad || iv || ciphertext`.
fn tag_mac(
    key: &SessionKey,
    associated_data: &[u8],
    iv: &[u8],
    ciphertext: &[u8],
) -> Result<HmacSha256> {
    let mut mac = new_mac(key)?;
    mac.update(MAC_DOMAIN);
    mac.update(&(associated_data.len() as u64).to_be_bytes());
    mac.update(associated_data);
    mac.update(iv);
    mac.update(ciphertext);
    Ok(mac)
}

fn compute_tag(
    key: &SessionKey,
    associated_data: &[u8],
    iv: &[u8],
    ciphertext: &[u8],
) -> Result<[u8; TAG_SIZE]> {
    let mac = tag_mac(key, associated_data, iv, ciphertext)?;

    let mut tag = [0u8; TAG_SIZE];
    tag.copy_from_slice(&mac.finalize().into_bytes());
    Ok(tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    const AD: &[u8] = b"alice\0notes";

    #[test]
    fn test_encrypt_decrypt() {
        let key = SessionKey::random();
        let long = "x".repeat(10_000);
        for plaintext in ["", "hunter2", "pässwörd 🔑 パスワード", long.as_str()] {
            let (sealed, iv) = encrypt(&key, plaintext.as_bytes(), AD).unwrap();
            let decrypted = decrypt(&key, &sealed, &iv, AD).unwrap();
            assert_eq!(decrypted, plaintext.as_bytes());
        }
    }

    #[test]
    fn test_fresh_iv_per_call() {
        let key = SessionKey::random();
        let (a, iv_a) = encrypt(&key, b"same input", AD).unwrap();
        let (b, iv_b) = encrypt(&key, b"same input", AD).unwrap();
        assert_ne!(iv_a, iv_b);
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_key_fails() {
        let key = SessionKey::random();
        let (sealed, iv) = encrypt(&key, b"secret", AD).unwrap();

        let result = decrypt(&SessionKey::random(), &sealed, &iv, AD);
        assert!(matches!(result, Err(CryptoError::Decryption(_))));
    }

    #[test]
    fn test_tampering_detected() {
        let key = SessionKey::random();
        let (sealed, iv) = encrypt(&key, b"secret value", AD).unwrap();

        let mut flipped = sealed.clone();
        flipped[0] ^= 0x01;
        assert!(decrypt(&key, &flipped, &iv, AD).is_err());

        let mut bad_iv = iv;
        bad_iv[3] ^= 0x80;
        assert!(decrypt(&key, &sealed, &bad_iv, AD).is_err());

        let mut bad_tag = sealed.clone();
        let last = bad_tag.len() - 1;
        bad_tag[last] ^= 0x01;
        assert!(decrypt(&key, &bad_tag, &iv, AD).is_err());
    }

    #[test]
    fn test_associated_data_must_match() {
        let key = SessionKey::random();
        let (sealed, iv) = encrypt(&key, b"secret", b"alice\0password").unwrap();

        assert!(decrypt(&key, &sealed, &iv, b"alice\0password").is_ok());
        assert!(decrypt(&key, &sealed, &iv, b"alice\0notes").is_err());
        assert!(decrypt(&key, &sealed, &iv, b"mallory\0password").is_err());
        assert!(decrypt(&key, &sealed, &iv, b"").is_err());
    }

    #[test]
    fn test_truncated_input_rejected() {
        let key = SessionKey::random();
        let (sealed, iv) = encrypt(&key, b"secret", AD).unwrap();

        assert!(decrypt(&key, &sealed[..sealed.len() - 1], &iv, AD).is_err());
        assert!(decrypt(&key, &sealed[..TAG_SIZE], &iv, AD).is_err());
        assert!(decrypt(&key, &[], &iv, AD).is_err());
        assert!(decrypt(&key, &sealed, &iv[..8], AD).is_err());
    }

    #[test]
    fn test_search_hash_is_keyed_and_deterministic() {
        let key = SessionKey::random();
        let a = search_hash(&key, "github").unwrap();
        assert_eq!(a, search_hash(&key, "github").unwrap());
        assert_ne!(a, search_hash(&key, "gitlab").unwrap());
        assert_ne!(a, search_hash(&SessionKey::random(), "github").unwrap());
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_field_helpers() {
        let key = SessionKey::random();
        let field = encrypt_field(&key, "alice@example.com", AD).unwrap();
        assert!(!field.ciphertext.contains("alice"));
        assert_eq!(decrypt_field(&key, &field, AD).unwrap(), "alice@example.com");

        let garbage = EncryptedField {
            ciphertext: "not base64!".to_string(),
            iv: field.iv.clone(),
        };
        assert!(decrypt_field(&key, &garbage, AD).is_err());
    }
}
