//! Key management and field encryption for Vaultkeep.
//!
//! Everything that touches plaintext on its way to or from the remote store
//! lives here:
//!
//! - [`kdf`]: master password + salt to [`SessionKey`] (PBKDF2-HMAC-SHA256)
//! - [`cipher`]: AES-256-CBC with a fresh IV per call, encrypt-then-MAC
//! - [`codec`]: [`VaultItem`](vaultkeep_core::VaultItem) to
//!   [`EncryptedRecord`](vaultkeep_core::EncryptedRecord) and back

pub mod cipher;
pub mod codec;
pub mod error;
pub mod kdf;
pub mod key;

pub use cipher::{decrypt, decrypt_field, encrypt, encrypt_field, search_hash};
pub use codec::{normalize_search_value, open_record, seal_item};
pub use error::{CryptoError, Result};
pub use kdf::{derive, generate_salt, KdfParams, SALT_LEN};
pub use key::SessionKey;
