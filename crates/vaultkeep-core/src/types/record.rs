//! Server-side representation of a vault item.
//!
//! The remote store only ever sees [`EncryptedRecord`]s: each user-entered
//! field is an independent [`EncryptedField`] and the three searchable fields
//! are additionally represented by keyed hashes.

use crate::types::{ItemCategory, ItemId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One encrypted field, base64 encoded.
///
/// `ciphertext` is the AES-256-CBC output followed by the HMAC-SHA256 tag
/// computed over the IV and the ciphertext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedField {
    pub ciphertext: String,
    pub iv: String,
}

/// Fields that carry a keyed search hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashField {
    Name,
    Url,
    Username,
}

impl fmt::Display for HashField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HashField::Name => "name",
            HashField::Url => "url",
            HashField::Username => "username",
        };
        f.write_str(name)
    }
}

/// An item as persisted by the remote store.
///
/// `id` and `version` are owned by the store: on insert the store assigns
/// both, whatever the client sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedRecord {
    pub id: ItemId,

    pub owner: UserId,

    pub category: ItemCategory,

    #[serde(default)]
    pub favorite: bool,

    /// Field name to ciphertext. Absent optional fields are absent here too.
    pub fields: BTreeMap<String, EncryptedField>,

    pub name_hash: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_hash: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_hash: Option<String>,

    pub created: DateTime<Utc>,

    pub last_modified: DateTime<Utc>,

    #[serde(default)]
    pub version: u64,
}

impl EncryptedRecord {
    /// Search hash stored for `field`, if any.
    pub fn hash_of(&self, field: HashField) -> Option<&str> {
        match field {
            HashField::Name => Some(self.name_hash.as_str()),
            HashField::Url => self.url_hash.as_deref(),
            HashField::Username => self.username_hash.as_deref(),
        }
    }
}
