//! Conversion between [`VaultItem`] and [`EncryptedRecord`].
//!
//! Every user-entered value becomes its own [`EncryptedField`]. Only the
//! record metadata the store needs to route and order records stays in the
//! clear: id, owner, category, favorite flag, timestamps and version.
//!
//! Each field is sealed with `owner || 0 || field name` as associated data,
//! so a ciphertext cannot be moved to another field or another user. One
//! extra [`fields::SEAL`] field carries a digest of the clear metadata, the
//! search hashes and every other field, which pins the fields to their
//! record and makes edits to the clear metadata detectable. The id and
//! version are assigned by the store after sealing and are not covered.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use vaultkeep_core::{
    CardFields, EncryptedField, EncryptedRecord, IdentityFields, ItemCategory, ItemDetails,
    LoginFields, SecretString, UserId, VaultItem,
};

use crate::cipher::{decrypt_field, encrypt_field, search_hash};
use crate::error::{CryptoError, Result};
use crate::key::SessionKey;

/// Stored field names.
pub mod fields {
    pub const NAME: &str = "name";
    pub const NOTES: &str = "notes";
    pub const TAGS: &str = "tags";

    pub const USERNAME: &str = "username";
    pub const PASSWORD: &str = "password";
    pub const URL: &str = "url";

    pub const CARDHOLDER: &str = "cardholder";
    pub const NUMBER: &str = "number";
    pub const CVV: &str = "cvv";
    pub const EXPIRY: &str = "expiry";

    pub const TITLE: &str = "title";
    pub const FIRST_NAME: &str = "first_name";
    pub const LAST_NAME: &str = "last_name";
    pub const EMAIL: &str = "email";
    pub const PHONE: &str = "phone";
    pub const COMPANY: &str = "company";
    pub const ADDRESS: &str = "address";
    pub const SSN: &str = "ssn";

    /// Integrity digest over the rest of the record.
    pub const SEAL: &str = "seal";
}

/// Canonical form of a value before it is search-hashed.
pub fn normalize_search_value(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Hash of a non-blank value, `None` for blank ones.
fn optional_hash(key: &SessionKey, value: Option<&str>) -> Result<Option<String>> {
    match value.map(normalize_search_value) {
        Some(normalized) if !normalized.is_empty() => Ok(Some(search_hash(key, &normalized)?)),
        _ => Ok(None),
    }
}

/// Associated data binding a field to its owner and name.
fn field_context(owner: &UserId, name: &str) -> Vec<u8> {
    let mut context = Vec::with_capacity(owner.as_str().len() + name.len() + 1);
    context.extend_from_slice(owner.as_str().as_bytes());
    context.push(0);
    context.extend_from_slice(name.as_bytes());
    context
}

/// Length-prefixed hash input, so adjacent parts cannot run together.
struct Transcript(Sha256);

impl Transcript {
    fn part(&mut self, bytes: &[u8]) {
        self.0.update((bytes.len() as u64).to_be_bytes());
        self.0.update(bytes);
    }

    fn optional(&mut self, value: Option<&str>) {
        match value {
            Some(value) => {
                self.part(b"some");
                self.part(value.as_bytes());
            }
            None => self.part(b"none"),
        }
    }

    fn timestamp(&mut self, at: &DateTime<Utc>) {
        self.part(&at.timestamp().to_be_bytes());
        self.part(&at.timestamp_subsec_nanos().to_be_bytes());
    }
}

/// Digest of everything in `record` except its id, version and seal.
fn record_digest(record: &EncryptedRecord) -> String {
    let mut transcript = Transcript(Sha256::new());
    transcript.part(record.owner.as_str().as_bytes());
    transcript.part(record.category.as_str().as_bytes());
    transcript.part(&[u8::from(record.favorite)]);
    transcript.timestamp(&record.created);
    transcript.timestamp(&record.last_modified);
    transcript.part(record.name_hash.as_bytes());
    transcript.optional(record.url_hash.as_deref());
    transcript.optional(record.username_hash.as_deref());

    for (name, field) in &record.fields {
        if name == fields::SEAL {
            continue;
        }
        transcript.part(name.as_bytes());
        transcript.part(field.ciphertext.as_bytes());
        transcript.part(field.iv.as_bytes());
    }
    hex::encode(transcript.0.finalize())
}

struct Sealer<'a> {
    key: &'a SessionKey,
    owner: &'a UserId,
    fields: BTreeMap<String, EncryptedField>,
}

impl<'a> Sealer<'a> {
    fn put(&mut self, name: &str, value: Option<&str>) -> Result<()> {
        if let Some(value) = value {
            let context = field_context(self.owner, name);
            self.fields
                .insert(name.to_string(), encrypt_field(self.key, value, &context)?);
        }
        Ok(())
    }

    fn put_secret(&mut self, name: &str, value: Option<&SecretString>) -> Result<()> {
        self.put(name, value.map(SecretString::expose_secret))
    }
}

/// Encrypt `item` for storage under `owner`.
pub fn seal_item(key: &SessionKey, owner: &UserId, item: &VaultItem) -> Result<EncryptedRecord> {
    let mut sealer = Sealer {
        key,
        owner,
        fields: BTreeMap::new(),
    };

    sealer.put(fields::NAME, Some(&item.name))?;
    sealer.put(fields::NOTES, item.notes.as_deref())?;
    if !item.tags.is_empty() {
        let tags = serde_json::to_string(&item.tags)
            .map_err(|e| CryptoError::Encryption(format!("tags: {e}")))?;
        sealer.put(fields::TAGS, Some(&tags))?;
    }

    match &item.details {
        ItemDetails::Login(login) => {
            sealer.put(fields::USERNAME, login.username.as_deref())?;
            sealer.put_secret(fields::PASSWORD, login.password.as_ref())?;
            sealer.put(fields::URL, login.url.as_deref())?;
        }
        ItemDetails::SecureNote => {}
        ItemDetails::CreditCard(card) => {
            sealer.put(fields::CARDHOLDER, card.cardholder.as_deref())?;
            sealer.put_secret(fields::NUMBER, card.number.as_ref())?;
            sealer.put_secret(fields::CVV, card.cvv.as_ref())?;
            sealer.put(fields::EXPIRY, card.expiry.as_deref())?;
        }
        ItemDetails::Identity(identity) => {
            sealer.put(fields::TITLE, identity.title.as_deref())?;
            sealer.put(fields::FIRST_NAME, identity.first_name.as_deref())?;
            sealer.put(fields::LAST_NAME, identity.last_name.as_deref())?;
            sealer.put(fields::EMAIL, identity.email.as_deref())?;
            sealer.put(fields::PHONE, identity.phone.as_deref())?;
            sealer.put(fields::COMPANY, identity.company.as_deref())?;
            sealer.put(fields::ADDRESS, identity.address.as_deref())?;
            sealer.put_secret(fields::SSN, identity.ssn.as_ref())?;
        }
    }

    let mut record = EncryptedRecord {
        id: item.id.clone(),
        owner: owner.clone(),
        category: item.category(),
        favorite: item.favorite,
        fields: sealer.fields,
        name_hash: search_hash(key, &normalize_search_value(&item.name))?,
        url_hash: optional_hash(key, item.url())?,
        username_hash: optional_hash(key, item.username())?,
        created: item.created,
        last_modified: item.last_modified,
        version: 0,
    };

    let seal = encrypt_field(
        key,
        &record_digest(&record),
        &field_context(owner, fields::SEAL),
    )?;
    record.fields.insert(fields::SEAL.to_string(), seal);
    Ok(record)
}

struct Opener<'a> {
    key: &'a SessionKey,
    record: &'a EncryptedRecord,
}

impl<'a> Opener<'a> {
    fn get(&self, name: &str) -> Result<Option<String>> {
        self.record
            .fields
            .get(name)
            .map(|field| {
                decrypt_field(self.key, field, &field_context(&self.record.owner, name))
                    .map_err(|e| CryptoError::Decryption(format!("field '{name}': {e}")))
            })
            .transpose()
    }

    fn get_secret(&self, name: &str) -> Result<Option<SecretString>> {
        Ok(self.get(name)?.map(SecretString::new))
    }
}

/// Decrypt a stored record.
///
/// Fails if the seal is missing or does not match the record, if any present
/// field does not authenticate under `key` for its owner and name, or if the
/// decrypted name does not match the stored name hash.
pub fn open_record(key: &SessionKey, record: &EncryptedRecord) -> Result<VaultItem> {
    let opener = Opener { key, record };

    let seal = opener
        .get(fields::SEAL)?
        .ok_or_else(|| CryptoError::Decryption("record has no seal".to_string()))?;
    if seal != record_digest(record) {
        return Err(CryptoError::Decryption("record seal mismatch".to_string()));
    }

    let name = opener
        .get(fields::NAME)?
        .ok_or_else(|| CryptoError::Decryption("record has no name field".to_string()))?;
    if search_hash(key, &normalize_search_value(&name))? != record.name_hash {
        return Err(CryptoError::Decryption("name hash mismatch".to_string()));
    }

    let tags = match opener.get(fields::TAGS)? {
        Some(json) => serde_json::from_str::<BTreeSet<String>>(&json)
            .map_err(|e| CryptoError::Decryption(format!("tags: {e}")))?,
        None => BTreeSet::new(),
    };

    let details = match record.category {
        ItemCategory::Login => ItemDetails::Login(LoginFields {
            username: opener.get(fields::USERNAME)?,
            password: opener.get_secret(fields::PASSWORD)?,
            url: opener.get(fields::URL)?,
        }),
        ItemCategory::SecureNote => ItemDetails::SecureNote,
        ItemCategory::CreditCard => ItemDetails::CreditCard(CardFields {
            cardholder: opener.get(fields::CARDHOLDER)?,
            number: opener.get_secret(fields::NUMBER)?,
            cvv: opener.get_secret(fields::CVV)?,
            expiry: opener.get(fields::EXPIRY)?,
        }),
        ItemCategory::Identity => ItemDetails::Identity(IdentityFields {
            title: opener.get(fields::TITLE)?,
            first_name: opener.get(fields::FIRST_NAME)?,
            last_name: opener.get(fields::LAST_NAME)?,
            email: opener.get(fields::EMAIL)?,
            phone: opener.get(fields::PHONE)?,
            company: opener.get(fields::COMPANY)?,
            address: opener.get(fields::ADDRESS)?,
            ssn: opener.get_secret(fields::SSN)?,
        }),
    };

    Ok(VaultItem {
        id: record.id.clone(),
        name,
        notes: opener.get(fields::NOTES)?,
        favorite: record.favorite,
        tags,
        details,
        created: record.created,
        last_modified: record.last_modified,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use vaultkeep_core::{ItemId, NewItem};

    fn owner() -> UserId {
        UserId::new("alice")
    }

    fn identity_item() -> VaultItem {
        let details = ItemDetails::Identity(IdentityFields {
            first_name: Some("Ada".to_string()),
            last_name: Some("Lovelace".to_string()),
            email: Some("Ada@Example.com".to_string()),
            ssn: Some(SecretString::new("078-05-1120")),
            ..Default::default()
        });
        let new = NewItem::new("Work ID", details).with_tag("work").with_notes("badge 42");
        VaultItem::from_new(ItemId::new("i1"), new, Utc::now())
    }

    #[test]
    fn test_seal_then_open() {
        let key = SessionKey::random();
        let item = identity_item();

        let record = seal_item(&key, &owner(), &item).unwrap();
        assert_eq!(record.category, ItemCategory::Identity);
        assert_eq!(record.owner, owner());

        let opened = open_record(&key, &record).unwrap();
        assert_eq!(opened, item);
    }

    #[test]
    fn test_no_plaintext_in_record() {
        let key = SessionKey::random();
        let mut new = NewItem::login("GitHub", Some("octocat"), Some("hunter2-secret"));
        if let ItemDetails::Login(login) = &mut new.details {
            login.url = Some("https://github.com".to_string());
        }
        let item = VaultItem::from_new(ItemId::new("l1"), new, Utc::now());

        let record = seal_item(&key, &owner(), &item).unwrap();
        let json = serde_json::to_string(&record).unwrap();
        for plaintext in ["GitHub", "octocat", "hunter2-secret", "github.com"] {
            assert!(!json.contains(plaintext), "record leaks {plaintext}");
        }
        assert!(record.url_hash.is_some());
        assert!(record.username_hash.is_some());
    }

    #[test]
    fn test_absent_fields_stay_absent() {
        let key = SessionKey::random();
        let item = VaultItem::from_new(ItemId::new("n1"), NewItem::note("Wifi", "pass"), Utc::now());

        let record = seal_item(&key, &owner(), &item).unwrap();
        let names: Vec<&str> = record.fields.keys().map(String::as_str).collect();
        assert_eq!(names, vec![fields::NAME, fields::NOTES, fields::SEAL]);
        assert!(record.url_hash.is_none());
        assert!(record.username_hash.is_none());
    }

    #[test]
    fn test_hashes_are_normalized() {
        let key = SessionKey::random();
        let record = seal_item(&key, &owner(), &identity_item()).unwrap();

        let expected = search_hash(&key, "ada@example.com").unwrap();
        assert_eq!(record.username_hash.as_deref(), Some(expected.as_str()));
        assert_eq!(
            record.name_hash,
            search_hash(&key, &normalize_search_value("  WORK id ")).unwrap()
        );
    }

    #[test]
    fn test_wrong_key_cannot_open() {
        let record = seal_item(&SessionKey::random(), &owner(), &identity_item()).unwrap();
        let result = open_record(&SessionKey::random(), &record);
        assert!(matches!(result, Err(CryptoError::Decryption(_))));
    }

    #[test]
    fn test_swapped_name_detected() {
        let key = SessionKey::random();
        let mut record = seal_item(&key, &owner(), &identity_item()).unwrap();
        record.name_hash = search_hash(&key, "something else").unwrap();
        assert!(open_record(&key, &record).is_err());
    }

    fn login_item(id: &str, name: &str, password: &str) -> VaultItem {
        let new = NewItem::login(name, Some("octocat"), Some(password)).with_notes("recovery codes");
        VaultItem::from_new(ItemId::new(id), new, Utc::now())
    }

    #[test]
    fn test_fields_swapped_within_record_detected() {
        let key = SessionKey::random();
        let mut record = seal_item(&key, &owner(), &login_item("l1", "GitHub", "hunter2")).unwrap();

        let password = record.fields.remove(fields::PASSWORD).unwrap();
        let notes = record.fields.remove(fields::NOTES).unwrap();
        record.fields.insert(fields::PASSWORD.to_string(), notes);
        record.fields.insert(fields::NOTES.to_string(), password);

        let result = open_record(&key, &record);
        assert!(matches!(result, Err(CryptoError::Decryption(_))));
    }

    #[test]
    fn test_field_moved_between_records_detected() {
        let key = SessionKey::random();
        let source = seal_item(&key, &owner(), &login_item("l1", "GitHub", "hunter2")).unwrap();
        let mut target = seal_item(&key, &owner(), &login_item("l2", "GitLab", "letmein")).unwrap();

        target
            .fields
            .insert(fields::PASSWORD.to_string(), source.fields[fields::PASSWORD].clone());
        assert!(open_record(&key, &target).is_err());

        // Moving the seal along with the field does not help either.
        target
            .fields
            .insert(fields::SEAL.to_string(), source.fields[fields::SEAL].clone());
        assert!(open_record(&key, &target).is_err());
    }

    #[test]
    fn test_record_moved_to_other_owner_detected() {
        let key = SessionKey::random();
        let mut record = seal_item(&key, &owner(), &login_item("l1", "GitHub", "hunter2")).unwrap();
        record.owner = UserId::new("mallory");
        assert!(open_record(&key, &record).is_err());
    }

    #[test]
    fn test_clear_metadata_edits_detected() {
        let key = SessionKey::random();
        let record = seal_item(&key, &owner(), &login_item("l1", "GitHub", "hunter2")).unwrap();
        assert!(open_record(&key, &record).is_ok());

        let mut favorite = record.clone();
        favorite.favorite = !favorite.favorite;
        assert!(open_record(&key, &favorite).is_err());

        let mut category = record.clone();
        category.category = ItemCategory::SecureNote;
        assert!(open_record(&key, &category).is_err());

        let mut aged = record.clone();
        aged.last_modified = aged.last_modified - chrono::Duration::days(400);
        assert!(open_record(&key, &aged).is_err());

        let mut rehashed = record.clone();
        rehashed.url_hash = Some(search_hash(&key, "evil.example").unwrap());
        assert!(open_record(&key, &rehashed).is_err());

        let mut unsealed = record;
        unsealed.fields.remove(fields::SEAL);
        assert!(open_record(&key, &unsealed).is_err());
    }

    #[test]
    fn test_store_assigned_id_and_version_accepted() {
        let key = SessionKey::random();
        let mut record = seal_item(&key, &owner(), &login_item("pending", "GitHub", "hunter2")).unwrap();
        record.id = ItemId::new("server-assigned");
        record.version = 42;

        let opened = open_record(&key, &record).unwrap();
        assert_eq!(opened.id, ItemId::new("server-assigned"));
    }
}
