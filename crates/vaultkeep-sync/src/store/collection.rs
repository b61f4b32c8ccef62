//! Document collection shared by the store implementations.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use vaultkeep_core::{id, EncryptedRecord, HashField, ItemId, UserId};

use super::feed::ChangeSet;
use crate::error::{StoreError, StoreResult};

/// Fingerprint of a set of records: SHA-256 over the sorted `(id, version)`
/// pairs, hex encoded. Equal record states give equal hashes.
pub fn change_hash<'a>(records: impl IntoIterator<Item = &'a EncryptedRecord>) -> String {
    let mut pairs: Vec<(&str, u64)> = records
        .into_iter()
        .map(|r| (r.id.as_str(), r.version))
        .collect();
    pairs.sort_unstable();

    let mut input = String::new();
    for (id, version) in pairs {
        input.push_str(id);
        input.push(':');
        input.push_str(&version.to_string());
        input.push('\n');
    }
    id::sha256(&input)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredRecord {
    record: EncryptedRecord,
    #[serde(default)]
    deleted: bool,
}

/// All users' records, tombstones, and salts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Collection {
    #[serde(default)]
    records: BTreeMap<ItemId, StoredRecord>,
    /// Hex-encoded salt per user.
    #[serde(default)]
    salts: BTreeMap<UserId, String>,
    #[serde(default)]
    last_version: u64,
}

impl Collection {
    fn next_version(&mut self) -> u64 {
        self.last_version += 1;
        self.last_version
    }

    fn live<'a>(&'a self, user: &'a UserId) -> impl Iterator<Item = &'a EncryptedRecord> + 'a {
        self.records
            .values()
            .filter(move |stored| !stored.deleted && &stored.record.owner == user)
            .map(|stored| &stored.record)
    }

    pub fn change_hash(&self, user: &UserId) -> String {
        change_hash(self.live(user))
    }

    pub fn get_all(&self, user: &UserId, limit: Option<usize>) -> Vec<EncryptedRecord> {
        let mut records: Vec<EncryptedRecord> = self.live(user).cloned().collect();
        records.sort_by(|a, b| {
            b.last_modified
                .cmp(&a.last_modified)
                .then_with(|| a.id.cmp(&b.id))
        });
        if let Some(limit) = limit {
            records.truncate(limit);
        }
        records
    }

    pub fn find_by_hash(&self, user: &UserId, field: HashField, hash: &str) -> Vec<EncryptedRecord> {
        self.live(user)
            .filter(|record| record.hash_of(field) == Some(hash))
            .cloned()
            .collect()
    }

    pub fn insert(&mut self, user: &UserId, mut record: EncryptedRecord) -> ChangeSet {
        let base_hash = self.change_hash(user);

        record.id = ItemId::new(id::uuid());
        record.owner = user.clone();
        record.version = self.next_version();
        self.records.insert(
            record.id.clone(),
            StoredRecord {
                record: record.clone(),
                deleted: false,
            },
        );

        ChangeSet {
            base_hash,
            change_hash: self.change_hash(user),
            upserted: vec![record],
            removed: Vec::new(),
        }
    }

    fn check_writable(&self, id: &ItemId, user: &UserId) -> StoreResult<()> {
        match self.records.get(id) {
            None => Err(StoreError::NotFound(id.clone())),
            Some(stored) if &stored.record.owner != user => Err(StoreError::Ownership(id.clone())),
            Some(stored) if stored.deleted => Err(StoreError::NotFound(id.clone())),
            Some(_) => Ok(()),
        }
    }

    pub fn update(
        &mut self,
        id: &ItemId,
        user: &UserId,
        mut record: EncryptedRecord,
    ) -> StoreResult<ChangeSet> {
        self.check_writable(id, user)?;
        let base_hash = self.change_hash(user);
        let version = self.next_version();

        let stored = self
            .records
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        record.id = id.clone();
        record.owner = user.clone();
        record.created = stored.record.created;
        record.version = version;
        stored.record = record.clone();

        Ok(ChangeSet {
            base_hash,
            change_hash: self.change_hash(user),
            upserted: vec![record],
            removed: Vec::new(),
        })
    }

    pub fn delete(&mut self, id: &ItemId, user: &UserId) -> StoreResult<ChangeSet> {
        self.check_writable(id, user)?;
        let base_hash = self.change_hash(user);
        let version = self.next_version();

        let stored = self
            .records
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        stored.deleted = true;
        stored.record.version = version;
        // Tombstones keep routing metadata only.
        stored.record.fields.clear();

        Ok(ChangeSet {
            base_hash,
            change_hash: self.change_hash(user),
            upserted: Vec::new(),
            removed: vec![id.clone()],
        })
    }

    /// Rewrite a live record in place, bypassing ownership checks.
    pub fn modify(
        &mut self,
        id: &ItemId,
        edit: impl FnOnce(&mut EncryptedRecord),
    ) -> StoreResult<(UserId, ChangeSet)> {
        let owner = match self.records.get(id) {
            Some(stored) if !stored.deleted => stored.record.owner.clone(),
            _ => return Err(StoreError::NotFound(id.clone())),
        };
        let base_hash = self.change_hash(&owner);
        let version = self.next_version();

        let stored = self
            .records
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        edit(&mut stored.record);
        stored.record.id = id.clone();
        stored.record.owner = owner.clone();
        stored.record.version = version;
        let record = stored.record.clone();

        let change = ChangeSet {
            base_hash,
            change_hash: self.change_hash(&owner),
            upserted: vec![record],
            removed: Vec::new(),
        };
        Ok((owner, change))
    }

    /// Raw stored form of a record, tombstones included.
    pub fn raw(&self, id: &ItemId) -> Option<(EncryptedRecord, bool)> {
        self.records
            .get(id)
            .map(|stored| (stored.record.clone(), stored.deleted))
    }

    pub fn salt(&self, user: &UserId) -> StoreResult<Option<Vec<u8>>> {
        self.salts
            .get(user)
            .map(|encoded| {
                hex::decode(encoded).map_err(|e| StoreError::Storage(format!("corrupt salt: {e}")))
            })
            .transpose()
    }

    pub fn set_salt_if_absent(&mut self, user: &UserId, salt: &[u8]) -> StoreResult<Vec<u8>> {
        if let Some(existing) = self.salt(user)? {
            return Ok(existing);
        }
        self.salts.insert(user.clone(), hex::encode(salt));
        Ok(salt.to_vec())
    }
}
