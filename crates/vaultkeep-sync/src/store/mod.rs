//! The remote store contract.
//!
//! A [`VaultStore`] is a document collection of [`EncryptedRecord`]s scoped
//! by owner, with a change feed and a cheap change probe. It never sees
//! plaintext: records arrive already sealed and salts are not secret.

mod collection;
mod feed;
mod file;
mod memory;

pub use collection::change_hash;
pub use feed::{ChangeSet, StoreEvent, Subscription};
pub use file::FileVaultStore;
pub use memory::MemoryVaultStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use vaultkeep_core::{EncryptedRecord, HashField, ItemId, UserId};

use crate::error::StoreResult;

/// Options for [`VaultStore::get_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Return at most this many records, most recently modified first.
    pub limit: Option<usize>,
    /// Serve from the local cache when it is still valid. Honored by
    /// [`SyncEngine::get_all`](crate::SyncEngine::get_all); stores ignore it.
    pub use_cache: bool,
}

impl FetchOptions {
    pub fn cached() -> Self {
        Self {
            limit: None,
            use_cache: true,
        }
    }

    pub fn fresh() -> Self {
        Self::default()
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Result of [`VaultStore::get_change_info`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeInfo {
    /// Fingerprint of the user's live records; see [`change_hash`].
    pub change_hash: String,
}

/// Persistence contract for encrypted vault records.
#[async_trait]
pub trait VaultStore: Send + Sync {
    /// Insert a record for `user`. The store assigns the id and version.
    async fn add(&self, user: &UserId, record: EncryptedRecord) -> StoreResult<ItemId>;

    /// Replace the record `id`.
    ///
    /// Fails with `NotFound` if it was removed and with `Ownership` if it
    /// belongs to someone else.
    async fn update(&self, id: &ItemId, user: &UserId, record: EncryptedRecord) -> StoreResult<()>;

    /// Tombstone the record `id`. Same failure modes as [`update`](Self::update).
    async fn delete(&self, id: &ItemId, user: &UserId) -> StoreResult<()>;

    /// Live records of `user`, most recently modified first.
    async fn get_all(&self, user: &UserId, options: FetchOptions) -> StoreResult<Vec<EncryptedRecord>>;

    /// Open a change feed for `user`.
    async fn subscribe(&self, user: &UserId) -> StoreResult<Subscription>;

    /// Current change hash of `user`'s records.
    async fn get_change_info(&self, user: &UserId) -> StoreResult<ChangeInfo>;

    /// Live records of `user` whose `field` hash equals `hash`.
    async fn find_by_hash(
        &self,
        user: &UserId,
        field: HashField,
        hash: &str,
    ) -> StoreResult<Vec<EncryptedRecord>>;

    /// The key derivation salt stored for `user`, if any.
    async fn load_salt(&self, user: &UserId) -> StoreResult<Option<Vec<u8>>>;

    /// Store `salt` for `user` unless one exists. Returns the stored salt.
    async fn save_salt(&self, user: &UserId, salt: &[u8]) -> StoreResult<Vec<u8>>;
}
