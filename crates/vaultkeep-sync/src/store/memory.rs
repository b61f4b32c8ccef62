//! In-process vault store.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use vaultkeep_core::{EncryptedRecord, HashField, ItemId, UserId};

use super::collection::Collection;
use super::feed::{ChangeSet, Feed, Subscription};
use super::{ChangeInfo, FetchOptions, VaultStore};
use crate::error::{StoreError, StoreResult};

/// In-memory document collection with a live change feed.
///
/// Several engines sharing one `MemoryVaultStore` behave like several devices
/// on one account. The extra methods simulate the failure modes of a real
/// remote service.
pub struct MemoryVaultStore {
    collection: RwLock<Collection>,
    feed: Arc<Feed>,
    offline: AtomicBool,
    muted: AtomicBool,
}

impl Default for MemoryVaultStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryVaultStore {
    pub fn new() -> Self {
        Self {
            collection: RwLock::new(Collection::default()),
            feed: Feed::new(),
            offline: AtomicBool::new(false),
            muted: AtomicBool::new(false),
        }
    }

    fn ensure_online(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Connection("store is offline".to_string()));
        }
        Ok(())
    }

    fn publish(&self, user: &UserId, change: ChangeSet) {
        if self.muted.load(Ordering::SeqCst) {
            debug!(user_id = %user, "change feed muted, dropping notification");
            return;
        }
        self.feed.publish(user, change);
    }

    /// Make every call fail with a connection error and break open feeds.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
        if offline {
            self.feed
                .fail_all(StoreError::Connection("store went offline".to_string()));
        }
    }

    /// Commit changes without notifying subscribers.
    pub fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::SeqCst);
    }

    /// Break `user`'s open feeds with a connection error.
    pub fn inject_feed_error(&self, user: &UserId) {
        self.feed
            .fail(user, StoreError::Connection("change feed reset".to_string()));
    }

    /// Rewrite a stored record directly, as another writer would.
    pub async fn tamper(
        &self,
        id: &ItemId,
        edit: impl FnOnce(&mut EncryptedRecord) + Send,
    ) -> StoreResult<()> {
        let (owner, change) = self.collection.write().await.modify(id, edit)?;
        self.publish(&owner, change);
        Ok(())
    }

    /// Stored form of a record, including tombstoned ones.
    pub async fn raw_record(&self, id: &ItemId) -> Option<(EncryptedRecord, bool)> {
        self.collection.read().await.raw(id)
    }

    pub fn subscriber_count(&self, user: &UserId) -> usize {
        self.feed.subscriber_count(user)
    }
}

#[async_trait]
impl VaultStore for MemoryVaultStore {
    async fn add(&self, user: &UserId, record: EncryptedRecord) -> StoreResult<ItemId> {
        self.ensure_online()?;
        let change = self.collection.write().await.insert(user, record);
        let id = change.upserted[0].id.clone();
        self.publish(user, change);
        Ok(id)
    }

    async fn update(&self, id: &ItemId, user: &UserId, record: EncryptedRecord) -> StoreResult<()> {
        self.ensure_online()?;
        let change = self.collection.write().await.update(id, user, record)?;
        self.publish(user, change);
        Ok(())
    }

    async fn delete(&self, id: &ItemId, user: &UserId) -> StoreResult<()> {
        self.ensure_online()?;
        let change = self.collection.write().await.delete(id, user)?;
        self.publish(user, change);
        Ok(())
    }

    async fn get_all(&self, user: &UserId, options: FetchOptions) -> StoreResult<Vec<EncryptedRecord>> {
        self.ensure_online()?;
        Ok(self.collection.read().await.get_all(user, options.limit))
    }

    async fn subscribe(&self, user: &UserId) -> StoreResult<Subscription> {
        self.ensure_online()?;
        Ok(self.feed.subscribe(user))
    }

    async fn get_change_info(&self, user: &UserId) -> StoreResult<ChangeInfo> {
        self.ensure_online()?;
        Ok(ChangeInfo {
            change_hash: self.collection.read().await.change_hash(user),
        })
    }

    async fn find_by_hash(
        &self,
        user: &UserId,
        field: HashField,
        hash: &str,
    ) -> StoreResult<Vec<EncryptedRecord>> {
        self.ensure_online()?;
        Ok(self.collection.read().await.find_by_hash(user, field, hash))
    }

    async fn load_salt(&self, user: &UserId) -> StoreResult<Option<Vec<u8>>> {
        self.ensure_online()?;
        self.collection.read().await.salt(user)
    }

    async fn save_salt(&self, user: &UserId, salt: &[u8]) -> StoreResult<Vec<u8>> {
        self.ensure_online()?;
        self.collection.write().await.set_salt_if_absent(user, salt)
    }
}
