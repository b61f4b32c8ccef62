//! File-backed vault store with JSON persistence.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use vaultkeep_core::{EncryptedRecord, HashField, ItemId, UserId};

use super::collection::Collection;
use super::feed::{Feed, Subscription};
use super::{ChangeInfo, FetchOptions, VaultStore};
use crate::error::{StoreError, StoreResult};

/// Vault store kept in a single JSON file.
///
/// All mutations are persisted via atomic writes (write to tmp, then rename)
/// on the blocking pool. The change feed only reaches subscribers in the same
/// process.
pub struct FileVaultStore {
    path: PathBuf,
    collection: RwLock<Collection>,
    feed: Arc<Feed>,
}

impl FileVaultStore {
    /// Open the store at `path`, starting empty if the file does not exist.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let collection = if path.exists() {
            let data = std::fs::read_to_string(&path)?;
            serde_json::from_str(&data)?
        } else {
            Collection::default()
        };
        debug!(path = %path.display(), "opened vault store");

        Ok(Self {
            path,
            collection: RwLock::new(collection),
            feed: Feed::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `edit` to a copy of the collection, persist the copy, and only
    /// then make it visible. A failed write leaves the store unchanged.
    async fn commit<T>(
        &self,
        edit: impl FnOnce(&mut Collection) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut collection = self.collection.write().await;
        let mut staged = collection.clone();
        let value = edit(&mut staged)?;

        let data = serde_json::to_string_pretty(&staged)?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&path, &data))
            .await
            .map_err(|e| StoreError::Storage(format!("write task failed: {e}")))??;

        *collection = staged;
        Ok(value)
    }
}

fn write_atomic(path: &Path, data: &str) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, data)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))?;
    }

    if let Err(e) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        warn!(path = %path.display(), error = %e, "vault store write failed");
        return Err(e.into());
    }
    Ok(())
}

#[async_trait]
impl VaultStore for FileVaultStore {
    async fn add(&self, user: &UserId, record: EncryptedRecord) -> StoreResult<ItemId> {
        let change = self.commit(|c| Ok(c.insert(user, record))).await?;

        let id = change.upserted[0].id.clone();
        self.feed.publish(user, change);
        Ok(id)
    }

    async fn update(&self, id: &ItemId, user: &UserId, record: EncryptedRecord) -> StoreResult<()> {
        let change = self.commit(|c| c.update(id, user, record)).await?;
        self.feed.publish(user, change);
        Ok(())
    }

    async fn delete(&self, id: &ItemId, user: &UserId) -> StoreResult<()> {
        let change = self.commit(|c| c.delete(id, user)).await?;
        self.feed.publish(user, change);
        Ok(())
    }

    async fn get_all(&self, user: &UserId, options: FetchOptions) -> StoreResult<Vec<EncryptedRecord>> {
        Ok(self.collection.read().await.get_all(user, options.limit))
    }

    async fn subscribe(&self, user: &UserId) -> StoreResult<Subscription> {
        Ok(self.feed.subscribe(user))
    }

    async fn get_change_info(&self, user: &UserId) -> StoreResult<ChangeInfo> {
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
        Ok(self.collection.read().await.find_by_hash(user, field, hash))
    }

    async fn load_salt(&self, user: &UserId) -> StoreResult<Option<Vec<u8>>> {
        self.collection.read().await.salt(user)
    }

    async fn save_salt(&self, user: &UserId, salt: &[u8]) -> StoreResult<Vec<u8>> {
        if let Some(existing) = self.collection.read().await.salt(user)? {
            return Ok(existing);
        }
        self.commit(|c| c.set_salt_if_absent(user, salt)).await
    }
}
