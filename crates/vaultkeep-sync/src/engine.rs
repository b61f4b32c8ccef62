//! The sync engine.
//!
//! One [`SyncEngine`] per unlocked vault. It keeps the decrypted item list,
//! applies mutations optimistically before the store confirms them, and
//! follows the store's change feed:
//!
//! - an event whose `base_hash` matches the last applied hash is applied in
//!   place, decrypting only the records it carries
//! - an event whose `change_hash` was already applied is ignored
//! - anything else means events were missed, so the engine refetches
//!
//! Feed failures are reported in the snapshot and retried with backoff.

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use vaultkeep_core::config::SyncConfig;
use vaultkeep_core::{Config, EncryptedRecord, HashField, ItemId, NewItem, UserId, VaultItem};
use vaultkeep_crypto::{normalize_search_value, open_record, search_hash, seal_item, SessionKey};

use crate::cache::LocalCache;
use crate::error::{Result, SyncError};
use crate::store::{ChangeSet, FetchOptions, StoreEvent, Subscription, VaultStore};

/// One item in the vault list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultEntry {
    Item(VaultItem),
    /// A record that could not be decrypted. The rest of the list is unaffected.
    Unreadable { id: ItemId, error: SyncError },
}

impl VaultEntry {
    pub fn id(&self) -> &ItemId {
        match self {
            VaultEntry::Item(item) => &item.id,
            VaultEntry::Unreadable { id, .. } => id,
        }
    }

    pub fn item(&self) -> Option<&VaultItem> {
        match self {
            VaultEntry::Item(item) => Some(item),
            VaultEntry::Unreadable { .. } => None,
        }
    }

    pub fn into_item(self) -> Option<VaultItem> {
        match self {
            VaultEntry::Item(item) => Some(item),
            VaultEntry::Unreadable { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&SyncError> {
        match self {
            VaultEntry::Item(_) => None,
            VaultEntry::Unreadable { error, .. } => Some(error),
        }
    }
}

/// Engine lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Uninitialized,
    Loading,
    Ready,
    Error,
}

/// What UI consumers observe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultSnapshot {
    pub status: SyncStatus,
    pub entries: Vec<VaultEntry>,
    pub loading: bool,
    /// Blocking when `status` is `Error`, a recoverable banner otherwise.
    pub error: Option<SyncError>,
}

impl Default for VaultSnapshot {
    fn default() -> Self {
        Self {
            status: SyncStatus::Uninitialized,
            entries: Vec::new(),
            loading: false,
            error: None,
        }
    }
}

impl VaultSnapshot {
    /// Readable items.
    pub fn items(&self) -> impl Iterator<Item = &VaultItem> {
        self.entries.iter().filter_map(VaultEntry::item)
    }

    pub fn unreadable(&self) -> impl Iterator<Item = &VaultEntry> {
        self.entries.iter().filter(|e| e.item().is_none())
    }

    pub fn get(&self, id: &ItemId) -> Option<&VaultEntry> {
        self.entries.iter().find(|e| e.id() == id)
    }
}

/// Counters that make the sync strategy observable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub full_fetches: u64,
    pub targeted_updates: u64,
    pub ignored_events: u64,
    pub stale_responses: u64,
}

/// Result of an update or delete that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The store accepted the change.
    Applied,
    /// The record was already gone remotely; the local copy was dropped.
    RemovedRemotely,
}

#[derive(Debug)]
struct State {
    status: SyncStatus,
    entries: Vec<VaultEntry>,
    error: Option<SyncError>,
    applied_hash: Option<String>,
}

struct Inner {
    user: UserId,
    store: Arc<dyn VaultStore>,
    key: RwLock<Option<Arc<SessionKey>>>,
    cache: LocalCache,
    sync: SyncConfig,
    sweep_interval: Duration,
    state: Mutex<State>,
    snapshot: watch::Sender<VaultSnapshot>,
    generation: AtomicU64,
    stats: Mutex<SyncStats>,
}

/// Synchronizes one user's vault with the store.
pub struct SyncEngine {
    inner: Arc<Inner>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SyncEngine {
    pub fn new(user: UserId, store: Arc<dyn VaultStore>, key: SessionKey, config: &Config) -> Self {
        let (snapshot, _) = watch::channel(VaultSnapshot::default());
        let inner = Inner {
            cache: LocalCache::new(user.clone(), config.cache.ttl()),
            user,
            store,
            key: RwLock::new(Some(Arc::new(key))),
            sync: config.sync.clone(),
            sweep_interval: config.cache.sweep_interval(),
            state: Mutex::new(State {
                status: SyncStatus::Uninitialized,
                entries: Vec::new(),
                error: None,
                applied_hash: None,
            }),
            snapshot,
            generation: AtomicU64::new(0),
            stats: Mutex::new(SyncStats::default()),
        };
        Self {
            inner: Arc::new(inner),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn user(&self) -> &UserId {
        &self.inner.user
    }

    /// Subscribe to the change feed, load the vault, and start the
    /// background listener and cache sweeper.
    ///
    /// A load failure is returned and also published in the snapshot; the
    /// listener keeps retrying connection failures either way.
    pub async fn start(&self) -> Result<()> {
        self.stop_tasks();
        self.inner.key()?;

        let subscription = self.inner.store.subscribe(&self.inner.user).await;
        let loaded = self.inner.refresh().await;

        let listener = {
            let inner = self.inner.clone();
            let initial = subscription.map_err(SyncError::from);
            tokio::spawn(async move { inner.listen(initial).await })
        };
        let sweeper = {
            let inner = self.inner.clone();
            tokio::spawn(async move { inner.sweep_loop().await })
        };
        self.tasks.lock().extend([listener, sweeper]);

        info!(user_id = %self.inner.user, "sync engine started");
        loaded
    }

    /// Restart after a blocking error.
    pub async fn retry(&self) -> Result<()> {
        self.start().await
    }

    /// Stop background work and destroy the key and all decrypted state.
    pub fn close(&self) {
        self.stop_tasks();
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.key.write().take();
        self.inner.cache.clear();
        {
            let mut state = self.inner.state.lock();
            state.status = SyncStatus::Uninitialized;
            state.entries.clear();
            state.error = None;
            state.applied_hash = None;
        }
        self.inner.publish();
        info!(user_id = %self.inner.user, "sync engine closed");
    }

    pub fn is_open(&self) -> bool {
        self.inner.key.read().is_some()
    }

    fn stop_tasks(&self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }

    /// Observe snapshot transitions, optimistic states included.
    pub fn watch(&self) -> watch::Receiver<VaultSnapshot> {
        self.inner.snapshot.subscribe()
    }

    pub fn snapshot(&self) -> VaultSnapshot {
        self.inner.snapshot.borrow().clone()
    }

    pub fn status(&self) -> SyncStatus {
        self.inner.state.lock().status
    }

    /// Readable items of the current snapshot.
    pub fn items(&self) -> Vec<VaultItem> {
        self.snapshot().items().cloned().collect()
    }

    pub fn stats(&self) -> SyncStats {
        *self.inner.stats.lock()
    }

    /// Refetch and decrypt everything.
    pub async fn refresh(&self) -> Result<()> {
        self.inner.refresh().await
    }

    /// The vault list, served from the cache when `options.use_cache` is set
    /// and the cache is still valid.
    ///
    /// A limit (from `options`, else `sync.fetch_limit`) only trims the
    /// returned list. The session state and the cache always hold the whole
    /// vault.
    pub async fn get_all(&self, options: FetchOptions) -> Result<Vec<VaultEntry>> {
        self.inner.key()?;
        let limit = options.limit.or(self.inner.sync.fetch_limit);
        if options.use_cache {
            if let Some(entries) = self.cache_lookup().await? {
                return Ok(limited(entries, limit));
            }
            debug!(user_id = %self.inner.user, "cache miss, refetching");
        }

        self.inner.refresh().await?;
        Ok(limited(self.snapshot().entries, limit))
    }

    /// The cached list if it is still valid against the store.
    pub async fn cache_lookup(&self) -> Result<Option<Vec<VaultEntry>>> {
        let info = self.inner.store.get_change_info(&self.inner.user).await?;
        Ok(self.inner.cache.lookup(&info.change_hash))
    }

    /// Items whose `field` equals `value`, matched by keyed hash on the store.
    pub async fn find_exact(&self, field: HashField, value: &str) -> Result<Vec<VaultItem>> {
        let key = self.inner.key()?;
        let hash = search_hash(&key, &normalize_search_value(value))?;
        let records = self
            .inner
            .store
            .find_by_hash(&self.inner.user, field, &hash)
            .await?;
        let entries = open_batch(key, records).await?;
        Ok(entries.into_iter().filter_map(VaultEntry::into_item).collect())
    }

    /// Case-insensitive text filter over the decrypted items.
    pub fn search(&self, query: &str) -> Vec<VaultItem> {
        let needle = query.trim().to_lowercase();
        self.snapshot()
            .items()
            .filter(|item| needle.is_empty() || matches_query(item, &needle))
            .cloned()
            .collect()
    }

    /// Add an item. It shows up under a placeholder id immediately and is
    /// renamed once the store assigns the real id.
    pub async fn add(&self, new: NewItem) -> Result<ItemId> {
        new.validate()?;
        let key = self.inner.key()?;
        let user = &self.inner.user;

        let item = VaultItem::from_new(ItemId::pending(), new, Utc::now());
        let placeholder = item.id.clone();
        self.inner.upsert_local(VaultEntry::Item(item.clone()));

        let result = async {
            let record = seal_item(&key, user, &item)?;
            let id = self.inner.store.add(user, record).await?;
            Ok::<ItemId, SyncError>(id)
        }
        .await;

        match result {
            Ok(id) => {
                let mut confirmed = item;
                confirmed.id = id.clone();
                self.inner.confirm_insert(&placeholder, confirmed);
                info!(user_id = %user, item_id = %id, "item added");
                Ok(id)
            }
            Err(e) => {
                self.inner.remove_local(&placeholder);
                warn!(user_id = %user, error = %e, "add failed, rolled back");
                Err(e)
            }
        }
    }

    /// Replace an item. `last_modified` is bumped and stays strictly increasing.
    pub async fn update(&self, mut item: VaultItem) -> Result<MutationOutcome> {
        if item.id.is_pending() {
            return Err(SyncError::InvalidItem("item has not been saved yet".to_string()));
        }
        item.validate()?;
        let key = self.inner.key()?;
        let user = &self.inner.user;

        let previous = self.inner.find_local(&item.id);
        if let Some((_, VaultEntry::Item(prev))) = &previous {
            item.last_modified = item.last_modified.max(prev.last_modified);
        }
        item.touch(Utc::now());
        self.inner.upsert_local(VaultEntry::Item(item.clone()));

        let result = async {
            let record = seal_item(&key, user, &item)?;
            self.inner.store.update(&item.id, user, record).await?;
            Ok::<(), SyncError>(())
        }
        .await;

        match result {
            Ok(()) => {
                debug!(user_id = %user, item_id = %item.id, "item updated");
                Ok(MutationOutcome::Applied)
            }
            Err(SyncError::NotFound(id)) => {
                self.inner.remove_local(&id);
                info!(user_id = %user, item_id = %id, "item was removed remotely, dropped local copy");
                Ok(MutationOutcome::RemovedRemotely)
            }
            Err(e) => {
                match previous {
                    Some((index, entry)) => self.inner.restore_local(index, entry),
                    None => self.inner.remove_local(&item.id),
                }
                warn!(user_id = %user, item_id = %item.id, error = %e, "update failed, rolled back");
                Err(e)
            }
        }
    }

    /// Delete an item. Deleting something already gone counts as success.
    pub async fn delete(&self, id: &ItemId) -> Result<MutationOutcome> {
        if id.is_pending() {
            return Err(SyncError::InvalidItem("item has not been saved yet".to_string()));
        }
        self.inner.key()?;
        let user = &self.inner.user;

        let previous = self.inner.find_local(id);
        self.inner.remove_local(id);

        match self.inner.store.delete(id, user).await.map_err(SyncError::from) {
            Ok(()) => {
                info!(user_id = %user, item_id = %id, "item deleted");
                Ok(MutationOutcome::Applied)
            }
            Err(SyncError::NotFound(_)) => {
                debug!(user_id = %user, item_id = %id, "item already deleted remotely");
                Ok(MutationOutcome::RemovedRemotely)
            }
            Err(e) => {
                if let Some((index, entry)) = previous {
                    self.inner.restore_local(index, entry);
                }
                warn!(user_id = %user, item_id = %id, error = %e, "delete failed, rolled back");
                Err(e)
            }
        }
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        self.stop_tasks();
    }
}

impl Inner {
    fn key(&self) -> Result<Arc<SessionKey>> {
        self.key.read().clone().ok_or(SyncError::KeyUnavailable)
    }

    fn publish(&self) {
        let snapshot = {
            let state = self.state.lock();
            VaultSnapshot {
                status: state.status,
                entries: state.entries.clone(),
                loading: state.status == SyncStatus::Loading,
                error: state.error.clone(),
            }
        };
        self.snapshot.send_replace(snapshot);
    }

    fn set_status(&self, status: SyncStatus) {
        self.state.lock().status = status;
        self.publish();
    }

    /// Blocking error: the caller has to retry.
    fn set_error(&self, error: SyncError) {
        {
            let mut state = self.state.lock();
            state.status = SyncStatus::Error;
            state.error = Some(error);
        }
        self.publish();
    }

    /// Recoverable error: the list stays usable while the engine retries.
    fn set_warning(&self, error: SyncError) {
        self.state.lock().error = Some(error);
        self.publish();
    }

    async fn refresh(&self) -> Result<()> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.set_status(SyncStatus::Loading);

        let result = self.fetch(generation).await;
        if let Err(e) = &result {
            if self.generation.load(Ordering::SeqCst) == generation {
                warn!(user_id = %self.user, error = %e, "vault load failed");
                self.set_error(e.clone());
            }
        }
        result
    }

    async fn fetch(&self, generation: u64) -> Result<()> {
        let key = self.key()?;
        let info = self.store.get_change_info(&self.user).await?;
        let records = self.store.get_all(&self.user, FetchOptions::fresh()).await?;
        let count = records.len();
        let entries = open_batch(key, records).await?;

        {
            let mut state = self.state.lock();
            if self.generation.load(Ordering::SeqCst) != generation {
                drop(state);
                self.stats.lock().stale_responses += 1;
                debug!(user_id = %self.user, generation, "discarding superseded fetch");
                return Ok(());
            }
            self.cache.store(entries.clone(), info.change_hash.clone());
            state.entries = entries;
            state.applied_hash = Some(info.change_hash);
            state.status = SyncStatus::Ready;
            state.error = None;
        }
        self.stats.lock().full_fetches += 1;
        self.publish();

        debug!(user_id = %self.user, records = count, "vault loaded");
        Ok(())
    }

    async fn listen(self: Arc<Self>, initial: Result<Subscription>) {
        let mut subscription = match initial {
            Ok(subscription) => subscription,
            Err(e) => match self.reconnect(e).await {
                Some(subscription) => subscription,
                None => return,
            },
        };

        loop {
            let failure = match subscription.next().await {
                Some(StoreEvent::Changed(change)) => {
                    self.apply_change(change).await;
                    continue;
                }
                Some(StoreEvent::Error(e)) => SyncError::from(e),
                None => SyncError::Connection("change feed closed".to_string()),
            };

            warn!(user_id = %self.user, error = %failure, "change feed failed");
            drop(subscription);
            subscription = match self.reconnect(failure).await {
                Some(subscription) => subscription,
                None => return,
            };
        }
    }

    async fn reconnect(&self, failure: SyncError) -> Option<Subscription> {
        self.set_warning(failure);

        for attempt in 1..=self.sync.max_retries {
            tokio::time::sleep(self.sync.retry_delay(attempt)).await;
            match self.store.subscribe(&self.user).await {
                Ok(subscription) => {
                    info!(user_id = %self.user, attempt, "change feed reconnected");
                    // Anything could have changed while disconnected.
                    let _ = self.refresh().await;
                    return Some(subscription);
                }
                Err(e) => debug!(user_id = %self.user, attempt, error = %e, "reconnect failed"),
            }
        }

        error!(user_id = %self.user, attempts = self.sync.max_retries, "giving up on change feed");
        self.set_error(SyncError::Connection(format!(
            "change feed unavailable after {} attempts",
            self.sync.max_retries
        )));
        None
    }

    async fn apply_change(&self, change: ChangeSet) {
        let applied = self.state.lock().applied_hash.clone();
        if applied.as_deref() == Some(change.change_hash.as_str()) {
            self.stats.lock().ignored_events += 1;
            return;
        }
        if applied.as_deref() != Some(change.base_hash.as_str()) {
            debug!(user_id = %self.user, "missed changes, refetching");
            let _ = self.refresh().await;
            return;
        }

        let key = match self.key() {
            Ok(key) => key,
            Err(_) => return,
        };
        let upserted = match open_batch(key, change.upserted).await {
            Ok(entries) => entries,
            Err(e) => {
                self.set_error(e);
                return;
            }
        };

        {
            let mut state = self.state.lock();
            if state.applied_hash.as_deref() != Some(change.base_hash.as_str()) {
                // A refresh landed while decrypting; it already has this change or newer.
                drop(state);
                self.stats.lock().stale_responses += 1;
                return;
            }
            for entry in &upserted {
                upsert_entry(&mut state.entries, entry.clone());
                self.cache.upsert(entry.clone());
            }
            for id in &change.removed {
                state.entries.retain(|e| e.id() != id);
                self.cache.remove(id);
            }
            state.applied_hash = Some(change.change_hash.clone());
            self.cache.set_change_hash(change.change_hash);
        }
        self.stats.lock().targeted_updates += 1;
        self.publish();
    }

    async fn sweep_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.sweep_interval);
        interval.tick().await;
        loop {
            interval.tick().await;
            self.cache.sweep();
        }
    }

    fn find_local(&self, id: &ItemId) -> Option<(usize, VaultEntry)> {
        let state = self.state.lock();
        state
            .entries
            .iter()
            .position(|e| e.id() == id)
            .map(|index| (index, state.entries[index].clone()))
    }

    fn upsert_local(&self, entry: VaultEntry) {
        upsert_entry(&mut self.state.lock().entries, entry.clone());
        self.cache.upsert(entry);
        self.publish();
    }

    fn remove_local(&self, id: &ItemId) {
        self.state.lock().entries.retain(|e| e.id() != id);
        self.cache.remove(id);
        self.publish();
    }

    fn restore_local(&self, index: usize, entry: VaultEntry) {
        {
            let mut state = self.state.lock();
            state.entries.retain(|e| e.id() != entry.id());
            let index = index.min(state.entries.len());
            state.entries.insert(index, entry.clone());
        }
        self.cache.upsert(entry);
        self.publish();
    }

    /// Swap the placeholder for the stored item, unless the change feed
    /// delivered it first.
    fn confirm_insert(&self, placeholder: &ItemId, item: VaultItem) {
        {
            let mut state = self.state.lock();
            let slot = state.entries.iter().position(|e| e.id() == placeholder);
            let delivered = state.entries.iter().any(|e| e.id() == &item.id);
            match (slot, delivered) {
                (Some(index), false) => state.entries[index] = VaultEntry::Item(item.clone()),
                (Some(index), true) => {
                    state.entries.remove(index);
                }
                (None, false) => state.entries.insert(0, VaultEntry::Item(item.clone())),
                (None, true) => {}
            }
        }
        self.cache.confirm_insert(placeholder, VaultEntry::Item(item));
        self.publish();
    }
}

fn upsert_entry(entries: &mut Vec<VaultEntry>, entry: VaultEntry) {
    match entries.iter_mut().find(|e| e.id() == entry.id()) {
        Some(slot) => *slot = entry,
        None => entries.insert(0, entry),
    }
}

fn limited(mut entries: Vec<VaultEntry>, limit: Option<usize>) -> Vec<VaultEntry> {
    if let Some(limit) = limit {
        entries.truncate(limit);
    }
    entries
}

fn matches_query(item: &VaultItem, needle: &str) -> bool {
    let contains = |value: &str| value.to_lowercase().contains(needle);
    contains(&item.name)
        || item.username().is_some_and(contains)
        || item.url().is_some_and(contains)
        || item.notes.as_deref().is_some_and(contains)
        || item.tags.iter().any(|tag| contains(tag))
}

/// Decrypt a batch off the async threads. Failures are isolated per record.
async fn open_batch(key: Arc<SessionKey>, records: Vec<EncryptedRecord>) -> Result<Vec<VaultEntry>> {
    tokio::task::spawn_blocking(move || {
        records
            .iter()
            .map(|record| match open_record(&key, record) {
                Ok(item) => VaultEntry::Item(item),
                Err(e) => {
                    warn!(item_id = %record.id, error = %e, "skipping unreadable record");
                    VaultEntry::Unreadable {
                        id: record.id.clone(),
                        error: e.into(),
                    }
                }
            })
            .collect()
    })
    .await
    .map_err(|e| SyncError::Decryption(format!("decryption task failed: {e}")))
}
