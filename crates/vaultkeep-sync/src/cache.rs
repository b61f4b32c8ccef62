//! Per-session cache of decrypted items.
//!
//! An entry is valid only while it is younger than the TTL *and* its change
//! hash still matches the store's. Anything else is a logical miss.

use parking_lot::RwLock;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;
use vaultkeep_core::{ItemId, UserId};

use crate::engine::VaultEntry;

/// Cached view of one user's vault.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub items: Vec<VaultEntry>,
    /// Store change hash the items correspond to. `None` once invalidated.
    pub change_hash: Option<String>,
    pub last_fetch: Instant,
}

impl CacheEntry {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.last_fetch.elapsed() < ttl
    }
}

/// TTL-bound cache owned by one vault session.
pub struct LocalCache {
    user: UserId,
    ttl: Duration,
    entry: RwLock<Option<CacheEntry>>,
}

impl LocalCache {
    pub fn new(user: UserId, ttl: Duration) -> Self {
        Self {
            user,
            ttl,
            entry: RwLock::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Replace the entry with a fresh fetch.
    pub fn store(&self, items: Vec<VaultEntry>, change_hash: String) {
        *self.entry.write() = Some(CacheEntry {
            items,
            change_hash: Some(change_hash),
            last_fetch: Instant::now(),
        });
    }

    /// The cached items if the entry is fresh and matches `current_hash`.
    pub fn lookup(&self, current_hash: &str) -> Option<Vec<VaultEntry>> {
        let entry = self.entry.read();
        let entry = entry.as_ref()?;
        if !entry.is_fresh(self.ttl) {
            debug!(user_id = %self.user, "cache entry expired");
            return None;
        }
        if entry.change_hash.as_deref() != Some(current_hash) {
            debug!(user_id = %self.user, "cache entry stale");
            return None;
        }
        Some(entry.items.clone())
    }

    /// The entry regardless of validity.
    pub fn peek(&self) -> Option<CacheEntry> {
        self.entry.read().clone()
    }

    /// Insert or replace one item. No-op without an entry.
    pub fn upsert(&self, item: VaultEntry) {
        if let Some(entry) = self.entry.write().as_mut() {
            match entry.items.iter_mut().find(|e| e.id() == item.id()) {
                Some(slot) => *slot = item,
                None => entry.items.insert(0, item),
            }
        }
    }

    /// Replace a placeholder with the stored item once the store assigned
    /// the real id. If the change feed already delivered the real id, the
    /// placeholder is dropped instead. No-op without an entry.
    pub fn confirm_insert(&self, placeholder: &ItemId, item: VaultEntry) {
        if let Some(entry) = self.entry.write().as_mut() {
            let slot = entry.items.iter().position(|e| e.id() == placeholder);
            let delivered = entry.items.iter().any(|e| e.id() == item.id());
            match (slot, delivered) {
                (Some(index), false) => entry.items[index] = item,
                (Some(index), true) => {
                    entry.items.remove(index);
                }
                (None, false) => entry.items.insert(0, item),
                (None, true) => {}
            }
        }
    }

    pub fn remove(&self, id: &ItemId) {
        if let Some(entry) = self.entry.write().as_mut() {
            entry.items.retain(|e| e.id() != id);
        }
    }

    /// Record that the items now correspond to `change_hash`.
    pub fn set_change_hash(&self, change_hash: String) {
        if let Some(entry) = self.entry.write().as_mut() {
            entry.change_hash = Some(change_hash);
        }
    }

    /// Force the next lookup to miss.
    pub fn invalidate(&self) {
        if let Some(entry) = self.entry.write().as_mut() {
            entry.change_hash = None;
        }
    }

    /// Evict the entry if its TTL has passed. Returns whether it was evicted.
    pub fn sweep(&self) -> bool {
        let mut entry = self.entry.write();
        let expired = entry.as_ref().is_some_and(|e| !e.is_fresh(self.ttl));
        if expired {
            *entry = None;
            debug!(user_id = %self.user, "evicted expired cache entry");
        }
        expired
    }

    pub fn clear(&self) {
        *self.entry.write() = None;
    }
}
