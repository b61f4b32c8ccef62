//! Change feed plumbing.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tracing::debug;
use vaultkeep_core::{EncryptedRecord, ItemId, UserId};

use crate::error::StoreError;

/// One committed change to a user's records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Change hash before the change.
    pub base_hash: String,
    /// Change hash after the change.
    pub change_hash: String,
    /// Records inserted or replaced, in their stored form.
    pub upserted: Vec<EncryptedRecord>,
    /// Records tombstoned.
    pub removed: Vec<ItemId>,
}

/// Event delivered to a [`Subscription`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Changed(ChangeSet),
    /// The feed failed. No further events follow on this subscription.
    Error(StoreError),
}

type Listeners = HashMap<UserId, Vec<(u64, mpsc::UnboundedSender<StoreEvent>)>>;

/// Subscriber registry of one store.
#[derive(Default)]
pub(crate) struct Feed {
    listeners: Mutex<Listeners>,
    next_id: AtomicU64,
}

impl Feed {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn subscribe(self: &Arc<Self>, user: &UserId) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners
            .lock()
            .entry(user.clone())
            .or_default()
            .push((id, tx));
        debug!(user_id = %user, subscription = id, "subscribed to change feed");

        Subscription {
            id,
            user: user.clone(),
            events: rx,
            feed: Arc::downgrade(self),
        }
    }

    /// Deliver `change` to every subscriber of `user`.
    pub fn publish(&self, user: &UserId, change: ChangeSet) {
        let mut listeners = self.listeners.lock();
        if let Some(subscribers) = listeners.get_mut(user) {
            subscribers.retain(|(_, tx)| tx.send(StoreEvent::Changed(change.clone())).is_ok());
        }
    }

    /// Fail every subscription of `user` with `error` and drop them.
    pub fn fail(&self, user: &UserId, error: StoreError) {
        if let Some(subscribers) = self.listeners.lock().remove(user) {
            for (_, tx) in subscribers {
                let _ = tx.send(StoreEvent::Error(error.clone()));
            }
        }
    }

    /// Fail every subscription of every user.
    pub fn fail_all(&self, error: StoreError) {
        let drained: Vec<_> = self.listeners.lock().drain().collect();
        for (_, subscribers) in drained {
            for (_, tx) in subscribers {
                let _ = tx.send(StoreEvent::Error(error.clone()));
            }
        }
    }

    pub fn subscriber_count(&self, user: &UserId) -> usize {
        self.listeners.lock().get(user).map_or(0, Vec::len)
    }

    fn remove(&self, user: &UserId, id: u64) {
        let mut listeners = self.listeners.lock();
        if let Some(subscribers) = listeners.get_mut(user) {
            subscribers.retain(|(sid, _)| *sid != id);
            if subscribers.is_empty() {
                listeners.remove(user);
            }
        }
    }
}

/// A live change feed for one user.
///
/// Dropping the subscription unsubscribes it.
pub struct Subscription {
    id: u64,
    user: UserId,
    events: mpsc::UnboundedReceiver<StoreEvent>,
    feed: Weak<Feed>,
}

impl Subscription {
    /// Next event, or `None` once the store closed the feed.
    pub async fn next(&mut self) -> Option<StoreEvent> {
        self.events.recv().await
    }

    /// Next event if one is already queued.
    pub fn try_next(&mut self) -> Option<StoreEvent> {
        self.events.try_recv().ok()
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }

    /// Stop receiving events.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(feed) = self.feed.upgrade() {
            feed.remove(&self.user, self.id);
            debug!(user_id = %self.user, subscription = self.id, "unsubscribed from change feed");
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("user", &self.user)
            .finish()
    }
}
