//! Two unlocked sessions of the same user sharing one store.

use std::sync::Arc;
use vaultkeep_core::NewItem;
use vaultkeep_integration_tests::{unlock, wait_for};
use vaultkeep_sync::{MemoryVaultStore, MutationOutcome, SyncStatus};

#[tokio::test]
async fn test_changes_propagate_between_devices() {
    let store = Arc::new(MemoryVaultStore::new());
    let laptop = unlock(store.clone(), "alice", "shared secret").await;
    let phone = unlock(store.clone(), "alice", "shared secret").await;

    let id = phone
        .engine()
        .add(NewItem::login("Mail", Some("ada"), Some("first-password")))
        .await
        .unwrap();
    let seen = wait_for(laptop.engine(), |s| s.get(&id).is_some()).await;
    assert_eq!(seen.items().next().map(|i| i.name.as_str()), Some("Mail"));

    let mut edited = laptop.engine().items().remove(0);
    edited.notes = Some("rotated".to_string());
    assert_eq!(laptop.engine().update(edited).await.unwrap(), MutationOutcome::Applied);
    wait_for(phone.engine(), |s| {
        s.items().any(|i| i.notes.as_deref() == Some("rotated"))
    })
    .await;

    laptop.engine().delete(&id).await.unwrap();
    wait_for(phone.engine(), |s| s.entries.is_empty()).await;

    assert!(laptop.engine().stats().targeted_updates >= 1);
    assert!(phone.engine().stats().targeted_updates >= 2);
}

#[tokio::test]
async fn test_last_write_wins() {
    let store = Arc::new(MemoryVaultStore::new());
    let laptop = unlock(store.clone(), "alice", "shared secret").await;
    let phone = unlock(store.clone(), "alice", "shared secret").await;

    let id = laptop.engine().add(NewItem::note("Wifi", "v1")).await.unwrap();
    wait_for(phone.engine(), |s| s.get(&id).is_some()).await;

    let mut from_laptop = laptop.engine().items().remove(0);
    let mut from_phone = phone.engine().items().remove(0);
    from_laptop.notes = Some("laptop".to_string());
    from_phone.notes = Some("phone".to_string());

    laptop.engine().update(from_laptop).await.unwrap();
    phone.engine().update(from_phone).await.unwrap();

    for session in [&laptop, &phone] {
        wait_for(session.engine(), |s| {
            s.items().any(|i| i.notes.as_deref() == Some("phone"))
        })
        .await;
    }
}

#[tokio::test]
async fn test_update_after_remote_delete() {
    let store = Arc::new(MemoryVaultStore::new());
    let laptop = unlock(store.clone(), "alice", "shared secret").await;
    let phone = unlock(store.clone(), "alice", "shared secret").await;

    let id = laptop.engine().add(NewItem::note("Old", "x")).await.unwrap();
    let stale = wait_for(phone.engine(), |s| s.get(&id).is_some()).await;
    let stale = stale.items().next().cloned().unwrap();

    laptop.engine().delete(&id).await.unwrap();
    assert_eq!(
        phone.engine().update(stale).await.unwrap(),
        MutationOutcome::RemovedRemotely
    );
    assert!(phone.engine().snapshot().get(&id).is_none());
}

#[tokio::test]
async fn test_outage_then_recovery() {
    let store = Arc::new(MemoryVaultStore::new());
    let laptop = unlock(store.clone(), "alice", "shared secret").await;
    laptop.engine().add(NewItem::note("Before", "x")).await.unwrap();

    store.set_offline(true);
    let failed = wait_for(laptop.engine(), |s| s.status == SyncStatus::Error).await;
    assert!(failed.error.as_ref().is_some_and(|e| e.is_retryable()));
    assert_eq!(failed.items().count(), 1);

    store.set_offline(false);
    laptop.engine().retry().await.unwrap();
    let snapshot = laptop.engine().snapshot();
    assert_eq!(snapshot.status, SyncStatus::Ready);
    assert!(snapshot.error.is_none());
    assert_eq!(snapshot.items().count(), 1);
}

#[tokio::test]
async fn test_users_do_not_see_each_other() {
    let store = Arc::new(MemoryVaultStore::new());
    let alice = unlock(store.clone(), "alice", "alice pw").await;
    let bob = unlock(store.clone(), "bob", "bob pw").await;

    alice.engine().add(NewItem::note("Alice diary", "x")).await.unwrap();
    bob.engine().add(NewItem::note("Bob diary", "y")).await.unwrap();
    bob.engine().refresh().await.unwrap();

    let names: Vec<_> = bob.engine().items().into_iter().map(|i| i.name).collect();
    assert_eq!(names, vec!["Bob diary"]);
}
