//! Unlock, edit, lock, and unlock again against one store.

use std::sync::Arc;
use vaultkeep_core::{IdentityFields, ItemCategory, ItemDetails, NewItem, SecretString, UserId};
use vaultkeep_integration_tests::unlock;
use vaultkeep_sync::{MemoryVaultStore, SyncError, SyncStatus, VaultStore};

fn work_id() -> NewItem {
    NewItem::new(
        "Work ID",
        ItemDetails::Identity(IdentityFields {
            first_name: Some("Ada".to_string()),
            last_name: Some("Lovelace".to_string()),
            email: Some("ada@example.com".to_string()),
            ssn: Some(SecretString::new("078-05-1120")),
            ..Default::default()
        }),
    )
    .with_notes("badge 4411")
}

#[tokio::test]
async fn test_store_never_sees_plaintext() {
    let store = Arc::new(MemoryVaultStore::new());
    let session = unlock(store.clone(), "alice", "correct horse battery").await;

    let id = session.engine().add(work_id()).await.unwrap();

    let (record, deleted) = store.raw_record(&id).await.unwrap();
    assert!(!deleted);
    assert_eq!(record.category, ItemCategory::Identity);
    assert_eq!(record.owner, UserId::new("alice"));

    let json = serde_json::to_string(&record).unwrap();
    for plaintext in ["Work ID", "Lovelace", "ada@example.com", "078-05-1120", "badge 4411"] {
        assert!(!json.contains(plaintext), "store record leaks {plaintext}");
    }
}

#[tokio::test]
async fn test_relock_and_unlock() {
    let store = Arc::new(MemoryVaultStore::new());
    let session = unlock(store.clone(), "alice", "correct horse battery").await;
    let id = session.engine().add(work_id()).await.unwrap();

    session.lock();
    assert!(session.is_locked());
    assert!(session.engine().items().is_empty());
    assert!(matches!(
        session.engine().add(NewItem::note("late", "x")).await,
        Err(SyncError::KeyUnavailable)
    ));
    drop(session);

    let again = unlock(store.clone(), "alice", "correct horse battery").await;
    assert_eq!(again.engine().status(), SyncStatus::Ready);
    let items = again.engine().items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, id);
    assert_eq!(items[0].name, "Work ID");
    assert_eq!(items[0].notes.as_deref(), Some("badge 4411"));
}

#[tokio::test]
async fn test_wrong_password_isolates_every_record() {
    let store = Arc::new(MemoryVaultStore::new());
    let session = unlock(store.clone(), "alice", "correct horse battery").await;
    session.engine().add(work_id()).await.unwrap();
    session.engine().add(NewItem::note("Wifi", "hunter2")).await.unwrap();
    session.lock();

    let wrong = unlock(store.clone(), "alice", "incorrect horse").await;
    let snapshot = wrong.engine().snapshot();
    assert_eq!(snapshot.status, SyncStatus::Ready);
    assert_eq!(snapshot.items().count(), 0);

    let errors: Vec<_> = snapshot.unreadable().filter_map(|e| e.error()).collect();
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|e| matches!(e, SyncError::Decryption(_))));
}

#[tokio::test]
async fn test_salt_is_per_user() {
    let store = Arc::new(MemoryVaultStore::new());
    let _alice = unlock(store.clone(), "alice", "same password").await;
    let _bob = unlock(store.clone(), "bob", "same password").await;

    let alice_salt = store.load_salt(&UserId::new("alice")).await.unwrap().unwrap();
    let bob_salt = store.load_salt(&UserId::new("bob")).await.unwrap().unwrap();
    assert_ne!(alice_salt, bob_salt);
}

#[tokio::test]
async fn test_file_store_survives_reopen() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("vault.json");

    let id = {
        let store = Arc::new(vaultkeep_sync::FileVaultStore::open(&path).unwrap());
        let session = unlock(store, "alice", "pw-on-disk").await;
        let id = session.engine().add(NewItem::login("Bank", Some("ada"), Some("k3y!k3y!k3y"))).await.unwrap();
        session.lock();
        id
    };

    let store = Arc::new(vaultkeep_sync::FileVaultStore::open(&path).unwrap());
    let session = unlock(store, "alice", "pw-on-disk").await;
    let items = session.engine().items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, id);
    assert_eq!(items[0].password().map(|p| p.expose_secret()), Some("k3y!k3y!k3y"));
}

#[tokio::test]
async fn test_server_side_field_moves_are_detected() {
    let store = Arc::new(MemoryVaultStore::new());
    let session = unlock(store.clone(), "alice", "correct horse battery").await;
    let engine = session.engine();

    let bank = engine
        .add(NewItem::login("Bank", Some("ada"), Some("k3y!k3y!k3y")).with_notes("branch 12"))
        .await
        .unwrap();
    let mail = engine
        .add(NewItem::login("Mail", Some("ada"), Some("m41l-secret")).with_notes("recovery"))
        .await
        .unwrap();
    let wifi = engine.add(NewItem::note("Wifi", "hunter2")).await.unwrap();

    // Swap two fields inside one record.
    store
        .tamper(&bank, |record| {
            let password = record.fields.remove("password").unwrap();
            let notes = record.fields.remove("notes").unwrap();
            record.fields.insert("password".to_string(), notes);
            record.fields.insert("notes".to_string(), password);
        })
        .await
        .unwrap();

    // Copy a field from another record.
    let (donor, _) = store.raw_record(&bank).await.unwrap();
    store
        .tamper(&mail, |record| {
            record.fields.insert("notes".to_string(), donor.fields["notes"].clone());
        })
        .await
        .unwrap();

    engine.refresh().await.unwrap();
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.status, SyncStatus::Ready);
    for id in [&bank, &mail] {
        let entry = snapshot.get(id).unwrap();
        assert!(matches!(entry.error(), Some(SyncError::Decryption(_))), "{id} opened after tampering");
    }
    assert_eq!(snapshot.get(&wifi).and_then(|e| e.item()).map(|i| i.name.as_str()), Some("Wifi"));
}
