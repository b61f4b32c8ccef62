//! Export from one vault, import into another.

use std::sync::Arc;
use vaultkeep_core::{CardFields, ItemCategory, ItemDetails, NewItem, SecretString};
use vaultkeep_integration_tests::unlock;
use vaultkeep_sync::{export_vault, import_vault, ExportDocument, MemoryVaultStore, SyncError};

async fn seed(session: &vaultkeep_sync::VaultSession) {
    let engine = session.engine();
    engine
        .add(NewItem::login("GitHub", Some("octocat"), Some("correct-horse")).with_tag("dev"))
        .await
        .unwrap();
    engine.add(NewItem::note("Wifi", "hunter2")).await.unwrap();
    engine
        .add(NewItem::new(
            "Visa",
            ItemDetails::CreditCard(CardFields {
                cardholder: Some("Ada Lovelace".to_string()),
                number: Some(SecretString::new("4111111111111111")),
                cvv: Some(SecretString::new("123")),
                expiry: Some("08/27".to_string()),
            }),
        ))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_round_trip_between_users() {
    let store = Arc::new(MemoryVaultStore::new());
    let alice = unlock(store.clone(), "alice", "alice pw").await;
    seed(&alice).await;

    let document = export_vault(alice.engine()).unwrap();
    assert_eq!(document.metadata.item_count, 3);
    assert_eq!(document.items[&ItemCategory::Login].len(), 1);
    let json = document.to_json().unwrap();

    let bob = unlock(store.clone(), "bob", "bob pw").await;
    let report = import_vault(bob.engine(), ExportDocument::from_json(&json).unwrap())
        .await
        .unwrap();
    assert_eq!((report.imported, report.failed), (3, 0));

    let mut before = alice.engine().items();
    let mut after = bob.engine().items();
    before.sort_by(|a, b| a.name.cmp(&b.name));
    after.sort_by(|a, b| a.name.cmp(&b.name));
    for (original, imported) in before.iter().zip(&after) {
        assert_ne!(original.id, imported.id);
        assert_eq!(original.name, imported.name);
        assert_eq!(original.details, imported.details);
        assert_eq!(original.tags, imported.tags);
        assert_eq!(original.notes, imported.notes);
    }
}

#[tokio::test]
async fn test_tampered_count_rejects_whole_import() {
    let store = Arc::new(MemoryVaultStore::new());
    let alice = unlock(store.clone(), "alice", "alice pw").await;
    seed(&alice).await;

    let mut value: serde_json::Value =
        serde_json::from_str(&export_vault(alice.engine()).unwrap().to_json().unwrap()).unwrap();
    value["metadata"]["item_count"] = serde_json::json!(4);

    let bob = unlock(store.clone(), "bob", "bob pw").await;
    let document = ExportDocument::from_json(&value.to_string()).unwrap();
    let result = import_vault(bob.engine(), document).await;

    assert!(matches!(result, Err(SyncError::ImportValidation(_))));
    bob.engine().refresh().await.unwrap();
    assert!(bob.engine().items().is_empty());
}

#[tokio::test]
async fn test_misfiled_item_rejected() {
    let json = r#"{
        "metadata": { "format_version": 1, "exported_at": "2024-01-01T00:00:00Z", "item_count": 1 },
        "items": {
            "login": [{
                "id": "x", "name": "Wifi", "category": "secure-note",
                "created": "2024-01-01T00:00:00Z", "last_modified": "2024-01-01T00:00:00Z"
            }]
        }
    }"#;

    let document = ExportDocument::from_json(json).unwrap();
    let Err(SyncError::ImportValidation(message)) = document.validate() else {
        panic!("expected validation failure");
    };
    assert!(message.contains("login[0]"));
}
